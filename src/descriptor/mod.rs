//! Descriptor of a symmetric tensor contraction.
//!
//! For every output irrep `L` and degree `ν`, the descriptor holds an
//! orthonormal basis of equivariant polynomials `Sym^ν(V_in) → V_L` together
//! with the projection of the historical (unsymmetrized) coupling paths onto
//! that basis.
//!
//! ```text
//! coupling_paths(ν) ──symmetrize──▶ Gram–Schmidt ──▶ BasisFunction (sparse)
//!        │                                              │
//!        └────────────── ⟨sym(T_p), B_b⟩ ───────────────┴──▶ projection
//! ```

mod basis;
mod plan;

pub use basis::BasisFunction;
pub use plan::{ContractionPlan, RowScratch};

use std::ops::Range;

use tracing::debug;

use crate::backend::Cpu;
use crate::error::{Error, Result};
use crate::irreps::{Irrep, Irreps};
use crate::o3::{coupling_paths, natural_irreps, CouplingPath};
use crate::tensor::Tensor;

use basis::{dot, gram_schmidt, symmetrize};

/// Highest supported polynomial degree.
///
/// Coupling paths are expanded densely (`dim^ν` entries per output component)
/// and symmetrized over `ν!` permutations, so memory grows past practical
/// limits beyond this.
pub const MAX_CONTRACTION_DEGREE: usize = 4;

/// Relative tolerance below which a symmetrized path is considered dependent.
const GRAM_SCHMIDT_TOL: f64 = 1e-7;

/// Degree at which intermediate irreps are restricted to natural parity.
const NATURAL_PARITY_DEGREE: usize = 4;

/// Exclusive bound on `l` for the natural-parity filter.
const NATURAL_PARITY_LMAX: u32 = 12;

/// Basis functions of one output block at one degree.
#[derive(Debug, Clone)]
pub struct BasisBlock {
    /// Output irrep.
    pub ir_out: Irrep,
    /// Index of the output block in `irreps_out`.
    pub out_block: usize,
    /// Polynomial degree `ν`.
    pub degree: usize,
    /// Orthonormal symmetric basis, stored sparsely.
    pub functions: Vec<BasisFunction>,
    /// Label of every coupling path feeding this block.
    pub paths: Vec<String>,
    /// Row-major `[paths, functions]` projection of symmetrized paths.
    projection: Vec<f64>,
    weight_offset: usize,
    path_offset: usize,
}

impl BasisBlock {
    pub fn num_functions(&self) -> usize {
        self.functions.len()
    }

    pub fn num_paths(&self) -> usize {
        self.paths.len()
    }

    /// Rows of the reduced weight matrix owned by this block.
    pub fn weight_range(&self) -> Range<usize> {
        self.weight_offset..self.weight_offset + self.num_functions()
    }

    /// Rows of the compatibility weight matrix owned by this block.
    pub fn path_range(&self) -> Range<usize> {
        self.path_offset..self.path_offset + self.num_paths()
    }

    /// `⟨sym(T_path), B_function⟩`.
    pub fn projection(&self, path: usize, function: usize) -> f64 {
        self.projection[path * self.num_functions() + function]
    }
}

/// Equivariant basis and weight layout of a symmetric contraction.
///
/// # Example
///
/// ```rust
/// use equicontract::{Group, Irreps, SymmetricContractionDescriptor};
///
/// let irreps_in = Irreps::parse(Group::O3, "4x0e + 4x1o + 4x2e").unwrap();
/// let irreps_out = Irreps::parse(Group::O3, "4x0e + 4x1o").unwrap();
/// let desc = SymmetricContractionDescriptor::new(&irreps_in, &irreps_out, 3).unwrap();
///
/// assert_eq!(desc.num_weights(false), 17);
/// assert_eq!(desc.num_weights(true), 41);
/// ```
#[derive(Debug, Clone)]
pub struct SymmetricContractionDescriptor {
    irreps_in: Irreps,
    irreps_out: Irreps,
    degree: usize,
    mul: usize,
    blocks: Vec<BasisBlock>,
    num_functions: usize,
    num_paths: usize,
}

impl SymmetricContractionDescriptor {
    /// Build the basis for polynomials of degree `1..=degree`.
    ///
    /// # Errors
    ///
    /// [`Error::Irreps`] when either side is empty, multiplicities are not
    /// uniform, or input and output multiplicities differ.
    /// [`Error::Config`] when `degree` is 0 or above [`MAX_CONTRACTION_DEGREE`].
    pub fn new(irreps_in: &Irreps, irreps_out: &Irreps, degree: usize) -> Result<Self> {
        if degree == 0 || degree > MAX_CONTRACTION_DEGREE {
            return Err(Error::Config(format!(
                "contraction degree must be in 1..={}, got {}",
                MAX_CONTRACTION_DEGREE, degree
            )));
        }
        let mul = shared_mul(irreps_in, irreps_out)?;

        let coupled = irreps_in.irreps();
        let natural = natural_irreps(NATURAL_PARITY_LMAX);
        let mut levels: Vec<Vec<CouplingPath>> = Vec::with_capacity(degree);
        for nu in 1..=degree {
            let filter = (nu == NATURAL_PARITY_DEGREE).then_some(natural.as_slice());
            levels.push(coupling_paths(&coupled, nu, filter)?);
        }
        let d: usize = coupled.iter().map(Irrep::dim).sum();

        let mut blocks = Vec::new();
        let mut weight_offset = 0;
        let mut path_offset = 0;
        for (out_block, block) in irreps_out.iter().enumerate() {
            let ir_out = block.ir;
            for nu in (1..=degree).rev() {
                let dout = ir_out.dim();
                let paths: Vec<&CouplingPath> =
                    levels[nu - 1].iter().filter(|p| p.ir_out == ir_out).collect();
                let symmetric: Vec<Vec<f64>> = paths
                    .iter()
                    .map(|p| symmetrize(&p.tensor, dout, d, nu))
                    .collect();
                let dense = gram_schmidt(&symmetric, GRAM_SCHMIDT_TOL);

                let mut projection = Vec::with_capacity(symmetric.len() * dense.len());
                for s in &symmetric {
                    projection.extend(dense.iter().map(|b| dot(s, b)));
                }
                let functions: Vec<BasisFunction> = dense
                    .iter()
                    .map(|b| BasisFunction::from_dense(b, dout, d, nu))
                    .collect();

                debug!(
                    ir_out = %ir_out,
                    degree = nu,
                    paths = paths.len(),
                    functions = functions.len(),
                    "symmetric basis block"
                );

                let bb = BasisBlock {
                    ir_out,
                    out_block,
                    degree: nu,
                    functions,
                    paths: paths.iter().map(|p| p.to_string()).collect(),
                    projection,
                    weight_offset,
                    path_offset,
                };
                weight_offset += bb.num_functions();
                path_offset += bb.num_paths();
                blocks.push(bb);
            }
        }

        debug!(
            irreps_in = %irreps_in,
            irreps_out = %irreps_out,
            degree,
            num_functions = weight_offset,
            num_paths = path_offset,
            "built symmetric contraction descriptor"
        );

        Ok(Self {
            irreps_in: irreps_in.clone(),
            irreps_out: irreps_out.clone(),
            degree,
            mul,
            blocks,
            num_functions: weight_offset,
            num_paths: path_offset,
        })
    }

    pub fn irreps_in(&self) -> &Irreps {
        &self.irreps_in
    }

    pub fn irreps_out(&self) -> &Irreps {
        &self.irreps_out
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Shared multiplicity of input and output.
    pub fn mul(&self) -> usize {
        self.mul
    }

    /// Blocks in weight order: output blocks in declared order, degrees descending.
    pub fn blocks(&self) -> &[BasisBlock] {
        &self.blocks
    }

    /// Size of the reduced symmetric basis.
    pub fn num_basis_functions(&self) -> usize {
        self.num_functions
    }

    /// Number of historical coupling paths.
    pub fn num_paths(&self) -> usize {
        self.num_paths
    }

    /// Weights per element and channel.
    pub fn num_weights(&self, original_mace: bool) -> usize {
        if original_mace {
            self.num_paths
        } else {
            self.num_functions
        }
    }

    /// Weight rows grouped by block, with the count used for initialization scaling.
    pub fn weight_blocks(&self, original_mace: bool) -> Vec<Range<usize>> {
        self.blocks
            .iter()
            .map(|b| {
                if original_mace {
                    b.path_range()
                } else {
                    b.weight_range()
                }
            })
            .collect()
    }

    /// Block-diagonal projection matrix of shape `(num_paths, num_basis_functions)`.
    pub fn projection(&self) -> Tensor<f64, Cpu> {
        Tensor::from_data(&self.projection_data(), &[self.num_paths, self.num_functions])
    }

    fn projection_data(&self) -> Vec<f64> {
        let (np, nf) = (self.num_paths, self.num_functions);
        let mut data = vec![0.0; np * nf];
        for b in &self.blocks {
            for (p, row) in b.path_range().enumerate() {
                for (f, col) in b.weight_range().enumerate() {
                    data[row * nf + col] = b.projection(p, f);
                }
            }
        }
        data
    }

    /// Map compatibility weights `(E, num_paths, mul)` onto the reduced basis.
    ///
    /// Returns row-major `(E, num_basis_functions, mul)`.
    pub fn project_weights(&self, compat: &[f64], num_elements: usize) -> Vec<f64> {
        use faer::Mat;

        let (np, nf, mul) = (self.num_paths, self.num_functions, self.mul);
        debug_assert_eq!(compat.len(), num_elements * np * mul);

        let p = self.projection_data();
        let pt_mat = Mat::from_fn(nf, np, |i, j| p[j * nf + i]);

        let mut out = vec![0.0; num_elements * nf * mul];
        for e in 0..num_elements {
            let w = &compat[e * np * mul..(e + 1) * np * mul];
            let w_mat = Mat::from_fn(np, mul, |i, j| w[i * mul + j]);
            let r = &pt_mat * &w_mat;
            let dst = &mut out[e * nf * mul..(e + 1) * nf * mul];
            for i in 0..nf {
                for j in 0..mul {
                    dst[i * mul + j] = r[(i, j)];
                }
            }
        }
        out
    }
}

fn shared_mul(irreps_in: &Irreps, irreps_out: &Irreps) -> Result<usize> {
    if irreps_in.is_empty() || irreps_out.is_empty() {
        return Err(Error::Irreps("input and output irreps must be non-empty".into()));
    }
    let mul_in = irreps_in.uniform_mul().ok_or_else(|| {
        Error::Irreps(format!("input irreps {} must share one multiplicity", irreps_in))
    })?;
    let mul_out = irreps_out.uniform_mul().ok_or_else(|| {
        Error::Irreps(format!("output irreps {} must share one multiplicity", irreps_out))
    })?;
    if mul_in != mul_out {
        return Err(Error::Irreps(format!(
            "input multiplicity {} differs from output multiplicity {}",
            mul_in, mul_out
        )));
    }
    if mul_in == 0 {
        return Err(Error::Irreps("multiplicity must be positive".into()));
    }
    Ok(mul_in)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::irreps::Group;
    use approx::assert_abs_diff_eq;

    fn irreps(text: &str) -> Irreps {
        Irreps::parse(Group::O3, text).unwrap()
    }

    fn mace_descriptor() -> SymmetricContractionDescriptor {
        SymmetricContractionDescriptor::new(&irreps("4x0e + 4x1o + 4x2e"), &irreps("4x0e + 4x1o"), 3)
            .unwrap()
    }

    #[test]
    fn test_block_sizes() {
        let desc = mace_descriptor();
        let sizes: Vec<(String, usize, usize, usize)> = desc
            .blocks()
            .iter()
            .map(|b| (b.ir_out.to_string(), b.degree, b.num_paths(), b.num_functions()))
            .collect();
        assert_eq!(
            sizes,
            vec![
                ("0e".into(), 3, 11, 5),
                ("0e".into(), 2, 3, 3),
                ("0e".into(), 1, 1, 1),
                ("1o".into(), 3, 21, 5),
                ("1o".into(), 2, 4, 2),
                ("1o".into(), 1, 1, 1),
            ]
        );
        assert_eq!(desc.num_weights(true), 41);
        assert_eq!(desc.num_weights(false), 17);
    }

    #[test]
    fn test_weight_blocks_are_contiguous() {
        let desc = mace_descriptor();
        for compat in [false, true] {
            let ranges = desc.weight_blocks(compat);
            assert_eq!(ranges[0].start, 0);
            assert!(ranges.windows(2).all(|w| w[0].end == w[1].start));
            assert_eq!(ranges.last().map(|r| r.end), Some(desc.num_weights(compat)));
        }
    }

    #[test]
    fn test_projection_shape_and_block_structure() {
        let desc = mace_descriptor();
        let p = desc.projection();
        assert_eq!(p.shape(), &[41, 17]);
        // First path (0e, degree 3) has no overlap with 1o functions.
        for f in 9..17 {
            assert_eq!(p.get(&[0, f]), 0.0);
        }
    }

    #[test]
    fn test_degree_one_projection_is_identity() {
        let desc = mace_descriptor();
        let b = desc.blocks().iter().find(|b| b.degree == 1).unwrap();
        assert_abs_diff_eq!(b.projection(0, 0).abs(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_project_weights_identity_on_degree_one() {
        let desc = mace_descriptor();
        let mut compat = vec![0.0; 41 * 4];
        // 0e degree-1 path is row 14; its function is row 8.
        compat[14 * 4 + 2] = 3.0;
        let red = desc.project_weights(&compat, 1);
        let b = &desc.blocks()[2];
        assert_eq!(b.path_range(), 14..15);
        assert_eq!(b.weight_range(), 8..9);
        assert_abs_diff_eq!(red[8 * 4 + 2], 3.0 * b.projection(0, 0), epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_mixed_multiplicities() {
        let err = SymmetricContractionDescriptor::new(&irreps("4x0e + 2x1o"), &irreps("4x0e"), 2);
        assert!(matches!(err, Err(Error::Irreps(_))));
        let err = SymmetricContractionDescriptor::new(&irreps("4x0e"), &irreps("2x0e"), 2);
        assert!(matches!(err, Err(Error::Irreps(_))));
    }

    #[test]
    fn test_rejects_degree_out_of_range() {
        for degree in [0, MAX_CONTRACTION_DEGREE + 1, 8] {
            let err = SymmetricContractionDescriptor::new(&irreps("0e"), &irreps("0e"), degree);
            assert!(matches!(err, Err(Error::Config(_))), "degree {}", degree);
        }
    }

    #[test]
    fn test_unreachable_output_has_no_functions() {
        // Scalars alone cannot produce a vector.
        let desc = SymmetricContractionDescriptor::new(&irreps("2x0e"), &irreps("2x1o"), 3).unwrap();
        assert_eq!(desc.num_basis_functions(), 0);
        assert_eq!(desc.num_paths(), 0);
    }
}
