//! Flattened execution plan shared by the CPU and CUDA kernels.

use crate::irreps::{Irreps, IrrepsLayout};
use crate::scalar::Real;

use super::SymmetricContractionDescriptor;

/// Sparse symmetric contraction packed into flat arrays.
///
/// Every term reads `acc[out] += coeff · w[weight, u] · Π xc[inputs]`, where
/// `xc` is one channel's coupling vector gathered from a feature row. Terms
/// are stored as parallel arrays so they upload to a device as-is.
#[derive(Debug, Clone)]
pub struct ContractionPlan<M: Real> {
    mul: usize,
    num_weights: usize,
    dim_in: usize,
    dim_out: usize,
    /// `gather[u * dim_in + i]`: position of coupling component `i` of channel `u` in an input row.
    gather: Vec<u32>,
    /// `scatter[u * dim_out + o]`: position of output component `o` of channel `u` in an output row.
    scatter: Vec<u32>,
    term_weight: Vec<u32>,
    term_out: Vec<u32>,
    term_coeff: Vec<M>,
    /// Term `t` owns `term_inputs[term_offsets[t]..term_offsets[t + 1]]`.
    term_offsets: Vec<u32>,
    term_inputs: Vec<u16>,
}

/// Per-thread buffers for [`ContractionPlan::contract_row`].
#[derive(Debug, Clone)]
pub struct RowScratch<M> {
    xc: Vec<M>,
    acc: Vec<M>,
}

fn gather_map(irreps: &Irreps, mul: usize, layout: IrrepsLayout) -> Vec<u32> {
    let dim: usize = irreps.iter().map(|b| b.ir.dim()).sum();
    let mut map = vec![0u32; mul * dim];
    for u in 0..mul {
        let mut i = 0;
        for (block, range) in irreps.iter().zip(irreps.slices()) {
            let d = block.ir.dim();
            for m in 0..d {
                map[u * dim + i] = layout.index(range.start, mul, d, u, m) as u32;
                i += 1;
            }
        }
    }
    map
}

impl<M: Real> ContractionPlan<M> {
    /// Pack the reduced basis of `desc` for the given feature layouts.
    pub fn new(
        desc: &SymmetricContractionDescriptor,
        layout_in: IrrepsLayout,
        layout_out: IrrepsLayout,
    ) -> Self {
        let mul = desc.mul();
        let dim_in: usize = desc.irreps_in().iter().map(|b| b.ir.dim()).sum();
        let out_offsets: Vec<usize> = desc
            .irreps_out()
            .iter()
            .scan(0, |acc, b| {
                let o = *acc;
                *acc += b.ir.dim();
                Some(o)
            })
            .collect();
        let dim_out: usize = desc.irreps_out().iter().map(|b| b.ir.dim()).sum();

        let mut plan = Self {
            mul,
            num_weights: desc.num_basis_functions(),
            dim_in,
            dim_out,
            gather: gather_map(desc.irreps_in(), mul, layout_in),
            scatter: gather_map(desc.irreps_out(), mul, layout_out),
            term_weight: Vec::new(),
            term_out: Vec::new(),
            term_coeff: Vec::new(),
            term_offsets: vec![0],
            term_inputs: Vec::new(),
        };

        for block in desc.blocks() {
            let base = out_offsets[block.out_block] as u32;
            for (w, f) in block.weight_range().zip(&block.functions) {
                for (m, inputs, c) in f.iter() {
                    plan.term_weight.push(w as u32);
                    plan.term_out.push(base + m);
                    plan.term_coeff.push(M::from_f64(c));
                    plan.term_inputs.extend_from_slice(inputs);
                    plan.term_offsets.push(plan.term_inputs.len() as u32);
                }
            }
        }
        plan
    }

    pub fn mul(&self) -> usize {
        self.mul
    }

    /// Reduced weights per element and channel.
    pub fn num_weights(&self) -> usize {
        self.num_weights
    }

    /// Width of an input feature row.
    pub fn row_in(&self) -> usize {
        self.mul * self.dim_in
    }

    /// Width of an output feature row.
    pub fn row_out(&self) -> usize {
        self.mul * self.dim_out
    }

    pub fn num_terms(&self) -> usize {
        self.term_coeff.len()
    }

    pub fn gather(&self) -> &[u32] {
        &self.gather
    }

    pub fn scatter(&self) -> &[u32] {
        &self.scatter
    }

    /// `(weight, out, coeff, offsets, inputs)` term arrays.
    pub fn terms(&self) -> (&[u32], &[u32], &[M], &[u32], &[u16]) {
        (
            &self.term_weight,
            &self.term_out,
            &self.term_coeff,
            &self.term_offsets,
            &self.term_inputs,
        )
    }

    pub fn scratch(&self) -> RowScratch<M> {
        RowScratch {
            xc: vec![M::zero(); self.dim_in],
            acc: vec![M::zero(); self.dim_out],
        }
    }

    /// Contract one feature row.
    ///
    /// `weights` holds this row's element slice, `(num_weights, mul)` row-major.
    /// Every position of `out` is written.
    pub fn contract_row<T: Real>(
        &self,
        x: &[T],
        weights: &[M],
        out: &mut [T],
        scratch: &mut RowScratch<M>,
    ) {
        debug_assert_eq!(x.len(), self.row_in());
        debug_assert_eq!(out.len(), self.row_out());
        debug_assert_eq!(weights.len(), self.num_weights * self.mul);

        let RowScratch { xc, acc } = scratch;
        for u in 0..self.mul {
            let gather = &self.gather[u * self.dim_in..(u + 1) * self.dim_in];
            for (v, &g) in xc.iter_mut().zip(gather) {
                *v = x[g as usize].cast();
            }
            acc.iter_mut().for_each(|a| *a = M::zero());

            for t in 0..self.term_coeff.len() {
                let lo = self.term_offsets[t] as usize;
                let hi = self.term_offsets[t + 1] as usize;
                let w = weights[self.term_weight[t] as usize * self.mul + u];
                let prod = self.term_inputs[lo..hi]
                    .iter()
                    .fold(self.term_coeff[t] * w, |p, &i| p * xc[i as usize]);
                acc[self.term_out[t] as usize] += prod;
            }

            let scatter = &self.scatter[u * self.dim_out..(u + 1) * self.dim_out];
            for (&a, &s) in acc.iter().zip(scatter) {
                out[s as usize] = a.cast();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::irreps::Group;
    use crate::o3::coupling_paths;

    fn irreps(text: &str) -> Irreps {
        Irreps::parse(Group::O3, text).unwrap()
    }

    #[test]
    fn test_gather_map_layouts() {
        let ir = irreps("2x0e + 2x1o");
        assert_eq!(gather_map(&ir, 2, IrrepsLayout::MulIr), vec![0, 2, 3, 4, 1, 5, 6, 7]);
        assert_eq!(gather_map(&ir, 2, IrrepsLayout::IrMul), vec![0, 2, 4, 6, 1, 3, 5, 7]);
    }

    #[test]
    fn test_linear_scalar_contraction() {
        // Degree one, 0e -> 0e: out[u] = B · w[u] · x[u] with B = ±1.
        let desc = SymmetricContractionDescriptor::new(&irreps("3x0e"), &irreps("3x0e"), 1).unwrap();
        let plan = ContractionPlan::<f64>::new(&desc, IrrepsLayout::MulIr, IrrepsLayout::MulIr);
        assert_eq!(plan.num_terms(), 1);
        let sign = plan.terms().2[0];

        let mut out = vec![0.0f32; 3];
        let mut scratch = plan.scratch();
        plan.contract_row(&[1.0f32, 2.0, 3.0], &[2.0, 3.0, 4.0], &mut out, &mut scratch);
        assert_eq!(out, vec![2.0 * sign as f32, 6.0 * sign as f32, 12.0 * sign as f32]);
    }

    #[test]
    fn test_matches_dense_coupling_paths() {
        // Σ_p w_p ⟨T_p, x⊗x⊗x⟩ with the unsymmetrized path tensors
        let desc =
            SymmetricContractionDescriptor::new(&irreps("0e + 1o + 2e"), &irreps("0e + 1o"), 3)
                .unwrap();
        let plan = ContractionPlan::<f64>::new(&desc, IrrepsLayout::MulIr, IrrepsLayout::MulIr);

        let compat: Vec<f64> = (0..desc.num_paths())
            .map(|p| ((p * 7 % 11) as f64 - 5.0) / 10.0)
            .collect();
        let reduced = desc.project_weights(&compat, 1);
        let x: Vec<f64> = (0..9).map(|i| ((i + 1) as f64).sin()).collect();

        let mut out = vec![0.0; 4];
        let mut scratch = plan.scratch();
        plan.contract_row(&x, &reduced, &mut out, &mut scratch);

        let coupled = desc.irreps_in().irreps();
        let mut expected = vec![0.0; 4];
        for block in desc.blocks() {
            let nu = block.degree;
            let paths: Vec<_> = coupling_paths(&coupled, nu, None)
                .unwrap()
                .into_iter()
                .filter(|p| p.ir_out == block.ir_out)
                .collect();
            let base = if block.out_block == 0 { 0 } else { 1 };
            let width = 9usize.pow(nu as u32);
            for (path, w) in paths.iter().zip(&compat[block.path_range()]) {
                for m in 0..block.ir_out.dim() {
                    for flat in 0..width {
                        let t = path.tensor[m * width + flat];
                        let mut rest = flat;
                        let mut prod = t * w;
                        for _ in 0..nu {
                            prod *= x[rest % 9];
                            rest /= 9;
                        }
                        expected[base + m] += prod;
                    }
                }
            }
        }

        for (a, e) in out.iter().zip(&expected) {
            assert!((a - e).abs() < 1e-12, "{} vs {}", a, e);
        }
    }

    #[test]
    fn test_quadratic_scalar_contraction() {
        let desc = SymmetricContractionDescriptor::new(&irreps("1x0e"), &irreps("1x0e"), 2).unwrap();
        let plan = ContractionPlan::<f64>::new(&desc, IrrepsLayout::MulIr, IrrepsLayout::MulIr);
        assert_eq!(plan.num_weights(), 2);

        // Only the quadratic weight is set: out = c · x²
        let (_, _, coeff, offsets, _) = plan.terms();
        let quad = (0..plan.num_terms())
            .find(|&t| offsets[t + 1] - offsets[t] == 2)
            .unwrap();
        let mut out = vec![0.0f64];
        let mut scratch = plan.scratch();
        plan.contract_row(&[3.0f64], &[1.0, 0.0], &mut out, &mut scratch);
        assert!((out[0] - coeff[quad] * 9.0).abs() < 1e-12);
    }
}
