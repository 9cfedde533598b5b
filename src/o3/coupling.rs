//! Iterated coupling of several copies of an irreps list.
//!
//! For `n` copies of irreps `V = ir_1 ⊕ … ⊕ ir_k` (multiplicity one each),
//! every coupling path `((a ⊗ b) → c ⊗ d) → …` defines a tensor
//! `T[m_out, i_1, …, i_n]` mapping `V^{⊗n}` onto one output irrep. Paths are
//! produced in the order used by the historical MACE implementation: each
//! level is generated from the previous one and then stably sorted by output
//! irrep.

use std::fmt;

use crate::error::Result;
use crate::irreps::Irrep;

use super::wigner_3j;

/// One coupling path and its dense tensor.
#[derive(Debug, Clone)]
pub struct CouplingPath {
    /// Irrep the path ends in.
    pub ir_out: Irrep,
    /// Input irrep index (into the coupled list) for each of the `n` factors.
    pub inputs: Vec<usize>,
    /// Irrep after each coupling step; empty for degree one.
    pub intermediates: Vec<Irrep>,
    /// Row-major tensor of shape `[ir_out.dim, d, …, d]` with `n` input axes.
    pub tensor: Vec<f64>,
}

impl CouplingPath {
    /// Number of coupled inputs.
    pub fn degree(&self) -> usize {
        self.inputs.len()
    }
}

impl fmt::Display for CouplingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "in{}", self.inputs[0])?;
        for (input, mid) in self.inputs[1..].iter().zip(&self.intermediates) {
            write!(f, "⊗in{}→{}", input, mid)?;
        }
        if self.intermediates.is_empty() {
            write!(f, "→{}", self.ir_out)?;
        }
        Ok(())
    }
}

/// Enumerate every coupling path of `degree` copies of `irreps`.
///
/// When `filter` is given, every intermediate and final irrep must belong to
/// it; paths leaving the set are dropped.
pub fn coupling_paths(
    irreps: &[Irrep],
    degree: usize,
    filter: Option<&[Irrep]>,
) -> Result<Vec<CouplingPath>> {
    let d: usize = irreps.iter().map(Irrep::dim).sum();
    let offsets: Vec<usize> = irreps
        .iter()
        .scan(0, |acc, ir| {
            let o = *acc;
            *acc += ir.dim();
            Some(o)
        })
        .collect();

    if degree == 0 {
        return Ok(Vec::new());
    }

    // Degree one: identity slices, kept in declaration order.
    let mut level: Vec<CouplingPath> = irreps
        .iter()
        .zip(&offsets)
        .enumerate()
        .map(|(b, (ir, &o))| {
            let mut tensor = vec![0.0; ir.dim() * d];
            for m in 0..ir.dim() {
                tensor[m * d + o + m] = 1.0;
            }
            CouplingPath {
                ir_out: *ir,
                inputs: vec![b],
                intermediates: Vec::new(),
                tensor,
            }
        })
        .collect();

    let mut width = d; // d^(n-1) for the level being extended
    for _ in 1..degree {
        let mut next = Vec::new();
        for left in &level {
            let dl = left.ir_out.dim();
            for (b, (ir, &o)) in irreps.iter().zip(&offsets).enumerate() {
                let dr = ir.dim();
                for ir_out in left.ir_out.couple(*ir) {
                    if let Some(allowed) = filter {
                        if !allowed.contains(&ir_out) {
                            continue;
                        }
                    }
                    let w = wigner_3j(ir_out.l, left.ir_out.l, ir.l)?;
                    let scale = (ir_out.dim() as f64).sqrt();
                    let dout = ir_out.dim();

                    // E[io, J, o + k] = Σ_j C_left[j, J] · W[io, j, k] · sqrt(dim_out)
                    let mut tensor = vec![0.0; dout * width * d];
                    for io in 0..dout {
                        for j in 0..dl {
                            let row = &left.tensor[j * width..(j + 1) * width];
                            for k in 0..dr {
                                let c = w.get(io, j, k) * scale;
                                if c == 0.0 {
                                    continue;
                                }
                                for (jj, &v) in row.iter().enumerate() {
                                    if v != 0.0 {
                                        tensor[(io * width + jj) * d + o + k] += v * c;
                                    }
                                }
                            }
                        }
                    }

                    let mut inputs = left.inputs.clone();
                    inputs.push(b);
                    let mut intermediates = left.intermediates.clone();
                    intermediates.push(ir_out);
                    next.push(CouplingPath {
                        ir_out,
                        inputs,
                        intermediates,
                        tensor,
                    });
                }
            }
        }
        next.sort_by_key(|p| p.ir_out);
        level = next;
        width *= d;
    }

    Ok(level)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn irs(text: &str) -> Vec<Irrep> {
        text.split('+').map(|s| s.trim().parse().unwrap()).collect()
    }

    fn count(paths: &[CouplingPath], ir: &str) -> usize {
        let ir: Irrep = ir.parse().unwrap();
        paths.iter().filter(|p| p.ir_out == ir).count()
    }

    #[test]
    fn test_degree_one_identity() {
        let paths = coupling_paths(&irs("0e + 1o"), 1, None).unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[1].tensor.len(), 3 * 4);
        assert_eq!(paths[1].tensor[0 * 4 + 1], 1.0);
        assert_eq!(paths[1].tensor[2 * 4 + 3], 1.0);
        assert_eq!(paths[1].to_string(), "in1→1o");
    }

    #[test]
    fn test_path_counts_degree_two() {
        let paths = coupling_paths(&irs("0e + 1o + 2e"), 2, None).unwrap();
        assert_eq!(count(&paths, "0e"), 3);
        assert_eq!(count(&paths, "1o"), 4);
        // sorted by output irrep
        assert!(paths.windows(2).all(|w| w[0].ir_out <= w[1].ir_out));
    }

    #[test]
    fn test_path_counts_degree_three() {
        let paths = coupling_paths(&irs("0e + 1o + 2e"), 3, None).unwrap();
        assert_eq!(count(&paths, "0e"), 11);
        assert_eq!(count(&paths, "1o"), 21);
        assert_eq!(paths[0].tensor.len(), 9 * 9 * 9);
    }

    #[test]
    fn test_filter_drops_paths() {
        let all = coupling_paths(&irs("1o"), 2, None).unwrap();
        let natural = irs("0e + 1o + 2e");
        let filtered = coupling_paths(&irs("1o"), 2, Some(&natural)).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(filtered.len(), 2); // 1e dropped
    }

    #[test]
    fn test_scalar_path_component_normalization() {
        // 1o ⊗ 1o → 0e with component normalization is the dot product / sqrt(3)
        let paths = coupling_paths(&irs("1o"), 2, None).unwrap();
        let scalar = &paths[0];
        assert_eq!(scalar.ir_out, "0e".parse().unwrap());
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 / 3f64.sqrt() } else { 0.0 };
                assert!((scalar.tensor[i * 3 + j] - expected).abs() < 1e-12);
            }
        }
    }
}
