//! Symmetrization, orthonormalization and sparse storage of basis tensors.

use std::collections::BTreeMap;

/// Coefficients smaller than this are dropped from sparse tensors.
const SPARSE_EPS: f64 = 1e-12;

/// Every permutation of `0..n`, in lexicographic order.
pub(crate) fn permutations(n: usize) -> Vec<Vec<usize>> {
    fn extend(prefix: &mut Vec<usize>, used: &mut [bool], out: &mut Vec<Vec<usize>>) {
        if prefix.len() == used.len() {
            out.push(prefix.clone());
            return;
        }
        for i in 0..used.len() {
            if !used[i] {
                used[i] = true;
                prefix.push(i);
                extend(prefix, used, out);
                prefix.pop();
                used[i] = false;
            }
        }
    }

    let mut out = Vec::new();
    extend(&mut Vec::with_capacity(n), &mut vec![false; n], &mut out);
    out
}

/// Decompose a flat index over `n` axes of size `d` into digits, most significant first.
fn digits(mut flat: usize, d: usize, n: usize, out: &mut [usize]) {
    for slot in out[..n].iter_mut().rev() {
        *slot = flat % d;
        flat /= d;
    }
}

/// Average a `[dout, d^n]` tensor over all permutations of its `n` input axes.
pub(crate) fn symmetrize(tensor: &[f64], dout: usize, d: usize, n: usize) -> Vec<f64> {
    let width = d.pow(n as u32);
    debug_assert_eq!(tensor.len(), dout * width);
    let perms = permutations(n);
    let weight = 1.0 / perms.len() as f64;

    let mut out = vec![0.0; tensor.len()];
    let mut idx = vec![0usize; n];
    for flat in 0..width {
        digits(flat, d, n, &mut idx);
        for perm in &perms {
            let target = perm.iter().fold(0, |acc, &p| acc * d + idx[p]);
            for m in 0..dout {
                let v = tensor[m * width + flat];
                if v != 0.0 {
                    out[m * width + target] += v * weight;
                }
            }
        }
    }
    out
}

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Modified Gram–Schmidt with one re-orthogonalization pass.
///
/// A candidate is kept when its residual exceeds `tol` times its own norm.
pub(crate) fn gram_schmidt(candidates: &[Vec<f64>], tol: f64) -> Vec<Vec<f64>> {
    let mut basis: Vec<Vec<f64>> = Vec::new();
    for s in candidates {
        let norm = dot(s, s).sqrt();
        if norm < SPARSE_EPS {
            continue;
        }
        let mut r = s.clone();
        for _ in 0..2 {
            for q in &basis {
                let c = dot(&r, q);
                r.iter_mut().zip(q).for_each(|(x, y)| *x -= c * y);
            }
        }
        let residual = dot(&r, &r).sqrt();
        if residual > tol * norm {
            r.iter_mut().for_each(|x| *x /= residual);
            basis.push(r);
        }
    }
    basis
}

/// Sparse polynomial `x ↦ Σ c · x_{i1} ⋯ x_{iν}` into output component `m`.
///
/// Entries are canonical: input indices are sorted and each
/// `(m, {i1..iν})` appears once, so evaluating against a symmetric power of
/// `x` visits every monomial exactly once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasisFunction {
    degree: usize,
    out: Vec<u32>,
    inputs: Vec<u16>,
    coeff: Vec<f64>,
}

impl BasisFunction {
    /// Collapse a dense symmetric `[dout, d^n]` tensor onto sorted monomials.
    pub(crate) fn from_dense(tensor: &[f64], dout: usize, d: usize, n: usize) -> Self {
        let width = d.pow(n as u32);
        let mut monomials: BTreeMap<(u32, Vec<u16>), f64> = BTreeMap::new();
        let mut idx = vec![0usize; n];
        for m in 0..dout {
            for flat in 0..width {
                let v = tensor[m * width + flat];
                if v == 0.0 {
                    continue;
                }
                digits(flat, d, n, &mut idx);
                let mut key: Vec<u16> = idx.iter().map(|&i| i as u16).collect();
                key.sort_unstable();
                *monomials.entry((m as u32, key)).or_insert(0.0) += v;
            }
        }

        let mut f = Self {
            degree: n,
            ..Self::default()
        };
        for ((m, key), c) in monomials {
            if c.abs() > SPARSE_EPS {
                f.out.push(m);
                f.inputs.extend(key);
                f.coeff.push(c);
            }
        }
        f
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Number of stored monomials.
    pub fn len(&self) -> usize {
        self.coeff.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coeff.is_empty()
    }

    /// Iterate `(m_out, sorted inputs, coefficient)`.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[u16], f64)> + '_ {
        self.out
            .iter()
            .zip(self.inputs.chunks_exact(self.degree.max(1)))
            .zip(&self.coeff)
            .map(|((&m, inputs), &c)| (m, inputs, c))
    }

    /// Evaluate against one channel's coupling vector `x`.
    pub fn evaluate(&self, x: &[f64], out: &mut [f64]) {
        for (m, inputs, c) in self.iter() {
            out[m as usize] += inputs.iter().fold(c, |acc, &i| acc * x[i as usize]);
        }
    }
}
