//! Clebsch–Gordan coefficients in the real spherical-harmonic basis.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use num_complex::Complex64;

use crate::error::{Error, Result};
use crate::irreps::Irrep;

/// Real coupling tensor `C[m1, m2, m3]` for `l1 ⊗ l2 → l3`, unit Frobenius norm.
#[derive(Debug, Clone, PartialEq)]
pub struct Wigner3j {
    ls: [u32; 3],
    dims: [usize; 3],
    data: Vec<f64>,
}

impl Wigner3j {
    pub fn ls(&self) -> [u32; 3] {
        self.ls
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Row-major coefficients.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize, k: usize) -> f64 {
        self.data[(i * self.dims[1] + j) * self.dims[2] + k]
    }
}

fn factorial(n: i64) -> f64 {
    debug_assert!(n >= 0, "factorial of negative number {}", n);
    (2..=n).fold(1.0, |acc, k| acc * k as f64)
}

/// Clebsch–Gordan coefficient `⟨j1 m1 j2 m2 | j3 m3⟩` (Condon–Shortley phase).
fn su2_coefficient(j1: i64, m1: i64, j2: i64, m2: i64, j3: i64, m3: i64) -> f64 {
    if m3 != m1 + m2 {
        return 0.0;
    }
    let vmin = (-j1 + j2 + m3).max(-j1 + m1).max(0);
    let vmax = (j2 + j3 + m1).min(j3 - j1 + j2).min(j3 + m3);

    let f = factorial;
    let prefactor = ((2 * j3 + 1) as f64
        * (f(j3 + j1 - j2) * f(j3 - j1 + j2) * f(j1 + j2 - j3) * f(j3 + m3) * f(j3 - m3))
        / (f(j1 + j2 + j3 + 1) * f(j1 - m1) * f(j1 + m1) * f(j2 - m2) * f(j2 + m2)))
        .sqrt();

    let mut sum = 0.0;
    for v in vmin..=vmax {
        let sign = if (v + j2 + m2).rem_euclid(2) == 0 { 1.0 } else { -1.0 };
        sum += sign * (f(j2 + j3 + m1 - v) * f(j1 - m1 + v))
            / (f(v) * f(j3 - j1 + j2 - v) * f(j3 + m3 - v) * f(v + j1 - j2 - m3));
    }
    prefactor * sum
}

/// Complex-basis Clebsch–Gordan tensor of shape `[2j1+1, 2j2+1, 2j3+1]`, row-major.
///
/// # Errors
///
/// Returns [`Error::Selection`] when `(j1, j2, j3)` violates the triangle rule.
pub fn su2_clebsch_gordan(j1: u32, j2: u32, j3: u32) -> Result<Vec<f64>> {
    if !Irrep::triangle(j1, j2, j3) {
        return Err(Error::Selection {
            l1: j1,
            l2: j2,
            l3: j3,
        });
    }
    let (j1, j2, j3) = (j1 as i64, j2 as i64, j3 as i64);
    let (d2, d3) = ((2 * j2 + 1) as usize, (2 * j3 + 1) as usize);
    let mut out = vec![0.0; (2 * j1 + 1) as usize * d2 * d3];
    for m1 in -j1..=j1 {
        for m2 in -j2..=j2 {
            let m3 = m1 + m2;
            if m3.abs() > j3 {
                continue;
            }
            let idx = ((j1 + m1) as usize * d2 + (j2 + m2) as usize) * d3 + (j3 + m3) as usize;
            out[idx] = su2_coefficient(j1, m1, j2, m2, j3, m3);
        }
    }
    Ok(out)
}

/// Change of basis between real and complex spherical harmonics of degree `l`.
///
/// Row index is the complex `m`, column index the real one. Carries a global
/// `(-i)^l` factor so that coupled coefficients come out real.
pub fn change_basis_real_to_complex(l: u32) -> Vec<Complex64> {
    let l = l as i64;
    let n = (2 * l + 1) as usize;
    let at = |row: i64, col: i64| (row as usize) * n + col as usize;
    let s = std::f64::consts::FRAC_1_SQRT_2;

    let mut q = vec![Complex64::new(0.0, 0.0); n * n];
    for m in -l..0 {
        q[at(l + m, l + m.abs())] = Complex64::new(s, 0.0);
        q[at(l + m, l - m.abs())] = Complex64::new(0.0, -s);
    }
    q[at(l, l)] = Complex64::new(1.0, 0.0);
    for m in 1..=l {
        let sign = if m % 2 == 0 { 1.0 } else { -1.0 };
        q[at(l + m, l + m)] = Complex64::new(sign * s, 0.0);
        q[at(l + m, l - m)] = Complex64::new(0.0, sign * s);
    }

    let phase = Complex64::new(0.0, -1.0).powu(l as u32);
    q.iter_mut().for_each(|z| *z *= phase);
    q
}

fn compute_wigner_3j(l1: u32, l2: u32, l3: u32) -> Result<Wigner3j> {
    let dims = [2 * l1 as usize + 1, 2 * l2 as usize + 1, 2 * l3 as usize + 1];
    let [n1, n2, n3] = dims;
    let q1 = change_basis_real_to_complex(l1);
    let q2 = change_basis_real_to_complex(l2);
    let q3 = change_basis_real_to_complex(l3);
    let cg = su2_clebsch_gordan(l1, l2, l3)?;

    // R[j, l, m] = Σ Q1[i, j] Q2[k, l] conj(Q3[n, m]) C[i, k, n]
    let mut acc = vec![Complex64::new(0.0, 0.0); n1 * n2 * n3];
    for i in 0..n1 {
        for k in 0..n2 {
            for n in 0..n3 {
                let c = cg[(i * n2 + k) * n3 + n];
                if c == 0.0 {
                    continue;
                }
                for j in (0..n1).filter(|&j| q1[i * n1 + j].norm_sqr() > 0.0) {
                    for l in (0..n2).filter(|&l| q2[k * n2 + l].norm_sqr() > 0.0) {
                        let a = q1[i * n1 + j] * q2[k * n2 + l] * c;
                        for m in (0..n3).filter(|&m| q3[n * n3 + m].norm_sqr() > 0.0) {
                            acc[(j * n2 + l) * n3 + m] += a * q3[n * n3 + m].conj();
                        }
                    }
                }
            }
        }
    }

    debug_assert!(
        acc.iter().all(|z| z.im.abs() < 1e-10),
        "coupling ({}, {}, {}) is not real",
        l1,
        l2,
        l3
    );
    let mut data: Vec<f64> = acc.iter().map(|z| z.re).collect();
    let norm = data.iter().map(|x| x * x).sum::<f64>().sqrt();
    data.iter_mut().for_each(|x| *x /= norm);

    Ok(Wigner3j {
        ls: [l1, l2, l3],
        dims,
        data,
    })
}

/// Real, normalized coupling tensor for `l1 ⊗ l2 → l3`.
///
/// Results are cached for the lifetime of the process.
///
/// # Errors
///
/// Returns [`Error::Selection`] when `(l1, l2, l3)` violates the triangle rule.
pub fn wigner_3j(l1: u32, l2: u32, l3: u32) -> Result<Arc<Wigner3j>> {
    static CACHE: OnceLock<Mutex<HashMap<(u32, u32, u32), Arc<Wigner3j>>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));

    if let Some(hit) = cache
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .get(&(l1, l2, l3))
    {
        return Ok(Arc::clone(hit));
    }

    let computed = Arc::new(compute_wigner_3j(l1, l2, l3)?);
    cache
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .insert((l1, l2, l3), Arc::clone(&computed));
    Ok(computed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_su2_known_values() {
        // <1 1; 1 -1 | 0 0> = 1/sqrt(3)
        let c = su2_clebsch_gordan(1, 1, 0).unwrap();
        assert_abs_diff_eq!(c[2 * 3 + 0], 1.0 / 3f64.sqrt(), epsilon = 1e-12);
        // <1 0; 1 0 | 2 0> = sqrt(2/3)
        let c = su2_clebsch_gordan(1, 1, 2).unwrap();
        assert_abs_diff_eq!(c[(1 * 3 + 1) * 5 + 2], (2.0f64 / 3.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_su2_selection() {
        for (j1, j2, j3) in [(1, 1, 5), (0, 1, 2), (3, 0, 1)] {
            assert!(matches!(
                su2_clebsch_gordan(j1, j2, j3),
                Err(Error::Selection { l1, l2, l3 }) if (l1, l2, l3) == (j1, j2, j3)
            ));
        }
        assert_eq!(su2_clebsch_gordan(2, 1, 3).unwrap().len(), 5 * 3 * 7);
    }

    #[test]
    fn test_change_basis_unitary() {
        for l in 0..4 {
            let n = 2 * l as usize + 1;
            let q = change_basis_real_to_complex(l);
            for a in 0..n {
                for b in 0..n {
                    let dot: Complex64 = (0..n).map(|k| q[k * n + a].conj() * q[k * n + b]).sum();
                    let expected = if a == b { 1.0 } else { 0.0 };
                    assert_abs_diff_eq!(dot.re, expected, epsilon = 1e-12);
                    assert_abs_diff_eq!(dot.im, 0.0, epsilon = 1e-12);
                }
            }
        }
    }

    #[test]
    fn test_wigner_3j_normalized() {
        for (l1, l2, l3) in [(0, 0, 0), (1, 1, 0), (1, 2, 3), (2, 2, 2), (3, 2, 1)] {
            let w = wigner_3j(l1, l2, l3).unwrap();
            let norm: f64 = w.data().iter().map(|x| x * x).sum();
            assert_abs_diff_eq!(norm, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_wigner_3j_scalar_coupling_is_identity() {
        let w = wigner_3j(0, 2, 2).unwrap();
        for a in 0..5 {
            for b in 0..5 {
                let expected = if a == b { 1.0 / 5f64.sqrt() } else { 0.0 };
                assert_abs_diff_eq!(w.get(0, a, b), expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_wigner_3j_vector_cross_product_antisymmetric() {
        let w = wigner_3j(1, 1, 1).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                for k in 0..3 {
                    assert_abs_diff_eq!(w.get(i, j, k), -w.get(j, i, k), epsilon = 1e-12);
                }
            }
        }
    }

    #[test]
    fn test_wigner_3j_selection() {
        assert!(matches!(wigner_3j(0, 1, 2), Err(Error::Selection { .. })));
    }

    #[test]
    fn test_wigner_3j_cached() {
        let a = wigner_3j(2, 1, 1).unwrap();
        let b = wigner_3j(2, 1, 1).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
