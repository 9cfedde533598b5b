//! O(3) representation theory in the real spherical-harmonic basis.
//!
//! - [`wigner_3j`]: real Clebsch–Gordan coupling tensors, cached
//! - [`coupling_paths`]: every iterated coupling of `n` copies of an irreps list

mod coupling;
mod wigner;

pub use coupling::{coupling_paths, CouplingPath};
pub use wigner::{change_basis_real_to_complex, su2_clebsch_gordan, wigner_3j, Wigner3j};

use crate::irreps::{Irrep, Parity};

/// Irreps of natural parity `(-1)^l` with `l < lmax`: `0e, 1o, 2e, 3o, …`.
pub fn natural_irreps(lmax: u32) -> Vec<Irrep> {
    (0..lmax)
        .map(|l| Irrep::new(l, if l % 2 == 0 { Parity::Even } else { Parity::Odd }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_irreps() {
        let irs: Vec<String> = natural_irreps(4).iter().map(|ir| ir.to_string()).collect();
        assert_eq!(irs, ["0e", "1o", "2e", "3o"]);
    }
}
