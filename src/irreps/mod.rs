//! Irreducible representations of O(3) and their direct sums.
//!
//! An [`Irrep`] is a degree `l` with a parity; an [`Irreps`] is an ordered
//! list of irreps with multiplicities, e.g. `64x0e + 64x1o + 64x2e`.

mod layout;

use std::fmt;
use std::ops::{Mul, Range};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use layout::{transpose, IrrepsLayout};

/// Behavior under spatial inversion.
///
/// Declaration order makes `Odd < Even`, matching the `(l, p)` ordering with
/// `p = -1` before `p = +1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Parity {
    Odd,
    Even,
}

impl Parity {
    /// `+1` or `-1`.
    pub fn sign(self) -> i32 {
        match self {
            Parity::Odd => -1,
            Parity::Even => 1,
        }
    }
}

impl Mul for Parity {
    type Output = Parity;

    fn mul(self, rhs: Parity) -> Parity {
        if self == rhs {
            Parity::Even
        } else {
            Parity::Odd
        }
    }
}

/// A single irreducible representation of O(3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Irrep {
    pub l: u32,
    pub p: Parity,
}

impl Irrep {
    pub const fn new(l: u32, p: Parity) -> Self {
        Self { l, p }
    }

    /// Dimension `2l + 1`.
    #[inline]
    pub fn dim(&self) -> usize {
        2 * self.l as usize + 1
    }

    pub fn is_scalar(&self) -> bool {
        self.l == 0 && self.p == Parity::Even
    }

    /// Irreps appearing in `self ⊗ other`, ascending in `l`.
    pub fn couple(self, other: Irrep) -> impl Iterator<Item = Irrep> {
        let p = self.p * other.p;
        let lo = self.l.abs_diff(other.l);
        let hi = self.l + other.l;
        (lo..=hi).map(move |l| Irrep::new(l, p))
    }

    /// Whether `l3` is reachable from `l1 ⊗ l2`.
    pub fn triangle(l1: u32, l2: u32, l3: u32) -> bool {
        l1.abs_diff(l2) <= l3 && l3 <= l1 + l2
    }
}

impl fmt::Display for Irrep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = match self.p {
            Parity::Even => 'e',
            Parity::Odd => 'o',
        };
        write!(f, "{}{}", self.l, p)
    }
}

impl FromStr for Irrep {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let err = |reason: &str| Error::Parse {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let (digits, p) = match s.char_indices().last() {
            Some((i, 'e')) => (&s[..i], Parity::Even),
            Some((i, 'o')) => (&s[..i], Parity::Odd),
            Some((i, 'y')) => {
                // spherical-harmonic parity: (-1)^l
                let l: u32 = s[..i].parse().map_err(|_| err("expected an integer degree"))?;
                let p = if l % 2 == 0 { Parity::Even } else { Parity::Odd };
                return Ok(Irrep::new(l, p));
            }
            _ => return Err(err("expected a parity suffix `e`, `o` or `y`")),
        };
        let l = digits
            .parse()
            .map_err(|_| err("expected an integer degree"))?;
        Ok(Irrep::new(l, p))
    }
}

/// Symmetry group tag carried by [`Irreps`].
///
/// Both groups use the e3nn real spherical-harmonic basis; the tag only
/// distinguishes where the irreps were declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Group {
    #[default]
    O3,
    O3E3nn,
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Group::O3 => write!(f, "O3"),
            Group::O3E3nn => write!(f, "O3_e3nn"),
        }
    }
}

/// An irrep repeated `mul` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MulIrrep {
    pub mul: usize,
    pub ir: Irrep,
}

impl MulIrrep {
    pub fn dim(&self) -> usize {
        self.mul * self.ir.dim()
    }
}

impl fmt::Display for MulIrrep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.mul, self.ir)
    }
}

/// Ordered direct sum of irreps with multiplicities.
///
/// # Example
///
/// ```rust
/// use equicontract::irreps::{Group, Irreps};
///
/// let irreps = Irreps::parse(Group::O3, "0e + 1o + 2e").unwrap();
/// assert_eq!(irreps.dim(), 9);
///
/// let wide = 64 * irreps;
/// assert_eq!(wide.dim(), 576);
/// assert_eq!(wide.to_string(), "64x0e+64x1o+64x2e");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Irreps {
    group: Group,
    blocks: Vec<MulIrrep>,
}

impl Irreps {
    /// Build from explicit blocks.
    pub fn new(group: Group, blocks: Vec<MulIrrep>) -> Self {
        Self { group, blocks }
    }

    /// Parse `"0e + 1o + 2e"` or `"16x0e + 8x1o"`.
    ///
    /// An empty string gives empty irreps.
    pub fn parse(group: Group, text: &str) -> Result<Self> {
        let mut blocks = Vec::new();
        for term in text.split('+') {
            let term = term.trim();
            if term.is_empty() {
                if text.trim().is_empty() {
                    continue;
                }
                return Err(Error::Parse {
                    input: text.to_string(),
                    reason: "empty term".to_string(),
                });
            }
            let (mul, ir) = match term.split_once('x') {
                Some((mul, ir)) => {
                    let mul = mul.trim().parse().map_err(|_| Error::Parse {
                        input: term.to_string(),
                        reason: "expected an integer multiplicity".to_string(),
                    })?;
                    (mul, ir.parse()?)
                }
                None => (1, term.parse()?),
            };
            blocks.push(MulIrrep { mul, ir });
        }
        Ok(Self { group, blocks })
    }

    pub fn group(&self) -> Group {
        self.group
    }

    pub fn blocks(&self) -> &[MulIrrep] {
        &self.blocks
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MulIrrep> {
        self.blocks.iter()
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Total dimension `Σ mul·(2l+1)`.
    pub fn dim(&self) -> usize {
        self.blocks.iter().map(MulIrrep::dim).sum()
    }

    /// Total number of irreps `Σ mul`.
    pub fn num_irreps(&self) -> usize {
        self.blocks.iter().map(|b| b.mul).sum()
    }

    /// Total multiplicity of `ir`.
    pub fn count(&self, ir: Irrep) -> usize {
        self.blocks.iter().filter(|b| b.ir == ir).map(|b| b.mul).sum()
    }

    pub fn lmax(&self) -> Option<u32> {
        self.blocks.iter().map(|b| b.ir.l).max()
    }

    /// Offsets of each block in a flat feature vector.
    pub fn slices(&self) -> Vec<Range<usize>> {
        let mut offset = 0;
        self.blocks
            .iter()
            .map(|b| {
                let r = offset..offset + b.dim();
                offset = r.end;
                r
            })
            .collect()
    }

    /// Shared multiplicity of every block, if there is one.
    pub fn uniform_mul(&self) -> Option<usize> {
        let first = self.blocks.first()?.mul;
        self.blocks.iter().all(|b| b.mul == first).then_some(first)
    }

    /// Same irreps with every multiplicity replaced by `mul`.
    pub fn set_mul(&self, mul: usize) -> Self {
        Self {
            group: self.group,
            blocks: self.blocks.iter().map(|b| MulIrrep { mul, ir: b.ir }).collect(),
        }
    }

    /// Irreps in block order, one per block, ignoring multiplicity.
    pub fn irreps(&self) -> Vec<Irrep> {
        self.blocks.iter().map(|b| b.ir).collect()
    }

    /// Merge consecutive blocks with the same irrep and drop empty ones.
    pub fn simplify(&self) -> Self {
        let mut blocks: Vec<MulIrrep> = Vec::with_capacity(self.blocks.len());
        for b in self.blocks.iter().filter(|b| b.mul > 0) {
            match blocks.last_mut() {
                Some(last) if last.ir == b.ir => last.mul += b.mul,
                _ => blocks.push(*b),
            }
        }
        Self {
            group: self.group,
            blocks,
        }
    }
}

impl fmt::Display for Irreps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.blocks.iter().enumerate() {
            if i > 0 {
                write!(f, "+")?;
            }
            write!(f, "{}", b)?;
        }
        Ok(())
    }
}

impl Mul<Irreps> for usize {
    type Output = Irreps;

    fn mul(self, rhs: Irreps) -> Irreps {
        Irreps {
            group: rhs.group,
            blocks: rhs
                .blocks
                .into_iter()
                .map(|b| MulIrrep {
                    mul: b.mul * self,
                    ir: b.ir,
                })
                .collect(),
        }
    }
}

impl Mul<&Irreps> for usize {
    type Output = Irreps;

    fn mul(self, rhs: &Irreps) -> Irreps {
        self * rhs.clone()
    }
}

impl<'a> IntoIterator for &'a Irreps {
    type Item = &'a MulIrrep;
    type IntoIter = std::slice::Iter<'a, MulIrrep>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}
