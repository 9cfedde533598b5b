//! Scalar types and numeric precision.
//!
//! - [`Scalar`]: anything that can live in tensor storage
//! - [`Real`]: floating-point scalars used for features, weights and accumulation
//! - [`IndexScalar`]: integer scalars used for element indices
//! - [`Dtype`]: runtime tag for a floating-point precision

use serde::{Deserialize, Serialize};

/// Marker trait for scalar types that can be used in tensors.
#[cfg(not(feature = "cuda"))]
pub trait Scalar:
    Copy + Clone + Send + Sync + Default + std::fmt::Debug + 'static + bytemuck::Pod
{
}

/// Marker trait for scalar types that can be used in tensors.
#[cfg(feature = "cuda")]
pub trait Scalar:
    Copy
    + Clone
    + Send
    + Sync
    + Default
    + std::fmt::Debug
    + 'static
    + bytemuck::Pod
    + cudarc::driver::DeviceRepr
    + cudarc::driver::ValidAsZeroBits
{
}

impl Scalar for f32 {}
impl Scalar for f64 {}
impl Scalar for i32 {}
impl Scalar for i64 {}
impl Scalar for u32 {}

/// Floating-point precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    F32,
    F64,
}

impl std::fmt::Display for Dtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dtype::F32 => write!(f, "float32"),
            Dtype::F64 => write!(f, "float64"),
        }
    }
}

/// Floating-point scalar with a runtime precision tag.
pub trait Real: Scalar + num_traits::Float + std::ops::AddAssign + std::iter::Sum {
    /// Precision of this type.
    const DTYPE: Dtype;

    /// Lossy conversion from `f64`.
    fn from_f64(v: f64) -> Self;

    /// Widening (or identity) conversion to `f64`.
    fn as_f64(self) -> f64;

    /// Convert between two real types through `f64`.
    #[inline]
    fn cast<R: Real>(self) -> R {
        R::from_f64(self.as_f64())
    }
}

impl Real for f32 {
    const DTYPE: Dtype = Dtype::F32;

    #[inline]
    fn from_f64(v: f64) -> Self {
        v as f32
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl Real for f64 {
    const DTYPE: Dtype = Dtype::F64;

    #[inline]
    fn from_f64(v: f64) -> Self {
        v
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self
    }
}

/// Integer scalar usable as an element (species) index.
pub trait IndexScalar: Scalar {
    /// Convert to `usize`, or `None` for negative values.
    fn to_index(self) -> Option<usize>;

    /// Widen to `i64` for error reporting.
    fn to_i64(self) -> i64;
}

impl IndexScalar for i32 {
    #[inline]
    fn to_index(self) -> Option<usize> {
        usize::try_from(self).ok()
    }

    #[inline]
    fn to_i64(self) -> i64 {
        self as i64
    }
}

impl IndexScalar for i64 {
    #[inline]
    fn to_index(self) -> Option<usize> {
        usize::try_from(self).ok()
    }

    #[inline]
    fn to_i64(self) -> i64 {
        self
    }
}

impl IndexScalar for u32 {
    #[inline]
    fn to_index(self) -> Option<usize> {
        Some(self as usize)
    }

    #[inline]
    fn to_i64(self) -> i64 {
        self as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_tags() {
        assert_eq!(<f32 as Real>::DTYPE, Dtype::F32);
        assert_eq!(<f64 as Real>::DTYPE, Dtype::F64);
        assert_eq!(Dtype::F64.to_string(), "float64");
    }

    #[test]
    fn test_cast() {
        let x = 1.5f32;
        let y: f64 = x.cast();
        assert_eq!(y, 1.5);
    }

    #[test]
    fn test_index_conversion() {
        assert_eq!(3i32.to_index(), Some(3));
        assert_eq!((-1i64).to_index(), None);
        assert_eq!(7u32.to_index(), Some(7));
    }
}
