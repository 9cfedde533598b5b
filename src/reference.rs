//! Helpers for comparing against recorded reference outputs.
//!
//! Reference tensors are stored as base64 of little-endian `f32` bytes in
//! row-major order, the format produced by
//! `base64.b64encode(t.numpy().astype("<f4").tobytes())`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::backend::Cpu;
use crate::error::{Error, Result};
use crate::scalar::Real;
use crate::tensor::Tensor;

/// Decode a base64 `f32` buffer into a tensor of the given shape.
///
/// # Errors
///
/// - [`Error::Base64`] for invalid base64
/// - [`Error::Reference`] when the byte count is not a multiple of 4 or the
///   element count does not match `shape`
///
/// # Example
///
/// ```rust
/// use equicontract::reference::from_base64;
///
/// let t = from_base64(&[2], "AACAPwAAAMA=").unwrap();
/// assert_eq!(t.to_vec(), vec![1.0, -2.0]);
/// ```
pub fn from_base64(shape: &[usize], text: &str) -> Result<Tensor<f32, Cpu>> {
    let bytes = STANDARD.decode(text.trim())?;
    if bytes.len() % 4 != 0 {
        return Err(Error::Reference(format!(
            "{} bytes is not a whole number of f32 values",
            bytes.len()
        )));
    }
    let mut data: Vec<f32> = bytemuck::pod_collect_to_vec::<u8, f32>(&bytes);
    if cfg!(target_endian = "big") {
        data.iter_mut()
            .for_each(|v| *v = f32::from_bits(v.to_bits().swap_bytes()));
    }
    let numel: usize = shape.iter().product();
    if data.len() != numel {
        return Err(Error::Reference(format!(
            "decoded {} values but shape {:?} needs {}",
            data.len(),
            shape,
            numel
        )));
    }
    Ok(Tensor::from_data(&data, shape))
}

/// Encode a tensor as base64 of little-endian `f32` bytes.
pub fn to_base64<T: Real>(x: &Tensor<T, Cpu>) -> String {
    let bits: Vec<u32> = x
        .to_vec()
        .into_iter()
        .map(|v| v.cast::<f32>().to_bits().to_le())
        .collect();
    STANDARD.encode(bytemuck::cast_slice::<u32, u8>(&bits))
}

/// Convert a tensor to another real precision.
pub fn cast<T: Real, R: Real>(x: &Tensor<T, Cpu>) -> Tensor<R, Cpu> {
    let data: Vec<R> = x.to_vec().into_iter().map(|v| v.cast()).collect();
    Tensor::from_data(&data, x.shape())
}

fn violates(a: f64, e: f64, atol: f64, rtol: f64) -> bool {
    if a.is_nan() || e.is_nan() {
        return true;
    }
    a != e && (a - e).abs() > atol + rtol * e.abs()
}

/// Largest violation of `|a - e| ≤ atol + rtol·|e|`, as `(index, |a - e|, allowed)`.
fn worst_violation<T: Real, U: Real>(
    actual: &[T],
    expected: &[U],
    atol: f64,
    rtol: f64,
) -> Option<(usize, f64, f64)> {
    let mut worst: Option<(usize, f64, f64)> = None;
    for (i, (&a, &e)) in actual.iter().zip(expected).enumerate() {
        let (a, e) = (a.as_f64(), e.as_f64());
        if !violates(a, e, atol, rtol) {
            continue;
        }
        let allowed = atol + rtol * e.abs();
        let diff = (a - e).abs();
        let excess = if diff.is_nan() { f64::INFINITY } else { diff - allowed };
        if worst.map_or(true, |(_, d, al)| excess > d - al) {
            worst = Some((i, diff, allowed));
        }
    }
    worst
}

/// `true` when shapes match and every element satisfies `|a - e| ≤ atol + rtol·|e|`.
pub fn allclose<T: Real, U: Real>(
    actual: &Tensor<T, Cpu>,
    expected: &Tensor<U, Cpu>,
    atol: f64,
    rtol: f64,
) -> bool {
    actual.shape() == expected.shape()
        && worst_violation(&actual.to_vec(), &expected.to_vec(), atol, rtol).is_none()
}

/// Assert closeness elementwise, reporting the worst offending element.
///
/// # Panics
///
/// Panics when the shapes differ or any element is out of tolerance.
#[track_caller]
pub fn assert_close<T: Real, U: Real>(
    actual: &Tensor<T, Cpu>,
    expected: &Tensor<U, Cpu>,
    atol: f64,
    rtol: f64,
) {
    assert_eq!(
        actual.shape(),
        expected.shape(),
        "shape mismatch: actual {:?}, expected {:?}",
        actual.shape(),
        expected.shape()
    );
    let a = actual.to_vec();
    let e = expected.to_vec();
    if let Some((i, diff, allowed)) = worst_violation(&a, &e, atol, rtol) {
        let mismatched = a
            .iter()
            .zip(&e)
            .filter(|(x, y)| violates(x.as_f64(), y.as_f64(), atol, rtol))
            .count();
        panic!(
            "tensors are not close: {} / {} elements mismatched; \
             worst at flat index {}: actual {}, expected {}, |diff| {:.3e} > allowed {:.3e}",
            mismatched,
            a.len(),
            i,
            a[i].as_f64(),
            e[i].as_f64(),
            diff,
            allowed
        );
    }
}
