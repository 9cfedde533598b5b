//! Memory layouts for irreps-valued feature vectors.

use serde::{Deserialize, Serialize};

use super::Irreps;
use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::scalar::Scalar;
use crate::tensor::Tensor;

/// How a `mul x ir` block is laid out in a flat feature vector.
///
/// Blocks always follow the declared irreps order; the layout only decides
/// the order inside a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IrrepsLayout {
    /// Block stored as `[mul, ir.dim]`: all components of one copy are adjacent.
    #[default]
    MulIr,
    /// Block stored as `[ir.dim, mul]`: one component across all copies is adjacent.
    IrMul,
}

impl IrrepsLayout {
    /// Flat index of component `m` of copy `u` in a block starting at `offset`.
    #[inline]
    pub fn index(self, offset: usize, mul: usize, dim: usize, u: usize, m: usize) -> usize {
        match self {
            IrrepsLayout::MulIr => offset + u * dim + m,
            IrrepsLayout::IrMul => offset + m * mul + u,
        }
    }
}

impl std::fmt::Display for IrrepsLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IrrepsLayout::MulIr => write!(f, "mul_ir"),
            IrrepsLayout::IrMul => write!(f, "ir_mul"),
        }
    }
}

/// Convert a `(batch, irreps.dim)` tensor from one layout to another.
///
/// Returns a shared clone when `from == to`.
pub fn transpose<T: Scalar, B: Backend>(
    x: &Tensor<T, B>,
    irreps: &Irreps,
    from: IrrepsLayout,
    to: IrrepsLayout,
) -> Result<Tensor<T, B>> {
    let dim = irreps.dim();
    if x.ndim() != 2 || x.shape()[1] != dim {
        return Err(Error::Shape {
            what: "layout transpose input",
            expected: vec![x.shape().first().copied().unwrap_or(0), dim],
            actual: x.shape().to_vec(),
        });
    }
    if from == to {
        return Ok(x.clone());
    }

    let batch = x.shape()[0];
    let src = x.to_vec();
    let mut dst = vec![T::default(); src.len()];
    for (row_src, row_dst) in src.chunks_exact(dim.max(1)).zip(dst.chunks_exact_mut(dim.max(1))) {
        for (block, range) in irreps.iter().zip(irreps.slices()) {
            let d = block.ir.dim();
            for u in 0..block.mul {
                for m in 0..d {
                    let i = from.index(range.start, block.mul, d, u, m);
                    let j = to.index(range.start, block.mul, d, u, m);
                    row_dst[j] = row_src[i];
                }
            }
        }
    }

    Ok(Tensor::from_data_with_backend(&dst, &[batch, dim], x.backend().clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Cpu;
    use crate::irreps::Group;

    #[test]
    fn test_index() {
        // 2x1o at offset 1: mul_ir -> [u0m0 u0m1 u0m2 u1m0 ...], ir_mul -> [m0u0 m0u1 m1u0 ...]
        assert_eq!(IrrepsLayout::MulIr.index(1, 2, 3, 1, 0), 4);
        assert_eq!(IrrepsLayout::IrMul.index(1, 2, 3, 1, 0), 2);
        assert_eq!(IrrepsLayout::IrMul.index(1, 2, 3, 0, 2), 5);
    }

    #[test]
    fn test_transpose_block() {
        let irreps = Irreps::parse(Group::O3, "1x0e + 2x1o").unwrap();
        // mul_ir row: [s | a0 a1 a2 | b0 b1 b2]
        let x = Tensor::<f32, Cpu>::from_data(&[9.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[1, 7]);
        let y = transpose(&x, &irreps, IrrepsLayout::MulIr, IrrepsLayout::IrMul).unwrap();
        assert_eq!(y.to_vec(), vec![9.0, 1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);

        let back = transpose(&y, &irreps, IrrepsLayout::IrMul, IrrepsLayout::MulIr).unwrap();
        assert_eq!(back.to_vec(), x.to_vec());
    }

    #[test]
    fn test_transpose_rejects_wrong_width() {
        let irreps = Irreps::parse(Group::O3, "0e + 1o").unwrap();
        let x = Tensor::<f32, Cpu>::zeros(&[2, 3]);
        assert!(transpose(&x, &irreps, IrrepsLayout::MulIr, IrrepsLayout::IrMul).is_err());
    }
}
