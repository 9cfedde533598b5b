//! CPU backend implementation.

mod contract;

use super::traits::{Backend, Storage};
use crate::descriptor::ContractionPlan;
use crate::error::Result;
use crate::scalar::{Real, Scalar};

/// CPU backend using Vec storage.
#[derive(Clone, Debug, Default)]
pub struct Cpu;

impl<T: Scalar> Storage<T> for Vec<T> {
    #[inline]
    fn len(&self) -> usize {
        Vec::len(self)
    }

    #[inline]
    fn get(&self, index: usize) -> T {
        self[index]
    }

    #[inline]
    fn to_vec(&self) -> Vec<T> {
        self.clone()
    }
}

impl Backend for Cpu {
    type Storage<T: Scalar> = Vec<T>;

    fn name() -> &'static str {
        "cpu"
    }

    fn alloc<T: Scalar>(&self, len: usize) -> Vec<T> {
        vec![T::default(); len]
    }

    fn from_slice<T: Scalar>(&self, data: &[T]) -> Vec<T> {
        data.to_vec()
    }

    fn copy_strided<T: Scalar>(
        &self,
        src: &Vec<T>,
        shape: &[usize],
        strides: &[usize],
        offset: usize,
    ) -> Vec<T> {
        let numel: usize = shape.iter().product();
        let mut dst = vec![T::default(); numel];

        // Iterate over all indices and copy
        let mut indices = vec![0usize; shape.len()];
        for dst_elem in dst.iter_mut() {
            // Compute source offset using strides
            let src_offset: usize = offset
                + indices
                    .iter()
                    .zip(strides.iter())
                    .map(|(i, s)| i * s)
                    .sum::<usize>();

            *dst_elem = src[src_offset];

            // Increment indices (row-major order: last dimension first)
            for dim in (0..shape.len()).rev() {
                indices[dim] += 1;
                if indices[dim] < shape[dim] {
                    break;
                }
                indices[dim] = 0;
            }
        }

        dst
    }

    fn symmetric_contract<T: Real, M: Real>(
        &self,
        plan: &ContractionPlan<M>,
        weights: &[M],
        x: &Vec<T>,
        indices: &[u32],
        batch: usize,
    ) -> Result<Vec<T>> {
        Ok(contract::symmetric_contract_rows(plan, weights, x, indices, batch))
    }
}
