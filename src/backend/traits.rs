//! Backend trait definitions.

use crate::descriptor::ContractionPlan;
use crate::error::Result;
use crate::scalar::{Real, Scalar};

/// Storage trait for host tensor data.
pub trait Storage<T: Scalar>: Clone + Send + Sync + Sized {
    /// Number of elements in storage.
    fn len(&self) -> usize;

    /// Check if storage is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get element at index (may be slow for GPU).
    fn get(&self, index: usize) -> T;

    /// Copy all data to a Vec (downloads from GPU if needed).
    fn to_vec(&self) -> Vec<T>;
}

/// Backend trait for tensor execution.
pub trait Backend: Clone + Send + Sync + 'static {
    /// Storage type for this backend.
    type Storage<T: Scalar>: Storage<T>;

    /// Backend name for debugging.
    fn name() -> &'static str;

    /// Allocate storage.
    fn alloc<T: Scalar>(&self, len: usize) -> Self::Storage<T>;

    /// Create storage from slice.
    #[allow(clippy::wrong_self_convention)]
    fn from_slice<T: Scalar>(&self, data: &[T]) -> Self::Storage<T>;

    /// Copy strided data to contiguous storage.
    ///
    /// This is the core operation for making non-contiguous tensors contiguous.
    fn copy_strided<T: Scalar>(
        &self,
        src: &Self::Storage<T>,
        shape: &[usize],
        strides: &[usize],
        offset: usize,
    ) -> Self::Storage<T>;

    /// Batched symmetric contraction.
    ///
    /// Computes `out[z] = plan(x[z], weights[indices[z]])` for every row
    /// `z < batch`, accumulating in the math precision `M`.
    ///
    /// # Arguments
    /// * `plan` - Packed sparse basis and feature layouts
    /// * `weights` - Reduced weights, `(num_elements, num_weights, mul)` row-major
    /// * `x` - Input features, `(batch, plan.row_in())` row-major
    /// * `indices` - Element of every row, already range-checked
    fn symmetric_contract<T: Real, M: Real>(
        &self,
        plan: &ContractionPlan<M>,
        weights: &[M],
        x: &Self::Storage<T>,
        indices: &[u32],
        batch: usize,
    ) -> Result<Self::Storage<T>>;
}
