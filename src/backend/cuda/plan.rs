//! Contraction plans resident in device memory.

use std::sync::Arc;

use super::storage::CudaStorage;

/// Sparse basis tables uploaded once per operator.
pub(super) struct PlanTables<M> {
    pub(super) gather: CudaStorage<u32>,
    pub(super) scatter: CudaStorage<u32>,
    /// `[weight, out, input_lo, input_hi]` per term.
    pub(super) terms: CudaStorage<u32>,
    pub(super) coeff: CudaStorage<M>,
    pub(super) inputs: CudaStorage<u16>,
    /// `[mul, dim_in, dim_out, num_terms, num_weights]`.
    pub(super) shape: CudaStorage<u32>,
}

/// A [`ContractionPlan`](crate::ContractionPlan) and its effective weights on the device.
///
/// Built by [`Cuda::upload_plan`](super::Cuda::upload_plan). The tables never
/// change after upload; weights are replaced by
/// [`Cuda::load_weights`](super::Cuda::load_weights). Clones share device memory
/// until one of them loads new weights.
pub struct DevicePlan<M> {
    pub(super) tables: Arc<PlanTables<M>>,
    pub(super) weights: Arc<CudaStorage<M>>,
    pub(super) mul: usize,
    pub(super) row_in: usize,
    pub(super) row_out: usize,
    pub(super) num_terms: usize,
    /// Reduced weights per element, `num_weights * mul`.
    pub(super) per_element: usize,
}

impl<M> Clone for DevicePlan<M> {
    fn clone(&self) -> Self {
        Self {
            tables: Arc::clone(&self.tables),
            weights: Arc::clone(&self.weights),
            mul: self.mul,
            row_in: self.row_in,
            row_out: self.row_out,
            num_terms: self.num_terms,
            per_element: self.per_element,
        }
    }
}

impl<M> DevicePlan<M> {
    pub fn mul(&self) -> usize {
        self.mul
    }

    pub fn row_in(&self) -> usize {
        self.row_in
    }

    pub fn row_out(&self) -> usize {
        self.row_out
    }

    pub fn num_terms(&self) -> usize {
        self.num_terms
    }

    /// Number of weight sets currently on the device.
    pub fn num_elements(&self) -> usize {
        if self.per_element == 0 {
            0
        } else {
            self.weights.len() / self.per_element
        }
    }
}

impl<M> std::fmt::Debug for DevicePlan<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevicePlan")
            .field("mul", &self.mul)
            .field("row_in", &self.row_in)
            .field("row_out", &self.row_out)
            .field("num_terms", &self.num_terms)
            .field("num_elements", &self.num_elements())
            .finish()
    }
}
