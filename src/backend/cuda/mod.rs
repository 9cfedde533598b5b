//! CUDA backend for GPU execution.
//!
//! This module provides the CUDA backend implementation using cudarc. The
//! symmetric contraction kernel is compiled with NVRTC when the device is
//! opened. Plans and weights are uploaded once into a [`DevicePlan`]; each
//! call moves only features, indices and results.

mod kernel;
mod plan;
mod storage;

pub use plan::DevicePlan;
pub use storage::CudaStorage;

use std::sync::Arc;

use cudarc::driver::{CudaDevice, LaunchAsync, LaunchConfig};
use thiserror::Error;
use tracing::{debug, trace};

use crate::descriptor::ContractionPlan;
use crate::scalar::{Dtype, Real};

use plan::PlanTables;

/// CUDA backend for symmetric contractions.
///
/// Wraps a CUDA device with the contraction kernels already loaded.
#[derive(Clone)]
pub struct Cuda {
    device: Arc<CudaDevice>,
}

impl Cuda {
    /// Create a new CUDA backend on the default device (device 0).
    pub fn new() -> Result<Self, CudaError> {
        Self::on_device(0)
    }

    /// Create a new CUDA backend on a specific device.
    ///
    /// # Arguments
    /// * `ordinal` - The device ordinal (0-indexed)
    pub fn on_device(ordinal: usize) -> Result<Self, CudaError> {
        let device = CudaDevice::new(ordinal).map_err(|e| CudaError::Device(e.to_string()))?;
        if !device.has_func(kernel::MODULE, kernel::FUNCTIONS[0]) {
            let ptx = cudarc::nvrtc::compile_ptx(kernel::SOURCE)
                .map_err(|e| CudaError::Compile(format!("{:?}", e)))?;
            device
                .load_ptx(ptx, kernel::MODULE, &kernel::FUNCTIONS)
                .map_err(|e| CudaError::Compile(e.to_string()))?;
            debug!(ordinal, "loaded symmetric contraction kernels");
        }
        Ok(Self { device })
    }

    /// Get a reference to the CUDA device.
    pub fn device(&self) -> &Arc<CudaDevice> {
        &self.device
    }

    fn upload<T: cudarc::driver::DeviceRepr + Clone + Unpin>(
        &self,
        data: &[T],
    ) -> Result<CudaStorage<T>, CudaError> {
        CudaStorage::from_host(&self.device, data).map_err(|e| CudaError::Alloc(e.to_string()))
    }

    /// Upload a plan and its effective weights `(E, num_weights, mul)`.
    ///
    /// Done once per operator; [`symmetric_contract`](Self::symmetric_contract)
    /// then only moves features, indices and results.
    pub fn upload_plan<M: Real>(
        &self,
        plan: &ContractionPlan<M>,
        weights: &[M],
    ) -> Result<DevicePlan<M>, CudaError> {
        let (term_weight, term_out, coeff, offsets, inputs) = plan.terms();
        let mut terms = Vec::with_capacity(kernel::TERM_STRIDE * plan.num_terms());
        for t in 0..plan.num_terms() {
            terms.extend_from_slice(&[term_weight[t], term_out[t], offsets[t], offsets[t + 1]]);
        }
        let shape: [u32; kernel::SHAPE_LEN] = [
            extent(plan.mul())?,
            extent(plan.row_in() / plan.mul())?,
            extent(plan.row_out() / plan.mul())?,
            extent(plan.num_terms())?,
            extent(plan.num_weights())?,
        ];

        // Empty device buffers are not allowed; pad unused tables.
        let terms = if terms.is_empty() { vec![0; kernel::TERM_STRIDE] } else { terms };
        let tables = PlanTables {
            gather: self.upload(plan.gather())?,
            scatter: self.upload(plan.scatter())?,
            terms: self.upload(&terms)?,
            coeff: self.upload::<M>(&padded(coeff, M::zero()))?,
            inputs: self.upload::<u16>(&padded(inputs, 0u16))?,
            shape: self.upload(&shape)?,
        };
        debug!(
            terms = plan.num_terms(),
            gather = plan.gather().len(),
            "uploaded contraction plan"
        );

        let mut device_plan = DevicePlan {
            tables: Arc::new(tables),
            weights: Arc::new(self.upload::<M>(&[M::zero()])?),
            mul: plan.mul(),
            row_in: plan.row_in(),
            row_out: plan.row_out(),
            num_terms: plan.num_terms(),
            per_element: plan.num_weights() * plan.mul(),
        };
        self.load_weights(&mut device_plan, weights)?;
        Ok(device_plan)
    }

    /// Replace the effective weights of an uploaded plan.
    pub fn load_weights<M: Real>(
        &self,
        plan: &mut DevicePlan<M>,
        weights: &[M],
    ) -> Result<(), CudaError> {
        if plan.per_element > 0 && weights.len() % plan.per_element != 0 {
            return Err(CudaError::Launch(format!(
                "{} weights is not a whole number of {}-weight element sets",
                weights.len(),
                plan.per_element
            )));
        }
        plan.weights = Arc::new(self.upload::<M>(&padded(weights, M::zero()))?);
        trace!(elements = plan.num_elements(), "loaded weights");
        Ok(())
    }

    /// Batched symmetric contraction with an uploaded plan.
    ///
    /// Same contract as [`crate::Backend::symmetric_contract`]: `x` is
    /// `(batch, plan.row_in())` and the result is `(batch, plan.row_out())`,
    /// row-major on the host. `indices` must already be range-checked against
    /// the loaded weights. Partial sums stay in `M` on the device and are
    /// cast to `T` here.
    pub fn symmetric_contract<T: Real, M: Real>(
        &self,
        plan: &DevicePlan<M>,
        x: &[T],
        indices: &[u32],
        batch: usize,
    ) -> Result<Vec<T>, CudaError> {
        let threads = batch * plan.mul;
        let out_len = batch * plan.row_out;
        if threads == 0 || out_len == 0 {
            return Ok(vec![T::zero(); out_len]);
        }
        if x.len() != batch * plan.row_in || indices.len() != batch {
            return Err(CudaError::Launch(format!(
                "batch of {} rows needs {} features and {} indices, got {} and {}",
                batch,
                batch * plan.row_in,
                batch,
                x.len(),
                indices.len()
            )));
        }

        let x_dev = self.upload(x)?;
        let idx_dev = self.upload(indices)?;
        let mut out_dev = self
            .device
            .alloc_zeros::<M>(out_len)
            .map_err(|e| CudaError::Alloc(e.to_string()))?;

        let name = function_name(T::DTYPE, M::DTYPE);
        let func = self
            .device
            .get_func(kernel::MODULE, name)
            .ok_or_else(|| CudaError::Launch(format!("kernel {} is not loaded", name)))?;
        let blocks = extent(threads.div_ceil(kernel::BLOCK_SIZE as usize))?;
        let cfg = LaunchConfig {
            grid_dim: (blocks, 1, 1),
            block_dim: (kernel::BLOCK_SIZE, 1, 1),
            shared_mem_bytes: 0,
        };
        trace!(kernel = name, batch, threads, terms = plan.num_terms, "launch");

        let tables = &plan.tables;
        // SAFETY: argument types and order match the kernel signature, every
        // buffer covers the extents recorded in `tables.shape` and `batch`.
        unsafe {
            func.launch(
                cfg,
                (
                    x_dev.slice(),
                    plan.weights.slice(),
                    idx_dev.slice(),
                    tables.gather.slice(),
                    tables.scatter.slice(),
                    tables.terms.slice(),
                    tables.coeff.slice(),
                    tables.inputs.slice(),
                    &mut out_dev,
                    tables.shape.slice(),
                    extent(batch)?,
                ),
            )
        }
        .map_err(|e| CudaError::Launch(e.to_string()))?;

        let out = CudaStorage::new(out_dev, Arc::clone(&self.device))
            .to_vec()
            .map_err(|e| CudaError::Alloc(e.to_string()))?;
        Ok(out.into_iter().map(|v| v.cast()).collect())
    }
}

fn extent(n: usize) -> Result<u32, CudaError> {
    u32::try_from(n).map_err(|_| CudaError::Launch(format!("extent {} exceeds u32", n)))
}

fn padded<T: Copy>(data: &[T], fill: T) -> std::borrow::Cow<'_, [T]> {
    if data.is_empty() {
        std::borrow::Cow::Owned(vec![fill])
    } else {
        std::borrow::Cow::Borrowed(data)
    }
}

fn function_name(io: Dtype, math: Dtype) -> &'static str {
    match (io, math) {
        (Dtype::F32, Dtype::F32) => kernel::FUNCTIONS[0],
        (Dtype::F32, Dtype::F64) => kernel::FUNCTIONS[1],
        (Dtype::F64, Dtype::F32) => kernel::FUNCTIONS[2],
        (Dtype::F64, Dtype::F64) => kernel::FUNCTIONS[3],
    }
}

/// Errors that can occur during CUDA operations.
#[derive(Debug, Error)]
pub enum CudaError {
    /// Error initializing or accessing the CUDA device.
    #[error("CUDA device error: {0}")]
    Device(String),
    /// Error allocating or copying GPU memory.
    #[error("CUDA allocation error: {0}")]
    Alloc(String),
    /// NVRTC compilation or module loading failed.
    #[error("CUDA kernel compilation error: {0}")]
    Compile(String),
    /// Kernel launch failed.
    #[error("CUDA launch error: {0}")]
    Launch(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_names_cover_all_precisions() {
        assert_eq!(function_name(Dtype::F32, Dtype::F64), "sc_f32_f64");
        assert_eq!(function_name(Dtype::F64, Dtype::F64), "sc_f64_f64");
        for name in kernel::FUNCTIONS {
            assert!(kernel::SOURCE.contains(&format!("INSTANTIATE({},", name)));
        }
    }

    #[test]
    fn test_empty_tables_are_padded() {
        assert_eq!(&*padded::<u16>(&[], 0), &[0]);
        assert_eq!(&*padded(&[1.5f32, 2.0], 0.0), &[1.5, 2.0]);
    }

    #[test]
    fn test_extent_overflow() {
        assert_eq!(extent(7).unwrap(), 7);
        assert!(matches!(extent(usize::MAX), Err(CudaError::Launch(_))));
    }
}
