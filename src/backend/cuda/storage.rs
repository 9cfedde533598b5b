//! CUDA storage implementation for GPU memory management.

use cudarc::driver::{CudaDevice, CudaSlice, DeviceRepr, DeviceSlice, DriverError};
use std::sync::Arc;

/// GPU memory storage backed by CUDA.
///
/// Provides a wrapper around cudarc's `CudaSlice` with device reference tracking.
pub struct CudaStorage<T> {
    slice: CudaSlice<T>,
    device: Arc<CudaDevice>,
}

impl<T> CudaStorage<T> {
    /// Create a new CudaStorage from a CudaSlice and device reference.
    pub fn new(slice: CudaSlice<T>, device: Arc<CudaDevice>) -> Self {
        Self { slice, device }
    }

    /// Get a reference to the underlying CUDA slice.
    pub fn slice(&self) -> &CudaSlice<T> {
        &self.slice
    }

    /// Number of elements in storage.
    pub fn len(&self) -> usize {
        self.slice.len()
    }

    /// Check if storage is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: DeviceRepr + Clone + Unpin> CudaStorage<T> {
    /// Upload a host slice.
    pub fn from_host(device: &Arc<CudaDevice>, data: &[T]) -> Result<Self, DriverError> {
        let slice = device.htod_sync_copy(data)?;
        Ok(Self::new(slice, Arc::clone(device)))
    }

    /// Copy all data from GPU to a Vec on the host.
    ///
    /// # Errors
    ///
    /// Returns a `DriverError` if the CUDA device-to-host copy fails.
    pub fn to_vec(&self) -> Result<Vec<T>, DriverError> {
        self.device.dtoh_sync_copy(&self.slice)
    }
}

// SAFETY: CudaSlice<T> holds a device pointer plus an Arc<CudaDevice>; the
// memory is only touched through the driver, which serializes access.
unsafe impl<T: Send> Send for CudaStorage<T> {}

// SAFETY: shared references only expose read access to the slice handle.
unsafe impl<T: Sync> Sync for CudaStorage<T> {}
