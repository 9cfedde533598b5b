//! Backend abstractions for CPU and GPU execution.
//!
//! This module defines the [`Backend`] trait and implementations:
//! - [`Cpu`]: CPU backend, rows contracted in parallel with rayon
//! - [`Cuda`]: NVRTC kernel over the same plans (optional, requires `cuda` feature)

mod cpu;
mod traits;

pub use cpu::Cpu;
pub use traits::{Backend, Storage};

#[cfg(feature = "cuda")]
mod cuda;

#[cfg(feature = "cuda")]
pub use cuda::{Cuda, CudaError, CudaStorage, DevicePlan};
