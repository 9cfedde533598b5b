//! # equicontract
//!
//! Element-indexed symmetric tensor contraction for O(3)-equivariant
//! networks, the many-body product at the heart of MACE-style interatomic
//! potentials.
//!
//! ## Features
//!
//! - **Irreps algebra**: parsing, layouts (`mul_ir` / `ir_mul`) and real Clebsch–Gordan coefficients
//! - **Symmetric basis**: orthonormal equivariant polynomials up to any degree, stored sparsely
//! - **MACE compatibility**: historical per-path weights projected onto the basis exactly
//! - **Mixed precision**: `f32`/`f64` I/O with independent accumulation precision
//! - **CPU + CUDA**: rayon-parallel CPU kernel and an NVRTC kernel (CUDA optional)
//!
//! ## Quick Start
//!
//! ```rust
//! use equicontract::{Cpu, Dtype, Group, Irreps, SymmetricContractionBuilder, Tensor};
//!
//! let irreps_in = 4 * Irreps::parse(Group::O3, "0e + 1o + 2e").unwrap();
//! let irreps_out = 4 * Irreps::parse(Group::O3, "0e + 1o").unwrap();
//!
//! let op = SymmetricContractionBuilder::new(&irreps_in, &irreps_out)
//!     .contraction_degree(3)
//!     .num_elements(2)
//!     .math_dtype(Dtype::F64)
//!     .build::<f32>()
//!     .unwrap();
//!
//! let x = Tensor::<f32, Cpu>::from_data(&vec![0.1; 3 * 36], &[3, 36]);
//! let i = Tensor::<i32, Cpu>::from_data(&[0, 1, 0], &[3]);
//! let y = op.forward(&x, &i).unwrap();
//! assert_eq!(y.shape(), &[3, 16]);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         User API                            │
//! │   SymmetricContractionBuilder::new(in, out)...build::<T>()  │
//! │   op.forward(x, indices) → Tensor                           │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 SymmetricContractionDescriptor              │
//! │   o3::coupling_paths → symmetrize → Gram–Schmidt            │
//! │   sparse basis + path projection (faer)                     │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ContractionPlan<M> dispatch                 │
//! │   Cpu:  rayon over rows                                     │
//! │   Cuda: NVRTC kernel, one thread per (row, channel)         │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod irreps;
pub mod o3;
pub mod operations;
pub mod reference;
pub mod scalar;
pub mod tensor;

// Re-exports
pub use backend::{Backend, Cpu, Storage};
pub use config::{Device, SymmetricContractionConfig};
pub use descriptor::{ContractionPlan, SymmetricContractionDescriptor};
pub use error::{Error, Result};
pub use irreps::{Group, Irrep, Irreps, IrrepsLayout, MulIrrep, Parity};
pub use operations::{SymmetricContraction, SymmetricContractionBuilder};
pub use scalar::{Dtype, IndexScalar, Real, Scalar};
pub use tensor::Tensor;

#[cfg(feature = "cuda")]
pub use backend::Cuda;
