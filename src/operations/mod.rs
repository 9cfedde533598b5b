//! User-facing operators.

mod builder;
mod symmetric_contraction;

pub use builder::SymmetricContractionBuilder;
pub use symmetric_contraction::SymmetricContraction;
