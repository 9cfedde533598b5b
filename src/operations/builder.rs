//! Builder pattern for symmetric contraction construction.

use crate::config::{Device, SymmetricContractionConfig};
use crate::error::Result;
use crate::irreps::{Irreps, IrrepsLayout};
use crate::scalar::{Dtype, Real};

use super::SymmetricContraction;

/// Builder for a [`SymmetricContraction`].
///
/// # Example
///
/// ```rust
/// use equicontract::{Dtype, Group, Irreps, IrrepsLayout, SymmetricContractionBuilder};
///
/// let irreps_in = 8 * Irreps::parse(Group::O3, "0e + 1o + 2e").unwrap();
/// let irreps_out = 8 * Irreps::parse(Group::O3, "0e + 1o").unwrap();
///
/// let op = SymmetricContractionBuilder::new(&irreps_in, &irreps_out)
///     .contraction_degree(3)
///     .num_elements(5)
///     .layout(IrrepsLayout::IrMul)
///     .math_dtype(Dtype::F64)
///     .build::<f32>()
///     .unwrap();
///
/// assert_eq!(op.weight_shape(), [5, 17, 8]);
/// ```
#[derive(Debug, Clone)]
pub struct SymmetricContractionBuilder {
    config: SymmetricContractionConfig,
}

impl SymmetricContractionBuilder {
    /// Create a new builder.
    pub fn new(irreps_in: &Irreps, irreps_out: &Irreps) -> Self {
        Self {
            config: SymmetricContractionConfig::new(irreps_in, irreps_out),
        }
    }

    /// Start from an existing configuration.
    pub fn from_config(config: SymmetricContractionConfig) -> Self {
        Self { config }
    }

    /// Highest polynomial degree (required, at least 1).
    pub fn contraction_degree(mut self, degree: usize) -> Self {
        self.config.contraction_degree = degree;
        self
    }

    /// Number of chemical elements with their own weights (required, at least 1).
    pub fn num_elements(mut self, n: usize) -> Self {
        self.config.num_elements = n;
        self
    }

    /// Alias of [`num_elements`](Self::num_elements).
    pub fn num_species(self, n: usize) -> Self {
        self.num_elements(n)
    }

    pub fn layout_in(mut self, layout: IrrepsLayout) -> Self {
        self.config.layout_in = layout;
        self
    }

    pub fn layout_out(mut self, layout: IrrepsLayout) -> Self {
        self.config.layout_out = layout;
        self
    }

    /// Set input and output layouts at once.
    pub fn layout(self, layout: IrrepsLayout) -> Self {
        self.layout_in(layout).layout_out(layout)
    }

    pub fn math_dtype(mut self, dtype: Dtype) -> Self {
        self.config.math_dtype = Some(dtype);
        self
    }

    pub fn device(mut self, device: Device) -> Self {
        self.config.device = device;
        self
    }

    /// Use one weight per historical coupling path.
    pub fn original_mace(mut self, enabled: bool) -> Self {
        self.config.original_mace = enabled;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// The configuration collected so far.
    pub fn config(&self) -> &SymmetricContractionConfig {
        &self.config
    }

    /// Build the operator with I/O precision `T`.
    ///
    /// # Errors
    ///
    /// See [`SymmetricContraction::from_config`].
    pub fn build<T: Real>(self) -> Result<SymmetricContraction<T>> {
        SymmetricContraction::from_config(self.config)
    }
}
