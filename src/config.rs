//! Serializable operator configuration.

use serde::{Deserialize, Serialize};

use crate::descriptor::MAX_CONTRACTION_DEGREE;
use crate::error::{Error, Result};
use crate::irreps::{Group, Irreps, IrrepsLayout};
use crate::scalar::Dtype;

/// Where the contraction runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    #[default]
    Cpu,
    /// CUDA device ordinal.
    Cuda(usize),
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(ordinal) => write!(f, "cuda:{}", ordinal),
        }
    }
}

/// Everything needed to rebuild a [`SymmetricContraction`](crate::SymmetricContraction).
///
/// ```rust
/// use equicontract::SymmetricContractionConfig;
///
/// let json = r#"{
///     "irreps_in": "4x0e+4x1o+4x2e",
///     "irreps_out": "4x0e+4x1o",
///     "contraction_degree": 3,
///     "num_elements": 2
/// }"#;
/// let config = SymmetricContractionConfig::from_json(json).unwrap();
/// assert_eq!(config.math_dtype, None);
/// assert!(!config.original_mace);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymmetricContractionConfig {
    /// Group of `irreps_in`.
    #[serde(default)]
    pub group: Group,
    /// Group of `irreps_out` when recorded; must equal `group`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_out: Option<Group>,
    /// Input irreps text, e.g. `"64x0e+64x1o"`.
    pub irreps_in: String,
    pub irreps_out: String,
    pub contraction_degree: usize,
    pub num_elements: usize,
    #[serde(default)]
    pub layout_in: IrrepsLayout,
    #[serde(default)]
    pub layout_out: IrrepsLayout,
    /// I/O precision, filled in when the operator is built.
    #[serde(default)]
    pub dtype: Option<Dtype>,
    /// Accumulation precision; defaults to the I/O precision.
    #[serde(default)]
    pub math_dtype: Option<Dtype>,
    #[serde(default)]
    pub device: Device,
    /// Use the historical per-path weight layout.
    #[serde(default)]
    pub original_mace: bool,
    /// Seed for weight initialization.
    #[serde(default)]
    pub seed: u64,
}

impl SymmetricContractionConfig {
    pub fn new(irreps_in: &Irreps, irreps_out: &Irreps) -> Self {
        Self {
            group: irreps_in.group(),
            group_out: Some(irreps_out.group()),
            irreps_in: irreps_in.to_string(),
            irreps_out: irreps_out.to_string(),
            contraction_degree: 0,
            num_elements: 0,
            layout_in: IrrepsLayout::default(),
            layout_out: IrrepsLayout::default(),
            dtype: None,
            math_dtype: None,
            device: Device::default(),
            original_mace: false,
            seed: 0,
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse `(irreps_in, irreps_out)` under the configured group.
    ///
    /// # Errors
    ///
    /// [`Error::Irreps`] when input and output were declared under different groups.
    pub fn irreps(&self) -> Result<(Irreps, Irreps)> {
        match self.group_out {
            Some(out) if out != self.group => {
                return Err(Error::Irreps(format!(
                    "input irreps are {} but output irreps are {}",
                    self.group, out
                )));
            }
            _ => {}
        }
        Ok((
            Irreps::parse(self.group, &self.irreps_in)?,
            Irreps::parse(self.group, &self.irreps_out)?,
        ))
    }

    /// Check the fields that do not depend on the irreps algebra.
    pub fn validate(&self) -> Result<()> {
        if self.contraction_degree == 0 {
            return Err(Error::Config("contraction_degree must be at least 1".into()));
        }
        if self.contraction_degree > MAX_CONTRACTION_DEGREE {
            return Err(Error::Config(format!(
                "contraction_degree {} exceeds the supported maximum of {}",
                self.contraction_degree, MAX_CONTRACTION_DEGREE
            )));
        }
        if self.num_elements == 0 {
            return Err(Error::Config("num_elements must be at least 1".into()));
        }
        Ok(())
    }
}
