//! Element-indexed symmetric contraction operator.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use tracing::{debug, trace};

use crate::backend::{Backend, Cpu};
use crate::config::{Device, SymmetricContractionConfig};
use crate::descriptor::{ContractionPlan, SymmetricContractionDescriptor};
use crate::error::{Error, Result};
use crate::scalar::{Dtype, IndexScalar, Real};
use crate::tensor::Tensor;

#[cfg(feature = "cuda")]
use crate::backend::{Cuda, DevicePlan};

/// Packed basis and effective weights in one math precision.
///
/// On CUDA the plan and weights are also resident on the device; the host
/// copies stay authoritative and are re-uploaded whenever weights change.
#[derive(Clone)]
struct Kernel<M: Real> {
    plan: ContractionPlan<M>,
    weights: Vec<M>,
    #[cfg(feature = "cuda")]
    device: Option<(Cuda, DevicePlan<M>)>,
}

impl<M: Real> Kernel<M> {
    fn new(
        desc: &SymmetricContractionDescriptor,
        config: &SymmetricContractionConfig,
        effective: &[f64],
    ) -> Result<Self> {
        let plan = ContractionPlan::new(desc, config.layout_in, config.layout_out);
        let weights: Vec<M> = effective.iter().map(|&v| M::from_f64(v)).collect();
        match config.device {
            Device::Cpu => Ok(Self {
                plan,
                weights,
                #[cfg(feature = "cuda")]
                device: None,
            }),
            #[cfg(feature = "cuda")]
            Device::Cuda(ordinal) => {
                let cuda = Cuda::on_device(ordinal)
                    .map_err(|e| Error::DeviceUnavailable(format!("{}: {}", config.device, e)))?;
                let uploaded = cuda.upload_plan(&plan, &weights)?;
                Ok(Self {
                    plan,
                    weights,
                    device: Some((cuda, uploaded)),
                })
            }
            #[cfg(not(feature = "cuda"))]
            Device::Cuda(_) => Err(Error::DeviceUnavailable(format!(
                "{} (built without the `cuda` feature)",
                config.device
            ))),
        }
    }

    fn set_weights(&mut self, effective: &[f64]) -> Result<()> {
        self.weights = effective.iter().map(|&v| M::from_f64(v)).collect();
        #[cfg(feature = "cuda")]
        {
            if let Some((cuda, uploaded)) = &mut self.device {
                cuda.load_weights(uploaded, &self.weights)?;
            }
        }
        Ok(())
    }

    fn run<T: Real>(&self, x: &Vec<T>, indices: &[u32], batch: usize) -> Result<Vec<T>> {
        #[cfg(feature = "cuda")]
        {
            if let Some((cuda, uploaded)) = &self.device {
                return Ok(cuda.symmetric_contract(uploaded, x, indices, batch)?);
            }
        }
        Cpu.symmetric_contract(&self.plan, &self.weights, x, indices, batch)
    }
}

impl<M: Real> std::fmt::Debug for Kernel<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        #[cfg(feature = "cuda")]
        let on_device = self.device.is_some();
        #[cfg(not(feature = "cuda"))]
        let on_device = false;
        f.debug_struct("Kernel")
            .field("math_dtype", &M::DTYPE)
            .field("num_terms", &self.plan.num_terms())
            .field("on_device", &on_device)
            .finish()
    }
}

#[derive(Debug, Clone)]
enum MathKernel {
    F32(Kernel<f32>),
    F64(Kernel<f64>),
}

impl MathKernel {
    fn dtype(&self) -> Dtype {
        match self {
            MathKernel::F32(_) => Dtype::F32,
            MathKernel::F64(_) => Dtype::F64,
        }
    }

    fn set_weights(&mut self, effective: &[f64]) -> Result<()> {
        match self {
            MathKernel::F32(k) => k.set_weights(effective),
            MathKernel::F64(k) => k.set_weights(effective),
        }
    }

    fn run<T: Real>(&self, x: &Vec<T>, indices: &[u32], batch: usize) -> Result<Vec<T>> {
        match self {
            MathKernel::F32(k) => k.run(x, indices, batch),
            MathKernel::F64(k) => k.run(x, indices, batch),
        }
    }
}

/// Symmetric contraction of per-channel irreps features with per-element weights.
///
/// For a row `z` with element `e = indices[z]` and channel `u`:
///
/// ```text
/// out[z, L, M, u] = Σ_ν Σ_b W[e, b, u] · B_b(x[z, :, u]^{⊗ν})[M]
/// ```
///
/// where `B_b` runs over the symmetric basis of degree `ν ≤ contraction_degree`.
///
/// # Example
///
/// ```rust
/// use equicontract::{Cpu, Group, Irreps, SymmetricContractionBuilder, Tensor};
///
/// let irreps_in = 2 * Irreps::parse(Group::O3, "0e + 1o").unwrap();
/// let irreps_out = 2 * Irreps::parse(Group::O3, "0e").unwrap();
/// let op = SymmetricContractionBuilder::new(&irreps_in, &irreps_out)
///     .contraction_degree(2)
///     .num_elements(3)
///     .build::<f64>()
///     .unwrap();
///
/// let x = Tensor::<f64, Cpu>::from_data(&[0.5; 2 * 8], &[2, 8]);
/// let i = Tensor::<i32, Cpu>::from_data(&[0, 2], &[2]);
/// let y = op.forward(&x, &i).unwrap();
/// assert_eq!(y.shape(), &[2, 2]);
/// ```
#[derive(Debug, Clone)]
pub struct SymmetricContraction<T: Real> {
    config: SymmetricContractionConfig,
    descriptor: Arc<SymmetricContractionDescriptor>,
    weight: Tensor<T, Cpu>,
    kernel: MathKernel,
}

impl<T: Real> SymmetricContraction<T> {
    /// Build from a configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] for a zero degree or element count, or a recorded
    ///   `dtype` that differs from `T`
    /// - [`Error::Parse`] / [`Error::Irreps`] for unusable irreps
    /// - [`Error::DeviceUnavailable`] when the device cannot be opened
    pub fn from_config(mut config: SymmetricContractionConfig) -> Result<Self> {
        config.validate()?;
        match config.dtype {
            Some(dtype) if dtype != T::DTYPE => {
                return Err(Error::Config(format!(
                    "configuration records dtype {} but the operator is built for {}",
                    dtype,
                    T::DTYPE
                )));
            }
            _ => config.dtype = Some(T::DTYPE),
        }
        let math_dtype = *config.math_dtype.get_or_insert(T::DTYPE);

        let (irreps_in, irreps_out) = config.irreps()?;
        let descriptor = Arc::new(SymmetricContractionDescriptor::new(
            &irreps_in,
            &irreps_out,
            config.contraction_degree,
        )?);
        let weight = init_weight::<T>(&descriptor, &config);
        let effective = effective_weights(&descriptor, &config, &weight);
        let kernel = match math_dtype {
            Dtype::F32 => MathKernel::F32(Kernel::new(&descriptor, &config, &effective)?),
            Dtype::F64 => MathKernel::F64(Kernel::new(&descriptor, &config, &effective)?),
        };

        debug!(
            irreps_in = %irreps_in,
            irreps_out = %irreps_out,
            degree = config.contraction_degree,
            num_elements = config.num_elements,
            num_weights = descriptor.num_weights(config.original_mace),
            dtype = %T::DTYPE,
            math_dtype = %math_dtype,
            device = %config.device,
            original_mace = config.original_mace,
            "built symmetric contraction"
        );

        Ok(Self {
            config,
            descriptor,
            weight,
            kernel,
        })
    }

    /// Contract `x` of shape `(Z, irreps_in.dim)` with the weights selected by `indices`.
    ///
    /// Returns `(Z, irreps_out.dim)` in the output layout.
    ///
    /// # Errors
    ///
    /// - [`Error::Shape`] when `x` is not `(Z, irreps_in.dim)` or `indices` is not `(Z,)`
    /// - [`Error::ElementIndex`] for an index outside `0..num_elements`
    pub fn forward<I: IndexScalar>(
        &self,
        x: &Tensor<T, Cpu>,
        indices: &Tensor<I, Cpu>,
    ) -> Result<Tensor<T, Cpu>> {
        let dim_in = self.descriptor.irreps_in().dim();
        let dim_out = self.descriptor.irreps_out().dim();
        if x.ndim() != 2 || x.shape()[1] != dim_in {
            return Err(Error::Shape {
                what: "input features",
                expected: vec![x.shape().first().copied().unwrap_or(0), dim_in],
                actual: x.shape().to_vec(),
            });
        }
        let batch = x.shape()[0];
        if indices.shape() != [batch] {
            return Err(Error::Shape {
                what: "element indices",
                expected: vec![batch],
                actual: indices.shape().to_vec(),
            });
        }

        let num_elements = self.config.num_elements;
        let idx = indices
            .to_vec()
            .into_iter()
            .enumerate()
            .map(|(row, v)| match v.to_index() {
                Some(e) if e < num_elements => Ok(e as u32),
                _ => Err(Error::ElementIndex {
                    row,
                    index: v.to_i64(),
                    num_elements,
                }),
            })
            .collect::<Result<Vec<u32>>>()?;

        trace!(batch, math_dtype = %self.kernel.dtype(), device = %self.config.device, "forward");

        let out = self.kernel.run(&x.to_vec(), &idx, batch)?;
        Ok(Tensor::from_data(&out, &[batch, dim_out]))
    }

    /// Current weights, `(num_elements, num_weights, mul)`.
    pub fn weight(&self) -> &Tensor<T, Cpu> {
        &self.weight
    }

    /// Replace the weights.
    ///
    /// # Errors
    ///
    /// [`Error::Shape`] when the shape differs from [`weight_shape`](Self::weight_shape),
    /// or a CUDA error when the new weights cannot be uploaded.
    pub fn set_weight(&mut self, weight: Tensor<T, Cpu>) -> Result<()> {
        let expected = self.weight_shape();
        if weight.shape() != expected {
            return Err(Error::Shape {
                what: "weight",
                expected: expected.to_vec(),
                actual: weight.shape().to_vec(),
            });
        }
        let weight = weight.contiguous();
        self.kernel
            .set_weights(&effective_weights(&self.descriptor, &self.config, &weight))?;
        self.weight = weight;
        Ok(())
    }

    /// `[num_elements, num_weights, mul]`.
    pub fn weight_shape(&self) -> [usize; 3] {
        [
            self.config.num_elements,
            self.descriptor.num_weights(self.config.original_mace),
            self.descriptor.mul(),
        ]
    }

    pub fn config(&self) -> &SymmetricContractionConfig {
        &self.config
    }

    pub fn descriptor(&self) -> &SymmetricContractionDescriptor {
        &self.descriptor
    }

    /// Accumulation precision.
    pub fn math_dtype(&self) -> Dtype {
        self.kernel.dtype()
    }

    /// Projection of historical coupling-path weights onto the symmetric basis.
    pub fn projection(&self) -> Tensor<f64, Cpu> {
        self.descriptor.projection()
    }
}

/// Seeded standard-normal weights, each block scaled by its size.
fn init_weight<T: Real>(
    desc: &SymmetricContractionDescriptor,
    config: &SymmetricContractionConfig,
) -> Tensor<T, Cpu> {
    let compat = config.original_mace;
    let (num_weights, mul) = (desc.num_weights(compat), desc.mul());

    let mut scale = vec![0.0; num_weights];
    for range in desc.weight_blocks(compat) {
        let n = range.len() as f64;
        scale[range].iter_mut().for_each(|s| *s = 1.0 / n);
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut data = Vec::with_capacity(config.num_elements * num_weights * mul);
    for _ in 0..config.num_elements {
        for s in &scale {
            for _ in 0..mul {
                let v: f64 = StandardNormal.sample(&mut rng);
                data.push(T::from_f64(v * s));
            }
        }
    }
    Tensor::from_data(&data, &[config.num_elements, num_weights, mul])
}

/// Weights on the reduced basis, in `f64`.
fn effective_weights<T: Real>(
    desc: &SymmetricContractionDescriptor,
    config: &SymmetricContractionConfig,
    weight: &Tensor<T, Cpu>,
) -> Vec<f64> {
    let w: Vec<f64> = weight.to_vec().into_iter().map(Real::as_f64).collect();
    if config.original_mace {
        desc.project_weights(&w, config.num_elements)
    } else {
        w
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::SymmetricContractionBuilder;
    use crate::irreps::{Group, Irreps};

    fn irreps(text: &str) -> Irreps {
        Irreps::parse(Group::O3, text).unwrap()
    }

    fn op(original_mace: bool) -> SymmetricContraction<f64> {
        SymmetricContractionBuilder::new(&irreps("2x0e + 2x1o"), &irreps("2x0e + 2x1o"))
            .contraction_degree(2)
            .num_elements(3)
            .original_mace(original_mace)
            .build::<f64>()
            .unwrap()
    }

    #[test]
    fn test_defaults_recorded_in_config() {
        let op = op(false);
        assert_eq!(op.config().dtype, Some(Dtype::F64));
        assert_eq!(op.math_dtype(), Dtype::F64);
        assert_eq!(op.config().device, Device::Cpu);
    }

    #[test]
    fn test_weight_init_is_seeded() {
        let a = op(false);
        let b = op(false);
        assert_eq!(a.weight().to_vec(), b.weight().to_vec());
        assert!(a.weight().to_vec().iter().any(|&v| v != 0.0));
    }

    #[test]
    fn test_zero_weights_give_zero_output() {
        let mut op = op(true);
        let shape = op.weight_shape();
        op.set_weight(Tensor::zeros(&shape)).unwrap();
        let x = Tensor::<f64, Cpu>::from_data(&[1.0; 16], &[2, 8]);
        let i = Tensor::<i64, Cpu>::from_data(&[0, 2], &[2]);
        let y = op.forward(&x, &i).unwrap();
        assert!(y.to_vec().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_dtype_mismatch_rejected() {
        let mut config = op(false).config().clone();
        config.dtype = Some(Dtype::F32);
        assert!(matches!(
            SymmetricContraction::<f64>::from_config(config),
            Err(Error::Config(_))
        ));
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_cuda_device_unavailable_without_feature() {
        let err = SymmetricContractionBuilder::new(&irreps("0e"), &irreps("0e"))
            .contraction_degree(1)
            .num_elements(1)
            .device(Device::Cuda(0))
            .build::<f32>();
        assert!(matches!(err, Err(Error::DeviceUnavailable(_))));
    }
}
