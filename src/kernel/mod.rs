//! Kernel functions for kernel machines
//!
//! [`AnyKernel`] is the closed set of kernel variants; it implements
//! [`Kernel`] by forwarding to the wrapped variant and can be built from
//! serializable [`KernelParams`].

pub mod custom;
pub mod locality_improved;
pub mod sparse_gaussian;
pub mod traits;

pub use self::custom::*;
pub use self::locality_improved::*;
pub use self::sparse_gaussian::*;
pub use self::traits::*;

use crate::core::{
    FeatureClass, FeatureType, Features, KernelError, KernelMatrix, KernelType, Result,
};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::sync::Arc;

/// Construction parameters for a kernel variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KernelParams {
    /// Precomputed matrix, populated after construction
    Custom,
    SparseGaussian {
        width: f64,
    },
    SimpleLocalityImproved {
        length: usize,
        inner_degree: u32,
        outer_degree: u32,
        /// Window half-width, derived from `length` when absent
        #[serde(default)]
        winlen: Option<usize>,
    },
}

impl KernelParams {
    pub fn kernel_type(&self) -> KernelType {
        match self {
            Self::Custom => KernelType::Custom,
            Self::SparseGaussian { .. } => KernelType::SparseGaussian,
            Self::SimpleLocalityImproved { .. } => KernelType::SimpleLocalityImproved,
        }
    }
}

/// One of the supported kernel variants
#[derive(Debug)]
pub enum AnyKernel {
    Custom(CustomKernel),
    SparseGaussian(SparseGaussianKernel),
    SimpleLocalityImproved(SimpleLocalityImprovedStringKernel),
}

impl AnyKernel {
    /// Build an unbound kernel, rejecting invalid hyperparameters
    pub fn from_params(params: &KernelParams) -> Result<Self> {
        match *params {
            KernelParams::Custom => Ok(Self::Custom(CustomKernel::new())),
            KernelParams::SparseGaussian { width } => {
                if !(width > 0.0) {
                    return Err(KernelError::InvalidParameter(format!(
                        "width must be positive, got {width}"
                    )));
                }
                Ok(Self::SparseGaussian(SparseGaussianKernel::new(width)))
            }
            KernelParams::SimpleLocalityImproved {
                length,
                inner_degree,
                outer_degree,
                winlen,
            } => {
                let winlen = winlen.unwrap_or((length / 4).max(1));
                validate_parameters(length, winlen, inner_degree, outer_degree)?;
                Ok(Self::SimpleLocalityImproved(
                    SimpleLocalityImprovedStringKernel::with_window(
                        length,
                        winlen,
                        inner_degree,
                        outer_degree,
                    ),
                ))
            }
        }
    }

    pub fn as_custom(&self) -> Option<&CustomKernel> {
        match self {
            Self::Custom(k) => Some(k),
            _ => None,
        }
    }

    /// Mutable access to a custom kernel, e.g. to set its matrix
    pub fn as_custom_mut(&mut self) -> Option<&mut CustomKernel> {
        match self {
            Self::Custom(k) => Some(k),
            _ => None,
        }
    }

    fn inner(&self) -> &dyn Kernel {
        match self {
            Self::Custom(k) => k,
            Self::SparseGaussian(k) => k,
            Self::SimpleLocalityImproved(k) => k,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Kernel {
        match self {
            Self::Custom(k) => k,
            Self::SparseGaussian(k) => k,
            Self::SimpleLocalityImproved(k) => k,
        }
    }
}

impl From<CustomKernel> for AnyKernel {
    fn from(kernel: CustomKernel) -> Self {
        Self::Custom(kernel)
    }
}

impl From<SparseGaussianKernel> for AnyKernel {
    fn from(kernel: SparseGaussianKernel) -> Self {
        Self::SparseGaussian(kernel)
    }
}

impl From<SimpleLocalityImprovedStringKernel> for AnyKernel {
    fn from(kernel: SimpleLocalityImprovedStringKernel) -> Self {
        Self::SimpleLocalityImproved(kernel)
    }
}

impl Kernel for AnyKernel {
    fn init(&mut self, lhs: Arc<dyn Features>, rhs: Arc<dyn Features>) -> Result<()> {
        self.inner_mut().init(lhs, rhs)
    }

    fn cleanup(&mut self) {
        self.inner_mut().cleanup()
    }

    fn binding(&self) -> Option<&KernelBinding> {
        self.inner().binding()
    }

    fn compute(&self, i: usize, j: usize) -> f64 {
        self.inner().compute(i, j)
    }

    fn load_init(&mut self, src: &mut dyn Read) -> Result<()> {
        self.inner_mut().load_init(src)
    }

    fn save_init(&self, dest: &mut dyn Write) -> Result<()> {
        self.inner().save_init(dest)
    }

    fn kernel_type(&self) -> KernelType {
        self.inner().kernel_type()
    }

    fn feature_type(&self) -> FeatureType {
        self.inner().feature_type()
    }

    fn feature_class(&self) -> FeatureClass {
        self.inner().feature_class()
    }

    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn is_symmetric(&self) -> bool {
        self.inner().is_symmetric()
    }

    fn kernel_matrix(&self, target: Option<Vec<f64>>) -> KernelMatrix {
        self.inner().kernel_matrix(target)
    }

    fn kernel_matrix_f32(&self) -> Vec<f32> {
        self.inner().kernel_matrix_f32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::SparseFeatures;

    #[test]
    fn test_from_params() {
        let kernel = AnyKernel::from_params(&KernelParams::SparseGaussian { width: 2.0 }).unwrap();
        assert_eq!(kernel.kernel_type(), KernelType::SparseGaussian);
        assert_eq!(kernel.name(), "SparseGaussian");
        assert_eq!(kernel.feature_class(), FeatureClass::Sparse);

        let params = KernelParams::SimpleLocalityImproved {
            length: 8,
            inner_degree: 2,
            outer_degree: 1,
            winlen: None,
        };
        let kernel = AnyKernel::from_params(&params).unwrap();
        assert_eq!(kernel.kernel_type(), params.kernel_type());
        assert_eq!(kernel.feature_type(), FeatureType::Char);
    }

    #[test]
    fn test_from_params_rejects_invalid() {
        assert!(matches!(
            AnyKernel::from_params(&KernelParams::SparseGaussian { width: -1.0 }),
            Err(KernelError::InvalidParameter(_))
        ));
        assert!(AnyKernel::from_params(&KernelParams::SparseGaussian { width: f64::NAN }).is_err());
        assert!(AnyKernel::from_params(&KernelParams::SimpleLocalityImproved {
            length: 4,
            inner_degree: 1,
            outer_degree: 1,
            winlen: Some(0),
        })
        .is_err());
    }

    #[test]
    fn test_from_params_rejects_degree_out_of_range() {
        for (inner_degree, outer_degree) in [(0, 1), (1, 0), (8, 1), (50, 0)] {
            let params = KernelParams::SimpleLocalityImproved {
                length: 4,
                inner_degree,
                outer_degree,
                winlen: None,
            };
            assert!(matches!(
                AnyKernel::from_params(&params),
                Err(KernelError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn test_params_from_json() {
        let params: KernelParams = serde_json::from_str(
            r#"{"type": "simple_locality_improved", "length": 10, "inner_degree": 3, "outer_degree": 1}"#,
        )
        .unwrap();
        assert_eq!(
            params,
            KernelParams::SimpleLocalityImproved {
                length: 10,
                inner_degree: 3,
                outer_degree: 1,
                winlen: None
            }
        );

        let params: KernelParams = serde_json::from_str(r#"{"type": "custom"}"#).unwrap();
        assert_eq!(params, KernelParams::Custom);
    }

    #[test]
    fn test_forwarding_uses_variant_matrix_path() {
        let mut kernel = AnyKernel::from_params(&KernelParams::Custom).unwrap();
        kernel
            .as_custom_mut()
            .unwrap()
            .set_triangle_kernel_matrix_from_triangle(&[1.0, 0.5, 2.0])
            .unwrap();

        assert!(kernel.is_bound());
        assert_eq!(kernel.kernel_matrix(None).data, vec![1.0, 0.5, 0.5, 2.0]);
        assert!(kernel.as_custom().is_some_and(CustomKernel::is_upper_diagonal));
    }

    #[test]
    fn test_forwarding_bind_and_compute() {
        let mut kernel: AnyKernel = SparseGaussianKernel::new(1.0).into();
        let features: Arc<dyn Features> =
            Arc::new(SparseFeatures::from_pairs(&[vec![(0, 1.0)], vec![(0, 2.0)]]));
        kernel.init(Arc::clone(&features), features).unwrap();

        assert_eq!((kernel.num_rows(), kernel.num_cols()), (2, 2));
        assert_eq!(kernel.compute(0, 0), 1.0);
        assert!(kernel.binding().is_some_and(KernelBinding::is_aliased));
        assert!(kernel.is_symmetric());

        kernel.cleanup();
        assert!(!kernel.is_bound());
    }
}
