//! Sparse Gaussian kernel implementation
//!
//! The kernel is defined as: K(x, y) = exp(-||x - y||² / width)
//!
//! Squared norms of every bound vector are cached at bind time, so each
//! lookup costs a single sparse dot product:
//! ||x - y||² = ||x||² + ||y||² - 2 * x·y

use crate::core::{
    FeatureClass, FeatureType, Features, KernelError, KernelType, Result, SparseVector,
};
use crate::kernel::traits::{Kernel, KernelBinding};
use crate::persistence::{read_init, write_init};
use log::debug;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::sync::Arc;

/// Gaussian kernel over sparse real vectors with cached squared norms
#[derive(Debug)]
pub struct SparseGaussianKernel {
    width: f64,
    binding: Option<KernelBinding>,
    sq_lhs: Option<Arc<[f64]>>,
    sq_rhs: Option<Arc<[f64]>>,
}

#[derive(Serialize, Deserialize)]
struct SparseGaussianInitData {
    width: f64,
}

impl SparseGaussianKernel {
    /// Create a new sparse Gaussian kernel
    ///
    /// # Arguments
    /// * `width` - The kernel width (must be positive)
    ///
    /// # Panics
    /// Panics if width is not positive
    pub fn new(width: f64) -> Self {
        assert!(width > 0.0, "Width must be positive, got: {}", width);
        Self {
            width,
            binding: None,
            sq_lhs: None,
            sq_rhs: None,
        }
    }

    /// Get the width parameter
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Cached squared norms of the left-hand side vectors
    pub fn sq_lhs(&self) -> Option<&[f64]> {
        self.sq_lhs.as_deref()
    }

    /// Cached squared norms of the right-hand side vectors
    pub fn sq_rhs(&self) -> Option<&[f64]> {
        self.sq_rhs.as_deref()
    }

    /// Gaussian value from precomputed squared norms and a dot product
    #[inline]
    fn evaluate(&self, x_norm_sq: f64, y_norm_sq: f64, dot: f64) -> f64 {
        // Clamp at zero against round-off for nearly identical vectors
        let squared_distance = (x_norm_sq + y_norm_sq - 2.0 * dot).max(0.0);
        (-squared_distance / self.width).exp()
    }
}

fn sparse_vector<'a>(features: &'a dyn Features, index: usize) -> Result<&'a SparseVector> {
    features.sparse_vector(index).ok_or_else(|| {
        KernelError::Binding(format!("feature vector {index} is not a sparse vector"))
    })
}

fn squared_norms(features: &dyn Features) -> Result<Arc<[f64]>> {
    (0..features.num_vectors())
        .map(|i| sparse_vector(features, i).map(SparseVector::norm_squared))
        .collect::<Result<Vec<f64>>>()
        .map(Arc::from)
}

impl Kernel for SparseGaussianKernel {
    fn init(&mut self, lhs: Arc<dyn Features>, rhs: Arc<dyn Features>) -> Result<()> {
        self.cleanup();

        let binding = KernelBinding::checked(
            lhs,
            rhs,
            self.feature_type(),
            self.feature_class(),
            self.name(),
        )?;

        let sq_lhs = squared_norms(binding.lhs())?;
        let sq_rhs = if binding.is_aliased() {
            Arc::clone(&sq_lhs)
        } else {
            squared_norms(binding.rhs())?
        };
        debug!(
            "sparse gaussian norm caches built: {} lhs, {} rhs (shared={})",
            sq_lhs.len(),
            sq_rhs.len(),
            binding.is_aliased()
        );

        self.sq_lhs = Some(sq_lhs);
        self.sq_rhs = Some(sq_rhs);
        self.binding = Some(binding);
        Ok(())
    }

    fn cleanup(&mut self) {
        self.sq_lhs = None;
        self.sq_rhs = None;
        self.binding = None;
    }

    fn binding(&self) -> Option<&KernelBinding> {
        self.binding.as_ref()
    }

    fn compute(&self, idx_a: usize, idx_b: usize) -> f64 {
        let (Some(binding), Some(sq_lhs), Some(sq_rhs)) =
            (&self.binding, &self.sq_lhs, &self.sq_rhs)
        else {
            panic!("SparseGaussian kernel is not bound");
        };
        assert!(
            idx_a < sq_lhs.len(),
            "row {idx_a} out of bounds ({})",
            sq_lhs.len()
        );
        assert!(
            idx_b < sq_rhs.len(),
            "col {idx_b} out of bounds ({})",
            sq_rhs.len()
        );

        let (Some(x), Some(y)) = (
            binding.lhs().sparse_vector(idx_a),
            binding.rhs().sparse_vector(idx_b),
        ) else {
            panic!("bound features lost sparse vectors ({idx_a}, {idx_b})");
        };

        self.evaluate(sq_lhs[idx_a], sq_rhs[idx_b], x.dot(y))
    }

    fn load_init(&mut self, src: &mut dyn Read) -> Result<()> {
        let data: SparseGaussianInitData = read_init(src, self.name())?;
        if !(data.width > 0.0) {
            return Err(KernelError::InvalidParameter(format!(
                "width must be positive, got {}",
                data.width
            )));
        }
        self.width = data.width;
        Ok(())
    }

    fn save_init(&self, dest: &mut dyn Write) -> Result<()> {
        write_init(dest, self.name(), &SparseGaussianInitData { width: self.width })
    }

    fn kernel_type(&self) -> KernelType {
        KernelType::SparseGaussian
    }

    fn feature_type(&self) -> FeatureType {
        FeatureType::Real
    }

    fn feature_class(&self) -> FeatureClass {
        FeatureClass::Sparse
    }

    fn name(&self) -> &'static str {
        "SparseGaussian"
    }

    fn is_symmetric(&self) -> bool {
        self.binding.as_ref().is_some_and(KernelBinding::is_aliased)
    }
}
