//! Kernel trait definition

use crate::core::{
    FeatureClass, FeatureType, Features, KernelError, KernelMatrix, KernelType, Result,
};
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

/// The (lhs, rhs) feature pair a kernel is currently bound to
#[derive(Clone)]
pub struct KernelBinding {
    lhs: Arc<dyn Features>,
    rhs: Arc<dyn Features>,
}

impl KernelBinding {
    pub fn new(lhs: Arc<dyn Features>, rhs: Arc<dyn Features>) -> Self {
        Self { lhs, rhs }
    }

    /// Validate both sides against a kernel's declared feature type and class
    pub fn checked(
        lhs: Arc<dyn Features>,
        rhs: Arc<dyn Features>,
        feature_type: FeatureType,
        feature_class: FeatureClass,
        name: &str,
    ) -> Result<Self> {
        for (side, features) in [("left", &lhs), ("right", &rhs)] {
            if !feature_type.accepts(features.feature_type())
                || !feature_class.accepts(features.feature_class())
            {
                return Err(KernelError::Binding(format!(
                    "{name} kernel requires {feature_type:?}/{feature_class:?} features, \
                     {side} side provides {:?}/{:?}",
                    features.feature_type(),
                    features.feature_class()
                )));
            }
        }
        Ok(Self::new(lhs, rhs))
    }

    pub fn lhs(&self) -> &dyn Features {
        self.lhs.as_ref()
    }

    pub fn rhs(&self) -> &dyn Features {
        self.rhs.as_ref()
    }

    /// Number of left-hand side vectors
    pub fn num_rows(&self) -> usize {
        self.lhs.num_vectors()
    }

    /// Number of right-hand side vectors
    pub fn num_cols(&self) -> usize {
        self.rhs.num_vectors()
    }

    /// Whether both sides are the same collection
    pub fn is_aliased(&self) -> bool {
        Arc::as_ptr(&self.lhs) as *const () == Arc::as_ptr(&self.rhs) as *const ()
    }
}

impl fmt::Debug for KernelBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelBinding")
            .field("num_rows", &self.num_rows())
            .field("num_cols", &self.num_cols())
            .field("aliased", &self.is_aliased())
            .finish()
    }
}

/// Kernel function bound to a pair of feature collections
///
/// A kernel K(i, j) maps left vector `i` and right vector `j` to a scalar
/// similarity. Per-binding state is built in [`Kernel::init`] and only read by
/// [`Kernel::compute`], so a bound kernel can be shared across threads.
/// Kernels that need scratch space per lookup may serialize concurrent
/// `compute` calls on it; [`Kernel::kernel_matrix`] is the path to use for
/// bulk evaluation.
pub trait Kernel: Send + Sync {
    /// Bind to a feature pair, releasing any previous binding first
    ///
    /// On failure the kernel is left unbound.
    fn init(&mut self, lhs: Arc<dyn Features>, rhs: Arc<dyn Features>) -> Result<()>;

    /// Release all per-binding state; no-op when unbound
    fn cleanup(&mut self);

    /// The active binding, if any
    fn binding(&self) -> Option<&KernelBinding>;

    /// Compute K(i, j) under the current binding
    ///
    /// # Panics
    /// Panics if the kernel is unbound or `i >= num_rows()` or `j >= num_cols()`
    fn compute(&self, i: usize, j: usize) -> f64;

    /// Restore hyperparameters and/or matrix payload from `src`
    fn load_init(&mut self, src: &mut dyn Read) -> Result<()>;

    /// Persist hyperparameters and/or matrix payload to `dest`
    fn save_init(&self, dest: &mut dyn Write) -> Result<()>;

    fn kernel_type(&self) -> KernelType;

    /// Feature type this kernel accepts
    fn feature_type(&self) -> FeatureType;

    /// Feature class this kernel accepts
    fn feature_class(&self) -> FeatureClass;

    fn name(&self) -> &'static str;

    fn is_bound(&self) -> bool {
        self.binding().is_some()
    }

    fn num_rows(&self) -> usize {
        self.binding().map_or(0, KernelBinding::num_rows)
    }

    fn num_cols(&self) -> usize {
        self.binding().map_or(0, KernelBinding::num_cols)
    }

    /// Whether K(i, j) == K(j, i) holds for every index pair of the binding
    ///
    /// Callers may share cached values between (i, j) and (j, i) only when
    /// this returns true.
    fn is_symmetric(&self) -> bool {
        false
    }

    /// Evaluate the full `num_rows() x num_cols()` matrix row-major
    ///
    /// `target` is reused when its capacity suffices.
    ///
    /// # Panics
    /// Panics if the kernel is unbound
    fn kernel_matrix(&self, target: Option<Vec<f64>>) -> KernelMatrix {
        assert!(self.is_bound(), "{} kernel is not bound", self.name());
        let rows = self.num_rows();
        let cols = self.num_cols();
        let mut data = matrix_buffer(target, rows * cols);

        for i in 0..rows {
            for j in 0..cols {
                data.push(self.compute(i, j));
            }
        }

        KernelMatrix { rows, cols, data }
    }

    /// Single precision variant of [`Kernel::kernel_matrix`]
    fn kernel_matrix_f32(&self) -> Vec<f32> {
        self.kernel_matrix(None)
            .data
            .into_iter()
            .map(|v| v as f32)
            .collect()
    }
}

/// Empty buffer with room for `len` values, reusing `target` if large enough
pub(crate) fn matrix_buffer(target: Option<Vec<f64>>, len: usize) -> Vec<f64> {
    match target {
        Some(mut buf) if buf.capacity() >= len => {
            buf.clear();
            buf
        }
        _ => Vec::with_capacity(len),
    }
}
