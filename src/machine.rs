//! Kernel machine boundary
//!
//! A [`KernelMachine`] shares a kernel with other holders and evaluates the
//! decision function f(j) = Σₖ αₖ · K(svₖ, j) + b for every right-hand side
//! vector of the kernel's binding. How the support vectors and their weights
//! were obtained is up to the caller.

use crate::cache::KernelCache;
use crate::core::{KernelError, Prediction, Result};
use crate::kernel::{AnyKernel, Kernel};
use log::{debug, warn};
use std::sync::{Arc, PoisonError, RwLock};

/// Kernel handle shared between machines and other owners
pub type SharedKernel = Arc<RwLock<AnyKernel>>;

/// Wrap a kernel into a shareable handle
pub fn share<K: Into<AnyKernel>>(kernel: K) -> SharedKernel {
    Arc::new(RwLock::new(kernel.into()))
}

/// Configuration for kernel machine evaluation
#[derive(Debug, Clone)]
pub struct MachineConfig {
    /// Evaluate through one bulk kernel matrix instead of pairwise lookups
    pub use_batch_computation: bool,
    /// Use linear-combination acceleration when the kernel supports it
    pub use_linadd: bool,
    /// Kernel cache size in bytes for the pairwise path
    pub cache_size: usize,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            use_batch_computation: true,
            use_linadd: true,
            cache_size: 10_000_000, // 10MB
        }
    }
}

/// Kernel plus support vector expansion
#[derive(Debug, Default)]
pub struct KernelMachine {
    kernel: Option<SharedKernel>,
    config: MachineConfig,
    support_vectors: Vec<usize>,
    alphas: Vec<f64>,
    bias: f64,
}

impl KernelMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MachineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Set kernel
    pub fn with_kernel(mut self, kernel: SharedKernel) -> Self {
        self.set_kernel(kernel);
        self
    }

    /// Set kernel cache size in bytes
    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.config.cache_size = cache_size;
        self
    }

    pub fn set_kernel(&mut self, kernel: SharedKernel) {
        self.kernel = Some(kernel);
    }

    /// Shared handle to the kernel, if one is set
    pub fn kernel(&self) -> Option<SharedKernel> {
        self.kernel.as_ref().map(Arc::clone)
    }

    pub fn set_batch_computation_enabled(&mut self, enable: bool) {
        self.config.use_batch_computation = enable;
    }

    pub fn batch_computation_enabled(&self) -> bool {
        self.config.use_batch_computation
    }

    pub fn set_linadd_enabled(&mut self, enable: bool) {
        self.config.use_linadd = enable;
    }

    pub fn linadd_enabled(&self) -> bool {
        self.config.use_linadd
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Set support vectors as left-hand side indices with their weights
    pub fn set_support_vectors(&mut self, indices: Vec<usize>, alphas: Vec<f64>) -> Result<()> {
        if indices.len() != alphas.len() {
            return Err(KernelError::InvalidParameter(format!(
                "{} support vectors but {} alphas",
                indices.len(),
                alphas.len()
            )));
        }
        self.support_vectors = indices;
        self.alphas = alphas;
        Ok(())
    }

    pub fn support_vectors(&self) -> &[usize] {
        &self.support_vectors
    }

    pub fn alphas(&self) -> &[f64] {
        &self.alphas
    }

    pub fn num_support_vectors(&self) -> usize {
        self.support_vectors.len()
    }

    pub fn set_bias(&mut self, bias: f64) {
        self.bias = bias;
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    /// Evaluate the machine on every right-hand side vector of the kernel
    ///
    /// `output` is reused as the result buffer when given.
    pub fn classify(&self, output: Option<Vec<Prediction>>) -> Result<Vec<Prediction>> {
        let handle = self.kernel.as_ref().ok_or(KernelError::NoKernel)?;
        let kernel = handle.read().unwrap_or_else(PoisonError::into_inner);
        if !kernel.is_bound() {
            return Err(KernelError::NotBound);
        }

        let num_rows = kernel.num_rows();
        if let Some(&sv) = self.support_vectors.iter().find(|&&sv| sv >= num_rows) {
            return Err(KernelError::InvalidParameter(format!(
                "support vector {sv} out of range for {num_rows} lhs vectors"
            )));
        }

        let mut output = output.unwrap_or_default();
        output.clear();
        output.reserve(kernel.num_cols());

        if self.config.use_batch_computation {
            self.classify_batch(&*kernel, &mut output);
        } else {
            if self.config.use_linadd {
                warn!(
                    "{} kernel does not support linadd, using pairwise evaluation",
                    kernel.name()
                );
            }
            self.classify_pairwise(&*kernel, &mut output);
        }

        Ok(output)
    }

    fn classify_batch(&self, kernel: &dyn Kernel, output: &mut Vec<Prediction>) {
        let matrix = kernel.kernel_matrix(None);
        debug!(
            "batch evaluation over {}x{} kernel matrix",
            matrix.rows, matrix.cols
        );

        let mut sums = vec![0.0; matrix.cols];
        for (&sv, &alpha) in self.support_vectors.iter().zip(&self.alphas) {
            for (sum, &k) in sums.iter_mut().zip(matrix.row(sv)) {
                *sum += alpha * k;
            }
        }
        output.extend(
            sums.into_iter()
                .map(|sum| Prediction::from_decision(sum + self.bias)),
        );
    }

    fn classify_pairwise(&self, kernel: &dyn Kernel, output: &mut Vec<Prediction>) {
        let mut cache =
            KernelCache::with_memory_limit(self.config.cache_size, kernel.is_symmetric());

        for j in 0..kernel.num_cols() {
            let sum: f64 = self
                .support_vectors
                .iter()
                .zip(&self.alphas)
                .map(|(&sv, &alpha)| alpha * cache.get_or_insert_with(sv, j, || kernel.compute(sv, j)))
                .sum();
            output.push(Prediction::from_decision(sum + self.bias));
        }

        let stats = cache.stats();
        debug!(
            "pairwise evaluation done, {} entries cached (symmetric={}), hit rate {:.2}%",
            stats.size,
            cache.is_symmetric(),
            cache.hit_rate() * 100.0
        );
    }
}
