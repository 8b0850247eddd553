//! Kernel matrix computation for kernel machines
//!
//! A kernel is bound to a pair of feature collections and answers K(i, j) for
//! any left index `i` and right index `j`, either entry by entry or as a full
//! matrix. Three kernels are provided: a custom kernel over a precomputed
//! (optionally triangle-packed) matrix, a sparse Gaussian kernel with cached
//! norms, and the simple locality-improved string kernel.

pub mod cache;
pub mod core;
pub mod features;
pub mod kernel;
pub mod machine;
pub mod persistence;

// Re-export main types for convenience
pub use crate::cache::{CacheStats, KernelCache};
pub use crate::core::traits::*;
pub use crate::core::types::*;
pub use crate::core::{KernelError, Result};
pub use crate::features::{DummyFeatures, SparseFeatures, StringFeatures};
pub use crate::kernel::{
    AnyKernel, CustomKernel, Kernel, KernelBinding, KernelParams,
    SimpleLocalityImprovedStringKernel, SparseGaussianKernel,
};
pub use crate::machine::{share, KernelMachine, MachineConfig, SharedKernel};

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
