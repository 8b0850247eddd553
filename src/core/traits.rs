//! Core traits for kernel computation

use crate::core::{FeatureClass, FeatureType, SparseVector};

/// Feature collection abstraction a kernel binds to
///
/// Collections are shared between kernels as `Arc<dyn Features>`; a kernel
/// only reads them.
pub trait Features: Send + Sync {
    /// Number of feature vectors in the collection
    fn num_vectors(&self) -> usize;

    /// Element type of the stored vectors
    fn feature_type(&self) -> FeatureType;

    /// Storage layout of the stored vectors
    fn feature_class(&self) -> FeatureClass;

    /// String vector at `index`, if this collection stores strings
    fn string_vector(&self, index: usize) -> Option<&[u8]> {
        let _ = index;
        None
    }

    /// Sparse vector at `index`, if this collection stores sparse vectors
    fn sparse_vector(&self, index: usize) -> Option<&SparseVector> {
        let _ = index;
        None
    }

    /// Check if the collection is empty
    fn is_empty(&self) -> bool {
        self.num_vectors() == 0
    }
}
