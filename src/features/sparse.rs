//! Sparse real-valued feature vectors

use crate::core::{FeatureClass, FeatureType, Features, SparseVector};

/// Collection of sparse real vectors
#[derive(Debug, Clone, Default)]
pub struct SparseFeatures {
    vectors: Vec<SparseVector>,
}

impl SparseFeatures {
    pub fn new(vectors: Vec<SparseVector>) -> Self {
        Self { vectors }
    }

    /// Build from `(dimension, value)` pair lists, one per vector
    pub fn from_pairs(pairs: &[Vec<(usize, f64)>]) -> Self {
        Self::new(pairs.iter().map(|p| SparseVector::from_pairs(p)).collect())
    }

}

impl Features for SparseFeatures {
    fn num_vectors(&self) -> usize {
        self.vectors.len()
    }

    fn feature_type(&self) -> FeatureType {
        FeatureType::Real
    }

    fn feature_class(&self) -> FeatureClass {
        FeatureClass::Sparse
    }

    fn sparse_vector(&self, index: usize) -> Option<&SparseVector> {
        self.vectors.get(index)
    }
}
