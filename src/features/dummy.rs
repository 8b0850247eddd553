//! Features that carry only a vector count

use crate::core::{FeatureClass, FeatureType, Features};

/// Placeholder collection for kernels that read no vector data
///
/// The custom kernel binds these so bound checks have a row/column count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DummyFeatures {
    num_vectors: usize,
}

impl DummyFeatures {
    pub fn new(num_vectors: usize) -> Self {
        Self { num_vectors }
    }
}

impl Features for DummyFeatures {
    fn num_vectors(&self) -> usize {
        self.num_vectors
    }

    fn feature_type(&self) -> FeatureType {
        FeatureType::Any
    }

    fn feature_class(&self) -> FeatureClass {
        FeatureClass::Opaque
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dummy_features() {
        let f = DummyFeatures::new(4);
        assert_eq!(f.num_vectors(), 4);
        assert_eq!(f.feature_class(), FeatureClass::Opaque);
        assert!(f.string_vector(0).is_none());
        assert!(f.sparse_vector(0).is_none());
        assert!(DummyFeatures::new(0).is_empty());
    }
}
