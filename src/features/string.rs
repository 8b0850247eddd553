//! Byte string feature vectors

use crate::core::{FeatureClass, FeatureType, Features};

/// Collection of byte strings (e.g. DNA sequences)
#[derive(Debug, Clone, Default)]
pub struct StringFeatures {
    strings: Vec<Vec<u8>>,
}

impl StringFeatures {
    pub fn new(strings: Vec<Vec<u8>>) -> Self {
        Self { strings }
    }

    /// Build from string slices
    pub fn from_strs<S: AsRef<str>>(strings: &[S]) -> Self {
        Self::new(
            strings
                .iter()
                .map(|s| s.as_ref().as_bytes().to_vec())
                .collect(),
        )
    }
}

impl Features for StringFeatures {
    fn num_vectors(&self) -> usize {
        self.strings.len()
    }

    fn feature_type(&self) -> FeatureType {
        FeatureType::Char
    }

    fn feature_class(&self) -> FeatureClass {
        FeatureClass::String
    }

    fn string_vector(&self, index: usize) -> Option<&[u8]> {
        self.strings.get(index).map(Vec::as_slice)
    }
}
