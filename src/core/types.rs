//! Core type definitions shared by kernels, features and machines

use serde::{Deserialize, Serialize};

/// Identity tag of a kernel variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KernelType {
    Custom,
    SparseGaussian,
    SimpleLocalityImproved,
}

/// Element type a kernel consumes or a feature collection stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureType {
    /// Accepts (or provides) anything
    Any,
    /// Real valued (`f64`) elements
    Real,
    /// Byte characters
    Char,
}

/// Storage layout a kernel consumes or a feature collection uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureClass {
    Any,
    Sparse,
    String,
    /// Carries only a vector count, no vector data
    Opaque,
}

impl FeatureType {
    /// Whether features of type `provided` satisfy a kernel requiring `self`
    pub fn accepts(self, provided: FeatureType) -> bool {
        self == FeatureType::Any || self == provided
    }
}

impl FeatureClass {
    /// Whether features of class `provided` satisfy a kernel requiring `self`
    pub fn accepts(self, provided: FeatureClass) -> bool {
        self == FeatureClass::Any || self == provided
    }
}

/// Output of a kernel machine for one right-hand side vector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Predicted class label (+1 or -1)
    pub label: f64,
    /// Raw decision function value
    pub decision_value: f64,
}

impl Prediction {
    /// Create a new prediction
    pub fn new(label: f64, decision_value: f64) -> Self {
        Self {
            label,
            decision_value,
        }
    }

    /// Create a prediction whose label is the sign of the decision value
    pub fn from_decision(decision_value: f64) -> Self {
        let label = if decision_value >= 0.0 { 1.0 } else { -1.0 };
        Self::new(label, decision_value)
    }

}

/// Sparse vector representation with sorted indices
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    /// Sorted indices of non-zero elements
    pub indices: Vec<usize>,
    /// Values corresponding to indices
    pub values: Vec<f64>,
}

impl SparseVector {
    /// Create a new sparse vector, ensuring indices are sorted
    ///
    /// Repeated indices are merged by summing their values, so every index
    /// appears once.
    pub fn new(indices: Vec<usize>, values: Vec<f64>) -> Self {
        assert_eq!(
            indices.len(),
            values.len(),
            "Indices and values must have same length"
        );

        let mut pairs: Vec<_> = indices.into_iter().zip(values).collect();
        pairs.sort_by_key(|&(idx, _)| idx);

        let mut merged = Self {
            indices: Vec::with_capacity(pairs.len()),
            values: Vec::with_capacity(pairs.len()),
        };
        for (idx, value) in pairs {
            if merged.indices.last() == Some(&idx) {
                if let Some(acc) = merged.values.last_mut() {
                    *acc += value;
                }
            } else {
                merged.indices.push(idx);
                merged.values.push(value);
            }
        }
        merged
    }

    /// Create a sparse vector from `(dimension, value)` pairs
    pub fn from_pairs(pairs: &[(usize, f64)]) -> Self {
        let (indices, values) = pairs.iter().copied().unzip();
        Self::new(indices, values)
    }

    /// Get the value at a specific index (0 if not present)
    pub fn get(&self, index: usize) -> f64 {
        match self.indices.binary_search(&index) {
            Ok(pos) => self.values[pos],
            Err(_) => 0.0,
        }
    }

    /// Compute squared L2 norm
    pub fn norm_squared(&self) -> f64 {
        self.values.iter().map(|&v| v * v).sum()
    }

    /// Dot product with another sparse vector via a sorted merge
    pub fn dot(&self, other: &SparseVector) -> f64 {
        let mut result = 0.0;
        let mut i = 0;
        let mut j = 0;

        while i < self.indices.len() && j < other.indices.len() {
            let a = self.indices[i];
            let b = other.indices[j];

            if a == b {
                result += self.values[i] * other.values[j];
                i += 1;
                j += 1;
            } else if a < b {
                i += 1;
            } else {
                j += 1;
            }
        }

        result
    }

    /// Number of non-zero elements
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Check if vector is empty
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Dense row-major kernel matrix
#[derive(Debug, Clone, PartialEq)]
pub struct KernelMatrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl KernelMatrix {
    /// Value at (`row`, `col`)
    ///
    /// # Panics
    /// Panics if the position is outside the matrix
    pub fn get(&self, row: usize, col: usize) -> f64 {
        assert!(
            row < self.rows && col < self.cols,
            "Index ({row}, {col}) out of bounds for {}x{} matrix",
            self.rows,
            self.cols
        );
        self.data[row * self.cols + col]
    }

    /// One row of the matrix
    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Releases the matrix, returning its buffer for reuse
    pub fn into_buffer(self) -> Vec<f64> {
        self.data
    }
}
