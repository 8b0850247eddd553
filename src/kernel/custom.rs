//! Custom (precomputed) kernel
//!
//! Wraps an externally computed kernel matrix so it can be consumed through
//! the [`Kernel`] interface. Symmetric matrices may be stored as a packed
//! upper triangle (including the diagonal), which halves memory at the cost
//! of one compare per lookup.

use crate::core::{
    FeatureClass, FeatureType, Features, KernelError, KernelMatrix, KernelType, Result,
};
use crate::features::DummyFeatures;
use crate::kernel::traits::{matrix_buffer, Kernel, KernelBinding};
use crate::persistence::{read_init, write_init};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::io::{Read, Write};
use std::sync::Arc;

/// Position of (`row`, `col`) in a packed upper triangle of a `cols x cols` matrix
///
/// Entries are packed row by row starting at the diagonal. Positions below the
/// diagonal map to their mirror image.
pub fn triangle_index(row: usize, col: usize, cols: usize) -> usize {
    let (row, col) = if row <= col { (row, col) } else { (col, row) };
    row * cols - row * (row + 1) / 2 + col
}

/// Side length `n` with `n * (n + 1) / 2 == len`, if one exists
pub fn triangle_side(len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let n = (-0.5 + (0.25 + 2.0 * len as f64).sqrt()).floor() as usize;
    // Guard against rounding in the square root on either side
    [n.saturating_sub(1), n, n + 1]
        .into_iter()
        .find(|&c| c > 0 && c * (c + 1) / 2 == len)
}

/// Kernel answering lookups from a stored matrix
#[derive(Debug, Default)]
pub struct CustomKernel {
    kmatrix: Option<Vec<f64>>,
    num_rows: usize,
    num_cols: usize,
    upper_diagonal: bool,
    binding: Option<KernelBinding>,
}

#[derive(Serialize, Deserialize)]
struct CustomInitData<'a> {
    rows: usize,
    cols: usize,
    upper_diagonal: bool,
    matrix: Cow<'a, [f64]>,
}

impl CustomKernel {
    /// Create an empty custom kernel; populate it with one of the setters
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a custom kernel from a full row-major matrix
    pub fn from_full(km: &[f64], rows: usize, cols: usize) -> Result<Self> {
        let mut kernel = Self::new();
        kernel.set_full_kernel_matrix_from_full(km, rows, cols)?;
        Ok(kernel)
    }

    /// Set the kernel matrix from a packed upper triangle
    ///
    /// `km.len()` must equal `cols * (cols + 1) / 2` for some `cols`.
    pub fn set_triangle_kernel_matrix_from_triangle(&mut self, km: &[f64]) -> Result<()> {
        let Some(cols) = triangle_side(km.len()) else {
            warn!(
                "km should contain an upper triangle matrix with len=cols*(cols+1)/2 elements, got {}",
                km.len()
            );
            return Err(KernelError::Shape(format!(
                "length {} is not of the form n*(n+1)/2",
                km.len()
            )));
        };

        self.store(km.to_vec(), cols, cols, true);
        Ok(())
    }

    /// Set the kernel matrix from the upper triangle of a full square matrix
    pub fn set_triangle_kernel_matrix_from_full(
        &mut self,
        km: &[f64],
        rows: usize,
        cols: usize,
    ) -> Result<()> {
        if rows != cols {
            return Err(KernelError::Shape(format!(
                "triangle storage requires a square matrix, got {rows}x{cols}"
            )));
        }
        check_full_shape(km, rows, cols)?;

        let mut packed = Vec::with_capacity(cols * (cols + 1) / 2);
        for row in 0..rows {
            packed.extend_from_slice(&km[row * cols + row..(row + 1) * cols]);
        }

        self.store(packed, rows, cols, true);
        Ok(())
    }

    /// Set the kernel matrix from a full row-major matrix, stored verbatim
    pub fn set_full_kernel_matrix_from_full(
        &mut self,
        km: &[f64],
        rows: usize,
        cols: usize,
    ) -> Result<()> {
        check_full_shape(km, rows, cols)?;
        self.store(km.to_vec(), rows, cols, false);
        Ok(())
    }

    /// Whether the matrix is stored as a packed upper triangle
    pub fn is_upper_diagonal(&self) -> bool {
        self.upper_diagonal
    }

    /// Stored matrix dimensions
    pub fn matrix_dims(&self) -> (usize, usize) {
        (self.num_rows, self.num_cols)
    }

    /// Number of stored values
    pub fn storage_len(&self) -> usize {
        self.kmatrix.as_ref().map_or(0, Vec::len)
    }

    fn store(&mut self, kmatrix: Vec<f64>, rows: usize, cols: usize, upper_diagonal: bool) {
        self.cleanup();
        debug!("using custom kernel of size {rows}x{cols} (upper_diagonal={upper_diagonal})");

        self.kmatrix = Some(kmatrix);
        self.num_rows = rows;
        self.num_cols = cols;
        self.upper_diagonal = upper_diagonal;
        self.binding = Some(KernelBinding::new(
            Arc::new(DummyFeatures::new(rows)),
            Arc::new(DummyFeatures::new(cols)),
        ));
    }

    #[inline]
    fn lookup(&self, kmatrix: &[f64], row: usize, col: usize) -> f64 {
        if self.upper_diagonal {
            kmatrix[triangle_index(row, col, self.num_cols)]
        } else {
            kmatrix[row * self.num_cols + col]
        }
    }
}

fn check_full_shape(km: &[f64], rows: usize, cols: usize) -> Result<()> {
    if rows == 0 || cols == 0 {
        return Err(KernelError::Shape(format!(
            "matrix must not be empty, got {rows}x{cols}"
        )));
    }
    if km.len() != rows * cols {
        return Err(KernelError::Shape(format!(
            "{rows}x{cols} matrix needs {} values, got {}",
            rows * cols,
            km.len()
        )));
    }
    Ok(())
}

impl Kernel for CustomKernel {
    fn init(&mut self, lhs: Arc<dyn Features>, rhs: Arc<dyn Features>) -> Result<()> {
        // The stored matrix is this kernel's data, only the binding is replaced
        self.binding = None;

        if self.kmatrix.is_none() {
            return Err(KernelError::Binding(
                "custom kernel has no matrix to bind".to_string(),
            ));
        }

        let binding = KernelBinding::checked(
            lhs,
            rhs,
            self.feature_type(),
            self.feature_class(),
            self.name(),
        )?;
        debug!(
            "num_vec_lhs: {} vs num_rows {}",
            binding.num_rows(),
            self.num_rows
        );
        debug!(
            "num_vec_rhs: {} vs num_cols {}",
            binding.num_cols(),
            self.num_cols
        );

        if binding.num_rows() != self.num_rows {
            return Err(KernelError::DimensionMismatch {
                expected: self.num_rows,
                actual: binding.num_rows(),
            });
        }
        if binding.num_cols() != self.num_cols {
            return Err(KernelError::DimensionMismatch {
                expected: self.num_cols,
                actual: binding.num_cols(),
            });
        }

        self.binding = Some(binding);
        Ok(())
    }

    fn cleanup(&mut self) {
        self.kmatrix = None;
        self.upper_diagonal = false;
        self.num_rows = 0;
        self.num_cols = 0;
        self.binding = None;
    }

    fn binding(&self) -> Option<&KernelBinding> {
        self.binding.as_ref()
    }

    fn compute(&self, row: usize, col: usize) -> f64 {
        assert!(self.binding.is_some(), "Custom kernel is not bound");
        assert!(
            row < self.num_rows,
            "row {row} out of bounds ({})",
            self.num_rows
        );
        assert!(
            col < self.num_cols,
            "col {col} out of bounds ({})",
            self.num_cols
        );
        let kmatrix = self
            .kmatrix
            .as_deref()
            .unwrap_or_else(|| panic!("Custom kernel has no matrix"));

        self.lookup(kmatrix, row, col)
    }

    /// Expands the stored matrix without going through `compute`
    fn kernel_matrix(&self, target: Option<Vec<f64>>) -> KernelMatrix {
        assert!(self.binding.is_some(), "Custom kernel is not bound");
        let kmatrix = self
            .kmatrix
            .as_deref()
            .unwrap_or_else(|| panic!("Custom kernel has no matrix"));
        let (rows, cols) = (self.num_rows, self.num_cols);
        let mut data = matrix_buffer(target, rows * cols);

        if self.upper_diagonal {
            for row in 0..rows {
                for col in 0..cols {
                    data.push(kmatrix[triangle_index(row, col, cols)]);
                }
            }
        } else {
            data.extend_from_slice(kmatrix);
        }

        KernelMatrix { rows, cols, data }
    }

    fn load_init(&mut self, src: &mut dyn Read) -> Result<()> {
        let data: CustomInitData<'static> = read_init(src, self.name())?;

        let expected = if data.upper_diagonal {
            if data.rows != data.cols {
                return Err(KernelError::Shape(format!(
                    "packed matrix must be square, got {}x{}",
                    data.rows, data.cols
                )));
            }
            data.cols * (data.cols + 1) / 2
        } else {
            data.rows * data.cols
        };
        if data.rows == 0 || data.matrix.len() != expected {
            return Err(KernelError::Shape(format!(
                "stored matrix has {} values, expected {expected}",
                data.matrix.len()
            )));
        }

        self.store(
            data.matrix.into_owned(),
            data.rows,
            data.cols,
            data.upper_diagonal,
        );
        Ok(())
    }

    fn save_init(&self, dest: &mut dyn Write) -> Result<()> {
        let matrix = self.kmatrix.as_deref().ok_or_else(|| {
            KernelError::InvalidParameter("custom kernel has no matrix to save".to_string())
        })?;
        let data = CustomInitData {
            rows: self.num_rows,
            cols: self.num_cols,
            upper_diagonal: self.upper_diagonal,
            matrix: Cow::Borrowed(matrix),
        };
        write_init(dest, self.name(), &data)
    }

    fn kernel_type(&self) -> KernelType {
        KernelType::Custom
    }

    fn feature_type(&self) -> FeatureType {
        FeatureType::Any
    }

    fn feature_class(&self) -> FeatureClass {
        FeatureClass::Any
    }

    fn name(&self) -> &'static str {
        "Custom"
    }

    /// Only packed storage guarantees K(i, j) == K(j, i); a full matrix is
    /// stored verbatim and may be asymmetric even on an aliased binding
    fn is_symmetric(&self) -> bool {
        self.is_bound() && self.upper_diagonal
    }
}
