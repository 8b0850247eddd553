//! Simple locality-improved string kernel
//!
//! Compares two strings of equal length position by position. Around every
//! position a window of up to `2 * winlen - 1` characters is inspected, the
//! number of matching characters inside it is raised to `inner_degree`, and
//! the windows are summed under a pyramid weighting that favours the middle
//! of the string. The sum is finally raised to `outer_degree`:
//!
//! K(x, y) = (Σₚ w[p] · matches(p)^inner)^outer / length^outer
//!
//! Windows that run past either end of the string are truncated, so
//! position `p` sees `[p - winlen + 1, p + winlen - 1] ∩ [0, length)`.

use crate::core::{
    FeatureClass, FeatureType, Features, KernelError, KernelMatrix, KernelType, Result,
};
use crate::kernel::traits::{matrix_buffer, Kernel, KernelBinding};
use crate::persistence::{read_init, write_init};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// Largest supported inner and outer degree
pub const MAX_DEGREE: u32 = 7;

/// Check hyperparameters before they are applied to a kernel
pub fn validate_parameters(
    length: usize,
    winlen: usize,
    inner_degree: u32,
    outer_degree: u32,
) -> Result<()> {
    if length == 0 || winlen == 0 {
        return Err(KernelError::InvalidParameter(format!(
            "length and winlen must be positive, got {length} and {winlen}"
        )));
    }
    for (which, degree) in [("inner", inner_degree), ("outer", outer_degree)] {
        if !(1..=MAX_DEGREE).contains(&degree) {
            return Err(KernelError::InvalidParameter(format!(
                "{which} degree must lie in 1..={MAX_DEGREE}, got {degree}"
            )));
        }
    }
    Ok(())
}

/// Pyramid weights for strings of `length` characters
///
/// `w[p] = 4 * rank(p) / length / (2 * winlen - 1)^inner_degree` where
/// `rank` climbs from 1 at both ends towards the middle.
pub fn pyramid_weights(length: usize, winlen: usize, inner_degree: u32) -> Vec<f64> {
    let pyral = (2 * winlen - 1) as f64;
    let pyral_pot = pyral.powi(inner_degree as i32);
    let half = length / 2;

    (0..length)
        .map(|p| {
            let rank = if p < half { p + 1 } else { length - p };
            4.0 * rank as f64 / length as f64 / pyral_pot
        })
        .collect()
}

#[derive(Debug)]
pub struct SimpleLocalityImprovedStringKernel {
    length: usize,
    inner_degree: u32,
    outer_degree: u32,
    winlen: usize,
    pyramid_weights: Option<Vec<f64>>,
    binding: Option<KernelBinding>,
    /// Match indicators of the pair being compared, one per position.
    /// Only `compute` uses it; `kernel_matrix` brings its own.
    stage1: Option<Mutex<Vec<bool>>>,
}

#[derive(Serialize, Deserialize)]
struct LocalityImprovedInitData {
    length: usize,
    inner_degree: u32,
    outer_degree: u32,
    winlen: usize,
}

impl SimpleLocalityImprovedStringKernel {
    /// Create a kernel for strings of exactly `length` characters
    ///
    /// The window half-width defaults to `max(1, length / 4)`.
    ///
    /// # Panics
    /// Panics if `length` is zero or a degree lies outside `1..=MAX_DEGREE`
    pub fn new(length: usize, inner_degree: u32, outer_degree: u32) -> Self {
        Self::with_window(length, (length / 4).max(1), inner_degree, outer_degree)
    }

    /// Create a kernel with an explicit window half-width
    ///
    /// # Panics
    /// Panics if `length` or `winlen` is zero, or a degree lies outside
    /// `1..=MAX_DEGREE`
    pub fn with_window(length: usize, winlen: usize, inner_degree: u32, outer_degree: u32) -> Self {
        assert!(length > 0, "String length must be positive");
        assert!(winlen > 0, "Window half-width must be positive");
        assert!(
            (1..=MAX_DEGREE).contains(&inner_degree),
            "Inner degree must lie in 1..={MAX_DEGREE}, got: {inner_degree}"
        );
        assert!(
            (1..=MAX_DEGREE).contains(&outer_degree),
            "Outer degree must lie in 1..={MAX_DEGREE}, got: {outer_degree}"
        );
        Self {
            length,
            inner_degree,
            outer_degree,
            winlen,
            pyramid_weights: Some(pyramid_weights(length, winlen, inner_degree)),
            binding: None,
            stage1: None,
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn inner_degree(&self) -> u32 {
        self.inner_degree
    }

    pub fn outer_degree(&self) -> u32 {
        self.outer_degree
    }

    pub fn winlen(&self) -> usize {
        self.winlen
    }

    /// Current pyramid weight table, if not released by `cleanup`
    pub fn weights(&self) -> Option<&[f64]> {
        self.pyramid_weights.as_deref()
    }

    /// Change the expected string length; unbinds the kernel
    ///
    /// # Panics
    /// Panics if `length` is zero
    pub fn set_length(&mut self, length: usize) {
        assert!(length > 0, "String length must be positive");
        self.cleanup();
        self.length = length;
        self.pyramid_weights = Some(pyramid_weights(length, self.winlen, self.inner_degree));
    }

    fn ensure_weights(&mut self) {
        let stale = self
            .pyramid_weights
            .as_ref()
            .map_or(true, |w| w.len() != self.length);
        if stale {
            info!(
                "initializing pyramid weights: length={} winlen={}",
                self.length, self.winlen
            );
            self.pyramid_weights = Some(pyramid_weights(
                self.length,
                self.winlen,
                self.inner_degree,
            ));
        }
    }

    fn check_lengths(&self, features: &dyn Features, side: &str) -> Result<()> {
        for i in 0..features.num_vectors() {
            let s = features.string_vector(i).ok_or_else(|| {
                KernelError::Binding(format!("{side} feature vector {i} is not a string"))
            })?;
            if s.len() != self.length {
                return Err(KernelError::Binding(format!(
                    "{side} string {i} has length {}, kernel expects {}",
                    s.len(),
                    self.length
                )));
            }
        }
        Ok(())
    }

    fn strings<'a>(
        &self,
        binding: &'a KernelBinding,
        idx_a: usize,
        idx_b: usize,
    ) -> (&'a [u8], &'a [u8]) {
        let (Some(avec), Some(bvec)) = (
            binding.lhs().string_vector(idx_a),
            binding.rhs().string_vector(idx_b),
        ) else {
            panic!("bound features lost string vectors ({idx_a}, {idx_b})");
        };
        assert!(
            avec.len() == self.length && bvec.len() == self.length,
            "can only deal with strings of length {}, got {} and {}",
            self.length,
            avec.len(),
            bvec.len()
        );
        (avec, bvec)
    }

    fn normalizer(&self) -> f64 {
        (self.length as f64).powi(self.outer_degree as i32)
    }

    /// Pyramid-weighted windowed match score of two `length` strings
    fn dot_pyr(&self, x1: &[u8], x2: &[u8], stage1: &mut [bool], weights: &[f64]) -> f64 {
        let n = self.length;
        let reach = self.winlen - 1;

        for (m, (a, b)) in stage1.iter_mut().zip(x1.iter().zip(x2)) {
            *m = a == b;
        }

        let mut conv = stage1[..self.winlen.min(n)].iter().filter(|&&m| m).count();
        let mut sum = 0.0;

        for p in 0..n {
            if p > 0 {
                if p + reach < n && stage1[p + reach] {
                    conv += 1;
                }
                if p > reach && stage1[p - reach - 1] {
                    conv -= 1;
                }
            }
            sum += (conv as f64).powi(self.inner_degree as i32) * weights[p];
        }

        sum.powi(self.outer_degree as i32)
    }
}

impl Kernel for SimpleLocalityImprovedStringKernel {
    fn init(&mut self, lhs: Arc<dyn Features>, rhs: Arc<dyn Features>) -> Result<()> {
        self.binding = None;
        self.stage1 = None;

        let binding = KernelBinding::checked(
            lhs,
            rhs,
            self.feature_type(),
            self.feature_class(),
            self.name(),
        )?;
        self.check_lengths(binding.lhs(), "left")?;
        self.check_lengths(binding.rhs(), "right")?;

        self.ensure_weights();
        self.stage1 = Some(Mutex::new(vec![false; self.length]));
        debug!(
            "bound {} kernel to {}x{} strings of length {}",
            self.name(),
            binding.num_rows(),
            binding.num_cols(),
            self.length
        );
        self.binding = Some(binding);
        Ok(())
    }

    fn cleanup(&mut self) {
        self.stage1 = None;
        self.pyramid_weights = None;
        self.binding = None;
    }

    fn binding(&self) -> Option<&KernelBinding> {
        self.binding.as_ref()
    }

    fn compute(&self, idx_a: usize, idx_b: usize) -> f64 {
        let (Some(binding), Some(weights), Some(stage1)) =
            (&self.binding, &self.pyramid_weights, &self.stage1)
        else {
            panic!("SimpleLocalityImproved kernel is not bound");
        };
        assert!(
            idx_a < binding.num_rows(),
            "row {idx_a} out of bounds ({})",
            binding.num_rows()
        );
        assert!(
            idx_b < binding.num_cols(),
            "col {idx_b} out of bounds ({})",
            binding.num_cols()
        );

        let (avec, bvec) = self.strings(binding, idx_a, idx_b);

        // Concurrent lookups queue on the shared scratch buffer
        let mut stage1 = stage1.lock().unwrap_or_else(PoisonError::into_inner);
        self.dot_pyr(avec, bvec, &mut stage1, weights) / self.normalizer()
    }

    /// Evaluates every pair with a scratch buffer of its own
    fn kernel_matrix(&self, target: Option<Vec<f64>>) -> KernelMatrix {
        let (Some(binding), Some(weights)) = (&self.binding, &self.pyramid_weights) else {
            panic!("SimpleLocalityImproved kernel is not bound");
        };
        let (rows, cols) = (binding.num_rows(), binding.num_cols());
        let mut data = matrix_buffer(target, rows * cols);
        let mut stage1 = vec![false; self.length];
        let normalizer = self.normalizer();

        for i in 0..rows {
            for j in 0..cols {
                let (avec, bvec) = self.strings(binding, i, j);
                data.push(self.dot_pyr(avec, bvec, &mut stage1, weights) / normalizer);
            }
        }

        KernelMatrix { rows, cols, data }
    }

    fn load_init(&mut self, src: &mut dyn Read) -> Result<()> {
        let data: LocalityImprovedInitData = read_init(src, self.name())?;
        validate_parameters(
            data.length,
            data.winlen,
            data.inner_degree,
            data.outer_degree,
        )?;

        if data.length != self.length {
            self.cleanup();
        }
        self.length = data.length;
        self.inner_degree = data.inner_degree;
        self.outer_degree = data.outer_degree;
        self.winlen = data.winlen;
        self.pyramid_weights = Some(pyramid_weights(
            self.length,
            self.winlen,
            self.inner_degree,
        ));
        Ok(())
    }

    fn save_init(&self, dest: &mut dyn Write) -> Result<()> {
        let data = LocalityImprovedInitData {
            length: self.length,
            inner_degree: self.inner_degree,
            outer_degree: self.outer_degree,
            winlen: self.winlen,
        };
        write_init(dest, self.name(), &data)
    }

    fn kernel_type(&self) -> KernelType {
        KernelType::SimpleLocalityImproved
    }

    fn feature_type(&self) -> FeatureType {
        FeatureType::Char
    }

    fn feature_class(&self) -> FeatureClass {
        FeatureClass::String
    }

    fn name(&self) -> &'static str {
        "SimpleLocalityImproved"
    }

    fn is_symmetric(&self) -> bool {
        self.binding.as_ref().is_some_and(KernelBinding::is_aliased)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{SparseFeatures, StringFeatures};
    use approx::assert_relative_eq;
    use std::io::Cursor;

    fn bound(
        kernel: SimpleLocalityImprovedStringKernel,
        lhs: &[&str],
        rhs: &[&str],
    ) -> SimpleLocalityImprovedStringKernel {
        let mut kernel = kernel;
        kernel
            .init(
                Arc::new(StringFeatures::from_strs(lhs)),
                Arc::new(StringFeatures::from_strs(rhs)),
            )
            .unwrap();
        kernel
    }

    fn reversed(s: &str) -> String {
        s.chars().rev().collect()
    }

    #[test]
    fn test_pyramid_weights_shape() {
        // length 5, winlen 1, degree 1: ranks 1 2 3 2 1
        let w = pyramid_weights(5, 1, 1);
        let expected: Vec<f64> = [1.0, 2.0, 3.0, 2.0, 1.0].iter().map(|r| 4.0 * r / 5.0).collect();
        assert_eq!(w, expected);

        for (length, winlen, degree) in [(4, 1, 1), (9, 2, 3), (16, 4, 2)] {
            let w = pyramid_weights(length, winlen, degree);
            for p in 0..length {
                assert_eq!(w[p], w[length - 1 - p]);
            }
        }
    }

    #[test]
    fn test_pyramid_weights_normalized_by_window() {
        let w1 = pyramid_weights(8, 2, 1);
        let w2 = pyramid_weights(8, 2, 2);
        assert_relative_eq!(w1[0], 0.5 / 3.0, epsilon = 1e-15);
        assert_relative_eq!(w2[0], 0.5 / 9.0, epsilon = 1e-15);
    }

    #[test]
    fn test_identical_beats_mismatch() {
        let kernel = bound(
            SimpleLocalityImprovedStringKernel::new(4, 1, 1),
            &["ACGT", "ACGA"],
            &["ACGT"],
        );

        let same = kernel.compute(0, 0);
        let mismatch = kernel.compute(1, 0);
        assert_relative_eq!(same, 1.5, epsilon = 1e-12);
        assert_relative_eq!(mismatch, 1.25, epsilon = 1e-12);
        assert!(same > mismatch);
    }

    #[test]
    fn test_boundary_windows_are_truncated() {
        // length 5, winlen 2: windows [0,1] [0,2] [1,3] [2,4] [3,4]
        let kernel = bound(
            SimpleLocalityImprovedStringKernel::with_window(5, 2, 1, 1),
            &["AAAAA", "CAAAA", "AAAAC"],
            &["AAAAA"],
        );

        // Match counts 2 3 3 3 2, weights 4/15 * (1 2 3 2 1)
        assert_relative_eq!(kernel.compute(0, 0), 4.0 / 3.0, epsilon = 1e-12);

        let front = kernel.compute(1, 0);
        let back = kernel.compute(2, 0);
        assert_relative_eq!(front, 88.0 / 75.0, epsilon = 1e-12);
        assert_relative_eq!(front, back, epsilon = 1e-12);
    }

    #[test]
    fn test_window_wider_than_string() {
        // length 3, winlen 5: every window is the whole string, weights 4/27 * (1 2 1)
        let kernel = bound(
            SimpleLocalityImprovedStringKernel::with_window(3, 5, 1, 1),
            &["ACG", "ACT", "TTT"],
            &["ACG"],
        );

        assert_relative_eq!(kernel.compute(0, 0), 16.0 / 27.0, epsilon = 1e-12);
        assert_relative_eq!(kernel.compute(1, 0), 32.0 / 81.0, epsilon = 1e-12);
        assert_eq!(kernel.compute(2, 0), 0.0);
    }

    #[test]
    fn test_reversal_invariance() {
        let pairs = [("ACGTTGCA", "ACGTTGCA"), ("ACGTACGT", "AGGTACCT"), ("TTACGGAT", "CTACGTAA")];

        for (a, b) in pairs {
            let (ra, rb) = (reversed(a), reversed(b));
            let kernel = bound(
                SimpleLocalityImprovedStringKernel::with_window(8, 3, 2, 2),
                &[a, ra.as_str()],
                &[b, rb.as_str()],
            );
            assert_relative_eq!(kernel.compute(0, 0), kernel.compute(1, 1), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_symmetric_in_arguments() {
        let strings = ["ACGTAC", "ACCTAG", "TGCATG"];
        let features: Arc<dyn Features> = Arc::new(StringFeatures::from_strs(&strings));
        let mut kernel = SimpleLocalityImprovedStringKernel::with_window(6, 2, 3, 1);
        kernel.init(Arc::clone(&features), features).unwrap();

        for i in 0..3 {
            for j in 0..3 {
                assert_eq!(kernel.compute(i, j), kernel.compute(j, i));
            }
        }
    }

    #[test]
    fn test_outer_degree_powers_score() {
        let lhs = ["ACGTACGT"];
        let rhs = ["ACCTACGA"];
        let k1 = bound(SimpleLocalityImprovedStringKernel::with_window(8, 2, 2, 1), &lhs, &rhs);
        let k3 = bound(SimpleLocalityImprovedStringKernel::with_window(8, 2, 2, 3), &lhs, &rhs);

        assert_relative_eq!(k3.compute(0, 0), k1.compute(0, 0).powi(3), epsilon = 1e-12);
    }

    #[test]
    fn test_complete_mismatch_scores_zero() {
        let kernel = bound(SimpleLocalityImprovedStringKernel::new(4, 2, 2), &["AAAA"], &["CCCC"]);
        assert_eq!(kernel.compute(0, 0), 0.0);
    }

    #[test]
    fn test_init_rejects_wrong_length() {
        let mut kernel = SimpleLocalityImprovedStringKernel::new(4, 1, 1);
        let result = kernel.init(
            Arc::new(StringFeatures::from_strs(&["ACGT", "ACG"])),
            Arc::new(StringFeatures::from_strs(&["ACGT"])),
        );
        assert!(matches!(result, Err(KernelError::Binding(_))));
        assert!(!kernel.is_bound());
    }

    #[test]
    fn test_init_rejects_sparse_features() {
        let mut kernel = SimpleLocalityImprovedStringKernel::new(4, 1, 1);
        let sparse = Arc::new(SparseFeatures::from_pairs(&[vec![(0, 1.0)]]));
        assert!(kernel.init(sparse, Arc::new(StringFeatures::from_strs(&["ACGT"]))).is_err());
    }

    #[test]
    fn test_cleanup_and_rebind_rederives_weights() {
        let mut kernel = bound(
            SimpleLocalityImprovedStringKernel::new(4, 1, 1),
            &["ACGT"],
            &["ACGT"],
        );
        let before = kernel.compute(0, 0);

        kernel.cleanup();
        assert!(kernel.weights().is_none());
        assert!(!kernel.is_bound());

        kernel
            .init(
                Arc::new(StringFeatures::from_strs(&["ACGT"])),
                Arc::new(StringFeatures::from_strs(&["ACGT"])),
            )
            .unwrap();
        assert_eq!(kernel.weights().map(<[f64]>::len), Some(4));
        assert_eq!(kernel.compute(0, 0), before);
    }

    #[test]
    fn test_set_length_rebuilds_weights() {
        let mut kernel = bound(
            SimpleLocalityImprovedStringKernel::with_window(4, 1, 1, 1),
            &["ACGT"],
            &["ACGT"],
        );
        kernel.set_length(6);
        assert!(!kernel.is_bound());
        assert_eq!(kernel.weights().map(<[f64]>::len), Some(6));

        let kernel = bound(kernel, &["ACGTAC"], &["ACGTAC"]);
        // Ranks 1 2 3 3 2 1, all windows match once
        assert_relative_eq!(kernel.compute(0, 0), 4.0 * 12.0 / 36.0, epsilon = 1e-12);
    }

    #[test]
    #[should_panic(expected = "not bound")]
    fn test_compute_unbound() {
        SimpleLocalityImprovedStringKernel::new(4, 1, 1).compute(0, 0);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_compute_out_of_bounds() {
        bound(SimpleLocalityImprovedStringKernel::new(4, 1, 1), &["ACGT"], &["ACGT"]).compute(1, 0);
    }

    #[test]
    #[should_panic(expected = "String length must be positive")]
    fn test_zero_length() {
        SimpleLocalityImprovedStringKernel::new(0, 1, 1);
    }

    #[test]
    #[should_panic(expected = "Inner degree must lie in 1..=7")]
    fn test_inner_degree_too_large() {
        SimpleLocalityImprovedStringKernel::new(4, 50, 1);
    }

    #[test]
    #[should_panic(expected = "Outer degree must lie in 1..=7")]
    fn test_zero_outer_degree() {
        SimpleLocalityImprovedStringKernel::with_window(4, 1, 1, 0);
    }

    #[test]
    fn test_validate_parameters() {
        assert!(validate_parameters(4, 1, 1, MAX_DEGREE).is_ok());
        let invalid = [(0, 1, 1, 1), (4, 0, 1, 1), (4, 1, 0, 1), (4, 1, 8, 1), (4, 1, 1, 8)];
        for (length, winlen, inner, outer) in invalid {
            assert!(matches!(
                validate_parameters(length, winlen, inner, outer),
                Err(KernelError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn test_kernel_matrix_matches_compute() {
        let strings = ["ACGTAC", "ACCTAG", "TGCATG"];
        let features: Arc<dyn Features> = Arc::new(StringFeatures::from_strs(&strings));
        let mut kernel = SimpleLocalityImprovedStringKernel::with_window(6, 2, 2, 2);
        kernel.init(Arc::clone(&features), features).unwrap();
        assert!(kernel.is_symmetric());

        let m = kernel.kernel_matrix(Some(Vec::with_capacity(9)));
        for i in 0..3 {
            for j in 0..3 {
                assert_eq!(m.get(i, j), kernel.compute(i, j));
            }
        }
    }

    #[test]
    fn test_load_rejects_degree_out_of_range() {
        let mut kernel = bound(
            SimpleLocalityImprovedStringKernel::new(4, 2, 1),
            &["ACGT"],
            &["ACGT"],
        );
        let before = kernel.compute(0, 0);
        let doc = r#"{"format_version": 1, "kernel": "SimpleLocalityImproved", "created_at": "",
            "payload": {"length": 6, "inner_degree": 9, "outer_degree": 1, "winlen": 2}}"#;

        assert!(matches!(
            kernel.load_init(&mut Cursor::new(doc)),
            Err(KernelError::InvalidParameter(_))
        ));
        assert_eq!((kernel.length(), kernel.inner_degree()), (4, 2));
        assert!(kernel.is_bound());
        assert_eq!(kernel.compute(0, 0), before);
    }

    #[test]
    fn test_init_data_round_trip() -> Result<()> {
        let original = bound(
            SimpleLocalityImprovedStringKernel::with_window(6, 2, 3, 2),
            &["ACGTAC", "TTGCAA"],
            &["ACGTTC"],
        );
        let mut buf = Vec::new();
        original.save_init(&mut buf)?;

        let mut restored = SimpleLocalityImprovedStringKernel::new(1, 1, 1);
        restored.load_init(&mut Cursor::new(buf))?;
        assert_eq!(restored.winlen(), 2);
        assert_eq!((restored.inner_degree(), restored.outer_degree()), (3, 2));

        let restored = bound(restored, &["ACGTAC", "TTGCAA"], &["ACGTTC"]);
        for i in 0..2 {
            assert_eq!(restored.compute(i, 0), original.compute(i, 0));
        }
        Ok(())
    }
}
