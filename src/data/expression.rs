//! Expression matrix for microarray intensities

use ndarray::{Array2, ArrayView2, Axis};

use crate::error::{DgeError, Result};

/// Probe/feature by sample matrix of intensities.
/// Missing values are stored as NaN.
#[derive(Debug, Clone)]
pub struct ExpressionMatrix {
    /// Values (features x samples)
    values: Array2<f64>,
    /// Feature (probe) identifiers
    feature_ids: Vec<String>,
    /// Sample identifiers (GSM accessions)
    sample_ids: Vec<String>,
}

impl ExpressionMatrix {
    pub fn new(
        values: Array2<f64>,
        feature_ids: Vec<String>,
        sample_ids: Vec<String>,
    ) -> Result<Self> {
        let (n_features, n_samples) = values.dim();

        if feature_ids.len() != n_features {
            return Err(DgeError::DimensionMismatch {
                expected: format!("{} feature IDs", n_features),
                got: format!("{} feature IDs", feature_ids.len()),
            });
        }
        if sample_ids.len() != n_samples {
            return Err(DgeError::DimensionMismatch {
                expected: format!("{} sample IDs", n_samples),
                got: format!("{} sample IDs", sample_ids.len()),
            });
        }
        if values.iter().any(|v| v.is_infinite()) {
            return Err(DgeError::InvalidExpressionMatrix {
                reason: "Expression values must be finite or missing".to_string(),
            });
        }

        Ok(Self {
            values,
            feature_ids,
            sample_ids,
        })
    }

    pub fn n_features(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.values.ncols()
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// All finite values, in row-major order
    pub fn finite_values(&self) -> Vec<f64> {
        self.values.iter().copied().filter(|v| v.is_finite()).collect()
    }

    /// Number of missing values
    pub fn n_missing(&self) -> usize {
        self.values.iter().filter(|v| v.is_nan()).count()
    }

    /// Apply `f` to every value in place; infinities produced by `f` become NaN
    pub fn map_inplace<F: Fn(f64) -> f64>(&mut self, f: F) {
        self.values.mapv_inplace(|v| {
            let out = f(v);
            if out.is_finite() {
                out
            } else {
                f64::NAN
            }
        });
    }

    /// Replace the values with a matrix of the same shape
    pub fn set_values(&mut self, values: Array2<f64>) -> Result<()> {
        if values.dim() != self.values.dim() {
            return Err(DgeError::DimensionMismatch {
                expected: format!("{:?}", self.values.dim()),
                got: format!("{:?}", values.dim()),
            });
        }
        self.values = values;
        Ok(())
    }

    /// Subset to specific samples
    pub fn subset_samples(&self, sample_indices: &[usize]) -> Result<Self> {
        let values = self.values.select(Axis(1), sample_indices);
        let sample_ids = sample_indices
            .iter()
            .map(|&i| self.sample_ids[i].clone())
            .collect();
        Self::new(values, self.feature_ids.clone(), sample_ids)
    }
}
