//! Removal of genes too lowly expressed to be tested

use std::fmt;

use crate::data::DGEList;
use crate::design::{hat_values, DesignMatrix};
use crate::error::{DgeError, Result};
use crate::normalization::cpm_matrix;
use crate::stats::median;

/// Thresholds of the expression filter
#[derive(Debug, Clone)]
pub struct FilterParams {
    /// Minimum count required in the median-sized library
    pub min_count: f64,
    /// Minimum total count across all samples
    pub min_total_count: f64,
    /// Group size above which only `min_prop` of the extra samples must pass
    pub large_n: f64,
    pub min_prop: f64,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            min_count: 10.0,
            min_total_count: 15.0,
            large_n: 10.0,
            min_prop: 0.7,
        }
    }
}

/// How genes are selected before normalization
#[derive(Debug, Clone)]
pub enum FilterMethod {
    /// Expression filter sized by the design
    ByExpr(FilterParams),
    /// At least `min_samples` samples with CPM of `min_cpm` or more
    Cpm { min_cpm: f64, min_samples: usize },
}

impl Default for FilterMethod {
    fn default() -> Self {
        FilterMethod::ByExpr(FilterParams::default())
    }
}

impl fmt::Display for FilterMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterMethod::ByExpr(_) => write!(f, "filter_by_expr"),
            FilterMethod::Cpm { min_cpm, min_samples } => write!(f, "cpm >= {} in >= {} samples", min_cpm, min_samples),
        }
    }
}

const TOL: f64 = 1e-14;

/// Keep genes with a worthwhile count in at least as many samples as the
/// smallest group implied by the design, and a minimum total count.
///
/// The smallest group size is 1 / max leverage, compressed above `large_n`.
/// The CPM cutoff corresponds to `min_count` in the median library.
pub fn filter_by_expr(y: &DGEList, design: &DesignMatrix, params: &FilterParams) -> Result<Vec<bool>> {
    if design.n_samples() != y.n_samples() {
        return Err(DgeError::DimensionMismatch {
            expected: format!("design with {} rows", y.n_samples()),
            got: format!("{} rows", design.n_samples()),
        });
    }

    let hat = hat_values(design.matrix())?;
    let max_hat = hat.iter().copied().fold(0.0f64, f64::max);
    let mut min_sample_size = 1.0 / max_hat;
    if min_sample_size > params.large_n {
        min_sample_size = params.large_n + (min_sample_size - params.large_n) * params.min_prop;
    }

    let libs = y.effective_lib_sizes();
    let cutoff = params.min_count / median(&libs) * 1e6;
    let cpm = cpm_matrix(y.counts().counts(), &libs);
    let totals = y.counts().row_sums();

    log::debug!(
        "filter_by_expr: minimum sample size {:.3}, CPM cutoff {:.4}",
        min_sample_size,
        cutoff
    );

    Ok((0..y.n_genes())
        .map(|i| {
            let n_above = cpm.row(i).iter().filter(|&&v| v >= cutoff).count() as f64;
            n_above >= min_sample_size - TOL && totals[i] >= params.min_total_count - TOL
        })
        .collect())
}

/// Keep genes with CPM of at least `min_cpm` in at least `min_samples` samples
pub fn filter_by_cpm(y: &DGEList, min_cpm: f64, min_samples: usize) -> Vec<bool> {
    let cpm = cpm_matrix(y.counts().counts(), &y.effective_lib_sizes());
    cpm.rows()
        .into_iter()
        .map(|row| row.iter().filter(|&&v| v >= min_cpm).count() >= min_samples)
        .collect()
}

/// Apply `method` and drop the failing genes; library sizes are recomputed
pub fn filter_genes(y: &DGEList, design: &DesignMatrix, method: &FilterMethod) -> Result<DGEList> {
    let keep = match method {
        FilterMethod::ByExpr(params) => filter_by_expr(y, design, params)?,
        FilterMethod::Cpm { min_cpm, min_samples } => filter_by_cpm(y, *min_cpm, *min_samples),
    };
    let kept: Vec<usize> = keep.iter().enumerate().filter(|(_, k)| **k).map(|(i, _)| i).collect();
    if kept.is_empty() {
        return Err(DgeError::EmptyData {
            reason: format!("no genes pass the expression filter ({})", method),
        });
    }
    log::info!(
        "Filtering ({}): kept {} of {} genes",
        method,
        kept.len(),
        y.n_genes()
    );
    y.subset_genes(&kept, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CountMatrix, GeneAnnotation, SampleSheet};
    use crate::design::paired_design;
    use ndarray::Array2;

    fn dgelist(rows: &[[f64; 4]]) -> DGEList {
        let counts = Array2::from_shape_fn((rows.len(), 4), |(i, j)| rows[i][j]);
        let genes: Vec<String> = (0..rows.len()).map(|i| format!("g{}", i)).collect();
        let samples: Vec<String> = ["1N", "1T", "2N", "2T"].iter().map(|s| s.to_string()).collect();
        DGEList::new(CountMatrix::new(counts, genes, samples).unwrap(), GeneAnnotation::new(rows.len())).unwrap()
    }

    #[test]
    fn test_filter_by_expr() {
        let mut rows = vec![[1e5, 1e5, 1e5, 1e5]; 10];
        rows.push([0.0, 0.0, 1.0, 2.0]); // too low overall
        rows.push([0.0, 30.0, 0.0, 30.0]); // expressed in one tissue only
        rows.push([20.0, 0.0, 0.0, 0.0]); // one sample only
        let y = dgelist(&rows);
        let sheet = SampleSheet::from_sample_names(y.counts().sample_ids(), 'T', 'N').unwrap();
        let design = paired_design(&sheet).unwrap();

        // paired design with 2 patients: leverage 3/4, minimum sample size 4/3
        let keep = filter_by_expr(&y, &design, &FilterParams::default()).unwrap();
        assert!(keep[..10].iter().all(|&k| k));
        assert!(!keep[10]);
        assert!(keep[11]);
        assert!(!keep[12]);

        let filtered = filter_genes(&y, &design, &FilterMethod::default()).unwrap();
        assert_eq!(filtered.n_genes(), 11);
    }

    #[test]
    fn test_filter_by_cpm() {
        let y = dgelist(&[[500.0, 500.0, 500.0, 500.0], [500.0, 0.0, 0.0, 0.0], [0.0, 0.0, 0.0, 0.0]]);
        let keep = filter_by_cpm(&y, 1.0, 2);
        assert_eq!(keep, vec![true, false, false]);
    }
}
