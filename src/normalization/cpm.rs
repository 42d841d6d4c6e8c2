//! Counts per million and average log2 CPM

use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

use crate::data::DGEList;
use crate::glm::fit_one_group;

/// Prior count added before taking logs
pub const DEFAULT_PRIOR_COUNT: f64 = 2.0;

/// Dispersion assumed by the average log CPM fit
pub const AVE_LOG_CPM_DISPERSION: f64 = 0.05;

/// Prior counts scaled by relative library size, and library sizes enlarged
/// by twice the scaled prior
fn scaled_prior(lib_sizes: &[f64], prior_count: f64) -> (Vec<f64>, Vec<f64>) {
    let mean_lib = lib_sizes.iter().sum::<f64>() / lib_sizes.len() as f64;
    let prior: Vec<f64> = lib_sizes.iter().map(|l| prior_count * l / mean_lib).collect();
    let adj: Vec<f64> = lib_sizes.iter().zip(&prior).map(|(l, p)| l + 2.0 * p).collect();
    (prior, adj)
}

/// Counts per million against the given library sizes
pub fn cpm_matrix(counts: ArrayView2<f64>, lib_sizes: &[f64]) -> Array2<f64> {
    let mut out = counts.to_owned();
    for (j, mut col) in out.columns_mut().into_iter().enumerate() {
        let scale = 1e6 / lib_sizes[j];
        col.mapv_inplace(|v| v * scale);
    }
    out
}

/// log2 counts per million with a library-size scaled prior count
pub fn log_cpm_matrix(counts: ArrayView2<f64>, lib_sizes: &[f64], prior_count: f64) -> Array2<f64> {
    let (prior, adj) = scaled_prior(lib_sizes, prior_count);
    let mut out = counts.to_owned();
    for (j, mut col) in out.columns_mut().into_iter().enumerate() {
        col.mapv_inplace(|v| ((v + prior[j]) / adj[j] * 1e6).log2());
    }
    out
}

/// CPM (or log2 CPM) of a DGEList using effective library sizes
pub fn cpm(y: &DGEList, log: bool, prior_count: f64) -> Array2<f64> {
    let libs = y.effective_lib_sizes();
    if log {
        log_cpm_matrix(y.counts().counts(), &libs, prior_count)
    } else {
        cpm_matrix(y.counts().counts(), &libs)
    }
}

/// Average log2 CPM of every gene from a one-group NB fit to prior-augmented counts
pub fn ave_log_cpm_matrix(counts: ArrayView2<f64>, lib_sizes: &[f64], prior_count: f64, dispersion: f64) -> Vec<f64> {
    let (prior, adj) = scaled_prior(lib_sizes, prior_count);
    let offsets: Vec<f64> = adj.iter().map(|l| l.ln()).collect();
    let log_1e6 = 1e6f64.ln();

    (0..counts.nrows())
        .into_par_iter()
        .map(|i| {
            let y: Vec<f64> = counts.row(i).iter().zip(&prior).map(|(c, p)| c + p).collect();
            let beta = fit_one_group(&y, &offsets, dispersion, 50, 1e-10);
            (beta + log_1e6) / std::f64::consts::LN_2
        })
        .collect()
}

/// Average log2 CPM of a DGEList with the default prior count
pub fn ave_log_cpm(y: &DGEList) -> Vec<f64> {
    ave_log_cpm_matrix(
        y.counts().counts(),
        &y.effective_lib_sizes(),
        DEFAULT_PRIOR_COUNT,
        AVE_LOG_CPM_DISPERSION,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_cpm() {
        let c = array![[10.0, 20.0], [990.0, 1980.0]];
        let m = cpm_matrix(c.view(), &[1000.0, 2000.0]);
        assert!((m[[0, 0]] - 1e4).abs() < 1e-9);
        assert!((m[[0, 1]] - 1e4).abs() < 1e-9);
    }

    #[test]
    fn test_log_cpm_zero_count_is_finite() {
        let c = array![[0.0, 5.0], [100.0, 95.0]];
        let m = log_cpm_matrix(c.view(), &[100.0, 100.0], 2.0);
        assert!(m[[0, 0]].is_finite());
        // (0 + 2) / 104 * 1e6
        assert!((m[[0, 0]] - (2.0f64 / 104.0 * 1e6).log2()).abs() < 1e-12);
    }

    #[test]
    fn test_ave_log_cpm_equal_proportions() {
        // Same proportion in both libraries: the average equals the per-sample log CPM
        let c = array![[48.0, 96.0]];
        let libs = [1000.0, 2000.0];
        let ave = ave_log_cpm_matrix(c.view(), &libs, 2.0, 0.05);
        let per_sample = log_cpm_matrix(c.view(), &libs, 2.0);
        assert!((per_sample[[0, 0]] - per_sample[[0, 1]]).abs() < 1e-12);
        assert!((ave[0] - per_sample[[0, 0]]).abs() < 1e-8);
    }

    #[test]
    fn test_ave_log_cpm_orders_genes() {
        let c = array![[1.0, 0.0, 2.0], [50.0, 60.0, 40.0], [500.0, 400.0, 600.0]];
        let ave = ave_log_cpm_matrix(c.view(), &[1e4, 1e4, 1e4], 2.0, 0.05);
        assert!(ave[0] < ave[1] && ave[1] < ave[2]);
    }
}
