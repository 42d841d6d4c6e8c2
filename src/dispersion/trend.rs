//! Abundance-dependent dispersion trend

use ndarray::ArrayView2;

use super::common::common_dispersion_of;
use super::DispersionParams;
use crate::stats::{cmp_f64, interpolate};

/// Number of abundance bins for `n_genes`
fn n_bins(n_genes: usize, params: &DispersionParams) -> usize {
    (n_genes / params.min_bin_size.max(1)).clamp(1, params.max_bins.max(1))
}

/// Trended dispersion: genes are split into equal-sized bins by average
/// log CPM, each bin gets its own common dispersion, and genes take the
/// value interpolated linearly between bin centres.
pub fn estimate_trended_dispersion(
    counts: ArrayView2<f64>,
    design: ArrayView2<f64>,
    offsets: &[f64],
    ave_log_cpm: &[f64],
    params: &DispersionParams,
) -> Vec<f64> {
    let n_genes = ave_log_cpm.len();
    let mut order: Vec<usize> = (0..n_genes).collect();
    order.sort_by(|&a, &b| cmp_f64(&ave_log_cpm[a], &ave_log_cpm[b]));

    let bins = n_bins(n_genes, params);
    let mut centres = Vec::with_capacity(bins);
    let mut values = Vec::with_capacity(bins);

    for b in 0..bins {
        let start = b * n_genes / bins;
        let end = (b + 1) * n_genes / bins;
        let rows = &order[start..end];
        if rows.is_empty() {
            continue;
        }
        let centre = rows.iter().map(|&i| ave_log_cpm[i]).sum::<f64>() / rows.len() as f64;
        let disp = common_dispersion_of(counts, rows, design, offsets, params);
        log::debug!("Trend bin {}: {} genes, logCPM {:.3}, dispersion {:.5}", b, rows.len(), centre, disp);
        centres.push(centre);
        values.push(disp);
    }

    if centres.len() == 1 {
        return vec![values[0]; n_genes];
    }
    ave_log_cpm
        .iter()
        .map(|&a| interpolate(&centres, &values, a))
        .collect()
}
