//! Gene-wise dispersions shrunk toward the trend by weighted likelihood

use ndarray::ArrayView2;
use rayon::prelude::*;

use super::DispersionParams;
use crate::error::{DgeError, Result};
use crate::glm::adjusted_profile_loglik;
use crate::stats::{cmp_f64, moving_average_by_col};

/// Grid of log2 offsets from the trend at which the likelihood is evaluated
fn grid(params: &DispersionParams) -> Vec<f64> {
    let n = params.grid_length.max(2);
    let r = params.grid_range;
    (0..n).map(|k| -r + 2.0 * r * k as f64 / (n - 1) as f64).collect()
}

/// Position of the maximum of values on an equally spaced grid, refined by
/// fitting a parabola through the best point and its neighbours
pub(crate) fn maximize_interpolant(x: &[f64], y: &[f64]) -> f64 {
    let best = (0..y.len())
        .max_by(|&a, &b| y[a].total_cmp(&y[b]))
        .unwrap_or(0);
    if best == 0 || best + 1 >= y.len() {
        return x[best];
    }
    let (y0, y1, y2) = (y[best - 1], y[best], y[best + 1]);
    let denom = y0 - 2.0 * y1 + y2;
    if denom >= 0.0 || !denom.is_finite() {
        return x[best];
    }
    let h = x[best + 1] - x[best];
    let shift = 0.5 * (y0 - y2) / denom;
    x[best] + shift.clamp(-1.0, 1.0) * h
}

/// Window span for smoothing likelihoods across genes
pub(crate) fn default_span(n_genes: usize) -> f64 {
    if n_genes > 10 {
        (10.0 / n_genes as f64).powf(0.23)
    } else {
        1.0
    }
}

/// Tagwise dispersions.
///
/// Each gene's adjusted profile likelihood is evaluated on a grid around its
/// trended dispersion, the grid likelihoods are averaged over genes of
/// similar abundance to form a prior, and the gene's own likelihood plus
/// `prior_df / df_residual` times the prior is maximized.
pub fn estimate_tagwise_dispersion(
    counts: ArrayView2<f64>,
    design: ArrayView2<f64>,
    offsets: &[f64],
    ave_log_cpm: &[f64],
    trended: &[f64],
    params: &DispersionParams,
) -> Result<Vec<f64>> {
    let n_genes = counts.nrows();
    let df_residual = design.nrows().saturating_sub(design.ncols());
    if df_residual == 0 {
        return Err(DgeError::DispersionEstimationFailed {
            reason: "no residual degrees of freedom; tagwise dispersion needs replicates".to_string(),
        });
    }
    let prior_n = params.prior_df / df_residual as f64;
    let grid = grid(params);

    let loglik: Vec<Vec<f64>> = (0..n_genes)
        .into_par_iter()
        .map(|i| {
            grid.iter()
                .map(|&g| {
                    let disp = trended[i] * 2f64.powf(g);
                    adjusted_profile_loglik(counts.row(i), design, offsets, disp, &params.glm)
                })
                .collect()
        })
        .collect();

    // Prior: moving average of the grid likelihoods over genes sorted by abundance
    let mut order: Vec<usize> = (0..n_genes).collect();
    order.sort_by(|&a, &b| cmp_f64(&ave_log_cpm[a], &ave_log_cpm[b]));
    let sorted: Vec<Vec<f64>> = order.iter().map(|&i| loglik[i].clone()).collect();
    let span = params.span.unwrap_or_else(|| default_span(n_genes));
    let width = ((span * n_genes as f64).floor() as usize).max(1);
    let smoothed_sorted = moving_average_by_col(&sorted, width);
    let mut smoothed = vec![Vec::new(); n_genes];
    for (pos, &i) in order.iter().enumerate() {
        smoothed[i] = smoothed_sorted[pos].clone();
    }

    log::debug!(
        "Tagwise dispersion: prior.n {:.3}, smoothing width {} of {} genes",
        prior_n,
        width,
        n_genes
    );

    Ok((0..n_genes)
        .map(|i| {
            let weighted: Vec<f64> = loglik[i]
                .iter()
                .zip(&smoothed[i])
                .map(|(l, m)| l + prior_n * m)
                .collect();
            trended[i] * 2f64.powf(maximize_interpolant(&grid, &weighted))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_grid() {
        let g = grid(&DispersionParams::default());
        assert_eq!(g.len(), 11);
        assert_eq!(g[0], -10.0);
        assert_eq!(g[5], 0.0);
        assert_eq!(g[10], 10.0);
    }

    #[test]
    fn test_maximize_interpolant() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y: Vec<f64> = x.iter().map(|v| -(v - 1.4) * (v - 1.4)).collect();
        assert!((maximize_interpolant(&x, &y) - 1.4).abs() < 1e-12);
        // maximum at the edge
        assert_eq!(maximize_interpolant(&x, &[5.0, 4.0, 3.0, 2.0]), 0.0);
    }

    #[test]
    fn test_default_span() {
        assert_eq!(default_span(5), 1.0);
        assert!((default_span(10_000) - (0.001f64).powf(0.23)).abs() < 1e-12);
    }

    #[test]
    fn test_tagwise_shrinks_toward_trend() {
        let spread = [0.5, 1.5, 0.9, 1.1, 0.7, 1.3];
        let counts = Array2::from_shape_fn((12, 6), |(i, j)| {
            let f = if i == 0 { [0.1, 1.9, 0.2, 1.8, 0.3, 1.7][j] } else { spread[(i + j) % 6] };
            (200.0_f64 * f).round()
        });
        let design = Array2::from_elem((6, 1), 1.0);
        let ave = vec![5.0; 12];
        let trended = vec![0.1; 12];

        let strong = DispersionParams {
            prior_df: 1000.0,
            ..DispersionParams::default()
        };
        let tw = estimate_tagwise_dispersion(counts.view(), design.view(), &[0.0; 6], &ave, &trended, &strong).unwrap();
        // heavy prior pins genes near the trend-centred consensus
        assert!(tw.iter().all(|d| d.is_finite() && *d > 0.0));
        let spread_strong = tw.iter().cloned().fold(0.0f64, f64::max) / tw.iter().cloned().fold(f64::MAX, f64::min);

        let weak = DispersionParams {
            prior_df: 0.01,
            ..DispersionParams::default()
        };
        let tw_weak = estimate_tagwise_dispersion(counts.view(), design.view(), &[0.0; 6], &ave, &trended, &weak).unwrap();
        // the noisy gene stands out without shrinkage
        assert!(tw_weak[0] > tw_weak[1]);
        let spread_weak = tw_weak.iter().cloned().fold(0.0f64, f64::max) / tw_weak.iter().cloned().fold(f64::MAX, f64::min);
        assert!(spread_strong < spread_weak);
    }

    #[test]
    fn test_requires_residual_df() {
        let counts = Array2::from_elem((2, 2), 10.0);
        let design = Array2::from_elem((2, 2), 1.0);
        let r = estimate_tagwise_dispersion(counts.view(), design.view(), &[0.0; 2], &[1.0, 1.0], &[0.1, 0.1], &DispersionParams::default());
        assert!(r.is_err());
    }
}
