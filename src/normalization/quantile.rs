//! Between-array quantile normalization

use ndarray::{Array2, ArrayView2};

use crate::stats::{cmp_f64, interpolate, rank_average};

/// Quantile-normalize the columns of `values` so that every column has the
/// same empirical distribution.
///
/// Missing values (NaN) stay missing. Columns with missing values are first
/// interpolated onto the full-length quantile grid before the mean quantile
/// function is formed, and tied values receive the mean of their quantiles.
pub fn normalize_quantiles(values: ArrayView2<f64>) -> Array2<f64> {
    let (n_rows, n_cols) = values.dim();
    let mut out = values.to_owned();
    if n_cols < 2 || n_rows < 2 {
        return out;
    }

    let grid: Vec<f64> = (0..n_rows).map(|k| k as f64 / (n_rows - 1) as f64).collect();

    // Column quantile functions on the common grid
    let mut sorted_cols: Vec<Vec<f64>> = Vec::with_capacity(n_cols);
    let mut n_obs = vec![0usize; n_cols];
    for j in 0..n_cols {
        let mut col: Vec<f64> = values.column(j).iter().copied().filter(|v| !v.is_nan()).collect();
        col.sort_by(cmp_f64);
        n_obs[j] = col.len();
        let on_grid = if col.len() == n_rows {
            col
        } else if col.len() < 2 {
            vec![col.first().copied().unwrap_or(f64::NAN); n_rows]
        } else {
            let own: Vec<f64> = (0..col.len()).map(|k| k as f64 / (col.len() - 1) as f64).collect();
            grid.iter().map(|&g| interpolate(&own, &col, g)).collect()
        };
        sorted_cols.push(on_grid);
    }

    let mean_quantiles: Vec<f64> = (0..n_rows)
        .map(|k| {
            let vals: Vec<f64> = sorted_cols.iter().map(|c| c[k]).filter(|v| !v.is_nan()).collect();
            if vals.is_empty() {
                f64::NAN
            } else {
                vals.iter().sum::<f64>() / vals.len() as f64
            }
        })
        .collect();

    for j in 0..n_cols {
        if n_obs[j] == 0 {
            continue;
        }
        let observed: Vec<usize> = (0..n_rows).filter(|&i| !values[[i, j]].is_nan()).collect();
        let obs_values: Vec<f64> = observed.iter().map(|&i| values[[i, j]]).collect();
        let ranks = rank_average(&obs_values);
        let denom = (n_obs[j] - 1).max(1) as f64;
        for (&i, &r) in observed.iter().zip(&ranks) {
            let pos = if n_obs[j] == 1 { 0.5 } else { (r - 1.0) / denom };
            out[[i, j]] = interpolate(&grid, &mean_quantiles, pos);
        }
    }

    out
}
