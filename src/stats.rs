//! Small statistical helpers shared across modules
//!
//! Quantiles follow R's default `quantile(type = 7)`, ranks follow
//! `rank(ties.method = "average")`.

use std::cmp::Ordering;

/// Total order for finite floats, NaN sorted last
pub fn cmp_f64(a: &f64, b: &f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
    }
}

/// Quantile of already sorted, NaN-free data (R type 7)
pub fn quantile_sorted(sorted: &[f64], prob: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n == 1 {
        return sorted[0];
    }
    let h = (n - 1) as f64 * prob.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = h - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

/// Quantiles of the finite values of `x` at each probability in `probs`
pub fn quantiles(x: &[f64], probs: &[f64]) -> Vec<f64> {
    let mut finite: Vec<f64> = x.iter().copied().filter(|v| v.is_finite()).collect();
    finite.sort_by(cmp_f64);
    probs.iter().map(|&p| quantile_sorted(&finite, p)).collect()
}

/// Median of the finite values of `x`
pub fn median(x: &[f64]) -> f64 {
    quantiles(x, &[0.5])[0]
}

/// 1-based ranks with ties averaged
pub fn rank_average(x: &[f64]) -> Vec<f64> {
    let n = x.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| cmp_f64(&x[a], &x[b]));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && x[order[j + 1]] == x[order[i]] {
            j += 1;
        }
        // positions i..=j share the average of ranks i+1..=j+1
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }
    ranks
}

/// Linear interpolation of (xs, ys) at `xout`, constant beyond the ends.
/// `xs` must be non-decreasing.
pub fn interpolate(xs: &[f64], ys: &[f64], xout: f64) -> f64 {
    debug_assert_eq!(xs.len(), ys.len());
    let n = xs.len();
    if n == 0 {
        return f64::NAN;
    }
    if xout <= xs[0] {
        return ys[0];
    }
    if xout >= xs[n - 1] {
        return ys[n - 1];
    }
    let hi = xs.partition_point(|&v| v < xout);
    let lo = hi - 1;
    let span = xs[hi] - xs[lo];
    if span <= 0.0 {
        return ys[hi];
    }
    let t = (xout - xs[lo]) / span;
    ys[lo] + t * (ys[hi] - ys[lo])
}

/// Centered moving average of width `width` applied to each column of
/// `rows` (rows already in the smoothing order). Windows shrink at the ends.
pub fn moving_average_by_col(rows: &[Vec<f64>], width: usize) -> Vec<Vec<f64>> {
    let n = rows.len();
    if n == 0 {
        return Vec::new();
    }
    let ncol = rows[0].len();
    let width = width.clamp(1, n);
    let half = width / 2;

    // Prefix sums per column keep this linear in n
    let mut prefix = vec![vec![0.0; ncol]; n + 1];
    for i in 0..n {
        for j in 0..ncol {
            prefix[i + 1][j] = prefix[i][j] + rows[i][j];
        }
    }

    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + width - half).min(n);
            let len = (hi - lo) as f64;
            (0..ncol)
                .map(|j| (prefix[hi][j] - prefix[lo][j]) / len)
                .collect()
        })
        .collect()
}
