//! Small dense linear algebra on row-major `Vec<f64>` matrices
//!
//! Design matrices here have a handful of columns, so cross products are
//! formed explicitly and solved by Cholesky.

use ndarray::ArrayView2;

/// X'WX as a flat row-major `p x p` matrix; `weights` of `None` means unit weights
pub fn crossprod_weighted(design: ArrayView2<f64>, weights: Option<&[f64]>) -> Vec<f64> {
    let p = design.ncols();
    let mut xtwx = vec![0.0; p * p];
    for i in 0..design.nrows() {
        let w = weights.map_or(1.0, |w| w[i]);
        for j in 0..p {
            let xij = w * design[[i, j]];
            for k in 0..=j {
                xtwx[j * p + k] += xij * design[[i, k]];
            }
        }
    }
    for j in 0..p {
        for k in 0..j {
            xtwx[k * p + j] = xtwx[j * p + k];
        }
    }
    xtwx
}

/// X'Wz
pub fn crossprod_vector(design: ArrayView2<f64>, weights: Option<&[f64]>, z: &[f64]) -> Vec<f64> {
    let p = design.ncols();
    let mut out = vec![0.0; p];
    for i in 0..design.nrows() {
        let wz = weights.map_or(1.0, |w| w[i]) * z[i];
        for j in 0..p {
            out[j] += design[[i, j]] * wz;
        }
    }
    out
}

/// Lower Cholesky factor of a symmetric positive definite matrix, or `None`
/// when a pivot is not positive
pub fn cholesky(a: &[f64], n: usize) -> Option<Vec<f64>> {
    let mut l = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i * n + j];
            for k in 0..j {
                sum -= l[i * n + k] * l[j * n + k];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return None;
                }
                l[i * n + j] = sum.sqrt();
            } else {
                l[i * n + j] = sum / l[j * n + j];
            }
        }
    }
    Some(l)
}

fn cholesky_solve(l: &[f64], b: &[f64], n: usize) -> Vec<f64> {
    let mut y = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[i * n + j] * y[j];
        }
        y[i] = sum / l[i * n + i];
    }
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = y[i];
        for j in (i + 1)..n {
            sum -= l[j * n + i] * x[j];
        }
        x[i] = sum / l[i * n + i];
    }
    x
}

/// Solve `A x = b` for symmetric positive definite `A`
pub fn solve_symmetric(a: &[f64], b: &[f64], n: usize) -> Option<Vec<f64>> {
    cholesky(a, n).map(|l| cholesky_solve(&l, b, n))
}

/// Inverse of a symmetric positive definite matrix
pub fn invert_symmetric(a: &[f64], n: usize) -> Option<Vec<f64>> {
    let l = cholesky(a, n)?;
    let mut inv = vec![0.0; n * n];
    let mut e = vec![0.0; n];
    for col in 0..n {
        e.iter_mut().for_each(|v| *v = 0.0);
        e[col] = 1.0;
        let x = cholesky_solve(&l, &e, n);
        for row in 0..n {
            inv[row * n + col] = x[row];
        }
    }
    Some(inv)
}

/// log determinant of a symmetric positive definite matrix
pub fn log_det_symmetric(a: &[f64], n: usize) -> Option<f64> {
    let l = cholesky(a, n)?;
    Some((0..n).map(|i| 2.0 * l[i * n + i].ln()).sum())
}

/// Numerical rank via Householder QR with column pivoting
pub fn qr_rank(matrix: ArrayView2<f64>) -> usize {
    let nrow = matrix.nrows();
    let ncol = matrix.ncols();
    let k = nrow.min(ncol);
    let mut r = matrix.to_owned();

    let mut col_norms_sq: Vec<f64> = (0..ncol)
        .map(|j| r.column(j).iter().map(|&v| v * v).sum())
        .collect();

    for step in 0..k {
        let best_col = (step..ncol)
            .max_by(|&a, &b| col_norms_sq[a].total_cmp(&col_norms_sq[b]))
            .unwrap_or(step);
        if best_col != step {
            for i in 0..nrow {
                r.swap([i, step], [i, best_col]);
            }
            col_norms_sq.swap(step, best_col);
        }

        let mut alpha = (step..nrow).map(|i| r[[i, step]] * r[[i, step]]).sum::<f64>().sqrt();
        if alpha < f64::EPSILON * 1e3 {
            break;
        }
        if r[[step, step]] > 0.0 {
            alpha = -alpha;
        }

        let v0 = r[[step, step]] - alpha;
        r[[step, step]] = alpha;
        let v_norm_sq = v0 * v0 + ((step + 1)..nrow).map(|i| r[[i, step]] * r[[i, step]]).sum::<f64>();
        if v_norm_sq.abs() < f64::MIN_POSITIVE {
            continue;
        }
        let tau = 2.0 / v_norm_sq;

        for j in (step + 1)..ncol {
            let mut dot = v0 * r[[step, j]];
            for i in (step + 1)..nrow {
                dot += r[[i, step]] * r[[i, j]];
            }
            let scale = tau * dot;
            r[[step, j]] -= scale * v0;
            for i in (step + 1)..nrow {
                r[[i, j]] -= scale * r[[i, step]];
            }
        }

        for j in (step + 1)..ncol {
            col_norms_sq[j] = (col_norms_sq[j] - r[[step, j]] * r[[step, j]]).max(0.0);
        }
    }

    let max_abs_diag = (0..k).map(|i| r[[i, i]].abs()).fold(0.0f64, f64::max);
    let tol = nrow.max(ncol) as f64 * f64::EPSILON * max_abs_diag;
    (0..k).filter(|&i| r[[i, i]].abs() > tol).count()
}
