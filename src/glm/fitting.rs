//! Negative binomial GLM fitting by Iteratively Reweighted Least Squares (IRLS)

use ndarray::{Array2, ArrayView1, ArrayView2};
use rayon::prelude::*;

use super::negative_binomial::{nb_deviance, nb_mean, nb_weight, MAX_ETA};
use crate::data::DGEList;
use crate::design::linalg::{crossprod_vector, crossprod_weighted, solve_symmetric};
use crate::design::DesignMatrix;
use crate::error::{DgeError, Result};

/// Configurable parameters for GLM fitting
#[derive(Debug, Clone)]
pub struct GlmFitParams {
    /// Maximum IRLS iterations per gene
    pub maxit: usize,
    /// Relative deviance change below which a fit has converged
    pub tol: f64,
    /// Maximum step halvings when the deviance increases
    pub max_halving: usize,
    /// Average prior count added before computing the reported coefficients,
    /// keeping fold changes finite when a group has only zeros
    pub prior_count: f64,
}

impl Default for GlmFitParams {
    fn default() -> Self {
        Self {
            maxit: 50,
            tol: 1e-8,
            max_halving: 10,
            prior_count: 0.125,
        }
    }
}

/// Fit of a single gene
#[derive(Debug, Clone)]
pub struct GeneFit {
    /// Coefficients on the natural log scale
    pub coefficients: Vec<f64>,
    pub fitted: Vec<f64>,
    pub deviance: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Fits of all genes against one design
#[derive(Debug, Clone)]
pub struct GlmFit {
    pub design: DesignMatrix,
    /// genes x coefficients, natural log scale, from prior-augmented counts
    pub coefficients: Array2<f64>,
    /// genes x coefficients of the plain maximum likelihood fit
    pub unshrunk_coefficients: Array2<f64>,
    /// genes x samples fitted means
    pub fitted: Array2<f64>,
    pub deviance: Vec<f64>,
    pub converged: Vec<bool>,
    pub dispersion: Vec<f64>,
    pub offsets: Vec<f64>,
    pub df_residual: usize,
}

fn linear_predictor(design: ArrayView2<f64>, beta: &[f64], i: usize) -> f64 {
    (0..beta.len()).map(|j| design[[i, j]] * beta[j]).sum()
}

fn means(design: ArrayView2<f64>, beta: &[f64], offsets: &[f64]) -> Vec<f64> {
    (0..design.nrows())
        .map(|i| nb_mean(linear_predictor(design, beta, i), offsets[i]))
        .collect()
}

/// Solve a (weighted) least squares system, retrying with a tiny ridge when
/// the cross product is numerically singular
fn least_squares(design: ArrayView2<f64>, weights: Option<&[f64]>, z: &[f64]) -> Option<Vec<f64>> {
    let p = design.ncols();
    let mut xtwx = crossprod_weighted(design, weights);
    let xtwz = crossprod_vector(design, weights, z);
    if let Some(beta) = solve_symmetric(&xtwx, &xtwz, p) {
        return Some(beta);
    }
    let scale = (0..p).map(|j| xtwx[j * p + j]).fold(0.0f64, f64::max).max(1.0);
    for j in 0..p {
        xtwx[j * p + j] += 1e-10 * scale;
    }
    solve_symmetric(&xtwx, &xtwz, p)
}

/// Fit one gene by IRLS with step halving on deviance increase.
///
/// Starts from the least squares fit of log((y + 0.5) / exp(offset)).
pub fn fit_gene(
    y: ArrayView1<f64>,
    design: ArrayView2<f64>,
    offsets: &[f64],
    dispersion: f64,
    params: &GlmFitParams,
) -> GeneFit {
    let n = y.len();
    let p = design.ncols();
    let y: Vec<f64> = y.to_vec();

    if y.iter().all(|&v| v == 0.0) {
        return GeneFit {
            coefficients: vec![f64::NEG_INFINITY; p],
            fitted: vec![0.0; n],
            deviance: 0.0,
            iterations: 0,
            converged: true,
        };
    }

    let start: Vec<f64> = (0..n).map(|i| (y[i] + 0.5).ln() - offsets[i]).collect();
    let mut beta = least_squares(design, None, &start).unwrap_or_else(|| vec![0.0; p]);
    let mut mu = means(design, &beta, offsets);
    let mut dev = nb_deviance(&y, &mu, dispersion);
    let mut converged = false;
    let mut iterations = 0;

    for iter in 0..params.maxit {
        iterations = iter + 1;
        let weights: Vec<f64> = mu.iter().map(|&m| nb_weight(m, dispersion)).collect();
        let z: Vec<f64> = (0..n)
            .map(|i| {
                let eta = linear_predictor(design, &beta, i);
                eta + (y[i] - mu[i]) / mu[i].max(1e-300)
            })
            .collect();

        let Some(target) = least_squares(design, Some(&weights), &z) else {
            break;
        };

        // Step halving until the deviance no longer increases
        let mut step = 1.0;
        let mut candidate = target.clone();
        let mut cand_mu = means(design, &candidate, offsets);
        let mut cand_dev = nb_deviance(&y, &cand_mu, dispersion);
        let mut halvings = 0;
        while (!cand_dev.is_finite() || cand_dev > dev * (1.0 + 1e-12) + 1e-12) && halvings < params.max_halving {
            step *= 0.5;
            candidate = beta
                .iter()
                .zip(&target)
                .map(|(&old, &new)| old + step * (new - old))
                .collect();
            cand_mu = means(design, &candidate, offsets);
            cand_dev = nb_deviance(&y, &cand_mu, dispersion);
            halvings += 1;
        }
        if !cand_dev.is_finite() {
            break;
        }

        let conv_test = (dev - cand_dev).abs() / (cand_dev.abs() + 0.1);
        beta = candidate;
        mu = cand_mu;
        dev = cand_dev;

        if conv_test < params.tol {
            converged = true;
            break;
        }
        if beta.iter().any(|b| b.abs() > MAX_ETA) {
            break;
        }
    }

    GeneFit {
        coefficients: beta,
        fitted: mu,
        deviance: dev,
        iterations,
        converged,
    }
}

/// Fit every gene of `y` against `design` with log effective library sizes as offsets
pub fn glm_fit(y: &DGEList, design: &DesignMatrix, dispersion: &[f64], params: &GlmFitParams) -> Result<GlmFit> {
    let n_genes = y.n_genes();
    if design.n_samples() != y.n_samples() {
        return Err(DgeError::DimensionMismatch {
            expected: format!("design with {} rows", y.n_samples()),
            got: format!("{} rows", design.n_samples()),
        });
    }
    if dispersion.len() != n_genes {
        return Err(DgeError::DimensionMismatch {
            expected: format!("{} dispersions", n_genes),
            got: format!("{}", dispersion.len()),
        });
    }

    let offsets: Vec<f64> = y.effective_lib_sizes().iter().map(|l| l.ln()).collect();
    let counts = y.counts().counts();
    let x = design.matrix();

    let fits: Vec<GeneFit> = (0..n_genes)
        .into_par_iter()
        .map(|i| fit_gene(counts.row(i), x, &offsets, dispersion[i], params))
        .collect();

    let n_samples = y.n_samples();
    let mut unshrunk_coefficients = Array2::zeros((n_genes, design.n_coefs()));
    let mut fitted = Array2::zeros((n_genes, n_samples));
    let mut deviance = Vec::with_capacity(n_genes);
    let mut converged = Vec::with_capacity(n_genes);
    for (i, fit) in fits.into_iter().enumerate() {
        for (j, b) in fit.coefficients.iter().enumerate() {
            unshrunk_coefficients[[i, j]] = *b;
        }
        for (j, m) in fit.fitted.iter().enumerate() {
            fitted[[i, j]] = *m;
        }
        deviance.push(fit.deviance);
        converged.push(fit.converged);
    }

    let n_failed = converged.iter().filter(|c| !**c).count();
    if n_failed > 0 {
        log::warn!("{} genes did not converge in {} IRLS iterations", n_failed, params.maxit);
    }

    let coefficients = if params.prior_count > 0.0 {
        shrunk_coefficients(counts, x, &y.effective_lib_sizes(), dispersion, params)
    } else {
        unshrunk_coefficients.clone()
    };

    Ok(GlmFit {
        design: design.clone(),
        coefficients,
        unshrunk_coefficients,
        fitted,
        deviance,
        converged,
        dispersion: dispersion.to_vec(),
        offsets,
        df_residual: design.df_residual(),
    })
}

/// Coefficients refitted after adding `prior_count` scaled by relative library
/// size to every count, with library sizes enlarged by twice the scaled prior
fn shrunk_coefficients(
    counts: ArrayView2<f64>,
    design: ArrayView2<f64>,
    lib_sizes: &[f64],
    dispersion: &[f64],
    params: &GlmFitParams,
) -> Array2<f64> {
    let mean_lib = lib_sizes.iter().sum::<f64>() / lib_sizes.len() as f64;
    let prior: Vec<f64> = lib_sizes.iter().map(|l| params.prior_count * l / mean_lib).collect();
    let offsets: Vec<f64> = lib_sizes.iter().zip(&prior).map(|(l, p)| (l + 2.0 * p).ln()).collect();

    let rows: Vec<Vec<f64>> = (0..counts.nrows())
        .into_par_iter()
        .map(|i| {
            let augmented: Vec<f64> = counts.row(i).iter().zip(&prior).map(|(c, p)| c + p).collect();
            fit_gene(ArrayView1::from(&augmented), design, &offsets, dispersion[i], params).coefficients
        })
        .collect();

    let mut out = Array2::zeros((counts.nrows(), design.ncols()));
    for (i, row) in rows.into_iter().enumerate() {
        for (j, b) in row.into_iter().enumerate() {
            out[[i, j]] = b;
        }
    }
    out
}

/// Maximum likelihood log mean of a one-group NB model with offsets, by Newton-Raphson.
/// Returns negative infinity for an all-zero gene.
pub fn fit_one_group(y: &[f64], offsets: &[f64], dispersion: f64, maxit: usize, tol: f64) -> f64 {
    let total: f64 = y.iter().sum();
    if total <= 0.0 {
        return f64::NEG_INFINITY;
    }
    let lib_total: f64 = offsets.iter().map(|o| o.exp()).sum();
    let mut beta = (total / lib_total).ln();

    for _ in 0..maxit {
        let mut score = 0.0;
        let mut info = 0.0;
        for (&yi, &off) in y.iter().zip(offsets) {
            let mu = (beta + off).exp();
            let denom = 1.0 + dispersion * mu;
            score += (yi - mu) / denom;
            info += mu / denom;
        }
        let step = score / info;
        beta += step;
        if step.abs() < tol {
            break;
        }
    }
    beta
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fit_gene_two_groups_is_exact() {
        // Saturated group means: fitted values equal group means
        let x = array![[1.0, 0.0], [1.0, 0.0], [1.0, 1.0], [1.0, 1.0]];
        let y = array![10.0, 20.0, 60.0, 40.0];
        let offsets = vec![0.0; 4];
        let fit = fit_gene(y.view(), x.view(), &offsets, 0.1, &GlmFitParams::default());
        assert!(fit.converged);
        assert!((fit.coefficients[0] - 15.0f64.ln()).abs() < 1e-6);
        assert!((fit.coefficients[1] - (50.0f64 / 15.0).ln()).abs() < 1e-6);
    }

    #[test]
    fn test_fit_gene_uses_offsets() {
        let x = array![[1.0], [1.0]];
        let y = array![10.0, 20.0];
        let offsets = vec![100.0f64.ln(), 200.0f64.ln()];
        let fit = fit_gene(y.view(), x.view(), &offsets, 0.0, &GlmFitParams::default());
        assert!((fit.coefficients[0] - 0.1f64.ln()).abs() < 1e-6);
        assert!(fit.deviance.abs() < 1e-6);
    }

    #[test]
    fn test_fit_gene_all_zero() {
        let x = array![[1.0], [1.0]];
        let fit = fit_gene(array![0.0, 0.0].view(), x.view(), &[0.0, 0.0], 0.1, &GlmFitParams::default());
        assert_eq!(fit.deviance, 0.0);
        assert!(fit.coefficients[0].is_infinite());
    }

    #[test]
    fn test_glm_fit_prior_count_keeps_fold_change_finite() {
        use crate::data::{CountMatrix, GeneAnnotation};
        let counts = CountMatrix::new(
            array![[0.0, 0.0, 30.0, 25.0], [10.0, 12.0, 11.0, 9.0]],
            vec!["g1".into(), "g2".into()],
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
        )
        .unwrap();
        let y = DGEList::new(counts, GeneAnnotation::new(2)).unwrap();
        let design = DesignMatrix::new(
            array![[1.0, 0.0], [1.0, 0.0], [1.0, 1.0], [1.0, 1.0]],
            vec!["(Intercept)".into(), "b".into()],
        )
        .unwrap();
        let fit = glm_fit(&y, &design, &[0.1, 0.1], &GlmFitParams::default()).unwrap();
        assert!(fit.coefficients[[0, 1]].is_finite());
        assert!(fit.coefficients[[0, 1]] > 3.0);
        assert!(fit.unshrunk_coefficients[[0, 1]] > fit.coefficients[[0, 1]]);
        assert!(fit.deviance.iter().all(|d| d.is_finite() && *d >= 0.0));
        assert_eq!(fit.df_residual, 2);
    }

    #[test]
    fn test_fit_one_group_poisson_closed_form() {
        let offsets = vec![1000.0f64.ln(), 3000.0f64.ln()];
        let beta = fit_one_group(&[10.0, 30.0], &offsets, 0.0, 50, 1e-10);
        assert!((beta - (40.0f64 / 4000.0).ln()).abs() < 1e-8);
        assert_eq!(fit_one_group(&[0.0, 0.0], &offsets, 0.1, 50, 1e-10), f64::NEG_INFINITY);
    }

    #[test]
    fn test_fit_one_group_score_zero() {
        let offsets = vec![0.0, 2.0f64.ln(), 0.5f64.ln()];
        let y = [5.0, 22.0, 1.0];
        let phi = 0.4;
        let beta = fit_one_group(&y, &offsets, phi, 100, 1e-12);
        let score: f64 = y
            .iter()
            .zip(&offsets)
            .map(|(&yi, &o)| {
                let mu = (beta + o).exp();
                (yi - mu) / (1.0 + phi * mu)
            })
            .sum();
        assert!(score.abs() < 1e-8);
    }
}
