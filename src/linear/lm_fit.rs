//! Gene-wise linear models for log-expression values
//!
//! Each gene is fit by least squares on its non-missing samples only, so
//! genes with missing values carry their own residual degrees of freedom and
//! their own unscaled covariance matrix.

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;

use crate::data::{ExpressionMatrix, GeneAnnotation};
use crate::design::linalg::{crossprod_vector, crossprod_weighted, invert_symmetric};
use crate::design::DesignMatrix;
use crate::error::{DgeError, Result};

/// Least squares fit of every gene
#[derive(Debug, Clone)]
pub struct LinearFit {
    pub feature_ids: Vec<String>,
    pub genes: GeneAnnotation,
    pub coef_names: Vec<String>,
    /// Estimated coefficients, genes x coefficients
    pub coefficients: Array2<f64>,
    /// Standard errors divided by sigma
    pub stdev_unscaled: Array2<f64>,
    /// Residual standard deviation
    pub sigma: Vec<f64>,
    pub df_residual: Vec<f64>,
    /// Mean log-expression over the non-missing samples
    pub amean: Vec<f64>,
    /// Per-gene (X'X)^-1 restricted to the observed samples, row-major
    pub cov_unscaled: Vec<Vec<f64>>,
}

impl LinearFit {
    pub fn n_genes(&self) -> usize {
        self.feature_ids.len()
    }

    pub fn n_coefs(&self) -> usize {
        self.coef_names.len()
    }

    pub fn coef_index(&self, name: &str) -> Option<usize> {
        self.coef_names.iter().position(|c| c == name)
    }
}

pub(crate) struct GeneLm {
    pub coefficients: Vec<f64>,
    pub stdev_unscaled: Vec<f64>,
    pub sigma: f64,
    pub df_residual: f64,
    pub cov_unscaled: Vec<f64>,
}

impl GeneLm {
    fn not_estimable(p: usize) -> Self {
        Self {
            coefficients: vec![f64::NAN; p],
            stdev_unscaled: vec![f64::NAN; p],
            sigma: f64::NAN,
            df_residual: 0.0,
            cov_unscaled: vec![f64::NAN; p * p],
        }
    }
}

/// Fit one gene on the samples where it is observed. Coefficients whose
/// design column is zero on those samples are not estimable and stay NaN.
pub(crate) fn lm_gene(y: ArrayView1<f64>, design: ArrayView2<f64>) -> GeneLm {
    let p = design.ncols();
    let obs: Vec<usize> = (0..y.len()).filter(|&i| y[i].is_finite()).collect();
    let x_obs = design.select(Axis(0), &obs);
    let cols: Vec<usize> = (0..p).filter(|&j| x_obs.column(j).iter().any(|&v| v != 0.0)).collect();
    if cols.is_empty() || obs.len() < cols.len() {
        return GeneLm::not_estimable(p);
    }

    let x = x_obs.select(Axis(1), &cols);
    let q = cols.len();
    let y_obs: Vec<f64> = obs.iter().map(|&i| y[i]).collect();

    let xtx_inv = match invert_symmetric(&crossprod_weighted(x.view(), None), q) {
        Some(inv) => inv,
        None => return GeneLm::not_estimable(p),
    };
    let xty = crossprod_vector(x.view(), None, &y_obs);
    let beta: Vec<f64> = (0..q)
        .map(|j| (0..q).map(|k| xtx_inv[j * q + k] * xty[k]).sum())
        .collect();

    let rss: f64 = y_obs
        .iter()
        .enumerate()
        .map(|(i, &yi)| {
            let fitted: f64 = (0..q).map(|j| x[[i, j]] * beta[j]).sum();
            (yi - fitted).powi(2)
        })
        .sum();
    let df_residual = (obs.len() - q) as f64;
    let sigma = if df_residual > 0.0 { (rss / df_residual).sqrt() } else { f64::NAN };

    let mut out = GeneLm::not_estimable(p);
    out.sigma = sigma;
    out.df_residual = df_residual;
    for (a, &ja) in cols.iter().enumerate() {
        out.coefficients[ja] = beta[a];
        out.stdev_unscaled[ja] = xtx_inv[a * q + a].sqrt();
        for (b, &jb) in cols.iter().enumerate() {
            out.cov_unscaled[ja * p + jb] = xtx_inv[a * q + b];
        }
    }
    out
}

/// Fit the linear model `design` to every gene of `expr`
pub fn lm_fit(expr: &ExpressionMatrix, genes: &GeneAnnotation, design: &DesignMatrix) -> Result<LinearFit> {
    let values = expr.values();
    if design.n_samples() != values.ncols() {
        return Err(DgeError::DimensionMismatch {
            expected: format!("design with {} rows", values.ncols()),
            got: format!("{} rows", design.n_samples()),
        });
    }
    if genes.n_rows() != values.nrows() {
        return Err(DgeError::DimensionMismatch {
            expected: format!("annotation for {} features", values.nrows()),
            got: format!("{} rows", genes.n_rows()),
        });
    }

    let n_genes = values.nrows();
    let p = design.n_coefs();
    let x = design.matrix();

    let fits: Vec<GeneLm> = (0..n_genes)
        .into_par_iter()
        .map(|g| lm_gene(values.row(g), x))
        .collect();

    let mut coefficients = Array2::from_elem((n_genes, p), f64::NAN);
    let mut stdev_unscaled = Array2::from_elem((n_genes, p), f64::NAN);
    let mut sigma = Vec::with_capacity(n_genes);
    let mut df_residual = Vec::with_capacity(n_genes);
    let mut cov_unscaled = Vec::with_capacity(n_genes);
    for (g, fit) in fits.into_iter().enumerate() {
        for j in 0..p {
            coefficients[[g, j]] = fit.coefficients[j];
            stdev_unscaled[[g, j]] = fit.stdev_unscaled[j];
        }
        sigma.push(fit.sigma);
        df_residual.push(fit.df_residual);
        cov_unscaled.push(fit.cov_unscaled);
    }

    let amean: Vec<f64> = values
        .rows()
        .into_iter()
        .map(|row| {
            let finite: Vec<f64> = row.iter().copied().filter(|v| v.is_finite()).collect();
            if finite.is_empty() {
                f64::NAN
            } else {
                finite.iter().sum::<f64>() / finite.len() as f64
            }
        })
        .collect();

    let no_df = df_residual.iter().filter(|d| **d == 0.0).count();
    if no_df > 0 {
        log::warn!("{} genes have no residual degrees of freedom", no_df);
    }
    log::info!("Fitted linear model to {} genes, {} coefficients", n_genes, p);

    Ok(LinearFit {
        feature_ids: expr.feature_ids().to_vec(),
        genes: genes.clone(),
        coef_names: design.coef_names().to_vec(),
        coefficients,
        stdev_unscaled,
        sigma,
        df_residual,
        amean,
        cov_unscaled,
    })
}

/// Re-express the fit in terms of one contrast of its coefficients.
/// The result has a single coefficient named `name`.
pub fn contrasts_fit(fit: &LinearFit, contrast: &[f64], name: &str) -> Result<LinearFit> {
    let p = fit.n_coefs();
    if contrast.len() != p {
        return Err(DgeError::DimensionMismatch {
            expected: format!("contrast of length {}", p),
            got: format!("{}", contrast.len()),
        });
    }
    if contrast.iter().all(|c| *c == 0.0) {
        return Err(DgeError::InvalidInput {
            reason: "contrast has no non-zero entries".to_string(),
        });
    }

    let active: Vec<usize> = (0..p).filter(|&j| contrast[j] != 0.0).collect();
    let n_genes = fit.n_genes();
    let mut coefficients = Array2::zeros((n_genes, 1));
    let mut stdev_unscaled = Array2::zeros((n_genes, 1));

    for g in 0..n_genes {
        let beta: f64 = active.iter().map(|&j| contrast[j] * fit.coefficients[[g, j]]).sum();
        let cov = &fit.cov_unscaled[g];
        let mut var = 0.0f64;
        for &a in &active {
            for &b in &active {
                var += contrast[a] * cov[a * p + b] * contrast[b];
            }
        }
        coefficients[[g, 0]] = beta;
        stdev_unscaled[[g, 0]] = var.sqrt();
    }

    let cov_unscaled = single_coef_cov(&stdev_unscaled);
    Ok(LinearFit {
        feature_ids: fit.feature_ids.clone(),
        genes: fit.genes.clone(),
        coef_names: vec![name.to_string()],
        coefficients,
        stdev_unscaled,
        sigma: fit.sigma.clone(),
        df_residual: fit.df_residual.clone(),
        amean: fit.amean.clone(),
        cov_unscaled,
    })
}

fn single_coef_cov(stdev_unscaled: &Array2<f64>) -> Vec<Vec<f64>> {
    stdev_unscaled.column(0).iter().map(|s| vec![s * s]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::{group_means_design, make_contrast};
    use ndarray::array;

    fn two_groups() -> (ExpressionMatrix, DesignMatrix) {
        let values = array![
            [5.0, 6.0, 7.0, 1.0, 2.0, 3.0],
            [4.0, f64::NAN, 4.2, 4.1, 3.9, 4.0],
            [f64::NAN, f64::NAN, f64::NAN, 2.0, 2.5, 3.0],
        ];
        let ids = vec!["a".into(), "b".into(), "c".into()];
        let samples = (1..=6).map(|i| format!("GSM{}", i)).collect();
        let expr = ExpressionMatrix::new(values, ids, samples).unwrap();
        let groups: Vec<String> = ["tumor", "tumor", "tumor", "normal", "normal", "normal"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let design = group_means_design(&groups, &["tumor".into(), "normal".into()]).unwrap();
        (expr, design)
    }

    #[test]
    fn test_lm_fit_group_means() {
        let (expr, design) = two_groups();
        let fit = lm_fit(&expr, &GeneAnnotation::new(3), &design).unwrap();

        assert!((fit.coefficients[[0, 0]] - 6.0).abs() < 1e-12);
        assert!((fit.coefficients[[0, 1]] - 2.0).abs() < 1e-12);
        assert_eq!(fit.df_residual[0], 4.0);
        assert!((fit.sigma[0] - 1.0).abs() < 1e-12);
        assert!((fit.stdev_unscaled[[0, 0]] - (1.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!((fit.amean[0] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_lm_fit_missing_values() {
        let (expr, design) = two_groups();
        let fit = lm_fit(&expr, &GeneAnnotation::new(3), &design).unwrap();

        // one missing tumor sample
        assert_eq!(fit.df_residual[1], 3.0);
        assert!((fit.coefficients[[1, 0]] - 4.1).abs() < 1e-12);
        assert!((fit.stdev_unscaled[[1, 0]] - 0.5f64.sqrt()).abs() < 1e-12);

        // tumor group entirely missing
        assert!(fit.coefficients[[2, 0]].is_nan());
        assert!((fit.coefficients[[2, 1]] - 2.5).abs() < 1e-12);
        assert_eq!(fit.df_residual[2], 2.0);
    }

    #[test]
    fn test_zero_residual_df_gives_nan_sigma() {
        let expr = ExpressionMatrix::new(
            array![[1.0, 2.0]],
            vec!["g".into()],
            vec!["s1".into(), "s2".into()],
        )
        .unwrap();
        let groups = vec!["tumor".to_string(), "normal".to_string()];
        let design = group_means_design(&groups, &["tumor".into(), "normal".into()]).unwrap();
        let fit = lm_fit(&expr, &GeneAnnotation::new(1), &design).unwrap();
        assert_eq!(fit.df_residual[0], 0.0);
        assert!(fit.sigma[0].is_nan());
    }

    #[test]
    fn test_contrasts_fit() {
        let (expr, design) = two_groups();
        let fit = lm_fit(&expr, &GeneAnnotation::new(3), &design).unwrap();
        let contrast = make_contrast(&design, "tumor", "normal").unwrap();
        let cfit = contrasts_fit(&fit, &contrast, "tumor-normal").unwrap();

        assert_eq!(cfit.coef_names, vec!["tumor-normal".to_string()]);
        assert!((cfit.coefficients[[0, 0]] - 4.0).abs() < 1e-12);
        assert!((cfit.stdev_unscaled[[0, 0]] - (2.0f64 / 3.0).sqrt()).abs() < 1e-12);
        // 1/2 + 1/3 for the gene missing one tumor sample
        assert!((cfit.stdev_unscaled[[1, 0]] - (5.0f64 / 6.0).sqrt()).abs() < 1e-12);
        assert!(cfit.coefficients[[2, 0]].is_nan());
        assert_eq!(cfit.cov_unscaled.len(), 3);
        assert!((cfit.cov_unscaled[0][0] - 2.0 / 3.0).abs() < 1e-12);

        assert!(contrasts_fit(&fit, &[0.0, 0.0], "none").is_err());
        assert!(contrasts_fit(&fit, &[1.0], "short").is_err());
    }
}
