//! Empirical Bayes moderation of gene-wise variances
//!
//! Residual variances are assumed to follow a scaled F distribution whose
//! prior scale and degrees of freedom are estimated by matching moments of
//! the log variances. Posterior variances shrink each gene toward the prior,
//! giving moderated t statistics and log-odds of differential expression.

use ndarray::Array2;
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

use super::lm_fit::LinearFit;
use super::EbayesParams;
use crate::error::{DgeError, Result};
use crate::special::{digamma, trigamma, trigamma_inverse};
use crate::stats::{cmp_f64, median};
use crate::testing::pvalue_t;

/// Prior for the gene-wise variances
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariancePrior {
    /// Prior variance s0^2
    pub scale: f64,
    /// Prior degrees of freedom d0, infinite when the variances show no
    /// spread beyond sampling error
    pub df: f64,
}

/// Moment estimate of a scaled F distribution for variances `x` on `df1`
/// degrees of freedom. Entries with non-finite values or zero df are ignored.
pub fn fit_f_dist(x: &[f64], df1: &[f64]) -> VariancePrior {
    let (mut xs, ds): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(df1)
        .filter(|(v, d)| v.is_finite() && **v > -1e-15 && d.is_finite() && **d > 1e-15)
        .map(|(v, d)| (v.max(0.0), *d))
        .unzip();
    let n = xs.len();
    if n == 0 {
        return VariancePrior { scale: f64::NAN, df: f64::NAN };
    }
    if n == 1 {
        return VariancePrior { scale: xs[0], df: 0.0 };
    }

    let mut m = median(&xs);
    if m == 0.0 {
        log::warn!("More than half of residual variances are exactly zero: eBayes unreliable");
        m = 1.0;
    } else if xs.iter().any(|v| *v == 0.0) {
        log::warn!("Zero sample variances detected, have been offset away from zero");
    }
    for v in xs.iter_mut() {
        *v = v.max(1e-5 * m);
    }

    let e: Vec<f64> = xs
        .iter()
        .zip(&ds)
        .map(|(v, d)| v.ln() - digamma(d / 2.0) + (d / 2.0).ln())
        .collect();
    let emean = e.iter().sum::<f64>() / n as f64;
    let sample_var = e.iter().map(|v| (v - emean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let evar = sample_var - ds.iter().map(|d| trigamma(d / 2.0)).sum::<f64>() / n as f64;

    if evar > 0.0 {
        let df2 = 2.0 * trigamma_inverse(evar);
        let scale = (emean + digamma(df2 / 2.0) - (df2 / 2.0).ln()).exp();
        VariancePrior { scale, df: df2 }
    } else {
        VariancePrior {
            scale: emean.exp(),
            df: f64::INFINITY,
        }
    }
}

/// Posterior variances `(d0 s0^2 + d s^2) / (d0 + d)`
pub fn squeeze_var(var: &[f64], df: &[f64], prior: &VariancePrior) -> Vec<f64> {
    var.iter()
        .zip(df)
        .map(|(&v, &d)| {
            if prior.df.is_infinite() || d == 0.0 || !v.is_finite() {
                prior.scale
            } else {
                (prior.df * prior.scale + d * v) / (prior.df + d)
            }
        })
        .collect()
}

fn t_upper_tail(t: f64, df: f64) -> f64 {
    if df.is_infinite() {
        return Normal::new(0.0, 1.0).map_or(f64::NAN, |n| n.sf(t));
    }
    StudentsT::new(0.0, 1.0, df).map_or(f64::NAN, |d| d.sf(t))
}

/// Quantile `q` with upper tail probability `p`
fn t_upper_quantile(p: f64, df: f64) -> f64 {
    if df.is_infinite() {
        return Normal::new(0.0, 1.0).map_or(f64::NAN, |n| -n.inverse_cdf(p));
    }
    StudentsT::new(0.0, 1.0, df).map_or(f64::NAN, |d| -d.inverse_cdf(p))
}

/// Prior variance of non-zero coefficients, estimated from the largest
/// |t| statistics assuming a fraction `proportion` of genes is
/// differentially expressed. Returns NaN when too few genes are available.
pub fn tmixture(
    tstat: &[f64],
    stdev_unscaled: &[f64],
    df: &[f64],
    proportion: f64,
    v0_lim: Option<(f64, f64)>,
) -> f64 {
    let ok: Vec<usize> = (0..tstat.len()).filter(|&i| tstat[i].is_finite()).collect();
    let n_genes = ok.len();
    let n_target = (proportion / 2.0 * n_genes as f64).ceil() as usize;
    if n_target < 1 {
        return f64::NAN;
    }
    let p = (n_target as f64 / n_genes as f64).max(proportion);

    let max_df = ok.iter().map(|&i| df[i]).fold(f64::NEG_INFINITY, f64::max);
    let mut t: Vec<(f64, f64)> = ok
        .iter()
        .map(|&i| {
            let at = tstat[i].abs();
            let at = if df[i] < max_df {
                let tail = t_upper_tail(at, df[i]);
                if tail > 0.0 {
                    t_upper_quantile(tail, max_df)
                } else {
                    at
                }
            } else {
                at
            };
            (at, stdev_unscaled[i].powi(2))
        })
        .collect();
    t.sort_by(|a, b| cmp_f64(&b.0, &a.0));
    t.truncate(n_target);

    let v0: Vec<f64> = t
        .iter()
        .enumerate()
        .map(|(r, &(at, v1))| {
            let p0 = 2.0 * t_upper_tail(at, max_df);
            let p_target = ((r as f64 + 0.5) / n_genes as f64 - (1.0 - p) * p0) / p;
            let v0 = if p_target > p0 {
                let q = t_upper_quantile(p_target / 2.0, max_df);
                v1 * ((at / q).powi(2) - 1.0)
            } else {
                0.0
            };
            match v0_lim {
                Some((lo, hi)) => v0.clamp(lo, hi),
                None => v0,
            }
        })
        .collect();
    v0.iter().sum::<f64>() / v0.len() as f64
}

/// Moderated statistics for every coefficient of a linear fit
#[derive(Debug, Clone)]
pub struct EbayesFit {
    pub fit: LinearFit,
    pub prior: VariancePrior,
    /// Prior variance of the non-zero coefficients, one per coefficient
    pub var_prior: Vec<f64>,
    pub proportion: f64,
    pub s2_post: Vec<f64>,
    pub df_total: Vec<f64>,
    /// Moderated t statistics, genes x coefficients
    pub t: Array2<f64>,
    pub p_value: Array2<f64>,
    /// Log-odds of differential expression (B statistic)
    pub lods: Array2<f64>,
}

/// Empirical Bayes moderation of a (contrast) fit
pub fn ebayes(fit: LinearFit, params: &EbayesParams) -> Result<EbayesFit> {
    if !fit.df_residual.iter().any(|d| *d > 0.0) {
        return Err(DgeError::InvalidInput {
            reason: "no residual degrees of freedom in linear model fits".to_string(),
        });
    }
    if !(params.proportion > 0.0 && params.proportion < 1.0) {
        return Err(DgeError::InvalidInput {
            reason: format!("proportion must be in (0, 1), got {}", params.proportion),
        });
    }

    let s2: Vec<f64> = fit.sigma.iter().map(|s| s * s).collect();
    let prior = fit_f_dist(&s2, &fit.df_residual);
    log::info!("Variance prior: s0^2 = {:.4}, d0 = {:.3}", prior.scale, prior.df);
    let s2_post = squeeze_var(&s2, &fit.df_residual, &prior);

    let df_pooled: f64 = fit.df_residual.iter().filter(|d| d.is_finite()).sum();
    let df_total: Vec<f64> = fit
        .df_residual
        .iter()
        .map(|d| (d + prior.df).min(df_pooled))
        .collect();

    let (n_genes, p) = fit.coefficients.dim();
    let t = Array2::from_shape_fn((n_genes, p), |(g, j)| {
        fit.coefficients[[g, j]] / fit.stdev_unscaled[[g, j]] / s2_post[g].sqrt()
    });
    let p_value = Array2::from_shape_fn((n_genes, p), |(g, j)| pvalue_t(t[[g, j]], df_total[g]));

    let (lim_lo, lim_hi) = params.stdev_coef_lim;
    let v0_lim = (lim_lo.powi(2) / prior.scale, lim_hi.powi(2) / prior.scale);
    let var_prior: Vec<f64> = (0..p)
        .map(|j| {
            let tj: Vec<f64> = t.column(j).to_vec();
            let sj: Vec<f64> = fit.stdev_unscaled.column(j).to_vec();
            let v = tmixture(&tj, &sj, &df_total, params.proportion, Some(v0_lim));
            if v.is_nan() {
                log::warn!("Estimation of var.prior failed for '{}', set to default value", fit.coef_names[j]);
                1.0 / prior.scale
            } else {
                v
            }
        })
        .collect();
    log::debug!("var.prior: {:?}", var_prior);

    let log_odds_prior = (params.proportion / (1.0 - params.proportion)).ln();
    let infinite_prior = prior.df > 1e6;
    let lods = Array2::from_shape_fn((n_genes, p), |(g, j)| {
        let su2 = fit.stdev_unscaled[[g, j]].powi(2);
        let r = (su2 + var_prior[j]) / su2;
        let t2 = t[[g, j]].powi(2);
        let kernel = if infinite_prior {
            t2 * (1.0 - 1.0 / r) / 2.0
        } else {
            let d = df_total[g];
            (1.0 + d) / 2.0 * ((t2 + d) / (t2 / r + d)).ln()
        };
        log_odds_prior - r.ln() / 2.0 + kernel
    });

    Ok(EbayesFit {
        fit,
        prior,
        var_prior,
        proportion: params.proportion,
        s2_post,
        df_total,
        t,
        p_value,
        lods,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ExpressionMatrix, GeneAnnotation};
    use crate::design::{group_means_design, make_contrast};
    use crate::linear::{contrasts_fit, lm_fit};
    use ndarray::Array2;

    #[test]
    fn test_fit_f_dist_constant_variances() {
        let prior = fit_f_dist(&[1.0; 20], &[4.0; 20]);
        assert!(prior.df.is_infinite());
        let expected = (-digamma(2.0) + 2.0f64.ln()).exp();
        assert!((prior.scale - expected).abs() < 1e-10);
    }

    #[test]
    fn test_fit_f_dist_spread_variances() {
        let x: Vec<f64> = (0..40).map(|i| if i % 2 == 0 { 0.1 } else { 10.0 }).collect();
        let prior = fit_f_dist(&x, &[4.0; 40]);
        assert!(prior.df.is_finite() && prior.df > 0.0);
        assert!(prior.scale > 0.1 && prior.scale < 10.0);
    }

    #[test]
    fn test_fit_f_dist_ignores_zero_df() {
        let prior = fit_f_dist(&[f64::NAN, 2.0], &[0.0, 3.0]);
        assert_eq!(prior, VariancePrior { scale: 2.0, df: 0.0 });
    }

    #[test]
    fn test_squeeze_var() {
        let prior = VariancePrior { scale: 1.0, df: 4.0 };
        let post = squeeze_var(&[3.0, f64::NAN], &[4.0, 0.0], &prior);
        assert!((post[0] - 2.0).abs() < 1e-12);
        assert_eq!(post[1], 1.0);

        let flat = VariancePrior { scale: 0.5, df: f64::INFINITY };
        assert_eq!(squeeze_var(&[3.0], &[4.0], &flat), vec![0.5]);
    }

    #[test]
    fn test_tmixture_too_few_genes() {
        assert!(tmixture(&[], &[], &[], 0.01, None).is_nan());
    }

    fn simulated() -> (ExpressionMatrix, Vec<String>) {
        // deterministic noise with varying gene-wise scale
        let n_genes = 200;
        let values = Array2::from_shape_fn((n_genes, 6), |(g, j)| {
            let scale = 0.2 + 0.3 * ((g * 7) % 5) as f64 / 4.0;
            let noise = ((g * 13 + j * 29) as f64 * 0.731).sin() * scale;
            let effect = if g < 2 && j < 3 { 4.0 } else { 0.0 };
            8.0 + (g % 10) as f64 * 0.1 + noise + effect
        });
        let ids = (0..n_genes).map(|g| format!("probe{}", g)).collect();
        let samples = (0..6).map(|j| format!("GSM{}", j)).collect();
        let groups = ["tumor", "tumor", "tumor", "normal", "normal", "normal"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        (ExpressionMatrix::new(values, ids, samples).unwrap(), groups)
    }

    #[test]
    fn test_ebayes_ranks_true_differences() {
        let (expr, groups) = simulated();
        let levels = vec!["tumor".to_string(), "normal".to_string()];
        let design = group_means_design(&groups, &levels).unwrap();
        let fit = lm_fit(&expr, &GeneAnnotation::new(expr.n_features()), &design).unwrap();
        let contrast = make_contrast(&design, "tumor", "normal").unwrap();
        let cfit = contrasts_fit(&fit, &contrast, "tumor-normal").unwrap();
        let eb = ebayes(cfit, &EbayesParams::default()).unwrap();

        assert!(eb.prior.scale > 0.0);
        assert!(eb.df_total.iter().all(|d| *d <= 4.0 * 200.0 && *d >= 4.0));
        assert!(eb.var_prior[0] > 0.0);

        let max_other = (2..200).map(|g| eb.lods[[g, 0]]).fold(f64::NEG_INFINITY, f64::max);
        assert!(eb.lods[[0, 0]] > max_other);
        assert!(eb.lods[[1, 0]] > max_other);
        assert!(eb.p_value[[0, 0]] < 1e-3);
        assert!(eb.t[[0, 0]] > 0.0);
    }

    #[test]
    fn test_ebayes_requires_residual_df() {
        let expr = ExpressionMatrix::new(
            ndarray::array![[1.0, 2.0], [3.0, 1.0]],
            vec!["a".into(), "b".into()],
            vec!["s1".into(), "s2".into()],
        )
        .unwrap();
        let groups = vec!["tumor".to_string(), "normal".to_string()];
        let design = group_means_design(&groups, &["tumor".into(), "normal".into()]).unwrap();
        let fit = lm_fit(&expr, &GeneAnnotation::new(2), &design).unwrap();
        assert!(ebayes(fit, &EbayesParams::default()).is_err());
    }
}
