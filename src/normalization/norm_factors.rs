//! Library composition normalization factors (TMM, upper quartile)

use std::fmt;
use std::str::FromStr;

use ndarray::{ArrayView2, Axis};

use crate::data::DGEList;
use crate::error::{DgeError, Result};
use crate::stats::{quantile_sorted, rank_average, cmp_f64};

/// Method for normalization factor estimation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormMethod {
    /// Trimmed mean of M-values against a reference sample
    Tmm,
    /// Upper-quartile scaling
    UpperQuartile,
    /// All factors equal to one
    None,
}

impl FromStr for NormMethod {
    type Err = DgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tmm" => Ok(NormMethod::Tmm),
            "upperquartile" | "uq" => Ok(NormMethod::UpperQuartile),
            "none" => Ok(NormMethod::None),
            other => Err(DgeError::InvalidInput {
                reason: format!("unknown normalization method '{}' (TMM, upperquartile, none)", other),
            }),
        }
    }
}

impl fmt::Display for NormMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormMethod::Tmm => write!(f, "TMM"),
            NormMethod::UpperQuartile => write!(f, "upperquartile"),
            NormMethod::None => write!(f, "none"),
        }
    }
}

/// Trimming settings of the TMM method
#[derive(Debug, Clone)]
pub struct TmmParams {
    /// Fraction trimmed from each end of the log-ratios
    pub logratio_trim: f64,
    /// Fraction trimmed from each end of the average log-abundances
    pub sum_trim: f64,
    /// Weight log-ratios by their inverse asymptotic variance
    pub weighting: bool,
}

impl Default for TmmParams {
    fn default() -> Self {
        Self {
            logratio_trim: 0.3,
            sum_trim: 0.05,
            weighting: true,
        }
    }
}

/// Estimate normalization factors and store them in `y`
pub fn calc_norm_factors(y: &mut DGEList, method: NormMethod) -> Result<()> {
    let factors = norm_factors(y.counts().counts(), y.lib_sizes(), method, &TmmParams::default())?;
    log::info!(
        "{} normalization factors: {:?}",
        method,
        factors.iter().map(|f| (f * 1e4).round() / 1e4).collect::<Vec<_>>()
    );
    y.set_norm_factors(factors)
}

/// Normalization factors scaled to a geometric mean of one
pub fn norm_factors(counts: ArrayView2<f64>, lib_sizes: &[f64], method: NormMethod, tmm: &TmmParams) -> Result<Vec<f64>> {
    let n_samples = counts.ncols();
    if lib_sizes.len() != n_samples {
        return Err(DgeError::DimensionMismatch {
            expected: format!("{} library sizes", n_samples),
            got: format!("{}", lib_sizes.len()),
        });
    }
    if method == NormMethod::None {
        return Ok(vec![1.0; n_samples]);
    }

    // Genes with zero counts in every sample carry no information
    let keep: Vec<usize> = counts
        .axis_iter(Axis(0))
        .enumerate()
        .filter(|(_, row)| row.iter().any(|&v| v > 0.0))
        .map(|(i, _)| i)
        .collect();
    if keep.is_empty() {
        return Err(DgeError::NormalizationFailed {
            reason: "all genes have zero counts".to_string(),
        });
    }
    let x = counts.select(Axis(0), &keep);

    let f = match method {
        NormMethod::None => vec![1.0; n_samples],
        NormMethod::UpperQuartile => quantile_factors(x.view(), lib_sizes, 0.75),
        NormMethod::Tmm => {
            let f75 = quantile_factors(x.view(), lib_sizes, 0.75);
            let mut sorted = f75.clone();
            sorted.sort_by(cmp_f64);
            let reference = if quantile_sorted(&sorted, 0.5) < 1e-20 {
                // Sparse data: column with the largest sum of square-root counts
                (0..n_samples)
                    .max_by(|&a, &b| {
                        let sa: f64 = x.column(a).iter().map(|v| v.sqrt()).sum();
                        let sb: f64 = x.column(b).iter().map(|v| v.sqrt()).sum();
                        sa.total_cmp(&sb)
                    })
                    .unwrap_or(0)
            } else {
                let mean = f75.iter().sum::<f64>() / n_samples as f64;
                (0..n_samples)
                    .min_by(|&a, &b| (f75[a] - mean).abs().total_cmp(&(f75[b] - mean).abs()))
                    .unwrap_or(0)
            };
            log::debug!("TMM reference sample: column {}", reference);

            (0..n_samples)
                .map(|j| {
                    let obs = x.column(j).to_vec();
                    let refc = x.column(reference).to_vec();
                    tmm_factor(&obs, &refc, lib_sizes[j], lib_sizes[reference], tmm)
                })
                .collect()
        }
    };

    if f.iter().any(|&v| !(v > 0.0) || !v.is_finite()) {
        return Err(DgeError::NormalizationFailed {
            reason: format!("{} produced non-positive factors {:?}", method, f),
        });
    }
    let log_mean = f.iter().map(|v| v.ln()).sum::<f64>() / n_samples as f64;
    let geo = log_mean.exp();
    Ok(f.into_iter().map(|v| v / geo).collect())
}

/// Per-sample quantile of counts divided by library size
fn quantile_factors(x: ArrayView2<f64>, lib_sizes: &[f64], prob: f64) -> Vec<f64> {
    (0..x.ncols())
        .map(|j| {
            let mut col = x.column(j).to_vec();
            col.sort_by(cmp_f64);
            quantile_sorted(&col, prob) / lib_sizes[j]
        })
        .collect()
}

/// TMM factor of `obs` against `reference`
fn tmm_factor(obs: &[f64], reference: &[f64], lib_obs: f64, lib_ref: f64, params: &TmmParams) -> f64 {
    let mut log_r = Vec::new();
    let mut abs_e = Vec::new();
    let mut var = Vec::new();

    for (&o, &r) in obs.iter().zip(reference) {
        let lo = (o / lib_obs).log2();
        let lr = (r / lib_ref).log2();
        let m = lo - lr;
        let a = (lo + lr) / 2.0;
        if m.is_finite() && a.is_finite() {
            log_r.push(m);
            abs_e.push(a);
            var.push((lib_obs - o) / lib_obs / o + (lib_ref - r) / lib_ref / r);
        }
    }

    if log_r.is_empty() || log_r.iter().all(|m| m.abs() < 1e-6) {
        return 1.0;
    }

    let n = log_r.len() as f64;
    let lo_l = (n * params.logratio_trim).floor() + 1.0;
    let hi_l = n + 1.0 - lo_l;
    let lo_s = (n * params.sum_trim).floor() + 1.0;
    let hi_s = n + 1.0 - lo_s;

    let rank_m = rank_average(&log_r);
    let rank_a = rank_average(&abs_e);

    let mut num = 0.0;
    let mut den = 0.0;
    for k in 0..log_r.len() {
        let keep = rank_m[k] >= lo_l && rank_m[k] <= hi_l && rank_a[k] >= lo_s && rank_a[k] <= hi_s;
        if keep {
            let w = if params.weighting { 1.0 / var[k] } else { 1.0 };
            num += w * log_r[k];
            den += w;
        }
    }

    let f = num / den;
    if f.is_finite() {
        2f64.powf(f)
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn two_sample(counts: &[(f64, f64)]) -> Array2<f64> {
        Array2::from_shape_fn((counts.len(), 2), |(i, j)| if j == 0 { counts[i].0 } else { counts[i].1 })
    }

    #[test]
    fn test_parse_method() {
        assert_eq!("TMM".parse::<NormMethod>().unwrap(), NormMethod::Tmm);
        assert_eq!("upperquartile".parse::<NormMethod>().unwrap(), NormMethod::UpperQuartile);
        assert!("rle".parse::<NormMethod>().is_err());
    }

    #[test]
    fn test_identical_samples_get_unit_factors() {
        let x = two_sample(&[(10.0, 10.0), (20.0, 20.0), (5.0, 5.0), (0.0, 0.0), (100.0, 100.0)]);
        let f = norm_factors(x.view(), &[135.0, 135.0], NormMethod::Tmm, &TmmParams::default()).unwrap();
        assert!((f[0] - 1.0).abs() < 1e-12 && (f[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_tmm_detects_composition_bias() {
        // Sample 2 has one hugely expressed gene; the rest are equal in raw counts
        let mut rows: Vec<(f64, f64)> = (1..=40).map(|i| (10.0 * i as f64, 10.0 * i as f64)).collect();
        rows.push((10.0, 8200.0));
        let x = two_sample(&rows);
        let libs: Vec<f64> = (0..2).map(|j| x.column(j).sum()).collect();
        let f = norm_factors(x.view(), &libs, NormMethod::Tmm, &TmmParams::default()).unwrap();
        // the inflated library is scaled down
        assert!(f[1] < f[0]);
        assert!((f[0] * f[1] - 1.0).abs() < 1e-12);
        // effective library sizes of the unchanged genes now agree
        let eff: Vec<f64> = libs.iter().zip(&f).map(|(l, f)| l * f).collect();
        assert!((eff[0] / eff[1] - 1.0).abs() < 0.05);
    }

    #[test]
    fn test_upper_quartile() {
        let x = two_sample(&[(1.0, 2.0), (2.0, 4.0), (3.0, 6.0), (4.0, 8.0), (5.0, 10.0)]);
        let f = norm_factors(x.view(), &[15.0, 30.0], NormMethod::UpperQuartile, &TmmParams::default()).unwrap();
        assert!((f[0] - 1.0).abs() < 1e-12);
        assert!((f[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_none() {
        let x = two_sample(&[(1.0, 2.0)]);
        assert_eq!(norm_factors(x.view(), &[1.0, 2.0], NormMethod::None, &TmmParams::default()).unwrap(), vec![1.0, 1.0]);
    }
}
