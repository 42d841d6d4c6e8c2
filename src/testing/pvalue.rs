//! P-values from test statistics

use statrs::distribution::{ChiSquared, ContinuousCDF, Normal, StudentsT};

/// Two-sided p-value of a standard normal statistic
pub fn pvalue_normal(z: f64) -> f64 {
    if !z.is_finite() {
        return f64::NAN;
    }
    match Normal::new(0.0, 1.0) {
        Ok(normal) => 2.0 * normal.cdf(-z.abs()),
        Err(_) => f64::NAN,
    }
}

/// Two-sided p-value of a t statistic; infinite `df` gives the normal limit
pub fn pvalue_t(stat: f64, df: f64) -> f64 {
    if stat.is_nan() || !(df > 0.0) {
        return f64::NAN;
    }
    if df.is_infinite() {
        return pvalue_normal(stat);
    }
    match StudentsT::new(0.0, 1.0, df) {
        Ok(t) => 2.0 * t.cdf(-stat.abs()),
        Err(_) => f64::NAN,
    }
}

/// Upper tail probability of a chi-square statistic
pub fn pvalue_chisq(stat: f64, df: f64) -> f64 {
    if stat.is_nan() || !(df > 0.0) {
        return f64::NAN;
    }
    match ChiSquared::new(df) {
        Ok(chi) => chi.sf(stat.max(0.0)),
        Err(_) => f64::NAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pvalue_normal() {
        assert!((pvalue_normal(2.0) - pvalue_normal(-2.0)).abs() < 1e-12);
        assert!((pvalue_normal(0.0) - 1.0).abs() < 1e-12);
        assert!((pvalue_normal(1.959963984540054) - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_pvalue_t_distribution() {
        let p_normal = pvalue_normal(2.0);
        assert!((pvalue_t(2.0, 1000.0) - p_normal).abs() < 0.001);
        assert!(pvalue_t(2.0, 3.0) > p_normal);
        assert_eq!(pvalue_t(2.0, f64::INFINITY), p_normal);
        assert!(pvalue_t(2.0, 0.0).is_nan());
    }

    #[test]
    fn test_pvalue_chisq() {
        assert!((pvalue_chisq(3.841458820694124, 1.0) - 0.05).abs() < 1e-9);
        assert!((pvalue_chisq(0.0, 1.0) - 1.0).abs() < 1e-12);
    }
}
