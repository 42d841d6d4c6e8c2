//! Cox-Reid adjusted profile likelihood of the dispersion

use ndarray::{ArrayView1, ArrayView2};

use super::fitting::{fit_gene, GlmFitParams};
use super::negative_binomial::{nb_log_likelihood, nb_weight};
use crate::design::linalg::{crossprod_weighted, log_det_symmetric};

/// Cox-Reid correction 0.5 * log det(X'WX) for fitted means `mu`
pub fn cox_reid_adjustment(design: ArrayView2<f64>, mu: &[f64], dispersion: f64) -> f64 {
    let p = design.ncols();
    let w: Vec<f64> = mu.iter().map(|&m| nb_weight(m, dispersion)).collect();
    let mut xtwx = crossprod_weighted(design, Some(&w));
    if let Some(ld) = log_det_symmetric(&xtwx, p) {
        return 0.5 * ld;
    }
    // Groups with all-zero counts leave X'WX singular
    for j in 0..p {
        xtwx[j * p + j] += 1e-10;
    }
    log_det_symmetric(&xtwx, p).map_or(0.0, |ld| 0.5 * ld)
}

/// Adjusted profile log-likelihood of one gene at `dispersion`
pub fn adjusted_profile_loglik(
    y: ArrayView1<f64>,
    design: ArrayView2<f64>,
    offsets: &[f64],
    dispersion: f64,
    params: &GlmFitParams,
) -> f64 {
    let fit = fit_gene(y, design, offsets, dispersion, params);
    let ll: f64 = y
        .iter()
        .zip(&fit.fitted)
        .map(|(&yi, &mu)| nb_log_likelihood(yi, mu, dispersion))
        .sum();
    ll - cox_reid_adjustment(design, &fit.fitted, dispersion)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_apl_prefers_moderate_dispersion_for_overdispersed_counts() {
        let x = array![[1.0], [1.0], [1.0], [1.0], [1.0], [1.0]];
        let y = array![2.0, 40.0, 9.0, 75.0, 15.0, 4.0];
        let off = vec![0.0; 6];
        let params = GlmFitParams::default();
        let near_poisson = adjusted_profile_loglik(y.view(), x.view(), &off, 1e-4, &params);
        let moderate = adjusted_profile_loglik(y.view(), x.view(), &off, 1.0, &params);
        assert!(moderate > near_poisson);
    }

    #[test]
    fn test_cox_reid_single_group() {
        // X'WX = sum w for an intercept-only design
        let x = array![[1.0], [1.0]];
        let adj = cox_reid_adjustment(x.view(), &[10.0, 10.0], 0.1);
        assert!((adj - 0.5 * 10.0f64.ln()).abs() < 1e-12);
    }
}
