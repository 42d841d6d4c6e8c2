//! Negative binomial distribution utilities

use statrs::function::gamma::ln_gamma;

/// Maximum linear predictor value to prevent overflow (exp(700) ~ 1e304)
pub const MAX_ETA: f64 = 700.0;

/// Below this value of dispersion * mu the Poisson limit is used
const POISSON_LIMIT: f64 = 1e-6;

/// Mean from linear predictor and log offset: mu = exp(eta + offset)
pub fn nb_mean(eta: f64, offset: f64) -> f64 {
    (eta + offset).clamp(-MAX_ETA, MAX_ETA).exp()
}

/// Var(Y) = mu + dispersion * mu^2
pub fn nb_variance(mu: f64, dispersion: f64) -> f64 {
    mu + dispersion * mu * mu
}

/// IRLS working weight for the log link, W = mu / (1 + dispersion * mu)
pub fn nb_weight(mu: f64, dispersion: f64) -> f64 {
    mu / (1.0 + dispersion * mu)
}

/// Log-probability of count `y` under NB(mu, dispersion); Poisson at zero dispersion
pub fn nb_log_likelihood(y: f64, mu: f64, dispersion: f64) -> f64 {
    if mu <= 0.0 {
        return if y == 0.0 { 0.0 } else { f64::NEG_INFINITY };
    }
    if dispersion <= 0.0 {
        return y * mu.ln() - mu - ln_gamma(y + 1.0);
    }
    let size = 1.0 / dispersion;
    let prob = size / (size + mu);
    ln_gamma(y + size) - ln_gamma(size) - ln_gamma(y + 1.0) + size * prob.ln() + y * (1.0 - prob).ln()
}

/// Unit deviance of one observation
pub fn nb_unit_deviance(y: f64, mu: f64, dispersion: f64) -> f64 {
    const MINI: f64 = 1e-8;
    let y = y + MINI;
    let mu = mu + MINI;
    let resid = y - mu;

    if dispersion * mu < POISSON_LIMIT {
        // Poisson deviance with a first order dispersion correction
        return 2.0 * (y * (y / mu).ln() - resid - 0.5 * dispersion * resid * resid);
    }
    let size = 1.0 / dispersion;
    2.0 * (y * (y / mu).ln() + (y + size) * ((mu + size) / (y + size)).ln())
}

/// Total deviance of a gene
pub fn nb_deviance(y: &[f64], mu: &[f64], dispersion: f64) -> f64 {
    y.iter()
        .zip(mu)
        .map(|(&yi, &mi)| nb_unit_deviance(yi, mi, dispersion))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nb_mean() {
        let mu = nb_mean(2.0, 1.0f64.ln());
        assert!((mu - 2.0_f64.exp()).abs() < 1e-10);
    }

    #[test]
    fn test_nb_variance() {
        assert!((nb_variance(10.0, 0.1) - 20.0).abs() < 1e-10);
    }

    #[test]
    fn test_nb_log_likelihood() {
        // near the Poisson limit
        let ll = nb_log_likelihood(5.0, 5.0, 1e-8);
        let poisson = 5.0 * 5.0f64.ln() - 5.0 - ln_gamma(6.0);
        assert!((ll - poisson).abs() < 1e-5);
        assert_eq!(nb_log_likelihood(0.0, 0.0, 0.1), 0.0);
    }

    #[test]
    fn test_nb_weight() {
        assert!((nb_weight(10.0, 0.1) - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_deviance_zero_at_perfect_fit() {
        assert!(nb_unit_deviance(7.0, 7.0, 0.2).abs() < 1e-9);
        assert!(nb_unit_deviance(7.0, 7.0, 0.0).abs() < 1e-9);
        assert!(nb_unit_deviance(0.0, 3.0, 0.2) > 0.0);
    }

    #[test]
    fn test_deviance_matches_likelihood_difference() {
        let (y, mu, phi) = (12.0, 8.0, 0.3);
        let dev = nb_unit_deviance(y, mu, phi);
        let diff = 2.0 * (nb_log_likelihood(y, y, phi) - nb_log_likelihood(y, mu, phi));
        assert!((dev - diff).abs() < 1e-6);
    }
}
