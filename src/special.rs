//! Polygamma helpers not provided by statrs

pub use statrs::function::gamma::{digamma, ln_gamma};

/// Trigamma function psi'(x) for x > 0 (reflection below 0.5)
pub fn trigamma(x: f64) -> f64 {
    if x < 0.5 {
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).powi(2) - trigamma(1.0 - x);
    }

    let mut acc = 0.0;
    let mut z = x;
    while z < 8.0 {
        acc += 1.0 / (z * z);
        z += 1.0;
    }

    let z2 = z * z;
    let inv = 1.0 / z;
    let inv2 = 1.0 / z2;
    // Asymptotic series in 1/z
    acc + inv
        + 0.5 * inv2
        + inv * inv2 * (1.0 / 6.0 - inv2 * (1.0 / 30.0 - inv2 * (1.0 / 42.0 - inv2 / 30.0)))
}

/// Tetragamma function psi''(x) for x > 0
pub fn tetragamma(x: f64) -> f64 {
    let mut acc = 0.0;
    let mut z = x;
    while z < 8.0 {
        acc -= 2.0 / (z * z * z);
        z += 1.0;
    }

    let inv2 = 1.0 / (z * z);
    let inv3 = inv2 / z;
    acc - inv2
        - inv3
        - 0.5 * inv2 * inv2
        + inv3 * inv3 * (1.0 / 6.0 - inv2 * (1.0 / 6.0 - inv2 * 3.0 / 10.0))
}

/// Inverse of the trigamma function by Newton iteration on 1/trigamma,
/// the approach used for moment-matching scaled F priors.
pub fn trigamma_inverse(x: f64) -> f64 {
    if !x.is_finite() || x <= 0.0 {
        return f64::NAN;
    }
    if x > 1e7 {
        return 1.0 / x.sqrt();
    }
    if x < 1e-6 {
        return 1.0 / x;
    }

    let mut y = 0.5 + 1.0 / x;
    for _ in 0..50 {
        let tri = trigamma(y);
        let dif = tri * (1.0 - tri / x) / tetragamma(y);
        y += dif;
        if -dif / y < 1e-8 {
            return y;
        }
    }
    log::warn!("trigamma_inverse: iteration limit exceeded for x = {}", x);
    y
}
