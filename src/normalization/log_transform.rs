//! Data-driven log2 transform decision for microarray intensities

use serde::Serialize;

use crate::data::ExpressionMatrix;
use crate::stats::quantiles;

/// Probabilities at which the intensity distribution is inspected
pub const LOG_CHECK_PROBS: [f64; 6] = [0.0, 0.25, 0.5, 0.75, 0.99, 1.0];

/// Quantiles inspected and whether the data were judged to be on the raw scale
#[derive(Debug, Clone, Serialize)]
pub struct LogDecision {
    pub quantiles: Vec<f64>,
    pub log_transform: bool,
}

/// Raw-scale intensities have a large upper tail (99th percentile above
/// 100) or a wide positive range (span above 50 with a positive lower
/// quartile). Unlogged ratios sit in a narrow positive band: lower quartile
/// in (0, 1) and upper quartile in (1, 2). Already logged data fail all
/// three tests.
pub fn needs_log_transform(q: &[f64]) -> bool {
    if q.len() != LOG_CHECK_PROBS.len() || q.iter().any(|v| v.is_nan()) {
        return false;
    }
    q[4] > 100.0
        || (q[5] - q[0] > 50.0 && q[1] > 0.0)
        || (q[1] > 0.0 && q[1] < 1.0 && q[3] > 1.0 && q[3] < 2.0)
}

/// Inspect quantiles and log2-transform in place when needed. Non-positive
/// values become missing before taking logs.
pub fn auto_log2(expr: &mut ExpressionMatrix) -> LogDecision {
    let q = quantiles(&expr.finite_values(), &LOG_CHECK_PROBS);
    let log_transform = needs_log_transform(&q);

    log::info!(
        "Intensity quantiles (0, .25, .5, .75, .99, 1): {:?}",
        q.iter().map(|v| (v * 1000.0).round() / 1000.0).collect::<Vec<_>>()
    );

    if log_transform {
        log::info!("Values look like raw intensities; applying log2");
        expr.map_inplace(|v| if v > 0.0 { v.log2() } else { f64::NAN });
    } else {
        log::info!("Values look log-transformed already; leaving unchanged");
    }

    LogDecision {
        quantiles: q,
        log_transform,
    }
}
