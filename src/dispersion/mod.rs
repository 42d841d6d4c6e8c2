//! Dispersion estimation for negative binomial models

mod common;
mod tagwise;
mod trend;

pub use common::{common_dispersion_of, estimate_common_dispersion};
pub use tagwise::estimate_tagwise_dispersion;
pub use trend::estimate_trended_dispersion;

use crate::data::DGEList;
use crate::design::DesignMatrix;
use crate::error::{DgeError, Result};
use crate::glm::GlmFitParams;
use crate::normalization::ave_log_cpm;

/// Configurable parameters for dispersion estimation
#[derive(Debug, Clone)]
pub struct DispersionParams {
    /// Search interval for common and binned dispersions
    pub interval: (f64, f64),
    /// Tolerance of the golden section search on log dispersion
    pub tol: f64,
    /// Minimum number of genes per trend bin
    pub min_bin_size: usize,
    pub max_bins: usize,
    /// Points in the tagwise likelihood grid
    pub grid_length: usize,
    /// Grid spans +/- this many log2 units around the trend
    pub grid_range: f64,
    /// Prior degrees of freedom weighting the smoothed likelihood
    pub prior_df: f64,
    /// Smoothing span as a fraction of genes; chosen from the gene count when `None`
    pub span: Option<f64>,
    pub glm: GlmFitParams,
}

impl Default for DispersionParams {
    fn default() -> Self {
        Self {
            interval: (1e-4, 4.0),
            tol: 1e-5,
            min_bin_size: 400,
            max_bins: 50,
            grid_length: 11,
            grid_range: 10.0,
            prior_df: 10.0,
            span: None,
            glm: GlmFitParams::default(),
        }
    }
}

/// Estimate common, trended and tagwise dispersions and store them in `y`
pub fn estimate_disp(y: &mut DGEList, design: &DesignMatrix, params: &DispersionParams) -> Result<()> {
    if design.n_samples() != y.n_samples() {
        return Err(DgeError::DimensionMismatch {
            expected: format!("design with {} rows", y.n_samples()),
            got: format!("{} rows", design.n_samples()),
        });
    }
    if design.df_residual() == 0 {
        return Err(DgeError::DispersionEstimationFailed {
            reason: "design has as many coefficients as samples; no replicates for dispersion estimation".to_string(),
        });
    }

    let offsets: Vec<f64> = y.effective_lib_sizes().iter().map(|l| l.ln()).collect();
    let ave = ave_log_cpm(y);
    let counts = y.counts().counts().to_owned();
    let x = design.matrix();

    let common = estimate_common_dispersion(counts.view(), x, &offsets, params);
    log::info!("Common dispersion: {:.5} (BCV {:.4})", common, common.sqrt());

    let trended = estimate_trended_dispersion(counts.view(), x, &offsets, &ave, params);
    let tagwise = estimate_tagwise_dispersion(counts.view(), x, &offsets, &ave, &trended, params)?;
    log::info!(
        "Tagwise dispersions estimated for {} genes (prior df {})",
        tagwise.len(),
        params.prior_df
    );

    y.set_ave_log_cpm(ave)?;
    y.set_common_dispersion(common);
    y.set_trended_dispersion(trended)?;
    y.set_tagwise_dispersion(tagwise)?;
    Ok(())
}
