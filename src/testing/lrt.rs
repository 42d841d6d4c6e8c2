//! Likelihood ratio test of one GLM coefficient
//!
//! The null model drops the tested coefficient from the design and is refit
//! with the same dispersions. The statistic is the deviance difference,
//! referred to a chi-square distribution on one degree of freedom.

use super::pvalue::pvalue_chisq;
use crate::data::{DGEList, GeneAnnotation};
use crate::error::{DgeError, Result};
use crate::glm::{glm_fit, GlmFit, GlmFitParams};
use crate::normalization::ave_log_cpm;

/// Per-gene results of a likelihood ratio test
#[derive(Debug, Clone)]
pub struct LrtResult {
    /// Name of the tested coefficient
    pub coef_name: String,
    pub gene_ids: Vec<String>,
    pub genes: GeneAnnotation,
    /// log2 fold change of the tested coefficient
    pub log_fc: Vec<f64>,
    /// Average log2 counts per million
    pub log_cpm: Vec<f64>,
    /// Likelihood ratio statistic
    pub lr: Vec<f64>,
    pub p_value: Vec<f64>,
    /// Degrees of freedom of the test
    pub df: usize,
}

impl LrtResult {
    pub fn n_genes(&self) -> usize {
        self.gene_ids.len()
    }
}

/// Test coefficient `coef` of `fit` by refitting without it
pub fn glm_lrt(y: &DGEList, fit: &GlmFit, coef: usize, params: &GlmFitParams) -> Result<LrtResult> {
    if fit.coefficients.nrows() != y.n_genes() {
        return Err(DgeError::DimensionMismatch {
            expected: format!("fit with {} genes", y.n_genes()),
            got: format!("{} genes", fit.coefficients.nrows()),
        });
    }
    let null_design = fit.design.drop_coef(coef)?;
    let coef_name = fit.design.coef_names()[coef].clone();
    log::info!("Likelihood ratio test of coefficient '{}'", coef_name);

    let null_fit = glm_fit(y, &null_design, &fit.dispersion, params)?;

    let lr: Vec<f64> = null_fit
        .deviance
        .iter()
        .zip(&fit.deviance)
        .map(|(d0, d1)| (d0 - d1).max(0.0))
        .collect();
    let df = 1;
    let p_value: Vec<f64> = lr.iter().map(|&s| pvalue_chisq(s, df as f64)).collect();
    let log_fc: Vec<f64> = fit
        .coefficients
        .column(coef)
        .iter()
        .map(|b| b / std::f64::consts::LN_2)
        .collect();

    let log_cpm = match y.ave_log_cpm() {
        Some(a) => a.to_vec(),
        None => ave_log_cpm(y),
    };

    Ok(LrtResult {
        coef_name,
        gene_ids: y.counts().gene_ids().to_vec(),
        genes: y.genes().clone(),
        log_fc,
        log_cpm,
        lr,
        p_value,
        df,
    })
}
