//! JSON summary of a run

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::normalization::LogDecision;
use crate::testing::DecideSummary;

/// Moderated-variance prior of the linear model analysis
#[derive(Debug, Clone, Serialize)]
pub struct PriorSummary {
    pub s2_prior: f64,
    /// `null` when infinite
    pub df_prior: f64,
}

/// What a run did and what it found
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub analysis: String,
    pub input: String,
    pub features_in: usize,
    pub features_tested: usize,
    pub samples: Vec<String>,
    pub groups: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_transform: Option<LogDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prior: Option<PriorSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub norm_factors: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common_dispersion: Option<f64>,
    pub decide: DecideSummary,
    pub outputs: Vec<String>,
}

pub fn write_summary<P: AsRef<Path>>(path: P, summary: &RunSummary) -> Result<()> {
    let file = std::fs::File::create(path.as_ref())?;
    let mut writer = std::io::BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, summary)?;
    writer.flush()?;
    log::info!("Wrote run summary to {}", path.as_ref().display());
    Ok(())
}
