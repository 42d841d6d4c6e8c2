//! Normalization of microarray intensities and RNA-seq counts

mod cpm;
mod log_transform;
mod norm_factors;
mod quantile;

pub use cpm::{ave_log_cpm, ave_log_cpm_matrix, cpm, cpm_matrix, log_cpm_matrix, AVE_LOG_CPM_DISPERSION, DEFAULT_PRIOR_COUNT};
pub use log_transform::{auto_log2, needs_log_transform, LogDecision, LOG_CHECK_PROBS};
pub use norm_factors::{calc_norm_factors, norm_factors, NormMethod, TmmParams};
pub use quantile::normalize_quantiles;
