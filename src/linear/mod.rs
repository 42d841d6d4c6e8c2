//! Linear models with empirical Bayes moderated statistics for log-expression data

mod ebayes;
mod lm_fit;
mod top_table;

pub use ebayes::{ebayes, fit_f_dist, squeeze_var, tmixture, EbayesFit, VariancePrior};
pub use lm_fit::{contrasts_fit, lm_fit, LinearFit};
pub use top_table::{decide_fit, top_table, TableSort, TopTableRow, SYMBOL_COLUMN, TITLE_COLUMN};

/// Configurable parameters for the moderated t analysis
#[derive(Debug, Clone)]
pub struct EbayesParams {
    /// Assumed proportion of differentially expressed genes
    pub proportion: f64,
    /// Bounds on the prior standard deviation of non-zero coefficients,
    /// relative to the prior residual standard deviation
    pub stdev_coef_lim: (f64, f64),
}

impl Default for EbayesParams {
    fn default() -> Self {
        Self {
            proportion: 0.01,
            stdev_coef_lim: (0.1, 4.0),
        }
    }
}
