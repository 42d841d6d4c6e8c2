//! Generalized Linear Model fitting for negative binomial data

mod fitting;
mod negative_binomial;
mod profile;

pub use fitting::{fit_gene, fit_one_group, glm_fit, GeneFit, GlmFit, GlmFitParams};
pub use negative_binomial::{nb_deviance, nb_log_likelihood, nb_mean, nb_unit_deviance, nb_variance, nb_weight, MAX_ETA};
pub use profile::{adjusted_profile_loglik, cox_reid_adjustment};
