//! tumor_dge: differential expression between tumor and normal samples
//!
//! Two analyses are provided:
//!
//! - microarray series from GEO: sample selection by indicator string,
//!   automatic log2 transform, linear model with empirical Bayes moderated
//!   t statistics ([`run_microarray`]);
//! - RNA-seq count tables from patient-matched tumor/normal pairs: expression
//!   filter, TMM normalization, negative binomial GLM with empirically
//!   shrunk dispersions, likelihood ratio test and GO enrichment
//!   ([`run_rnaseq`]).
//!
//! # Example
//!
//! ```ignore
//! use tumor_dge::prelude::*;
//!
//! let config = RnaSeqConfig::new("counts.txt".into(), "de.csv".into());
//! let report = run_rnaseq(&config)?;
//! println!("{}", report.summary.decide);
//! ```

pub mod cli;
pub mod data;
pub mod design;
pub mod dispersion;
pub mod enrichment;
pub mod error;
pub mod filter;
pub mod glm;
pub mod io;
pub mod linear;
pub mod normalization;
pub mod pipeline;
pub mod special;
pub mod stats;
pub mod testing;

pub use pipeline::{run_microarray, run_rnaseq, MicroarrayConfig, RnaSeqConfig, SeriesSource};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::data::{CountMatrix, DGEList, ExpressionMatrix, GeneAnnotation, SampleIndicator, SampleSheet, Tissue};
    pub use crate::design::{group_means_design, make_contrast, paired_design, DesignMatrix};
    pub use crate::dispersion::{estimate_disp, DispersionParams};
    pub use crate::enrichment::{goana, top_go, GoAnnotation, GoSort, GoanaParams, Ontology};
    pub use crate::error::{DgeError, Result};
    pub use crate::filter::{annotate_genes, filter_by_expr, filter_genes, FilterMethod, FilterParams};
    pub use crate::glm::{glm_fit, GlmFit, GlmFitParams};
    pub use crate::io::{read_count_table, read_series_matrix, CountTableLayout, GeoClient, RunSummary};
    pub use crate::linear::{contrasts_fit, ebayes, lm_fit, top_table, EbayesParams, TableSort};
    pub use crate::normalization::{auto_log2, calc_norm_factors, cpm, normalize_quantiles, NormMethod};
    pub use crate::pipeline::{
        run_microarray, run_rnaseq, MicroarrayConfig, MicroarrayReport, RnaSeqConfig, RnaSeqReport, SeriesSource,
    };
    pub use crate::testing::{benjamini_hochberg, decide_tests, glm_lrt, p_adjust, top_tags, AdjustMethod, TagSort};
}
