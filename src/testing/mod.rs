//! Statistical testing for differential expression

mod decide;
mod fdr;
mod lrt;
mod pvalue;
mod toptags;

pub use decide::{decide_tests, DecideSummary, Decision};
pub use fdr::{benjamini_hochberg, bonferroni, p_adjust, AdjustMethod};
pub use lrt::{glm_lrt, LrtResult};
pub use pvalue::{pvalue_chisq, pvalue_normal, pvalue_t};
pub use toptags::{top_tags, TagSort, TopTags, TopTagsRow};
