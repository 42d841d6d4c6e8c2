//! Ranked table of likelihood ratio test results

use std::str::FromStr;

use super::fdr::{p_adjust, AdjustMethod};
use super::lrt::LrtResult;
use crate::error::{DgeError, Result};
use crate::stats::cmp_f64;

/// Ordering of the ranked table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagSort {
    PValue,
    LogFc,
    None,
}

impl FromStr for TagSort {
    type Err = DgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pvalue" | "p" => Ok(TagSort::PValue),
            "logfc" => Ok(TagSort::LogFc),
            "none" => Ok(TagSort::None),
            other => Err(DgeError::InvalidInput {
                reason: format!("unknown sort order '{}' (PValue, logFC, none)", other),
            }),
        }
    }
}

/// One gene of the ranked table
#[derive(Debug, Clone)]
pub struct TopTagsRow {
    pub gene_id: String,
    /// Annotation values in the order of `TopTags::annotation_columns`
    pub annotation: Vec<String>,
    pub log_fc: f64,
    pub log_cpm: f64,
    pub lr: f64,
    pub p_value: f64,
    pub fdr: f64,
}

#[derive(Debug, Clone)]
pub struct TopTags {
    pub coef_name: String,
    pub adjust: AdjustMethod,
    pub annotation_columns: Vec<String>,
    pub rows: Vec<TopTagsRow>,
}

/// Adjust p-values over all genes, sort, and keep the first `n` rows
pub fn top_tags(res: &LrtResult, n: Option<usize>, sort_by: TagSort, adjust: AdjustMethod) -> TopTags {
    let fdr = p_adjust(&res.p_value, adjust);

    let mut order: Vec<usize> = (0..res.n_genes()).collect();
    match sort_by {
        TagSort::PValue => order.sort_by(|&a, &b| cmp_f64(&res.p_value[a], &res.p_value[b])),
        TagSort::LogFc => order.sort_by(|&a, &b| cmp_f64(&res.log_fc[b].abs(), &res.log_fc[a].abs())),
        TagSort::None => {}
    }
    order.truncate(n.unwrap_or(usize::MAX));

    let mut annotation_columns: Vec<String> = res.genes.column_names().iter().map(|c| c.to_string()).collect();
    let use_ids = annotation_columns.is_empty();
    if use_ids {
        annotation_columns.push("GeneID".to_string());
    }

    let rows = order
        .into_iter()
        .map(|i| TopTagsRow {
            gene_id: res.gene_ids[i].clone(),
            annotation: if use_ids {
                vec![res.gene_ids[i].clone()]
            } else {
                res.genes.row(i).into_iter().map(str::to_string).collect()
            },
            log_fc: res.log_fc[i],
            log_cpm: res.log_cpm[i],
            lr: res.lr[i],
            p_value: res.p_value[i],
            fdr: fdr[i],
        })
        .collect();

    TopTags {
        coef_name: res.coef_name.clone(),
        adjust,
        annotation_columns,
        rows,
    }
}
