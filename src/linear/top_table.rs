//! Ranked gene table from moderated statistics

use std::str::FromStr;

use serde::Serialize;

use super::ebayes::EbayesFit;
use crate::error::{DgeError, Result};
use crate::stats::cmp_f64;
use crate::testing::{decide_tests, p_adjust, AdjustMethod, DecideSummary};

/// Annotation columns carried into the table
pub const SYMBOL_COLUMN: &str = "Gene.symbol";
pub const TITLE_COLUMN: &str = "Gene.title";

/// Ordering of the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableSort {
    /// Log-odds, largest first
    B,
    P,
    LogFc,
    T,
    None,
}

impl FromStr for TableSort {
    type Err = DgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "b" => Ok(TableSort::B),
            "p" | "pvalue" => Ok(TableSort::P),
            "logfc" => Ok(TableSort::LogFc),
            "t" => Ok(TableSort::T),
            "none" => Ok(TableSort::None),
            other => Err(DgeError::InvalidInput {
                reason: format!("unknown sort order '{}' (B, P, logFC, t, none)", other),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TopTableRow {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "adj.P.Val")]
    pub adj_p_value: f64,
    #[serde(rename = "P.Value")]
    pub p_value: f64,
    pub t: f64,
    #[serde(rename = "B")]
    pub b: f64,
    #[serde(rename = "logFC")]
    pub log_fc: f64,
    #[serde(rename = "Gene.symbol")]
    pub gene_symbol: String,
    #[serde(rename = "Gene.title")]
    pub gene_title: String,
}

/// Top genes for coefficient `coef`; p-values are adjusted over all genes
/// before the table is cut to `number` rows
pub fn top_table(
    eb: &EbayesFit,
    coef: usize,
    number: Option<usize>,
    sort_by: TableSort,
    adjust: AdjustMethod,
) -> Result<Vec<TopTableRow>> {
    let fit = &eb.fit;
    if coef >= fit.n_coefs() {
        return Err(DgeError::InvalidInput {
            reason: format!("coefficient {} out of range for {} coefficients", coef, fit.n_coefs()),
        });
    }

    let p_value = eb.p_value.column(coef).to_vec();
    let adj = p_adjust(&p_value, adjust);
    let log_fc = fit.coefficients.column(coef);
    let t = eb.t.column(coef);
    let b = eb.lods.column(coef);

    let mut order: Vec<usize> = (0..fit.n_genes()).collect();
    match sort_by {
        TableSort::B => order.sort_by(|&i, &j| cmp_f64(&-b[i], &-b[j])),
        TableSort::P => order.sort_by(|&i, &j| cmp_f64(&p_value[i], &p_value[j])),
        TableSort::LogFc => order.sort_by(|&i, &j| cmp_f64(&-log_fc[i].abs(), &-log_fc[j].abs())),
        TableSort::T => order.sort_by(|&i, &j| cmp_f64(&-t[i].abs(), &-t[j].abs())),
        TableSort::None => {}
    }
    order.truncate(number.unwrap_or(usize::MAX));

    let annotation = |name: &str, g: usize| -> String {
        fit.genes.column(name).map(|c| c[g].clone()).unwrap_or_default()
    };

    Ok(order
        .into_iter()
        .map(|g| TopTableRow {
            id: fit.feature_ids[g].clone(),
            adj_p_value: adj[g],
            p_value: p_value[g],
            t: t[g],
            b: b[g],
            log_fc: log_fc[g],
            gene_symbol: annotation(SYMBOL_COLUMN, g),
            gene_title: annotation(TITLE_COLUMN, g),
        })
        .collect())
}

/// Up/Down/NotSig counts for coefficient `coef` at adjusted p-value `p_value`
pub fn decide_fit(eb: &EbayesFit, coef: usize, adjust: AdjustMethod, p_value: f64) -> DecideSummary {
    let adj = p_adjust(&eb.p_value.column(coef).to_vec(), adjust);
    let effects = eb.fit.coefficients.column(coef).to_vec();
    DecideSummary::from_decisions(&decide_tests(&adj, &effects, p_value), p_value)
}
