//! P-value adjustment for multiple testing

use std::fmt;
use std::str::FromStr;

use crate::error::{DgeError, Result};

/// Multiple testing adjustment method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustMethod {
    /// Benjamini-Hochberg false discovery rate
    BenjaminiHochberg,
    /// Bonferroni family-wise error rate
    Bonferroni,
    /// No adjustment
    None,
}

impl FromStr for AdjustMethod {
    type Err = DgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bh" | "fdr" => Ok(AdjustMethod::BenjaminiHochberg),
            "bonferroni" => Ok(AdjustMethod::Bonferroni),
            "none" => Ok(AdjustMethod::None),
            other => Err(DgeError::InvalidInput {
                reason: format!("unknown adjustment method '{}' (BH, bonferroni, none)", other),
            }),
        }
    }
}

impl fmt::Display for AdjustMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdjustMethod::BenjaminiHochberg => write!(f, "BH"),
            AdjustMethod::Bonferroni => write!(f, "bonferroni"),
            AdjustMethod::None => write!(f, "none"),
        }
    }
}

/// Adjust `pvalues` with `method`; missing p-values stay missing
pub fn p_adjust(pvalues: &[f64], method: AdjustMethod) -> Vec<f64> {
    match method {
        AdjustMethod::BenjaminiHochberg => benjamini_hochberg(pvalues),
        AdjustMethod::Bonferroni => bonferroni(pvalues),
        AdjustMethod::None => pvalues.to_vec(),
    }
}

/// Benjamini-Hochberg adjusted p-values (q-values)
pub fn benjamini_hochberg(pvalues: &[f64]) -> Vec<f64> {
    let n = pvalues.len();
    if n == 0 {
        return vec![];
    }

    let mut indices: Vec<usize> = (0..n).collect();
    // NaN sorts last
    indices.sort_by(|&a, &b| {
        let pa = pvalues[a];
        let pb = pvalues[b];
        match (pa.is_nan(), pb.is_nan()) {
            (true, true) => std::cmp::Ordering::Equal,
            (true, false) => std::cmp::Ordering::Greater,
            (false, true) => std::cmp::Ordering::Less,
            _ => pa.total_cmp(&pb),
        }
    });

    let m = pvalues.iter().filter(|p| p.is_finite()).count();
    if m == 0 {
        return vec![f64::NAN; n];
    }

    let mut padj = vec![f64::NAN; n];
    let mut cummin = f64::INFINITY;
    let mut rank = m;

    for &i in indices.iter().rev() {
        let p = pvalues[i];
        if p.is_finite() {
            let adj = (p * m as f64 / rank as f64).min(1.0);
            cummin = cummin.min(adj);
            padj[i] = cummin;
            rank -= 1;
        }
    }

    padj
}

/// Bonferroni adjusted p-values
pub fn bonferroni(pvalues: &[f64]) -> Vec<f64> {
    let m = pvalues.iter().filter(|p| p.is_finite()).count();
    if m == 0 {
        return vec![f64::NAN; pvalues.len()];
    }
    pvalues
        .iter()
        .map(|&p| if p.is_nan() { f64::NAN } else { (p * m as f64).min(1.0) })
        .collect()
}
