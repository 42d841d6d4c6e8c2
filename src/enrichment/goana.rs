//! Over-representation of GO terms among up- and down-regulated genes
//!
//! For each term, the number of annotated DE genes is compared with the
//! hypergeometric distribution over the universe of tested, annotated genes.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use statrs::distribution::{DiscreteCDF, Hypergeometric};

use super::annotation::{GoAnnotation, Ontology};
use crate::error::{DgeError, Result};
use crate::stats::cmp_f64;
use crate::testing::{decide_tests, Decision};

/// Configurable parameters for GO enrichment
#[derive(Debug, Clone)]
pub struct GoanaParams {
    /// FDR cutoff defining the DE gene sets
    pub fdr: f64,
}

impl Default for GoanaParams {
    fn default() -> Self {
        Self { fdr: 0.05 }
    }
}

/// Enrichment of one GO term
#[derive(Debug, Clone, Serialize)]
pub struct GoRow {
    #[serde(rename = "GO")]
    pub go_id: String,
    #[serde(rename = "Term")]
    pub term: String,
    #[serde(rename = "Ont")]
    pub ontology: String,
    /// Annotated genes in the universe
    #[serde(rename = "N")]
    pub n: u64,
    #[serde(rename = "Up")]
    pub up: u64,
    #[serde(rename = "Down")]
    pub down: u64,
    #[serde(rename = "P.Up")]
    pub p_up: f64,
    #[serde(rename = "P.Down")]
    pub p_down: f64,
}

/// P(X >= observed) for X hypergeometric
fn upper_tail(universe: u64, annotated: u64, drawn: u64, observed: u64) -> Result<f64> {
    if observed == 0 {
        return Ok(1.0);
    }
    let hyper = Hypergeometric::new(universe, annotated, drawn).map_err(|e| DgeError::InvalidInput {
        reason: format!(
            "hypergeometric with population {}, successes {}, draws {}: {}",
            universe, annotated, drawn, e
        ),
    })?;
    Ok(hyper.sf(observed - 1))
}

/// Test every GO term for over-representation among the up- and
/// down-regulated genes (FDR below `params.fdr`, split by the sign of logFC)
pub fn goana(
    gene_ids: &[String],
    fdr: &[f64],
    log_fc: &[f64],
    go: &GoAnnotation,
    params: &GoanaParams,
) -> Result<Vec<GoRow>> {
    if gene_ids.len() != fdr.len() || gene_ids.len() != log_fc.len() {
        return Err(DgeError::DimensionMismatch {
            expected: format!("{} FDR values and fold changes", gene_ids.len()),
            got: format!("{} and {}", fdr.len(), log_fc.len()),
        });
    }

    let decisions = decide_tests(fdr, log_fc, params.fdr);
    let mut seen = HashSet::new();
    let mut universe = Vec::new();
    for (id, decision) in gene_ids.iter().zip(&decisions) {
        if let Some(terms) = go.terms_of(id) {
            if seen.insert(id.as_str()) {
                universe.push((terms, *decision));
            }
        }
    }
    if universe.is_empty() {
        return Err(DgeError::EmptyData {
            reason: "no tested gene has a GO annotation".to_string(),
        });
    }

    let n_universe = universe.len() as u64;
    let n_up = universe.iter().filter(|(_, d)| *d == Decision::Up).count() as u64;
    let n_down = universe.iter().filter(|(_, d)| *d == Decision::Down).count() as u64;
    log::info!(
        "GO universe: {} genes ({} up, {} down at FDR < {})",
        n_universe,
        n_up,
        n_down,
        params.fdr
    );

    let mut counts: HashMap<&str, (u64, u64, u64)> = HashMap::new();
    for (terms, decision) in &universe {
        for go_id in terms.iter() {
            let entry = counts.entry(go_id.as_str()).or_insert((0, 0, 0));
            entry.0 += 1;
            match decision {
                Decision::Up => entry.1 += 1,
                Decision::Down => entry.2 += 1,
                Decision::NotSig => {}
            }
        }
    }

    let mut ids: Vec<&str> = counts.keys().copied().collect();
    ids.sort_unstable();
    ids.into_iter()
        .map(|go_id| {
            let (n, up, down) = counts[go_id];
            let (ontology, term) = go
                .term(go_id)
                .map(|t| (t.ontology.to_string(), t.name.clone()))
                .unwrap_or_default();
            Ok(GoRow {
                go_id: go_id.to_string(),
                term,
                ontology,
                n,
                up,
                down,
                p_up: upper_tail(n_universe, n, n_up, up)?,
                p_down: upper_tail(n_universe, n, n_down, down)?,
            })
        })
        .collect()
}

/// Which p-value orders the GO table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoSort {
    Up,
    Down,
    /// Smaller of the two
    Either,
}

impl std::str::FromStr for GoSort {
    type Err = DgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(GoSort::Up),
            "down" => Ok(GoSort::Down),
            "either" | "min" => Ok(GoSort::Either),
            other => Err(DgeError::InvalidInput {
                reason: format!("unknown GO sort '{}' (up, down, either)", other),
            }),
        }
    }
}

/// Most significant terms: optionally restricted to one ontology, sorted by
/// p-value (larger N first on ties), term names cut to `truncate_term` chars
pub fn top_go(
    rows: &[GoRow],
    ontology: Option<Ontology>,
    sort: GoSort,
    number: usize,
    truncate_term: Option<usize>,
) -> Vec<GoRow> {
    let wanted = ontology.map(|o| o.to_string());
    let mut selected: Vec<GoRow> = rows
        .iter()
        .filter(|r| wanted.as_ref().map_or(true, |o| &r.ontology == o))
        .cloned()
        .collect();

    let key = |r: &GoRow| match sort {
        GoSort::Up => r.p_up,
        GoSort::Down => r.p_down,
        GoSort::Either => r.p_up.min(r.p_down),
    };
    selected.sort_by(|a, b| cmp_f64(&key(a), &key(b)).then(b.n.cmp(&a.n)));
    selected.truncate(number);

    if let Some(width) = truncate_term {
        for row in selected.iter_mut() {
            if row.term.chars().count() > width {
                row.term = row.term.chars().take(width.saturating_sub(3)).collect::<String>() + "...";
            }
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (Vec<String>, Vec<f64>, Vec<f64>, GoAnnotation) {
        let ids: Vec<String> = (1..=10).map(|i| i.to_string()).collect();
        // genes 1-3 up, 4 down, rest not significant
        let fdr = vec![0.001, 0.01, 0.02, 0.001, 0.5, 0.6, 0.7, 0.8, 0.9, 0.95];
        let lfc = vec![2.0, 1.5, 3.0, -2.0, 0.1, -0.1, 0.2, 0.0, 0.3, -0.2];
        let mut go = GoAnnotation::new();
        for g in ["1", "2", "3", "5"] {
            go.insert(g, "GO:0000001", Ontology::BiologicalProcess, "cell cycle");
        }
        for g in ["4", "6", "7", "8", "9", "10"] {
            go.insert(g, "GO:0000002", Ontology::MolecularFunction, "kinase activity");
        }
        (ids, fdr, lfc, go)
    }

    #[test]
    fn test_goana_counts_and_pvalues() {
        let (ids, fdr, lfc, go) = fixture();
        let rows = goana(&ids, &fdr, &lfc, &go, &GoanaParams::default()).unwrap();
        assert_eq!(rows.len(), 2);

        let cycle = &rows[0];
        assert_eq!(cycle.go_id, "GO:0000001");
        assert_eq!((cycle.n, cycle.up, cycle.down), (4, 3, 0));
        // choose(4,3) * choose(6,0) / choose(10,3)
        assert!((cycle.p_up - 4.0 / 120.0).abs() < 1e-9);
        assert_eq!(cycle.p_down, 1.0);

        let kin = &rows[1];
        assert_eq!((kin.n, kin.up, kin.down), (6, 0, 1));
        assert!((kin.p_down - 0.6).abs() < 1e-9);
        assert_eq!(kin.ontology, "MF");
    }

    #[test]
    fn test_goana_requires_annotated_universe() {
        let ids = vec!["x".to_string()];
        let go = GoAnnotation::new();
        assert!(goana(&ids, &[0.01], &[1.0], &go, &GoanaParams::default()).is_err());
    }

    #[test]
    fn test_top_go_filter_sort_truncate() {
        let (ids, fdr, lfc, go) = fixture();
        let rows = goana(&ids, &fdr, &lfc, &go, &GoanaParams::default()).unwrap();

        let top = top_go(&rows, None, GoSort::Down, 10, None);
        assert_eq!(top[0].go_id, "GO:0000002");

        let bp = top_go(&rows, Some(Ontology::BiologicalProcess), GoSort::Up, 10, Some(6));
        assert_eq!(bp.len(), 1);
        assert_eq!(bp[0].term, "cel...");
    }
}
