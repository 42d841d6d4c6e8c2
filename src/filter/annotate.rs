//! Gene re-annotation: drop unmapped accessions and collapse duplicated symbols

use std::collections::HashMap;

use crate::data::DGEList;
use crate::error::{DgeError, Result};
use crate::io::GeneMap;

/// Annotation column holding the mapped gene identifier
pub const GENE_ID_COLUMN: &str = "GeneID";
/// Annotation column holding the mapped gene symbol
pub const SYMBOL_COLUMN: &str = "Symbol";

/// Keep genes whose accession is in `map`, keep the most highly counted row
/// of each symbol, and rename rows to the mapped gene ids.
pub fn annotate_genes(y: &DGEList, map: &GeneMap) -> Result<DGEList> {
    let accessions = y.counts().gene_ids();
    let mapped: Vec<(usize, &str, &str)> = accessions
        .iter()
        .enumerate()
        .filter_map(|(i, acc)| map.lookup(acc).map(|(g, s)| (i, g, s)))
        .collect();

    if mapped.is_empty() {
        return Err(DgeError::EmptyData {
            reason: "no gene identifiers matched the gene map".to_string(),
        });
    }
    log::info!(
        "Gene map matched {} of {} genes; {} unmapped dropped",
        mapped.len(),
        accessions.len(),
        accessions.len() - mapped.len()
    );

    // One row per symbol (gene id when the symbol is blank): the highest total count wins
    let totals = y.counts().row_sums();
    let mut best: HashMap<&str, usize> = HashMap::new();
    for (pos, &(i, gene_id, symbol)) in mapped.iter().enumerate() {
        let key = if symbol.is_empty() { gene_id } else { symbol };
        best.entry(key)
            .and_modify(|b| {
                if totals[i] > totals[mapped[*b].0] {
                    *b = pos;
                }
            })
            .or_insert(pos);
    }
    let mut chosen: Vec<usize> = best.into_values().collect();
    chosen.sort_unstable();

    let n_dup = mapped.len() - chosen.len();
    if n_dup > 0 {
        log::info!("Collapsed {} rows with duplicated symbols", n_dup);
    }

    let rows: Vec<usize> = chosen.iter().map(|&pos| mapped[pos].0).collect();
    let mut out = y.subset_genes(&rows, true)?;

    let mut genes = out.genes().clone();
    let gene_ids: Vec<String> = chosen.iter().map(|&pos| mapped[pos].1.to_string()).collect();
    let symbols: Vec<String> = chosen.iter().map(|&pos| mapped[pos].2.to_string()).collect();
    genes.add_column(GENE_ID_COLUMN, gene_ids.clone())?;
    genes.add_column(SYMBOL_COLUMN, symbols)?;
    out.set_genes(gene_ids, genes)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CountMatrix, GeneAnnotation};
    use ndarray::array;

    #[test]
    fn test_annotate_genes() {
        let ids: Vec<String> = ["NM_1", "NM_2", "NM_3", "NR_9"].iter().map(|s| s.to_string()).collect();
        let counts = CountMatrix::new(
            array![[5.0, 5.0], [50.0, 40.0], [7.0, 1.0], [3.0, 3.0]],
            ids.clone(),
            vec!["1N".into(), "1T".into()],
        )
        .unwrap();
        let mut genes = GeneAnnotation::new(4);
        genes.add_column("RefSeqID", ids).unwrap();
        let y = DGEList::new(counts, genes).unwrap();

        let mut map = GeneMap::default();
        map.insert("NM_1", "7157", "TP53");
        map.insert("NM_2", "7157", "TP53");
        map.insert("NM_3", "1956", "EGFR");

        let out = annotate_genes(&y, &map).unwrap();
        assert_eq!(out.counts().gene_ids(), &["7157".to_string(), "1956".to_string()]);
        // the NM_2 isoform has the larger total
        assert_eq!(out.genes().value("RefSeqID", 0), "NM_2");
        assert_eq!(out.genes().value(SYMBOL_COLUMN, 1), "EGFR");
        // library sizes still count the dropped rows
        assert_eq!(out.lib_sizes(), y.lib_sizes());
    }

    #[test]
    fn test_no_matches() {
        let counts = CountMatrix::new(array![[1.0]], vec!["x".into()], vec!["s".into()]).unwrap();
        let y = DGEList::new(counts, GeneAnnotation::new(1)).unwrap();
        assert!(annotate_genes(&y, &GeneMap::default()).is_err());
    }
}
