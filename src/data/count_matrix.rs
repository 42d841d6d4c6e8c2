//! Count matrix representation for RNA-seq data

use std::collections::HashMap;

use ndarray::{Array2, ArrayView2, Axis};

use crate::error::{DgeError, Result};

/// Make gene identifiers unique by appending `.1`, `.2`, ... to repeats
fn make_unique(names: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for name in &names {
        *seen.entry(name.clone()).or_insert(0) += 1;
    }
    if seen.values().all(|&c| c == 1) {
        return names;
    }

    seen.clear();
    names
        .into_iter()
        .map(|name| {
            let count = seen.entry(name.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                name
            } else {
                let renamed = format!("{}.{}", name, *count - 1);
                log::warn!("Duplicate gene identifier '{}' renamed to '{}'", name, renamed);
                renamed
            }
        })
        .collect()
}

/// Read counts, genes in rows and samples in columns
#[derive(Debug, Clone)]
pub struct CountMatrix {
    counts: Array2<f64>,
    gene_ids: Vec<String>,
    sample_ids: Vec<String>,
}

impl CountMatrix {
    pub fn new(counts: Array2<f64>, gene_ids: Vec<String>, sample_ids: Vec<String>) -> Result<Self> {
        let (n_genes, n_samples) = counts.dim();

        if gene_ids.len() != n_genes {
            return Err(DgeError::DimensionMismatch {
                expected: format!("{} gene IDs", n_genes),
                got: format!("{} gene IDs", gene_ids.len()),
            });
        }
        if sample_ids.len() != n_samples {
            return Err(DgeError::DimensionMismatch {
                expected: format!("{} sample IDs", n_samples),
                got: format!("{} sample IDs", sample_ids.len()),
            });
        }
        if counts.iter().any(|&x| x < 0.0 || !x.is_finite()) {
            return Err(DgeError::InvalidCountMatrix {
                reason: "Counts must be non-negative finite values".to_string(),
            });
        }
        if counts.iter().any(|&x| x != x.round()) {
            log::warn!("Some counts are not integers; the negative binomial model expects integer counts");
        }

        Ok(Self {
            counts,
            gene_ids: make_unique(gene_ids),
            sample_ids,
        })
    }

    pub fn n_genes(&self) -> usize {
        self.counts.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.counts.ncols()
    }

    pub fn counts(&self) -> ArrayView2<'_, f64> {
        self.counts.view()
    }

    pub fn gene_ids(&self) -> &[String] {
        &self.gene_ids
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Column sums
    pub fn library_sizes(&self) -> Vec<f64> {
        self.counts.axis_iter(Axis(1)).map(|col| col.sum()).collect()
    }

    /// Row sums
    pub fn row_sums(&self) -> Vec<f64> {
        self.counts.axis_iter(Axis(0)).map(|row| row.sum()).collect()
    }

    /// Replace gene identifiers (same length)
    pub fn set_gene_ids(&mut self, gene_ids: Vec<String>) -> Result<()> {
        if gene_ids.len() != self.n_genes() {
            return Err(DgeError::DimensionMismatch {
                expected: format!("{} gene IDs", self.n_genes()),
                got: format!("{} gene IDs", gene_ids.len()),
            });
        }
        self.gene_ids = make_unique(gene_ids);
        Ok(())
    }

    pub fn subset_samples(&self, sample_indices: &[usize]) -> Result<Self> {
        let counts = self.counts.select(Axis(1), sample_indices);
        let sample_ids = sample_indices
            .iter()
            .map(|&i| self.sample_ids[i].clone())
            .collect();
        Self::new(counts, self.gene_ids.clone(), sample_ids)
    }

    pub fn subset_genes(&self, gene_indices: &[usize]) -> Result<Self> {
        let counts = self.counts.select(Axis(0), gene_indices);
        let gene_ids = gene_indices
            .iter()
            .map(|&i| self.gene_ids[i].clone())
            .collect();
        Self::new(counts, gene_ids, self.sample_ids.clone())
    }
}
