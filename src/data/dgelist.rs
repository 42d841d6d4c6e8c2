//! DGEList: counts plus library sizes, normalization factors, gene
//! annotation and the dispersion estimates attached during an RNA-seq run

use crate::error::{DgeError, Result};

use super::{CountMatrix, GeneAnnotation, SampleSheet};

#[derive(Debug, Clone)]
pub struct DGEList {
    counts: CountMatrix,
    genes: GeneAnnotation,
    lib_sizes: Vec<f64>,
    norm_factors: Vec<f64>,
    samples: Option<SampleSheet>,

    ave_log_cpm: Option<Vec<f64>>,
    common_dispersion: Option<f64>,
    trended_dispersion: Option<Vec<f64>>,
    tagwise_dispersion: Option<Vec<f64>>,
}

impl DGEList {
    /// Library sizes default to column sums and normalization factors to one
    pub fn new(counts: CountMatrix, genes: GeneAnnotation) -> Result<Self> {
        if genes.n_rows() != counts.n_genes() {
            return Err(DgeError::DimensionMismatch {
                expected: format!("{} annotation rows", counts.n_genes()),
                got: format!("{} annotation rows", genes.n_rows()),
            });
        }
        if counts.n_genes() == 0 || counts.n_samples() == 0 {
            return Err(DgeError::EmptyData {
                reason: "count table has no genes or no samples".to_string(),
            });
        }

        let lib_sizes = counts.library_sizes();
        if let Some(j) = lib_sizes.iter().position(|&l| l <= 0.0) {
            return Err(DgeError::InvalidCountMatrix {
                reason: format!("sample '{}' has zero library size", counts.sample_ids()[j]),
            });
        }
        let n_samples = counts.n_samples();

        Ok(Self {
            counts,
            genes,
            lib_sizes,
            norm_factors: vec![1.0; n_samples],
            samples: None,
            ave_log_cpm: None,
            common_dispersion: None,
            trended_dispersion: None,
            tagwise_dispersion: None,
        })
    }

    pub fn counts(&self) -> &CountMatrix {
        &self.counts
    }

    pub fn genes(&self) -> &GeneAnnotation {
        &self.genes
    }

    pub fn n_genes(&self) -> usize {
        self.counts.n_genes()
    }

    pub fn n_samples(&self) -> usize {
        self.counts.n_samples()
    }

    pub fn lib_sizes(&self) -> &[f64] {
        &self.lib_sizes
    }

    pub fn norm_factors(&self) -> &[f64] {
        &self.norm_factors
    }

    /// Library sizes scaled by normalization factors
    pub fn effective_lib_sizes(&self) -> Vec<f64> {
        self.lib_sizes
            .iter()
            .zip(&self.norm_factors)
            .map(|(l, f)| l * f)
            .collect()
    }

    pub fn set_norm_factors(&mut self, factors: Vec<f64>) -> Result<()> {
        if factors.len() != self.n_samples() {
            return Err(DgeError::DimensionMismatch {
                expected: format!("{} normalization factors", self.n_samples()),
                got: format!("{} normalization factors", factors.len()),
            });
        }
        if factors.iter().any(|&f| !(f.is_finite() && f > 0.0)) {
            return Err(DgeError::NormalizationFailed {
                reason: "normalization factors must be positive and finite".to_string(),
            });
        }
        self.norm_factors = factors;
        Ok(())
    }

    pub fn samples(&self) -> Option<&SampleSheet> {
        self.samples.as_ref()
    }

    pub fn set_samples(&mut self, samples: SampleSheet) -> Result<()> {
        let aligned = samples.align_to(self.counts.sample_ids())?;
        self.samples = Some(aligned);
        Ok(())
    }

    /// Replace gene identifiers and annotation after re-annotation
    pub fn set_genes(&mut self, gene_ids: Vec<String>, genes: GeneAnnotation) -> Result<()> {
        if genes.n_rows() != self.n_genes() {
            return Err(DgeError::DimensionMismatch {
                expected: format!("{} annotation rows", self.n_genes()),
                got: format!("{} annotation rows", genes.n_rows()),
            });
        }
        self.counts.set_gene_ids(gene_ids)?;
        self.genes = genes;
        Ok(())
    }

    /// Keep the given genes. Library sizes are kept unless `keep_lib_sizes`
    /// is false, in which case they are recomputed from the kept rows.
    /// Gene-level estimates are dropped.
    pub fn subset_genes(&self, keep: &[usize], keep_lib_sizes: bool) -> Result<Self> {
        if keep.is_empty() {
            return Err(DgeError::EmptyData {
                reason: "no genes left after subsetting".to_string(),
            });
        }
        let counts = self.counts.subset_genes(keep)?;
        let lib_sizes = if keep_lib_sizes {
            self.lib_sizes.clone()
        } else {
            counts.library_sizes()
        };
        Ok(Self {
            counts,
            genes: self.genes.subset(keep),
            lib_sizes,
            norm_factors: self.norm_factors.clone(),
            samples: self.samples.clone(),
            ave_log_cpm: None,
            common_dispersion: None,
            trended_dispersion: None,
            tagwise_dispersion: None,
        })
    }

    /// Keep the given samples; library sizes are recomputed
    pub fn subset_samples(&self, keep: &[usize]) -> Result<Self> {
        let counts = self.counts.subset_samples(keep)?;
        let mut out = Self::new(counts, self.genes.clone())?;
        out.norm_factors = keep.iter().map(|&j| self.norm_factors[j]).collect();
        out.samples = self.samples.as_ref().map(|s| s.subset(keep));
        Ok(out)
    }

    pub fn ave_log_cpm(&self) -> Option<&[f64]> {
        self.ave_log_cpm.as_deref()
    }

    pub fn set_ave_log_cpm(&mut self, values: Vec<f64>) -> Result<()> {
        self.check_gene_len(values.len())?;
        self.ave_log_cpm = Some(values);
        Ok(())
    }

    pub fn common_dispersion(&self) -> Option<f64> {
        self.common_dispersion
    }

    pub fn set_common_dispersion(&mut self, dispersion: f64) {
        self.common_dispersion = Some(dispersion);
    }

    pub fn trended_dispersion(&self) -> Option<&[f64]> {
        self.trended_dispersion.as_deref()
    }

    pub fn set_trended_dispersion(&mut self, values: Vec<f64>) -> Result<()> {
        self.check_gene_len(values.len())?;
        self.trended_dispersion = Some(values);
        Ok(())
    }

    pub fn tagwise_dispersion(&self) -> Option<&[f64]> {
        self.tagwise_dispersion.as_deref()
    }

    pub fn set_tagwise_dispersion(&mut self, values: Vec<f64>) -> Result<()> {
        self.check_gene_len(values.len())?;
        self.tagwise_dispersion = Some(values);
        Ok(())
    }

    /// Most specific dispersion available: tagwise, then trended, then common
    pub fn dispersion(&self) -> Option<Vec<f64>> {
        if let Some(t) = &self.tagwise_dispersion {
            return Some(t.clone());
        }
        if let Some(t) = &self.trended_dispersion {
            return Some(t.clone());
        }
        self.common_dispersion.map(|c| vec![c; self.n_genes()])
    }

    fn check_gene_len(&self, len: usize) -> Result<()> {
        if len != self.n_genes() {
            return Err(DgeError::DimensionMismatch {
                expected: format!("{} values", self.n_genes()),
                got: format!("{} values", len),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn small() -> DGEList {
        let counts = CountMatrix::new(
            array![[10.0, 20.0], [0.0, 5.0], [90.0, 75.0]],
            vec!["g1".into(), "g2".into(), "g3".into()],
            vec!["1N".into(), "1T".into()],
        )
        .unwrap();
        DGEList::new(counts, GeneAnnotation::new(3)).unwrap()
    }

    #[test]
    fn test_defaults() {
        let y = small();
        assert_eq!(y.lib_sizes(), &[100.0, 100.0]);
        assert_eq!(y.norm_factors(), &[1.0, 1.0]);
        assert!(y.dispersion().is_none());
    }

    #[test]
    fn test_subset_genes_library_sizes() {
        let y = small();
        let kept = y.subset_genes(&[0, 2], true).unwrap();
        assert_eq!(kept.lib_sizes(), &[100.0, 100.0]);
        let recomputed = y.subset_genes(&[0, 2], false).unwrap();
        assert_eq!(recomputed.lib_sizes(), &[100.0, 95.0]);
    }

    #[test]
    fn test_dispersion_precedence() {
        let mut y = small();
        y.set_common_dispersion(0.1);
        assert_eq!(y.dispersion().unwrap(), vec![0.1; 3]);
        y.set_tagwise_dispersion(vec![0.2, 0.3, 0.4]).unwrap();
        assert_eq!(y.dispersion().unwrap(), vec![0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_zero_library_rejected() {
        let counts = CountMatrix::new(
            array![[0.0, 1.0]],
            vec!["g1".into()],
            vec!["a".into(), "b".into()],
        )
        .unwrap();
        assert!(DGEList::new(counts, GeneAnnotation::new(1)).is_err());
    }
}
