//! Paired tumor-versus-normal analysis of an RNA-seq count table

use std::path::{Path, PathBuf};

use crate::data::{SampleIndicator, SampleSheet, Tissue};
use crate::design::paired_design;
use crate::dispersion::{estimate_disp, DispersionParams};
use crate::enrichment::{goana, top_go, GoRow, GoSort, GoanaParams, Ontology};
use crate::error::{DgeError, Result};
use crate::filter::{annotate_genes, filter_genes, FilterMethod};
use crate::glm::glm_fit;
use crate::io::{
    read_count_table, read_gene_map, read_go_annotation, read_sample_sheet, write_go_table, write_summary,
    write_top_tags, CountTableLayout, RunSummary,
};
use crate::normalization::{calc_norm_factors, NormMethod};
use crate::testing::{decide_tests, glm_lrt, p_adjust, top_tags, AdjustMethod, DecideSummary, TagSort, TopTags};

#[derive(Debug, Clone)]
pub struct RnaSeqConfig {
    /// Tab-delimited count table
    pub counts: PathBuf,
    pub layout: CountTableLayout,
    /// `sample, patient, tissue` sheet; parsed from sample names when `None`
    pub sample_sheet: Option<PathBuf>,
    pub tumor_code: char,
    pub normal_code: char,
    /// One tumor/normal code or `X` per sample of the count table
    pub indicator: Option<String>,
    /// `accession, gene_id, symbol` map used to annotate and collapse genes
    pub gene_map: Option<PathBuf>,
    pub filter: FilterMethod,
    pub norm_method: NormMethod,
    pub dispersion: DispersionParams,
    pub adjust: AdjustMethod,
    /// FDR cutoff for Up/Down calls and GO gene sets
    pub fdr: f64,
    /// Genes written; all when `None`
    pub top: Option<usize>,
    /// `gene_id, go_id, ontology, term` table enabling GO enrichment
    pub go_annotation: Option<PathBuf>,
    pub go_ontology: Option<Ontology>,
    pub go_sort: GoSort,
    pub go_top: usize,
    pub go_truncate: Option<usize>,
    pub output: PathBuf,
    /// GO table path; `<output stem>_go.csv` when `None`
    pub go_output: Option<PathBuf>,
    pub summary: Option<PathBuf>,
}

impl RnaSeqConfig {
    pub fn new(counts: PathBuf, output: PathBuf) -> Self {
        Self {
            counts,
            layout: CountTableLayout::default(),
            sample_sheet: None,
            tumor_code: 'T',
            normal_code: 'N',
            indicator: None,
            gene_map: None,
            filter: FilterMethod::default(),
            norm_method: NormMethod::Tmm,
            dispersion: DispersionParams::default(),
            adjust: AdjustMethod::BenjaminiHochberg,
            fdr: 0.05,
            top: None,
            go_annotation: None,
            go_ontology: None,
            go_sort: GoSort::Up,
            go_top: 20,
            go_truncate: None,
            output,
            go_output: None,
            summary: None,
        }
    }

    fn go_output_path(&self) -> PathBuf {
        self.go_output.clone().unwrap_or_else(|| sibling_with_suffix(&self.output, "_go"))
    }
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned()).unwrap_or_else(|| "csv".to_string());
    path.with_file_name(format!("{}{}.{}", stem, suffix, ext))
}

#[derive(Debug, Clone)]
pub struct RnaSeqReport {
    pub top_tags: TopTags,
    pub go: Option<Vec<GoRow>>,
    pub summary: RunSummary,
}

/// Samples whose indicator code disagrees with their tissue are an error
fn check_indicator_tissues(sheet: &SampleSheet, groups: &[String], indices: &[usize]) -> Result<()> {
    for (&i, group) in indices.iter().zip(groups) {
        let tissue = sheet.tissues()[i];
        if tissue.to_string() != *group {
            return Err(DgeError::InvalidIndicator {
                reason: format!(
                    "sample '{}' is marked {} by the indicator but is {} in the sample sheet",
                    sheet.sample_ids()[i],
                    group,
                    tissue
                ),
            });
        }
    }
    Ok(())
}

/// Load, pair, filter, normalize, estimate dispersions, fit, test and write
pub fn run_rnaseq(config: &RnaSeqConfig) -> Result<RnaSeqReport> {
    log::info!("Reading count table {}", config.counts.display());
    let mut y = read_count_table(&config.counts, &config.layout)?;
    let features_in = y.n_genes();
    log::info!("{} genes, {} samples", features_in, y.n_samples());

    if let Some(path) = &config.gene_map {
        let map = read_gene_map(path)?;
        y = annotate_genes(&y, &map)?;
    }

    let sheet = match &config.sample_sheet {
        Some(path) => read_sample_sheet(path)?,
        None => SampleSheet::from_sample_names(y.counts().sample_ids(), config.tumor_code, config.normal_code)?,
    };
    y.set_samples(sheet)?;

    if let Some(code) = &config.indicator {
        let indicator = SampleIndicator::parse_with_codes(code, &[config.tumor_code, config.normal_code])?;
        let groups = vec![Tissue::Tumor.to_string(), Tissue::Normal.to_string()];
        let selection = indicator.select(y.counts().sample_ids(), &groups)?;
        if let Some(sheet) = y.samples() {
            check_indicator_tissues(sheet, &selection.groups, &selection.indices)?;
        }
        if indicator.n_excluded() > 0 {
            log::info!("Excluding {} samples", indicator.n_excluded());
            y = y.subset_samples(&selection.indices)?;
        }
    }

    let sheet = y.samples().cloned().ok_or_else(|| DgeError::InvalidSampleSheet {
        reason: "no sample information".to_string(),
    })?;
    sheet.check_pairing()?;
    let design = paired_design(&sheet)?;
    log::info!(
        "Paired design with {} patients: {:?}",
        sheet.patient_levels().len(),
        design.coef_names()
    );

    log::info!("Filtering genes ({})", config.filter);
    let mut y = filter_genes(&y, &design, &config.filter)?;
    calc_norm_factors(&mut y, config.norm_method)?;
    estimate_disp(&mut y, &design, &config.dispersion)?;

    let dispersion = y
        .tagwise_dispersion()
        .map(<[f64]>::to_vec)
        .ok_or_else(|| DgeError::DispersionEstimationFailed {
            reason: "tagwise dispersions missing after estimation".to_string(),
        })?;
    let fit = glm_fit(&y, &design, &dispersion, &config.dispersion.glm)?;
    let lrt = glm_lrt(&y, &fit, design.n_coefs() - 1, &config.dispersion.glm)?;

    let fdr = p_adjust(&lrt.p_value, config.adjust);
    let decide = DecideSummary::from_decisions(&decide_tests(&fdr, &lrt.log_fc, config.fdr), config.fdr);
    log::info!("{}: {}", lrt.coef_name, decide);

    let tags = top_tags(&lrt, config.top, TagSort::PValue, config.adjust);
    write_top_tags(&config.output, &tags)?;
    let mut outputs = vec![config.output.display().to_string()];

    let go = match &config.go_annotation {
        Some(path) => {
            let annotation = read_go_annotation(path)?;
            let rows = goana(&lrt.gene_ids, &fdr, &lrt.log_fc, &annotation, &GoanaParams { fdr: config.fdr })?;
            let top = top_go(&rows, config.go_ontology, config.go_sort, config.go_top, config.go_truncate);
            let go_path = config.go_output_path();
            write_go_table(&go_path, &top)?;
            outputs.push(go_path.display().to_string());
            Some(top)
        }
        None => None,
    };

    let summary = RunSummary {
        analysis: "rnaseq".to_string(),
        input: config.counts.display().to_string(),
        features_in,
        features_tested: lrt.n_genes(),
        samples: sheet.sample_ids().to_vec(),
        groups: sheet.tissues().iter().map(|t| t.to_string()).collect(),
        log_transform: None,
        prior: None,
        norm_factors: Some(y.norm_factors().to_vec()),
        common_dispersion: y.common_dispersion(),
        decide,
        outputs,
    };
    if let Some(path) = &config.summary {
        write_summary(path, &summary)?;
    }

    Ok(RnaSeqReport {
        top_tags: tags,
        go,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    const SAMPLES: [&str; 8] = ["1N", "1T", "2N", "2T", "3N", "3T", "4N", "4T"];

    /// 80 genes in four patients; genes 0-2 up and 3-5 down in tumors
    fn count_table() -> NamedTempFile {
        let mut text = format!("RefSeqID\tSymbol\t{}\n", SAMPLES.join("\t"));
        for g in 0..80 {
            text.push_str(&format!("NM_{}\tGENE{}", g, g));
            for j in 0..SAMPLES.len() {
                let tumor = j % 2 == 1;
                let patient = (j / 2) as f64;
                let base = 80.0 + 12.0 * (g % 17) as f64 + 5.0 * patient;
                let noise = 1.0 + 0.12 * ((g * 31 + j * 17) as f64 * 0.37).sin();
                let fold = match (g, tumor) {
                    (0..=2, true) => 6.0,
                    (3..=5, false) => 6.0,
                    _ => 1.0,
                };
                text.push_str(&format!("\t{}", (base * noise * fold).round()));
            }
            text.push('\n');
        }
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    fn go_table() -> NamedTempFile {
        let mut text = String::from("gene_id\tgo_id\tontology\tterm\n");
        for g in 0..3 {
            text.push_str(&format!("NM_{}\tGO:0000001\tBP\tresponse to tumor\n", g));
        }
        for g in 10..40 {
            text.push_str(&format!("NM_{}\tGO:0000002\tCC\tcytoplasm\n", g));
        }
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_run_rnaseq_paired() {
        let counts = count_table();
        let go = go_table();
        let dir = tempdir().unwrap();
        let mut config = RnaSeqConfig::new(counts.path().to_path_buf(), dir.path().join("de.csv"));
        config.go_annotation = Some(go.path().to_path_buf());
        config.summary = Some(dir.path().join("summary.json"));

        let report = run_rnaseq(&config).unwrap();
        let top: Vec<&str> = report.top_tags.rows.iter().take(6).map(|r| r.gene_id.as_str()).collect();
        for g in 0..6 {
            assert!(top.contains(&format!("NM_{}", g).as_str()), "gene {} not in top 6: {:?}", g, top);
        }
        let first = &report.top_tags.rows[0];
        assert!(first.fdr < 0.05);
        assert!(first.log_fc.abs() > 2.0);
        assert!(report.summary.decide.up >= 3);
        assert!(report.summary.decide.down >= 3);

        let go_rows = report.go.unwrap();
        assert_eq!(go_rows[0].go_id, "GO:0000001");
        assert_eq!(go_rows[0].up, 3);
        assert!(dir.path().join("de_go.csv").exists());

        let header = std::fs::read_to_string(dir.path().join("de.csv")).unwrap();
        assert!(header.starts_with("RefSeqID,Symbol,logFC,logCPM,LR,PValue,FDR"));
    }

    #[test]
    fn test_run_rnaseq_indicator_excludes_pair() {
        let counts = count_table();
        let dir = tempdir().unwrap();
        let mut config = RnaSeqConfig::new(counts.path().to_path_buf(), dir.path().join("de.csv"));
        config.indicator = Some("NTNTNTXX".to_string());
        let report = run_rnaseq(&config).unwrap();
        assert_eq!(report.summary.samples.len(), 6);

        // unpaired after excluding one tumor sample
        config.indicator = Some("NTNTNTNX".to_string());
        assert!(matches!(run_rnaseq(&config), Err(DgeError::InvalidSampleSheet { .. })));

        // indicator contradicting the sample names
        config.indicator = Some("TNNTNTNT".to_string());
        assert!(matches!(run_rnaseq(&config), Err(DgeError::InvalidIndicator { .. })));
    }

    #[test]
    fn test_sibling_with_suffix() {
        assert_eq!(sibling_with_suffix(Path::new("out/de.csv"), "_go"), PathBuf::from("out/de_go.csv"));
    }
}
