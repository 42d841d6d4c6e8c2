//! Tumor-versus-normal analysis of a GEO microarray series

use std::path::PathBuf;

use crate::data::{GeneAnnotation, SampleIndicator};
use crate::design::{group_means_design, make_contrast};
use crate::error::{DgeError, Result};
use crate::io::{read_platform_table, read_series_matrix, write_summary, write_top_table, GeoClient, PriorSummary, RunSummary};
use crate::linear::{contrasts_fit, decide_fit, ebayes, lm_fit, top_table, EbayesParams, TableSort, TopTableRow};
use crate::normalization::{auto_log2, normalize_quantiles};
use crate::testing::AdjustMethod;

/// Where the series matrix comes from
#[derive(Debug, Clone)]
pub enum SeriesSource {
    /// GSE accession downloaded from GEO
    Accession(String),
    /// Local series matrix file, plain or gzipped
    Path(PathBuf),
}

impl SeriesSource {
    fn describe(&self) -> String {
        match self {
            SeriesSource::Accession(acc) => acc.clone(),
            SeriesSource::Path(path) => path.display().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MicroarrayConfig {
    pub source: SeriesSource,
    /// Platform to use when the series spans several
    pub platform: Option<String>,
    /// Platform annotation file; downloaded from GEO for accessions when `None`
    /// and `fetch_annotation` is set
    pub annotation: Option<PathBuf>,
    pub fetch_annotation: bool,
    /// Download cache for GEO files
    pub download_dir: PathBuf,
    /// One character per sample: group digit or `X`
    pub indicator: String,
    /// Group names indexed by indicator digits; the contrast is first minus second
    pub group_names: Vec<String>,
    pub quantile_normalize: bool,
    pub ebayes: EbayesParams,
    /// Rows written; all genes when `None`
    pub number: Option<usize>,
    pub sort_by: TableSort,
    pub adjust: AdjustMethod,
    /// Adjusted p-value cutoff for the Up/Down counts
    pub p_value: f64,
    pub output: PathBuf,
    pub summary: Option<PathBuf>,
}

impl MicroarrayConfig {
    pub fn new(source: SeriesSource, indicator: &str, output: PathBuf) -> Self {
        Self {
            source,
            platform: None,
            annotation: None,
            fetch_annotation: true,
            download_dir: std::env::temp_dir().join("tumor_dge"),
            indicator: indicator.to_string(),
            group_names: vec!["tumor".to_string(), "normal".to_string()],
            quantile_normalize: false,
            ebayes: EbayesParams::default(),
            number: None,
            sort_by: TableSort::B,
            adjust: AdjustMethod::BenjaminiHochberg,
            p_value: 0.05,
            output,
            summary: None,
        }
    }
}

/// Ranked table plus the run summary
#[derive(Debug, Clone)]
pub struct MicroarrayReport {
    pub table: Vec<TopTableRow>,
    pub summary: RunSummary,
}

/// Load, select, transform, fit, moderate and write the ranked gene table
pub fn run_microarray(config: &MicroarrayConfig) -> Result<MicroarrayReport> {
    if config.group_names.len() < 2 {
        return Err(DgeError::InvalidInput {
            reason: "two group names are needed for the tumor-normal contrast".to_string(),
        });
    }

    let (series_path, client) = match &config.source {
        SeriesSource::Accession(acc) => {
            let client = GeoClient::new(&config.download_dir)?;
            (client.fetch_series(acc, config.platform.as_deref())?, Some(client))
        }
        SeriesSource::Path(path) => (path.clone(), None),
    };

    log::info!("Reading series matrix {}", series_path.display());
    let series = read_series_matrix(&series_path)?;
    let mut expr = series.expression;
    let features_in = expr.n_features();
    log::info!("{} features, {} samples", features_in, expr.n_samples());

    let annotation_path = match (&config.annotation, &client, &series.platform) {
        (Some(path), _, _) => Some(path.clone()),
        (None, Some(client), Some(platform)) if config.fetch_annotation => {
            Some(client.fetch_platform_annotation(platform)?)
        }
        _ => None,
    };
    let genes = match annotation_path {
        Some(path) => {
            log::info!("Reading platform annotation {}", path.display());
            read_platform_table(&path)?.align(expr.feature_ids())?
        }
        None => GeneAnnotation::new(features_in),
    };

    let indicator = SampleIndicator::parse(&config.indicator)?;
    let selection = indicator.select(expr.sample_ids(), &config.group_names)?;
    if indicator.n_excluded() > 0 {
        log::info!("Excluding {} samples", indicator.n_excluded());
    }
    expr = expr.subset_samples(&selection.indices)?;
    for (g, name) in config.group_names.iter().enumerate() {
        log::info!("Group '{}': {} samples", name, selection.group_size(g));
    }

    let log_decision = auto_log2(&mut expr);
    if config.quantile_normalize {
        log::info!("Quantile normalizing {} samples", expr.n_samples());
        let normalized = normalize_quantiles(expr.values());
        expr.set_values(normalized)?;
    }

    let levels: Vec<String> = config
        .group_names
        .iter()
        .filter(|name| selection.groups.contains(name))
        .cloned()
        .collect();
    let design = group_means_design(&selection.groups, &levels)?;
    let contrast = make_contrast(&design, &config.group_names[0], &config.group_names[1])?;
    let contrast_name = format!("{}-{}", config.group_names[0], config.group_names[1]);

    let fit = lm_fit(&expr, &genes, &design)?;
    let fit = contrasts_fit(&fit, &contrast, &contrast_name)?;
    let eb = ebayes(fit, &config.ebayes)?;

    let table = top_table(&eb, 0, config.number, config.sort_by, config.adjust)?;
    let decide = decide_fit(&eb, 0, config.adjust, config.p_value);
    log::info!("{}: {}", contrast_name, decide);

    write_top_table(&config.output, &table)?;

    let summary = RunSummary {
        analysis: "microarray".to_string(),
        input: config.source.describe(),
        features_in,
        features_tested: eb.fit.n_genes(),
        samples: selection.sample_ids.clone(),
        groups: selection.groups.clone(),
        log_transform: Some(log_decision),
        prior: Some(PriorSummary {
            s2_prior: eb.prior.scale,
            df_prior: eb.prior.df,
        }),
        norm_factors: None,
        common_dispersion: None,
        decide,
        outputs: vec![config.output.display().to_string()],
    };
    if let Some(path) = &config.summary {
        write_summary(path, &summary)?;
    }

    Ok(MicroarrayReport { table, summary })
}
