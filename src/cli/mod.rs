//! Command-line interface for tumor_dge

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tumor_dge")]
#[command(version)]
#[command(about = "Tumor versus normal differential expression for microarray and RNA-seq data")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Number of threads (0 = auto) [default: 0]
    #[arg(short = 't', long, global = true, default_value = "0")]
    pub threads: usize,
}

/// Subcommand names recognized before handing over to clap
pub const SUBCOMMANDS: [&str; 3] = ["microarray", "rnaseq", "help"];

/// Global options that consume the following argument as their value
const VALUE_OPTIONS: [&str; 2] = ["-t", "--threads"];

/// Whether the first positional argument, after skipping global option
/// values, names a subcommand
pub fn has_subcommand(args: &[String]) -> bool {
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        if VALUE_OPTIONS.contains(&arg.as_str()) {
            iter.next();
        } else if !arg.starts_with('-') {
            return SUBCOMMANDS.contains(&arg.as_str());
        }
    }
    false
}

#[derive(Subcommand)]
pub enum Commands {
    /// Moderated t analysis of a GEO microarray series
    #[command(
        long_about = "Moderated t analysis of a GEO microarray series\n\n\
            Downloads the series matrix of a GSE accession (or reads a local file),\n\
            keeps the samples flagged by the indicator string, log2-transforms the\n\
            data when its quantiles indicate raw intensities, fits a group-means\n\
            linear model and ranks genes by empirical Bayes moderated statistics.",
        after_long_help = "\
Examples:
  # Samples 1-3 tumor, 4-6 normal, 7th excluded
  tumor_dge microarray --accession GSE15852 --indicator 000111X -o gse15852.csv

  # Series with two platforms, local annotation
  tumor_dge microarray --accession GSE2034 --platform GPL96 \\
    --annotation GPL96.annot.gz --indicator 0101 -o out.csv

  # Local series matrix with quantile normalization
  tumor_dge microarray --series GSE0001_series_matrix.txt.gz --indicator 0011 --normalize"
    )]
    Microarray {
        /// GEO series accession (GSE...)
        #[arg(short, long, conflicts_with = "series", required_unless_present = "series")]
        accession: Option<String>,

        /// Local series matrix file (.txt or .txt.gz)
        #[arg(short, long)]
        series: Option<PathBuf>,

        /// Platform (GPL...) to use when the series has several
        #[arg(long)]
        platform: Option<String>,

        /// Platform annotation file (GPL .annot or TSV with ID, Gene symbol, Gene title)
        #[arg(long)]
        annotation: Option<PathBuf>,

        /// Do not download the platform annotation
        #[arg(long)]
        no_annotation: bool,

        /// Sample indicator string
        #[arg(short, long,
            long_help = "Sample indicator string, one character per sample in series order.\n\
                Digits select the group (0 = first group name, 1 = second, ...),\n\
                X excludes the sample. Whitespace is ignored.")]
        indicator: String,

        /// Group names indexed by indicator digits [default: tumor,normal]
        #[arg(long, value_delimiter = ',', default_value = "tumor,normal")]
        groups: Vec<String>,

        /// Quantile normalize samples after the log2 check
        #[arg(long)]
        normalize: bool,

        /// Assumed proportion of differentially expressed genes [default: 0.01]
        #[arg(long, default_value = "0.01")]
        proportion: f64,

        /// Number of genes written (all when omitted)
        #[arg(short, long)]
        number: Option<usize>,

        /// Sort order: B, P, logFC, t, none [default: B]
        #[arg(long, default_value = "B")]
        sort_by: String,

        /// P-value adjustment: BH, bonferroni, none [default: BH]
        #[arg(long, default_value = "BH")]
        adjust: String,

        /// Adjusted p-value cutoff for the Up/Down summary [default: 0.05]
        #[arg(short, long, default_value = "0.05")]
        p_value: f64,

        /// Directory caching GEO downloads
        #[arg(long, default_value = "geo_cache")]
        download_dir: PathBuf,

        /// Output CSV [default: microarray_results.csv]
        #[arg(short, long, default_value = "microarray_results.csv")]
        output: PathBuf,

        /// Write a JSON run summary
        #[arg(long)]
        summary: Option<PathBuf>,
    },

    /// Paired negative binomial analysis of an RNA-seq count table
    #[command(
        long_about = "Paired negative binomial analysis of an RNA-seq count table\n\n\
            Reads a tab-delimited count table with patient-matched tumor and normal\n\
            samples, filters lowly expressed genes, computes TMM normalization\n\
            factors, estimates common, trended and tagwise dispersions, fits\n\
            ~patient + tissue and tests the tissue effect by likelihood ratio.",
        after_long_help = "\
Examples:
  # Sample names such as 8N / 8T give patient and tissue
  tumor_dge rnaseq -c counts.txt -o de.csv

  # Gene map collapsing RefSeq ids to genes, GO enrichment
  tumor_dge rnaseq -c counts.txt --gene-map refseq2gene.tsv \\
    --go go.tsv --go-ontology BP -o de.csv

  # Exclude the last pair, CPM filter
  tumor_dge rnaseq -c counts.txt --indicator NTNTNTXX --min-cpm 1 --min-samples 3"
    )]
    Rnaseq {
        /// Tab-delimited count table
        #[arg(short, long)]
        counts: PathBuf,

        /// Number of leading annotation columns (detected when omitted)
        #[arg(long)]
        annotation_columns: Option<usize>,

        /// Annotation column holding gene identifiers [default: first column]
        #[arg(long)]
        id_column: Option<String>,

        /// Sample sheet TSV with sample, patient and tissue columns
        #[arg(long)]
        samples: Option<PathBuf>,

        /// Suffix marking tumor samples [default: T]
        #[arg(long, default_value = "T")]
        tumor_code: char,

        /// Suffix marking normal samples [default: N]
        #[arg(long, default_value = "N")]
        normal_code: char,

        /// Sample indicator string of tumor/normal codes, X to exclude
        #[arg(short, long)]
        indicator: Option<String>,

        /// Accession to gene map (accession, gene_id, symbol)
        #[arg(long)]
        gene_map: Option<PathBuf>,

        /// Keep genes with at least this CPM in --min-samples samples instead of filter_by_expr
        #[arg(long, requires = "min_samples")]
        min_cpm: Option<f64>,

        #[arg(long, requires = "min_cpm")]
        min_samples: Option<usize>,

        /// Minimum count for filter_by_expr [default: 10]
        #[arg(long, default_value = "10")]
        min_count: f64,

        /// Minimum total count for filter_by_expr [default: 15]
        #[arg(long, default_value = "15")]
        min_total_count: f64,

        /// Normalization: TMM, upperquartile, none [default: TMM]
        #[arg(long, default_value = "TMM")]
        norm_method: String,

        /// Prior degrees of freedom for tagwise dispersions [default: 10]
        #[arg(long, default_value = "10")]
        prior_df: f64,

        /// FDR cutoff [default: 0.05]
        #[arg(long, default_value = "0.05")]
        fdr: f64,

        /// P-value adjustment: BH, bonferroni, none [default: BH]
        #[arg(long, default_value = "BH")]
        adjust: String,

        /// Number of genes written (all when omitted)
        #[arg(long)]
        top: Option<usize>,

        /// GO annotation TSV (gene_id, go_id, ontology, term)
        #[arg(long)]
        go: Option<PathBuf>,

        /// Restrict the GO table to BP, CC or MF
        #[arg(long)]
        go_ontology: Option<String>,

        /// GO sort: up, down, either [default: up]
        #[arg(long, default_value = "up")]
        go_sort: String,

        /// GO terms written [default: 20]
        #[arg(long, default_value = "20")]
        go_top: usize,

        /// Truncate GO term names to this many characters
        #[arg(long)]
        go_truncate: Option<usize>,

        /// GO output CSV [default: <output>_go.csv]
        #[arg(long)]
        go_output: Option<PathBuf>,

        /// Output CSV [default: rnaseq_results.csv]
        #[arg(short, long, default_value = "rnaseq_results.csv")]
        output: PathBuf,

        /// Write a JSON run summary
        #[arg(long)]
        summary: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_microarray() {
        let cli = Cli::parse_from(["tumor_dge", "microarray", "--accession", "GSE1", "--indicator", "01X", "-v"]);
        assert!(cli.verbose);
        match cli.command {
            Some(Commands::Microarray { accession, indicator, groups, .. }) => {
                assert_eq!(accession.as_deref(), Some("GSE1"));
                assert_eq!(indicator, "01X");
                assert_eq!(groups, vec!["tumor".to_string(), "normal".to_string()]);
            }
            _ => panic!("expected microarray command"),
        }
    }

    #[test]
    fn test_microarray_needs_source() {
        assert!(Cli::try_parse_from(["tumor_dge", "microarray", "--indicator", "01"]).is_err());
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_threads_before_subcommand() {
        let argv = args(&["tumor_dge", "-t", "2", "rnaseq", "-c", "counts.txt"]);
        assert!(has_subcommand(&argv));
        let cli = Cli::parse_from(&argv);
        assert_eq!(cli.threads, 2);
        assert!(matches!(cli.command, Some(Commands::Rnaseq { .. })));

        assert!(has_subcommand(&args(&["tumor_dge", "--threads", "4", "-v", "microarray", "-s", "x.txt"])));
        assert!(has_subcommand(&args(&["tumor_dge", "--threads=4", "rnaseq"])));
    }

    #[test]
    fn test_no_subcommand() {
        assert!(!has_subcommand(&args(&["tumor_dge"])));
        assert!(!has_subcommand(&args(&["tumor_dge", "-t", "2"])));
        assert!(!has_subcommand(&args(&["tumor_dge", "-v", "counts.txt"])));
    }

    #[test]
    fn test_parse_rnaseq() {
        let cli = Cli::parse_from(["tumor_dge", "rnaseq", "-c", "counts.txt", "--min-cpm", "1", "--min-samples", "3"]);
        match cli.command {
            Some(Commands::Rnaseq { min_cpm, min_samples, prior_df, .. }) => {
                assert_eq!(min_cpm, Some(1.0));
                assert_eq!(min_samples, Some(3));
                assert_eq!(prior_df, 10.0);
            }
            _ => panic!("expected rnaseq command"),
        }
    }
}
