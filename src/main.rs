//! tumor_dge command-line interface

use clap::Parser;
use log::LevelFilter;

use tumor_dge::cli::{has_subcommand, Cli, Commands};
use tumor_dge::prelude::*;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if !has_subcommand(&args) {
        if args.len() == 1 {
            print_no_args();
            return;
        }
        if args.iter().any(|a| a == "--help") {
            print_long_help();
            return;
        }
        if args.iter().any(|a| a == "-h") {
            print_short_help();
            return;
        }
        if args.iter().any(|a| a == "-V" || a == "--version") {
            println!("tumor_dge {}", VERSION);
            return;
        }
        print_no_args();
        return;
    }

    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .ok();
    }

    let result = match cli.command {
        Some(Commands::Microarray {
            accession,
            series,
            platform,
            annotation,
            no_annotation,
            indicator,
            groups,
            normalize,
            proportion,
            number,
            sort_by,
            adjust,
            p_value,
            download_dir,
            output,
            summary,
        }) => (|| -> Result<()> {
            let source = match (accession, series) {
                (Some(acc), _) => SeriesSource::Accession(acc),
                (None, Some(path)) => SeriesSource::Path(path),
                (None, None) => {
                    return Err(DgeError::InvalidInput {
                        reason: "either --accession or --series is required".to_string(),
                    })
                }
            };
            let mut config = MicroarrayConfig::new(source, &indicator, output);
            config.platform = platform;
            config.annotation = annotation;
            config.fetch_annotation = !no_annotation;
            config.download_dir = download_dir;
            config.group_names = groups;
            config.quantile_normalize = normalize;
            config.ebayes.proportion = proportion;
            config.number = number;
            config.sort_by = sort_by.parse()?;
            config.adjust = adjust.parse()?;
            config.p_value = p_value;
            config.summary = summary;
            run_microarray(&config).map(|report| {
                println!("{}", report.summary.decide);
            })
        })(),
        Some(Commands::Rnaseq {
            counts,
            annotation_columns,
            id_column,
            samples,
            tumor_code,
            normal_code,
            indicator,
            gene_map,
            min_cpm,
            min_samples,
            min_count,
            min_total_count,
            norm_method,
            prior_df,
            fdr,
            adjust,
            top,
            go,
            go_ontology,
            go_sort,
            go_top,
            go_truncate,
            go_output,
            output,
            summary,
        }) => (|| -> Result<()> {
            let mut config = RnaSeqConfig::new(counts, output);
            config.layout = CountTableLayout {
                annotation_columns,
                id_column,
            };
            config.sample_sheet = samples;
            config.tumor_code = tumor_code;
            config.normal_code = normal_code;
            config.indicator = indicator;
            config.gene_map = gene_map;
            config.filter = match (min_cpm, min_samples) {
                (Some(min_cpm), Some(min_samples)) => FilterMethod::Cpm { min_cpm, min_samples },
                _ => FilterMethod::ByExpr(FilterParams {
                    min_count,
                    min_total_count,
                    ..FilterParams::default()
                }),
            };
            config.norm_method = norm_method.parse()?;
            config.dispersion.prior_df = prior_df;
            config.fdr = fdr;
            config.adjust = adjust.parse()?;
            config.top = top;
            config.go_annotation = go;
            config.go_ontology = go_ontology.as_deref().map(str::parse).transpose()?;
            config.go_sort = go_sort.parse()?;
            config.go_top = go_top;
            config.go_truncate = go_truncate;
            config.go_output = go_output;
            config.summary = summary;
            run_rnaseq(&config).map(|report| {
                println!("{}", report.summary.decide);
            })
        })(),
        None => {
            print_no_args();
            return;
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// Custom help output
// ---------------------------------------------------------------------------

fn print_no_args() {
    println!("tumor_dge v{}", VERSION);
    println!("Run `tumor_dge -h` for usage or `tumor_dge --help` for detailed information.");
}

fn print_short_help() {
    println!("tumor_dge v{}", VERSION);
    println!();
    println!("Usage: tumor_dge <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  microarray  Moderated t analysis of a GEO microarray series");
    println!("  rnaseq      Paired negative binomial analysis of an RNA-seq count table");
    println!();
    println!("Run `tumor_dge <COMMAND> -h` for command-specific options.");
}

fn print_long_help() {
    println!("tumor_dge v{}", VERSION);
    println!("Differential expression between tumor and normal samples");
    println!();
    println!("Usage: tumor_dge <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  microarray  Moderated t analysis of a GEO microarray series");
    println!("                - series matrix download or local file");
    println!("                - sample selection by indicator string");
    println!("                - automatic log2 transform, optional quantile normalization");
    println!("                - empirical Bayes moderated t and B statistics");
    println!("  rnaseq      Paired negative binomial analysis of an RNA-seq count table");
    println!("                - gene map annotation and collapsing");
    println!("                - expression filter and TMM normalization");
    println!("                - common, trended and tagwise dispersions");
    println!("                - likelihood ratio test for the tissue effect");
    println!("                - GO over-representation of up and down genes");
    println!();
    println!("Global Options:");
    println!("  -v, --verbose    Enable verbose output");
    println!("  -t, --threads    Number of threads (0 = auto)");
    println!("  -h               Print short help");
    println!("      --help       Print detailed help");
    println!("  -V, --version    Print version");
    println!();
    println!("Examples:");
    println!("  tumor_dge microarray --accession GSE15852 --indicator 000111X -o gse15852.csv");
    println!();
    println!("  tumor_dge rnaseq -c counts.txt --gene-map refseq2gene.tsv \\");
    println!("    --go go.tsv --go-ontology BP -o de.csv");
}
