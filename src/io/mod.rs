//! Input/Output: GEO series matrices, tab-delimited tables, result files

mod geo;
mod results;
mod series_matrix;
mod summary;
mod tables;

pub use geo::{accession_stub, choose_series_file, parse_series_listing, GeoClient};
pub use results::{write_go_table, write_top_table, write_top_tags};
pub use series_matrix::{
    make_names, open_text, parse_platform_table, parse_series_matrix, read_platform_table, read_series_matrix,
    PlatformTable, SeriesMatrix,
};
pub use summary::{write_summary, PriorSummary, RunSummary};
pub use tables::{
    read_count_table, read_gene_map, read_go_annotation, read_sample_sheet, CountTableLayout, GeneMap,
};
