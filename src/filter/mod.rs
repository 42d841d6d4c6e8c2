//! Gene filtering and re-annotation of count data

mod annotate;
mod by_expr;

pub use annotate::{annotate_genes, GENE_ID_COLUMN, SYMBOL_COLUMN};
pub use by_expr::{filter_by_cpm, filter_by_expr, filter_genes, FilterMethod, FilterParams};
