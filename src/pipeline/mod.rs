//! End-to-end tumor-versus-normal analyses

mod microarray;
mod rnaseq;

pub use microarray::{run_microarray, MicroarrayConfig, MicroarrayReport, SeriesSource};
pub use rnaseq::{run_rnaseq, RnaSeqConfig, RnaSeqReport};
