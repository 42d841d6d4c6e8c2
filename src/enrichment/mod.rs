//! Gene ontology enrichment of differentially expressed genes

mod annotation;
mod goana;

pub use annotation::{GoAnnotation, GoTerm, Ontology};
pub use goana::{goana, top_go, GoRow, GoSort, GoanaParams};
