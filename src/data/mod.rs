//! Data structures for expression and count data

mod annotation;
mod count_matrix;
mod dgelist;
mod expression;
mod indicator;
mod sample_sheet;

pub use annotation::GeneAnnotation;
pub use count_matrix::CountMatrix;
pub use dgelist::DGEList;
pub use expression::ExpressionMatrix;
pub use indicator::{SampleFlag, SampleIndicator, SampleSelection};
pub use sample_sheet::{SampleSheet, Tissue};
