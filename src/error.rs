//! Error types for tumor_dge

use thiserror::Error;

/// Main error type for differential expression runs
#[derive(Error, Debug)]
pub enum DgeError {
    #[error("Invalid expression matrix: {reason}")]
    InvalidExpressionMatrix { reason: String },

    #[error("Invalid count matrix: {reason}")]
    InvalidCountMatrix { reason: String },

    #[error("Invalid sample indicator: {reason}")]
    InvalidIndicator { reason: String },

    #[error("Invalid sample sheet: {reason}")]
    InvalidSampleSheet { reason: String },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: String, got: String },

    #[error("Invalid design matrix: {reason}")]
    InvalidDesignMatrix { reason: String },

    #[error("Dispersion estimation failed: {reason}")]
    DispersionEstimationFailed { reason: String },

    #[error("Normalization failed: {reason}")]
    NormalizationFailed { reason: String },

    #[error("Malformed {format} input: {reason}")]
    ParseError { format: String, reason: String },

    #[error("Dataset {accession} not available: {reason}")]
    DatasetUnavailable { accession: String, reason: String },

    #[error("Empty data: {reason}")]
    EmptyData { reason: String },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Result type alias for tumor_dge operations
pub type Result<T> = std::result::Result<T, DgeError>;
