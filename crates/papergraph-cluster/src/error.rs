//! Error types for the clustering stage

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("No non-empty abstracts to cluster")]
    NoAbstracts,

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Embedding dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Cannot form {k} clusters from {samples} samples")]
    InvalidClusterCount { k: usize, samples: usize },

    #[error("Configuration error: {0}")]
    Config(String),
}
