//! Error type shared by every stage of the fitting pipeline.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Read failed: {0}")]
    Io(#[from] io::Error),

    #[error("Pass incomplete: processed {processed} of {expected} records")]
    IncompleteCoverage { processed: u64, expected: u64 },

    #[error("Insufficient data: need at least {needed} valid values, got {got}")]
    InsufficientData { needed: u64, got: u64 },

    #[error("Invalid distribution parameter: {0}")]
    Domain(String),

    #[error("Histogram is empty")]
    EmptyHistogram,

    #[error("Histogram shape mismatch: {left} bins vs {right} bins")]
    HistogramShape { left: usize, right: usize },
}

impl Error {
    /// Short machine-friendly category name, used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Open { .. } => "open",
            Self::Io(_) => "io",
            Self::IncompleteCoverage { .. } => "coverage",
            Self::InsufficientData { .. } => "insufficient_data",
            Self::Domain(_) => "domain",
            Self::EmptyHistogram => "empty_histogram",
            Self::HistogramShape { .. } => "histogram_shape",
        }
    }
}
