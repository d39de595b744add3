//! Failure taxonomy for the upload pipeline.

use thiserror::Error;

/// Coarse classification used for status mapping and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InputMissing,
    Validation,
    Computation,
    Store,
    Render,
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("No file provided")]
    InputMissing,

    #[error("Invalid CSV. Missing: {}", .missing.join(", "))]
    MissingColumns { missing: Vec<String> },

    #[error("Invalid CSV. The file contains no data rows")]
    EmptyDataset,

    #[error("Invalid CSV. {0}")]
    MalformedCsv(String),

    #[error("Processing failed: row {row}: column {column} has non-numeric value '{value}'")]
    Computation {
        row: usize,
        column: String,
        value: String,
    },

    #[error("storage failure: {0:#}")]
    Store(anyhow::Error),

    #[error("report rendering failed: {0:#}")]
    Render(anyhow::Error),
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::InputMissing => ErrorKind::InputMissing,
            AnalysisError::MissingColumns { .. }
            | AnalysisError::EmptyDataset
            | AnalysisError::MalformedCsv(_) => ErrorKind::Validation,
            AnalysisError::Computation { .. } => ErrorKind::Computation,
            AnalysisError::Store(_) => ErrorKind::Store,
            AnalysisError::Render(_) => ErrorKind::Render,
        }
    }

    /// HTTP status for this failure. Caller mistakes are 4xx, ours are 5xx.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::InputMissing | ErrorKind::Validation | ErrorKind::Computation => 400,
            ErrorKind::Store | ErrorKind::Render => 500,
        }
    }
}
