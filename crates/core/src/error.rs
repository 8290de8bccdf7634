//! The indexing pipeline's error taxonomy. Non-fatal variants are collected
//! into `IndexResult.errors` by the orchestrator; only `SchemaMismatch` and
//! an exhausted `StoreConflict` retry bubble up to the binary as fatal.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("file io error on {path}: {message}")]
    FileIo { path: String, message: String },

    #[error("parser for {path} exceeded its time budget")]
    ParseTimeout { path: String },

    #[error("failed to parse {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("ambiguous resolution for edge {from} -> {to}: {candidates} candidates")]
    ResolutionAmbiguity {
        from: String,
        to: String,
        candidates: usize,
    },

    #[error("indexing run was cancelled")]
    Cancelled,

    #[error(transparent)]
    Store(#[from] store::StoreError),
}

impl IndexError {
    /// The taxonomy tag persisted into `IndexResult.errors`, independent of
    /// the human-readable message.
    pub fn kind(&self) -> &'static str {
        match self {
            IndexError::FileIo { .. } => "file_io",
            IndexError::ParseTimeout { .. } => "parse_timeout",
            IndexError::ParseError { .. } => "parse_error",
            IndexError::ResolutionAmbiguity { .. } => "resolution_ambiguity",
            IndexError::Cancelled => "cancelled",
            IndexError::Store(_) => "store",
        }
    }
}
