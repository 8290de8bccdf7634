use thiserror::Error;

/// Error taxonomy for the persistence layer (C5), per the error handling
/// design: `SchemaMismatch` is fatal at startup, `Conflict` is retried with
/// backoff by the caller and becomes fatal only once that bound is exceeded.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database schema version {found} is newer than this build supports ({supported})")]
    SchemaMismatch { found: i64, supported: i64 },

    #[error("transient write conflict on {table}")]
    Conflict { table: String },

    #[error("migration failed: {0}")]
    Migration(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
