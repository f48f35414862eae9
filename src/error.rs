/// Error types for sqlx-placeholders
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// DSN string could not be parsed
    #[error("Invalid DSN '{dsn}': {reason}")]
    Dsn { dsn: String, reason: String },

    /// DSN names a database this crate has no driver for
    #[error("Unsupported database scheme '{0}'")]
    UnsupportedScheme(String),

    /// Error from SQLx database operations
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Placeholder expansion produced a diagnostic and strict mode is on
    #[error("Placeholder expansion failed: {0}")]
    Expand(#[from] crate::expand::Diagnostic),

    /// Structural misuse of the query-rewrite contract, e.g. asking for a
    /// row total on a statement that is not a SELECT
    #[error("Unsupported query transform ({kind}) for: {sql}")]
    UnsupportedTransform { kind: &'static str, sql: String },

    /// A row-returning call was made with a statement that produced no
    /// result set
    #[error("Statement did not produce a row set")]
    NoRowSet,

    /// Begin/commit/rollback called in the wrong state
    #[error("Transaction error: {0}")]
    Transaction(&'static str),
}

/// Result type alias for sqlx-placeholders operations
pub type Result<T> = std::result::Result<T, Error>;
