use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store query failed: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("failed to reset database file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("mismatched values in csv: wanted {expected} got {actual}")]
    RecordLengthMismatch { expected: usize, actual: usize },
    #[error("csv input has no header row")]
    MissingHeader,
    #[error("failed to parse datetime {value:?} with format {format:?}: {source}")]
    InvalidTimestamp {
        value: String,
        format: String,
        source: chrono::ParseError,
    },
    #[error("invalid row: {0}")]
    InvalidRow(#[source] csv::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ImportError {
    /// Errors confined to a single row; the import skips the row and keeps going.
    pub fn is_row_level(&self) -> bool {
        matches!(
            self,
            ImportError::InvalidTimestamp { .. } | ImportError::InvalidRow(_)
        )
    }
}
