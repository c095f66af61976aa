use thiserror::Error;

/// Failures of the local persistence boundary (watermarks, visited ledger)
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
