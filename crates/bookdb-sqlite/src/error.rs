use bookdb_core::BackendError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("cannot decode {column} value {value:?}")]
    Decode { column: &'static str, value: String },
}

impl StoreError {
    pub fn decode(column: &'static str, value: impl Into<String>) -> Self {
        StoreError::Decode {
            column,
            value: value.into(),
        }
    }
}

impl From<StoreError> for BackendError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::IOError(e) => BackendError::IOError(e),
            e => BackendError::Storage(e.to_string()),
        }
    }
}
