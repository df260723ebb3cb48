use uuid::Uuid;

use thiserror::Error;

/// Schema version stamp every type handler must carry.
pub const BACKEND_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("no such database: {0}")]
    NoSuchDatabase(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("unknown object type: {0}")]
    UnknownObjectType(String),
    #[error("a query is already running on this session")]
    QueryInProgress,
    #[error("no book attached to the session")]
    NoBook,
    #[error("a book is already attached to the session")]
    BookAlreadyAttached,
    #[error("object not found: {0}")]
    ObjectNotFound(Uuid),
    #[error("session is not connected")]
    NotConnected,
    #[error("misconfigured backend: {0}")]
    Misconfigured(String),
    #[error("malformed query: {0}")]
    BadQuery(String),
}

/// Fixed vocabulary of failure codes reported for an open, save or query
/// action as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NoSuchDatabase,
    ServerError,
    UnknownObjectType,
    QueryInProgress,
    NoBook,
    BookAlreadyAttached,
    ObjectNotFound,
    NotConnected,
    Misconfigured,
    BadQuery,
}

impl BackendError {
    pub fn code(&self) -> ErrorCode {
        match self {
            BackendError::NoSuchDatabase(_) => ErrorCode::NoSuchDatabase,
            BackendError::IOError(_) | BackendError::Storage(_) => ErrorCode::ServerError,
            BackendError::UnknownObjectType(_) => ErrorCode::UnknownObjectType,
            BackendError::QueryInProgress => ErrorCode::QueryInProgress,
            BackendError::NoBook => ErrorCode::NoBook,
            BackendError::BookAlreadyAttached => ErrorCode::BookAlreadyAttached,
            BackendError::ObjectNotFound(_) => ErrorCode::ObjectNotFound,
            BackendError::NotConnected => ErrorCode::NotConnected,
            BackendError::Misconfigured(_) => ErrorCode::Misconfigured,
            BackendError::BadQuery(_) => ErrorCode::BadQuery,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_surface_as_server_errors() {
        let err: BackendError = std::io::Error::new(std::io::ErrorKind::Other, "disk").into();
        assert_eq!(err.code(), ErrorCode::ServerError);
        assert_eq!(BackendError::QueryInProgress.code(), ErrorCode::QueryInProgress);
        assert_eq!(
            BackendError::UnknownObjectType("Lot".into()).to_string(),
            "unknown object type: Lot"
        );
    }
}
