use axum::http::StatusCode;
use thiserror::Error;

/// Errors surfaced by the record store, the data manager and the detector.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Item '{item_id}' references unknown project '{project_id}'")]
    Integrity { item_id: String, project_id: String },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record store lock was poisoned")]
    LockPoisoned,

    #[error("No healthy storage backend available")]
    NoBackendAvailable,
}

impl SyncError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether the caller supplied bad input (as opposed to a server-side failure)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Integrity { .. })
    }

    pub fn status_code(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_map_to_bad_request() {
        assert_eq!(
            SyncError::validation("projects is missing").status_code(),
            StatusCode::BAD_REQUEST
        );
        let err = SyncError::Integrity {
            item_id: "i1".to_string(),
            project_id: "nope".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Item 'i1' references unknown project 'nope'");
    }

    #[test]
    fn test_server_errors_map_to_internal() {
        assert_eq!(
            SyncError::LockPoisoned.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            SyncError::NoBackendAvailable.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let err = SyncError::from(rusqlite::Error::InvalidQuery);
        assert!(!err.is_client_error());
    }
}
