//! Store error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in the persistent stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store at {path} is locked by another process")]
    Locked { path: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locked_message_names_path() {
        let err = StoreError::Locked {
            path: PathBuf::from("/tmp/watch"),
        };
        assert!(err.to_string().contains("/tmp/watch"));
    }
}
