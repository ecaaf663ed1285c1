//! Cloud API error types

use thiserror::Error;

/// Errors from the cloud provisioning API
#[derive(Debug, Error)]
pub enum CloudError {
    #[error("Throttled by the platform")]
    Throttled,

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Missing prerequisite: {0}")]
    MissingPrerequisite(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl CloudError {
    /// Whether the error is worth retrying with backoff
    ///
    /// Throttling, service unavailability, and internal platform errors are
    /// transient; misconfiguration and missing prerequisites are not.
    pub fn is_transient(&self) -> bool {
        match self {
            CloudError::Throttled => true,
            CloudError::Api { status, .. } => *status >= 500,
            CloudError::Network(_) => true,
            CloudError::MissingPrerequisite(_) => false,
            CloudError::InvalidResponse(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttled_is_transient() {
        assert!(CloudError::Throttled.is_transient());
    }

    #[test]
    fn test_server_errors_are_transient() {
        assert!(
            CloudError::Api {
                status: 500,
                message: "internal".to_string()
            }
            .is_transient()
        );
        assert!(
            CloudError::Api {
                status: 503,
                message: "unavailable".to_string()
            }
            .is_transient()
        );
    }

    #[test]
    fn test_client_errors_are_permanent() {
        assert!(
            !CloudError::Api {
                status: 400,
                message: "bad request".to_string()
            }
            .is_transient()
        );
        assert!(!CloudError::MissingPrerequisite("no usable subnet".to_string()).is_transient());
        assert!(!CloudError::InvalidResponse("not json".to_string()).is_transient());
    }
}
