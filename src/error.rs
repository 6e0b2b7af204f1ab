//! Error types for conduit management.
//!
//! Every failure that reaches a caller carries enough context to diagnose it:
//! remote failures keep the status code and the response body verbatim.

use thiserror::Error;

/// Conduit management error.
#[derive(Debug, Error)]
pub enum ConduitError {
    /// Connection establishment timed out on every attempt.
    #[error("connection timed out after {attempts} attempt(s): {message}")]
    TransientNetwork {
        /// Number of attempts made before giving up.
        attempts: u32,
        /// Description of the last connection failure.
        message: String,
    },

    /// The remote service answered with a non-success status.
    #[error("API error {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body as returned by the service.
        body: String,
    },

    /// Operation attempted on a conduit that has been deleted.
    #[error("conduit {conduit_id} has been deleted")]
    InvalidState {
        /// Id of the deleted conduit.
        conduit_id: String,
    },

    /// Event type is not present in the catalog.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// Caller supplied an argument the operation cannot honour.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Shard endpoint accepted the request but rejected this shard.
    #[error("shard {id} rejected ({code}): {message}")]
    ShardRejected {
        /// Shard id as reported by the service.
        id: String,
        /// Error code reported by the service.
        code: String,
        /// Human-readable reason.
        message: String,
    },

    /// A call needing an access token was made before one was acquired.
    #[error("no access token; acquire one first")]
    MissingToken,

    /// HTTP request failed for a reason other than a connect timeout.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Response parsed but did not have the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Configuration is incomplete or malformed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ConduitError {
    /// Build an [`ConduitError::Api`] from a status and body.
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            status,
            body: body.into(),
        }
    }

    /// Status code of an API error, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` when the service rejected the credentials.
    ///
    /// Tokens are not refreshed automatically; callers seeing this should
    /// re-acquire the token and retry.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Returns `true` for connection-level failures that may be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientNetwork { .. })
    }
}

/// Result type for conduit operations.
pub type Result<T> = std::result::Result<T, ConduitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_keeps_body_verbatim() {
        let err = ConduitError::api(409, r#"{"error":"Conflict"}"#);
        assert_eq!(err.status(), Some(409));
        assert_eq!(err.to_string(), r#"API error 409: {"error":"Conflict"}"#);
    }

    #[test]
    fn test_unauthorized_detection() {
        assert!(ConduitError::api(401, "").is_unauthorized());
        assert!(!ConduitError::api(403, "").is_unauthorized());
        assert!(!ConduitError::MissingToken.is_unauthorized());
    }

    #[test]
    fn test_only_connect_timeouts_are_transient() {
        let timeout = ConduitError::TransientNetwork {
            attempts: 3,
            message: "connect timeout".to_string(),
        };
        assert!(timeout.is_transient());
        assert!(!ConduitError::api(503, "unavailable").is_transient());
    }
}
