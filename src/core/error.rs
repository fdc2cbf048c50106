//! Engine error types.
//!
//! [`GatewayError`] is the canonical user-visible failure: filters raise it,
//! the pipeline routes it through the ERROR stage, and the built-in error
//! filter turns it into the response the client observes. [`ConfigError`] is
//! confined to the loading path: a script that fails to compile is logged and
//! the previously compiled instance keeps serving.

use std::path::PathBuf;

use http::StatusCode;

/// Canonical gateway failure carrying the client-visible status, a short
/// machine-readable cause token, and a human message.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct GatewayError {
    /// HTTP status the response should carry (absent an override).
    pub status: StatusCode,
    /// Short cause token surfaced in the error-cause response header.
    pub error_cause: String,
    /// Human-readable message rendered into the error body.
    pub message: String,
    /// Underlying error, if any.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl GatewayError {
    pub fn new(status: u16, error_cause: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            error_cause: error_cause.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

/// Failure to turn a filter source blob into a runnable filter.
///
/// Never reaches a request: the loader logs it and retains the previous
/// instance for the affected path.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to compile filter script {path}: {detail}")]
    Compile { path: PathBuf, detail: String },

    #[error("filter script {path} is missing required declaration '{name}'")]
    MissingDeclaration { path: PathBuf, name: &'static str },

    #[error("filter script {path} has invalid declaration '{name}': {detail}")]
    InvalidDeclaration {
        path: PathBuf,
        name: &'static str,
        detail: String,
    },

    #[error("failed to read filter script {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_fields() {
        let err = GatewayError::new(501, "route.not.defined", "no route target configured");
        assert_eq!(err.status, StatusCode::NOT_IMPLEMENTED);
        assert_eq!(err.error_cause, "route.not.defined");
        assert_eq!(err.to_string(), "no route target configured");
    }

    #[test]
    fn test_gateway_error_bad_status_falls_back_to_500() {
        let err = GatewayError::new(9999, "x", "y");
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_gateway_error_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = GatewayError::new(502, "origin.unreachable", "origin refused").with_source(io);
        assert!(std::error::Error::source(&err).is_some());
    }
}
