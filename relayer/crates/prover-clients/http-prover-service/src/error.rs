use std::time::Duration;

use relayer_prover_client_interface::ProverClientError;
use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ProverServiceError {
    /// Network/transport errors (connection refused, incomplete messages, etc.)
    #[error("Network error during {operation}: {message}")]
    NetworkError { operation: String, message: String },

    /// The request did not complete within the configured timeout
    #[error("Request timed out during {operation} after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    /// Service returned an error response (4xx/5xx status codes)
    #[error("Service error during {operation} (status {status}): {message}")]
    ApiError { operation: String, status: StatusCode, message: String },

    /// JSON parsing errors
    #[error("Failed to parse response during {operation}: {message}")]
    ParseError { operation: String, message: String },

    /// URL/path segment errors
    #[error("Failed to build URL for {operation}: {message}")]
    UrlError { operation: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

impl ProverServiceError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            ProverServiceError::NetworkError { .. } | ProverServiceError::Timeout { .. } => true,
            ProverServiceError::ApiError { status, .. } => status.is_server_error(),
            _ => false,
        }
    }

    pub fn from_reqwest_error(operation: impl Into<String>, timeout: Duration, source: reqwest::Error) -> Self {
        let operation = operation.into();

        if source.is_timeout() {
            ProverServiceError::Timeout { operation, timeout }
        } else if source.is_connect() {
            ProverServiceError::NetworkError { operation, message: format!("connection failed: {}", source) }
        } else if source.is_decode() {
            ProverServiceError::ParseError { operation, message: source.to_string() }
        } else if let Some(status) = source.status() {
            ProverServiceError::ApiError { operation, status, message: source.to_string() }
        } else {
            ProverServiceError::NetworkError { operation, message: source.to_string() }
        }
    }

    pub fn parse_error(operation: impl Into<String>, message: impl Into<String>) -> Self {
        ProverServiceError::ParseError { operation: operation.into(), message: message.into() }
    }
}

impl From<ProverServiceError> for ProverClientError {
    fn from(value: ProverServiceError) -> Self {
        match value {
            ProverServiceError::Timeout { timeout, .. } => Self::Timeout(timeout),
            other => Self::Internal(Box::new(other)),
        }
    }
}
