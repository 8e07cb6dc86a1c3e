//! Error types for outbound fetches.

use graphscout_security::SecurityError;
use thiserror::Error;

/// Result type for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// A single gateway's failure inside a race
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayFailure {
    /// Gateway base URL
    pub url: String,
    /// Why this gateway failed
    pub reason: String,
}

/// Errors that can occur while fetching remote resources.
///
/// [`FetchError::Security`] is never retried and never downgraded by any
/// layer; everything else is a transport failure the caller may choose to
/// retry.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Endpoint security validation rejected the URL (initial or redirect hop)
    #[error("security violation: {0}")]
    Security(#[from] SecurityError),

    /// The whole operation exceeded its time budget
    #[error("request timed out after {timeout_ms}ms")]
    Timeout {
        /// Budget that was exceeded
        timeout_ms: u64,
    },

    /// The caller cancelled the operation
    #[error("request cancelled")]
    Cancelled,

    /// The redirect chain was longer than allowed
    #[error("too many redirects (max: {max})")]
    TooManyRedirects {
        /// Configured limit
        max: u32,
    },

    /// A 3xx response came back without a `Location` header
    #[error("redirect response {status} has no Location header")]
    MissingRedirectLocation {
        /// Redirect status code
        status: u16,
    },

    /// The `Location` header could not be resolved to a URL
    #[error("invalid redirect location: {0}")]
    InvalidRedirectLocation(String),

    /// Response body exceeded the byte cap
    #[error("response size limit exceeded: {received} bytes (max: {limit} bytes)")]
    ResponseTooLarge {
        /// Bytes declared or received when the cap tripped
        received: u64,
        /// Configured cap
        limit: usize,
    },

    /// Final response carried a non-2xx status
    #[error("HTTP {status} {status_text}: {body}")]
    Status {
        /// Status code
        status: u16,
        /// Canonical reason phrase
        status_text: String,
        /// Raw response body
        body: String,
    },

    /// A response that had to be JSON was not
    #[error("invalid JSON response: {0}")]
    InvalidJson(String),

    /// Connection, TLS or body read failure
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// HTTP client could not be constructed
    #[error("failed to create HTTP client: {0}")]
    Client(String),

    /// Every gateway in the pool failed
    #[error("all {} IPFS gateways failed: {}", .failures.len(), format_failures(.failures))]
    AllGatewaysFailed {
        /// One entry per gateway, in settlement order
        failures: Vec<GatewayFailure>,
    },
}

impl FetchError {
    /// Whether this error is an endpoint security violation
    pub fn is_security_violation(&self) -> bool {
        matches!(self, Self::Security(_))
    }

    pub(crate) fn from_reqwest(error: &reqwest::Error) -> Self {
        // Redirect policy errors carry the SecurityError that stopped the hop
        if let Some(security) = find_security_error(error) {
            return Self::Security(security);
        }
        Self::Http(error.to_string())
    }
}

fn find_security_error(error: &reqwest::Error) -> Option<SecurityError> {
    let mut source = std::error::Error::source(error);
    while let Some(inner) = source {
        if let Some(security) = inner.downcast_ref::<SecurityError>() {
            return Some(security.clone());
        }
        source = inner.source();
    }
    None
}

fn format_failures(failures: &[GatewayFailure]) -> String {
    if failures.is_empty() {
        return "no gateways configured".to_string();
    }
    failures
        .iter()
        .map(|f| format!("{} ({})", f.url, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregated_gateway_message_lists_every_gateway() {
        let error = FetchError::AllGatewaysFailed {
            failures: vec![
                GatewayFailure {
                    url: "https://a.example/ipfs/".to_string(),
                    reason: "HTTP 504 Gateway Timeout".to_string(),
                },
                GatewayFailure {
                    url: "https://b.example/api/v0/cat?arg=".to_string(),
                    reason: "timed out after 30000ms".to_string(),
                },
            ],
        };

        let message = error.to_string();
        assert!(message.starts_with("all 2 IPFS gateways failed"));
        assert!(message.contains("https://a.example/ipfs/ (HTTP 504 Gateway Timeout)"));
        assert!(message.contains("https://b.example/api/v0/cat?arg= (timed out after 30000ms)"));
    }

    #[test]
    fn test_security_classification() {
        let error = FetchError::from(SecurityError::EmbeddedCredentials);
        assert!(error.is_security_violation());
        assert!(!FetchError::Cancelled.is_security_violation());
    }
}
