//! Error types for the GraphQL client.

use graphscout_http::FetchError;
use graphscout_security::SecurityError;
use thiserror::Error;

/// Result type for GraphQL client operations
pub type Result<T> = std::result::Result<T, GraphQLError>;

/// GraphQL client errors
#[derive(Debug, Error)]
pub enum GraphQLError {
    /// Transport or security failure from the HTTP layer
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Introspection payload could not be turned into a schema
    #[error("invalid introspection result: {0}")]
    Introspection(String),

    /// Subgraph manifest could not be parsed
    #[error("invalid subgraph manifest: {0}")]
    Manifest(String),

    /// Endpoint answered with something that is not a GraphQL response
    #[error("invalid GraphQL response: {0}")]
    InvalidResponse(String),
}

impl GraphQLError {
    /// Create an introspection error
    pub fn introspection(msg: impl Into<String>) -> Self {
        Self::Introspection(msg.into())
    }

    /// Create a manifest error
    pub fn manifest(msg: impl Into<String>) -> Self {
        Self::Manifest(msg.into())
    }

    /// Create an invalid response error
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Whether this error is an endpoint security violation
    pub fn is_security_violation(&self) -> bool {
        matches!(self, Self::Fetch(e) if e.is_security_violation())
    }
}

impl From<SecurityError> for GraphQLError {
    fn from(error: SecurityError) -> Self {
        Self::Fetch(FetchError::Security(error))
    }
}
