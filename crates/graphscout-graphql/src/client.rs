//! GraphQL client with a per-endpoint schema cache.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use graphscout_http::{DEFAULT_EXECUTE_TIMEOUT, FetchResult, SecureFetcher};
use graphscout_security::SecurityPolicy;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::cid::CidResolver;
use crate::error::{GraphQLError, Result};
use crate::introspection::{INTROSPECTION_QUERY, parse_introspection};
use crate::schema::Schema;
use crate::validation;

/// Parsed GraphQL response; GraphQL-level errors are data, not failures
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphQLResponse {
    /// `data`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// `errors`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<Value>>,
    /// `extensions`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl GraphQLResponse {
    /// Whether the response carries GraphQL errors
    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().is_some_and(|e| !e.is_empty())
    }

    /// `message` of every GraphQL error
    pub fn error_messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .flatten()
            .map(|e| match e.get("message").and_then(Value::as_str) {
                Some(message) => message.to_string(),
                None => e.to_string(),
            })
            .collect()
    }
}

/// Cache key for an endpoint's schema
pub fn schema_cache_key(endpoint: &str) -> String {
    format!("{endpoint}:introspection")
}

/// Builder for [`GraphQLClient`]
#[derive(Debug, Clone)]
pub struct GraphQLClientBuilder {
    endpoint: String,
    authorization: Option<String>,
    introspection: Option<Value>,
    policy: SecurityPolicy,
    timeout: Duration,
}

impl GraphQLClientBuilder {
    /// Authorization header value, sent verbatim
    #[must_use]
    pub fn authorization(mut self, value: impl Into<String>) -> Self {
        self.authorization = Some(value.into());
        self
    }

    /// Pre-fetched introspection payload used instead of a network call
    #[must_use]
    pub fn introspection(mut self, payload: Value) -> Self {
        self.introspection = Some(payload);
        self
    }

    /// SSRF policy
    #[must_use]
    pub fn policy(mut self, policy: SecurityPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Execution timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the client
    ///
    /// # Errors
    ///
    /// Returns [`GraphQLError::InvalidResponse`] if the authorization value
    /// is not a valid header, or a fetch error if the HTTP client cannot be
    /// built.
    pub fn build(self) -> Result<GraphQLClient> {
        let mut headers = HeaderMap::new();
        if let Some(authorization) = &self.authorization {
            let mut value = HeaderValue::from_str(authorization).map_err(|_| {
                GraphQLError::invalid_response("authorization is not a valid header value")
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Ok(GraphQLClient {
            fetcher: SecureFetcher::new(self.policy)?,
            endpoint: self.endpoint,
            headers,
            introspection: self.introspection,
            timeout: self.timeout,
            cache: Arc::new(DashMap::new()),
        })
    }
}

/// GraphQL client for one endpoint
///
/// Clones share the schema cache.
#[derive(Debug, Clone)]
pub struct GraphQLClient {
    fetcher: SecureFetcher,
    endpoint: String,
    headers: HeaderMap,
    introspection: Option<Value>,
    timeout: Duration,
    cache: Arc<DashMap<String, Arc<Schema>>>,
}

impl GraphQLClient {
    /// Start building a client for `endpoint`
    pub fn builder(endpoint: impl Into<String>) -> GraphQLClientBuilder {
        GraphQLClientBuilder {
            endpoint: endpoint.into(),
            authorization: None,
            introspection: None,
            policy: SecurityPolicy::strict(),
            timeout: DEFAULT_EXECUTE_TIMEOUT,
        }
    }

    /// Endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetch the schema, using the cache when possible.
    ///
    /// The cache is never invalidated here; build a new client or supply an
    /// introspection payload to refresh.
    ///
    /// # Errors
    ///
    /// Returns a fetch error for transport or security failures, or
    /// [`GraphQLError::Introspection`] for an unusable introspection result.
    pub async fn fetch_schema(&self) -> Result<Arc<Schema>> {
        let key = schema_cache_key(&self.endpoint);
        if let Some(schema) = self.cache.get(&key) {
            debug!("Schema cache hit for {}", self.endpoint);
            return Ok(Arc::clone(schema.value()));
        }

        let payload = match &self.introspection {
            Some(payload) => payload.clone(),
            None => {
                debug!("Schema cache miss for {}, introspecting", self.endpoint);
                self.post(&json!({ "query": INTROSPECTION_QUERY })).await?
            }
        };

        let schema = Arc::new(Schema::from_introspection(parse_introspection(&payload)?)?);
        // Concurrent misses may both insert; last writer wins
        self.cache.insert(key, Arc::clone(&schema));
        info!("Cached schema for {}", self.endpoint);
        Ok(schema)
    }

    /// Execute a query, returning the response body verbatim.
    ///
    /// GraphQL `errors` are part of the returned value, not an `Err`.
    ///
    /// # Errors
    ///
    /// Returns a fetch error for non-2xx status, non-JSON body, timeout or a
    /// security violation, and [`GraphQLError::InvalidResponse`] when the body
    /// is not a GraphQL response object.
    pub async fn execute(&self, query: &str, variables: Option<Value>) -> Result<GraphQLResponse> {
        let mut body = json!({ "query": query });
        if let Some(variables) = variables {
            body["variables"] = variables;
        }

        let value = self.post(&body).await?;
        serde_json::from_value(value).map_err(|e| GraphQLError::invalid_response(e.to_string()))
    }

    /// Validate a query, returning one message per problem.
    ///
    /// Syntax errors short-circuit without touching the network. A schema
    /// that cannot be fetched is reported as a single message.
    ///
    /// # Errors
    ///
    /// Only security violations are returned as errors.
    pub async fn validate(&self, query: &str) -> Result<Vec<String>> {
        if let Err(message) = validation::check_syntax(query) {
            return Ok(vec![message]);
        }

        match self.fetch_schema().await {
            Ok(schema) => Ok(validation::validate_query(&schema, query)),
            Err(e) if e.is_security_violation() => Err(e),
            Err(e) => {
                warn!("Schema unavailable for validation of {}: {}", self.endpoint, e);
                Ok(vec![format!("Unable to fetch schema for validation: {e}")])
            }
        }
    }

    /// Discover the deployment CID of this client's endpoint
    ///
    /// # Errors
    ///
    /// Only security violations are returned as errors.
    pub async fn fetch_cid(&self) -> Result<String> {
        self.cid_resolver()
            .fetch_cid_from_endpoint(&self.endpoint, &self.headers)
            .await
    }

    /// Discover the deployment CID of any endpoint with this client's policy
    /// and credentials
    ///
    /// # Errors
    ///
    /// Only security violations are returned as errors.
    pub async fn fetch_cid_from_endpoint(&self, endpoint: &str) -> Result<String> {
        self.cid_resolver()
            .fetch_cid_from_endpoint(endpoint, &self.headers)
            .await
    }

    fn cid_resolver(&self) -> CidResolver {
        CidResolver::new(self.fetcher.clone())
    }

    async fn post(&self, body: &Value) -> FetchResult<Value> {
        self.fetcher
            .post_json(&self.endpoint, body, self.headers.clone(), self.timeout)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cache_key() {
        assert_eq!(
            schema_cache_key("https://indexer.example.com/graphql"),
            "https://indexer.example.com/graphql:introspection"
        );
    }

    #[test]
    fn test_response_error_messages() {
        let response: GraphQLResponse = serde_json::from_value(json!({
            "data": null,
            "errors": [{ "message": "Type `Query` has no field `nope`" }, { "code": 1 }]
        }))
        .unwrap();
        assert!(response.has_errors());
        assert_eq!(
            response.error_messages(),
            vec!["Type `Query` has no field `nope`".to_string(), "{\"code\":1}".to_string()]
        );
    }

    #[test]
    fn test_invalid_authorization_is_rejected() {
        let result = GraphQLClient::builder("https://indexer.example.com/graphql")
            .authorization("Bearer \n bad")
            .build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_syntax_errors_skip_the_network() {
        let client = GraphQLClient::builder("https://indexer.invalid/graphql")
            .build()
            .unwrap();
        let messages = client.validate("{ malformed").await.unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Syntax Error"));
    }

    #[tokio::test]
    async fn test_blocked_endpoint_is_an_error_for_validation() {
        let client = GraphQLClient::builder("http://169.254.169.254/graphql")
            .build()
            .unwrap();
        let err = client.validate("{ ok }").await.unwrap_err();
        assert!(err.is_security_violation());
    }
}
