//! # Secure fetch
//!
//! POST-with-JSON fetching for untrusted endpoints.
//!
//! [`SecureFetcher::fetch`] is the hardened path used for discovery calls:
//! - Redirects are followed manually, and every hop is re-validated against
//!   the SSRF policy before a request is issued
//! - One timer and one cancellation token cover the entire operation,
//!   including every hop and the streaming body read
//! - The body is streamed and the read stops the moment the running byte
//!   count would pass the cap, whatever `Content-Length` claims
//!
//! [`SecureFetcher::post_json`] is the standard execution path: reqwest
//! follows redirects itself, but its redirect policy still runs every hop
//! through the same validator.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use graphscout_security::{EndpointValidator, SecurityPolicy};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::redirect;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::error::{FetchError, FetchResult};

/// User agent sent on every outbound request
pub const USER_AGENT: &str = concat!("graphscout/", env!("CARGO_PKG_VERSION"));

/// Default timeout for GraphQL execution through [`SecureFetcher::post_json`]
pub const DEFAULT_EXECUTE_TIMEOUT: Duration = Duration::from_secs(30);

/// Redirect hops the standard execution client will follow
const STANDARD_MAX_REDIRECTS: usize = 10;

/// Per-call resource limits for the hardened path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchBudget {
    /// Wall-clock limit for the whole operation, all hops included
    pub timeout: Duration,

    /// Maximum number of redirect hops
    pub max_redirects: u32,

    /// Maximum response body size in bytes
    pub max_content_length: usize,
}

impl FetchBudget {
    /// Budget used for content-identifier discovery: 10s, 3 redirects, 10 MiB
    pub const fn discovery() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_redirects: 3,
            max_content_length: 10 * 1024 * 1024,
        }
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the redirect limit
    #[must_use]
    pub fn with_max_redirects(mut self, max_redirects: u32) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    /// Set the body size cap
    #[must_use]
    pub fn with_max_content_length(mut self, bytes: usize) -> Self {
        self.max_content_length = bytes;
        self
    }
}

impl Default for FetchBudget {
    fn default() -> Self {
        Self::discovery()
    }
}

/// Response body: JSON when it parses, raw text otherwise
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody {
    /// Body parsed as JSON
    Json(Value),
    /// Body that is not valid JSON
    Text(String),
}

impl ParsedBody {
    /// JSON value, if the body parsed
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    /// Consume into the JSON value, if the body parsed
    pub fn into_json(self) -> Option<Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        let text = String::from_utf8_lossy(bytes);
        match serde_json::from_str(&text) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Text(text.into_owned()),
        }
    }
}

/// Observer invoked once per followed redirect with `(from, to)`
pub type RedirectHook = Arc<dyn Fn(&Url, &Url) + Send + Sync>;

/// Options for one hardened fetch
#[derive(Clone, Default)]
pub struct FetchRequest {
    /// Extra headers (e.g. `Authorization`)
    pub headers: HeaderMap,
    /// Resource limits
    pub budget: FetchBudget,
    /// Caller-side cancellation; the operation also cancels itself on timeout
    pub cancel: CancellationToken,
    /// Redirect observer
    pub on_redirect: Option<RedirectHook>,
}

impl fmt::Debug for FetchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchRequest")
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("budget", &self.budget)
            .field("on_redirect", &self.on_redirect.is_some())
            .finish()
    }
}

impl FetchRequest {
    /// Create a request with the given budget
    pub fn new(budget: FetchBudget) -> Self {
        Self {
            budget,
            ..Self::default()
        }
    }

    /// Add a header; invalid values are rejected by the caller's `HeaderValue`
    #[must_use]
    pub fn with_header(mut self, name: header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replace the header map
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Tie the fetch to a caller-owned cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Observe redirect hops
    #[must_use]
    pub fn on_redirect(mut self, hook: impl Fn(&Url, &Url) + Send + Sync + 'static) -> Self {
        self.on_redirect = Some(Arc::new(hook));
        self
    }
}

/// SSRF-hardened HTTP fetcher
///
/// Holds two clients: one with redirects disabled for the manual hop loop,
/// and one whose redirect policy re-validates each hop for standard
/// execution.
#[derive(Debug, Clone)]
pub struct SecureFetcher {
    /// Client with redirects disabled
    manual: reqwest::Client,

    /// Client following redirects through the validator
    standard: reqwest::Client,

    /// Shared validator
    validator: Arc<EndpointValidator>,
}

impl SecureFetcher {
    /// Create a fetcher enforcing the given policy
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if an HTTP client cannot be built.
    pub fn new(policy: SecurityPolicy) -> FetchResult<Self> {
        Self::with_validator(EndpointValidator::new(policy))
    }

    /// Create a fetcher around an existing validator
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if an HTTP client cannot be built.
    pub fn with_validator(validator: EndpointValidator) -> FetchResult<Self> {
        let validator = Arc::new(validator);

        let manual = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(redirect::Policy::none()) // Hops are followed and validated by hand
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        let hop_validator = Arc::clone(&validator);
        let standard = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(DEFAULT_EXECUTE_TIMEOUT)
            .redirect(redirect::Policy::custom(move |attempt| {
                if attempt.previous().len() >= STANDARD_MAX_REDIRECTS {
                    return attempt.error("too many redirects");
                }
                match hop_validator.validate_url(attempt.url()) {
                    Ok(_) => attempt.follow(),
                    Err(e) => attempt.error(e),
                }
            }))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            manual,
            standard,
            validator,
        })
    }

    /// Get the validator
    pub fn validator(&self) -> &EndpointValidator {
        &self.validator
    }

    /// POST `body` to `url` under the hardened rules.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Security`] if the URL or any redirect target is blocked
    /// - [`FetchError::Timeout`] / [`FetchError::Cancelled`] when the budget
    ///   runs out or the caller cancels
    /// - [`FetchError::TooManyRedirects`], [`FetchError::MissingRedirectLocation`],
    ///   [`FetchError::ResponseTooLarge`], [`FetchError::Status`] for the
    ///   corresponding transport conditions
    pub async fn fetch(
        &self,
        url: &str,
        body: &Value,
        request: FetchRequest,
    ) -> FetchResult<ParsedBody> {
        let budget = request.budget;
        // One token for the whole operation, propagated into every read
        let operation = request.cancel.child_token();

        tokio::select! {
            biased;
            () = operation.cancelled() => Err(FetchError::Cancelled),
            () = tokio::time::sleep(budget.timeout) => {
                operation.cancel();
                warn!("Fetch of {} timed out after {:?}", url, budget.timeout);
                Err(FetchError::Timeout {
                    timeout_ms: budget.timeout.as_millis() as u64,
                })
            }
            result = self.fetch_hops(url, body, &request, &operation) => result,
        }
    }

    async fn fetch_hops(
        &self,
        url: &str,
        body: &Value,
        request: &FetchRequest,
        operation: &CancellationToken,
    ) -> FetchResult<ParsedBody> {
        let budget = request.budget;
        let mut current = self.validator.validate(url)?;
        let mut headers = request.headers.clone();
        let mut hops: u32 = 0;

        loop {
            debug!("POST {} (hop {})", current, hops);
            let response = self
                .manual
                .post(current.clone())
                .headers(headers.clone())
                .header(header::CONTENT_TYPE, "application/json")
                .json(body)
                .send()
                .await
                .map_err(|e| FetchError::from_reqwest(&e))?;

            let status = response.status();
            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(header::LOCATION)
                    .ok_or(FetchError::MissingRedirectLocation {
                        status: status.as_u16(),
                    })?
                    .to_str()
                    .map_err(|e| FetchError::InvalidRedirectLocation(e.to_string()))?
                    .to_string();

                hops += 1;
                if hops > budget.max_redirects {
                    warn!(
                        "Redirect chain from {} exceeded {} hops",
                        url, budget.max_redirects
                    );
                    return Err(FetchError::TooManyRedirects {
                        max: budget.max_redirects,
                    });
                }

                let next = current.join(&location).map_err(|e| {
                    FetchError::InvalidRedirectLocation(format!("{location}: {e}"))
                })?;
                let next = self.validator.validate_url(&next)?;

                if next.origin() != current.origin() {
                    strip_credentials(&mut headers);
                }

                if let Some(hook) = &request.on_redirect {
                    hook(&current, &next);
                }
                debug!("Following {} redirect {} -> {}", status.as_u16(), current, next);
                current = next;
                continue;
            }

            let bytes = read_capped(response.content_length(), response, budget, operation).await?;
            let parsed = ParsedBody::from_bytes(&bytes);

            if !status.is_success() {
                let body = match parsed {
                    ParsedBody::Text(text) => text,
                    ParsedBody::Json(_) => String::from_utf8_lossy(&bytes).into_owned(),
                };
                return Err(FetchError::Status {
                    status: status.as_u16(),
                    status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
                    body,
                });
            }

            return Ok(parsed);
        }
    }

    /// POST `body` to `url` through the standard client and parse the JSON reply.
    ///
    /// Redirects are followed by reqwest, each hop re-validated. No explicit
    /// size cap is applied.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Security`] for blocked URLs or hops,
    /// [`FetchError::Timeout`] when `timeout` elapses, [`FetchError::Status`]
    /// for non-2xx replies and [`FetchError::InvalidJson`] for non-JSON bodies.
    pub async fn post_json(
        &self,
        url: &str,
        body: &Value,
        headers: HeaderMap,
        timeout: Duration,
    ) -> FetchResult<Value> {
        let target = self.validator.validate(url)?;

        let response = self
            .standard
            .post(target)
            .headers(headers)
            .header(header::CONTENT_TYPE, "application/json")
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| map_timeout(&e, timeout))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| map_timeout(&e, timeout))?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| FetchError::InvalidJson(e.to_string()))
    }
}

/// Credentials never follow a redirect to another origin
fn strip_credentials(headers: &mut HeaderMap) {
    for name in [header::AUTHORIZATION, header::COOKIE, header::PROXY_AUTHORIZATION] {
        if headers.remove(&name).is_some() {
            debug!("Dropping {} on cross-origin redirect", name);
        }
    }
}

fn map_timeout(error: &reqwest::Error, timeout: Duration) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    } else {
        FetchError::from_reqwest(error)
    }
}

/// Stream the body, stopping as soon as the cap would be exceeded
async fn read_capped(
    declared: Option<u64>,
    response: reqwest::Response,
    budget: FetchBudget,
    operation: &CancellationToken,
) -> FetchResult<Vec<u8>> {
    let limit = budget.max_content_length;

    if let Some(declared) = declared
        && declared > limit as u64
    {
        return Err(FetchError::ResponseTooLarge {
            received: declared,
            limit,
        });
    }

    let capacity = declared.map_or(0, |d| d as usize).min(limit);
    let mut buffer = Vec::with_capacity(capacity);
    let mut stream = response.bytes_stream();

    loop {
        let chunk = tokio::select! {
            biased;
            () = operation.cancelled() => return Err(FetchError::Cancelled),
            chunk = stream.next() => chunk,
        };
        let Some(chunk) = chunk else { break };
        let chunk = chunk.map_err(|e| FetchError::Http(format!("Failed to read response: {e}")))?;

        let received = buffer.len() + chunk.len();
        if received > limit {
            warn!(
                "Response exceeded {} byte cap (declared: {:?})",
                limit, declared
            );
            return Err(FetchError::ResponseTooLarge {
                received: received as u64,
                limit,
            });
        }
        buffer.extend_from_slice(&chunk);
    }

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_discovery_budget_defaults() {
        let budget = FetchBudget::default();
        assert_eq!(budget.timeout, Duration::from_secs(10));
        assert_eq!(budget.max_redirects, 3);
        assert_eq!(budget.max_content_length, 10 * 1024 * 1024);
    }

    #[test]
    fn test_budget_builders() {
        let budget = FetchBudget::discovery()
            .with_timeout(Duration::from_millis(250))
            .with_max_redirects(0)
            .with_max_content_length(64);
        assert_eq!(budget.timeout, Duration::from_millis(250));
        assert_eq!(budget.max_redirects, 0);
        assert_eq!(budget.max_content_length, 64);
    }

    #[test]
    fn test_parsed_body_prefers_json() {
        assert_eq!(
            ParsedBody::from_bytes(br#"{"data":{"ok":true}}"#),
            ParsedBody::Json(json!({"data": {"ok": true}}))
        );
        assert_eq!(
            ParsedBody::from_bytes(b"<html>bad gateway</html>"),
            ParsedBody::Text("<html>bad gateway</html>".to_string())
        );
    }

    #[test]
    fn test_strip_credentials_keeps_other_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer t"));
        headers.insert(header::COOKIE, HeaderValue::from_static("session=1"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        strip_credentials(&mut headers);

        assert!(headers.get(header::AUTHORIZATION).is_none());
        assert!(headers.get(header::COOKIE).is_none());
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_user_agent_is_versioned() {
        assert!(USER_AGENT.starts_with("graphscout/"));
    }

    #[tokio::test]
    async fn test_blocked_url_fails_before_any_request() {
        let fetcher = SecureFetcher::new(SecurityPolicy::strict()).unwrap();
        let result = fetcher
            .fetch(
                "http://169.254.169.254/latest/meta-data",
                &json!({"query": "{ __typename }"}),
                FetchRequest::default(),
            )
            .await;
        assert!(matches!(result, Err(FetchError::Security(_))));
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits() {
        let fetcher = SecureFetcher::new(SecurityPolicy::strict()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = fetcher
            .fetch(
                "https://indexer.example.com/graphql",
                &json!({}),
                FetchRequest::default().with_cancellation(cancel),
            )
            .await;
        assert!(matches!(result, Err(FetchError::Cancelled)));
    }
}
