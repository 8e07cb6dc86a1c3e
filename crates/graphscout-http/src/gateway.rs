//! IPFS gateway racing.
//!
//! Content-addressed paths are fetched from every configured gateway at once;
//! the first 2xx body wins. Gateways are an operator-controlled pool, so this
//! path uses a plain client with a per-call timeout rather than the
//! redirect-hardened fetcher.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::{self, JoinSet};
use tracing::{debug, info, warn};

use crate::error::{FetchError, FetchResult, GatewayFailure};
use crate::fetch::USER_AGENT;

/// Environment variable holding a JSON array of gateway descriptors
pub const GATEWAYS_ENV: &str = "GRAPHSCOUT_IPFS_GATEWAYS";

/// Per-gateway timeout
pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP verb a gateway expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GatewayMethod {
    /// Path-style gateway (`/ipfs/<cid>`)
    #[serde(rename = "GET", alias = "get")]
    Get,
    /// Kubo RPC style (`/api/v0/cat?arg=<cid>`)
    #[serde(rename = "POST", alias = "post")]
    Post,
}

impl std::fmt::Display for GatewayMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// One gateway in the pool: base URL plus verb
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayDescriptor {
    /// Base URL; the encoded content path is appended verbatim
    pub url: String,
    /// Verb to use
    pub method: GatewayMethod,
}

impl GatewayDescriptor {
    /// Create a descriptor
    pub fn new(url: impl Into<String>, method: GatewayMethod) -> Self {
        Self {
            url: url.into(),
            method,
        }
    }
}

/// Built-in pool: one POST provider and one GET provider
pub fn default_gateways() -> Vec<GatewayDescriptor> {
    vec![
        GatewayDescriptor::new(
            "https://api.thegraph.com/ipfs/api/v0/cat?arg=",
            GatewayMethod::Post,
        ),
        GatewayDescriptor::new("https://ipfs.io/ipfs/", GatewayMethod::Get),
    ]
}

/// Parse an override value, falling back to the default pool when the
/// value is missing, malformed, or an empty list.
pub fn parse_gateway_override(raw: Option<&str>) -> Vec<GatewayDescriptor> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return default_gateways();
    };

    match serde_json::from_str::<Vec<GatewayDescriptor>>(raw) {
        Ok(gateways) if !gateways.is_empty() => gateways,
        Ok(_) => {
            warn!("{} is an empty list, using default gateways", GATEWAYS_ENV);
            default_gateways()
        }
        Err(e) => {
            warn!("Ignoring malformed {}: {}", GATEWAYS_ENV, e);
            default_gateways()
        }
    }
}

/// Read the pool from [`GATEWAYS_ENV`]
pub fn gateways_from_env() -> Vec<GatewayDescriptor> {
    parse_gateway_override(std::env::var(GATEWAYS_ENV).ok().as_deref())
}

/// Strip `ipfs://` and a leading `/ipfs/` from a content path
pub fn normalize_content_path(path: &str) -> &str {
    let path = path.trim();
    let path = path.strip_prefix("ipfs://").unwrap_or(path);
    path.strip_prefix("/ipfs/").unwrap_or(path)
}

/// Where the gateway pool comes from
#[derive(Debug, Clone)]
enum GatewaySource {
    /// Read [`GATEWAYS_ENV`] on every call
    Environment,
    /// Fixed list
    Fixed(Vec<GatewayDescriptor>),
}

/// Races a pool of IPFS gateways
#[derive(Debug, Clone)]
pub struct GatewayRaceFetcher {
    client: reqwest::Client,
    source: GatewaySource,
    timeout: Duration,
}

impl GatewayRaceFetcher {
    /// Create a fetcher reading its pool from the environment
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the HTTP client cannot be built.
    pub fn new() -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            source: GatewaySource::Environment,
            timeout: DEFAULT_GATEWAY_TIMEOUT,
        })
    }

    /// Use a fixed gateway list instead of the environment
    #[must_use]
    pub fn with_gateways(mut self, gateways: Vec<GatewayDescriptor>) -> Self {
        self.source = GatewaySource::Fixed(gateways);
        self
    }

    /// Override the per-gateway timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Current gateway pool
    pub fn gateways(&self) -> Vec<GatewayDescriptor> {
        match &self.source {
            GatewaySource::Environment => gateways_from_env(),
            GatewaySource::Fixed(gateways) => gateways.clone(),
        }
    }

    /// Fetch `path` from whichever gateway answers first with a 2xx.
    ///
    /// Losing requests keep running in the background and only log their
    /// outcome.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::AllGatewaysFailed`] once every gateway has
    /// settled without success.
    #[tracing::instrument(skip(self), fields(gateways = tracing::field::Empty))]
    pub async fn fetch_content(&self, path: &str) -> FetchResult<String> {
        let path = normalize_content_path(path);
        let encoded = urlencoding::encode(path);
        let gateways = self.gateways();
        tracing::Span::current().record("gateways", gateways.len());

        let mut attempts = JoinSet::new();
        let mut urls: HashMap<task::Id, String> = HashMap::new();
        for gateway in gateways {
            let client = self.client.clone();
            let timeout = self.timeout;
            let target = format!("{}{}", gateway.url, encoded);
            let url = gateway.url.clone();
            let handle = attempts.spawn(async move {
                let outcome = fetch_one(&client, gateway.method, &target, timeout).await;
                match &outcome {
                    Ok(body) => debug!("Gateway {} returned {} bytes", gateway.url, body.len()),
                    Err(reason) => debug!("Gateway {} failed: {}", gateway.url, reason),
                }
                outcome
            });
            urls.insert(handle.id(), url);
        }

        let mut failures = Vec::new();
        while let Some(joined) = attempts.join_next_with_id().await {
            match joined {
                Ok((id, Ok(body))) => {
                    info!("Fetched {} via {}", path, gateway_url(&urls, id));
                    // Losers settle on their own
                    attempts.detach_all();
                    return Ok(body);
                }
                Ok((id, Err(reason))) => failures.push(GatewayFailure {
                    url: gateway_url(&urls, id),
                    reason,
                }),
                Err(e) => failures.push(GatewayFailure {
                    url: gateway_url(&urls, e.id()),
                    reason: format!("gateway task failed: {e}"),
                }),
            }
        }

        warn!("All {} gateways failed for {}", failures.len(), path);
        Err(FetchError::AllGatewaysFailed { failures })
    }
}

fn gateway_url(urls: &HashMap<task::Id, String>, id: task::Id) -> String {
    urls.get(&id).cloned().unwrap_or_else(|| format!("<task {id}>"))
}

async fn fetch_one(
    client: &reqwest::Client,
    method: GatewayMethod,
    url: &str,
    timeout: Duration,
) -> Result<String, String> {
    let request = match method {
        GatewayMethod::Get => client.get(url),
        GatewayMethod::Post => client.post(url),
    };

    let response = request
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| describe(&e, timeout))?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!(
            "HTTP {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown")
        ));
    }

    response.text().await.map_err(|e| describe(&e, timeout))
}

fn describe(error: &reqwest::Error, timeout: Duration) -> String {
    if error.is_timeout() {
        format!("timed out after {}ms", timeout.as_millis())
    } else {
        error.to_string()
    }
}
