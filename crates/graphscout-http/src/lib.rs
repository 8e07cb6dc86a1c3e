//! # graphscout http
//!
//! Outbound HTTP for graphscout.
//!
//! - [`SecureFetcher`] posts JSON to untrusted GraphQL endpoints. The
//!   hardened [`SecureFetcher::fetch`] path follows redirects by hand,
//!   re-validating each hop, and enforces a single [`FetchBudget`] (timeout,
//!   redirect count, body size) across the whole operation.
//! - [`GatewayRaceFetcher`] fetches IPFS content from a pool of gateways and
//!   returns the first success.
//!
//! ## Example
//!
//! ```rust,no_run
//! use graphscout_http::{FetchBudget, FetchRequest, SecureFetcher};
//! use graphscout_security::SecurityPolicy;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = SecureFetcher::new(SecurityPolicy::strict())?;
//! let body = fetcher
//!     .fetch(
//!         "https://indexer.example.com/subgraphs/name/tokens",
//!         &json!({ "query": "{ _meta { deployment } }" }),
//!         FetchRequest::new(FetchBudget::discovery()),
//!     )
//!     .await?;
//! println!("{body:?}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![warn(clippy::all)]

pub mod error;
pub mod fetch;
pub mod gateway;

pub use error::{FetchError, FetchResult, GatewayFailure};
pub use fetch::{
    DEFAULT_EXECUTE_TIMEOUT, FetchBudget, FetchRequest, ParsedBody, RedirectHook, SecureFetcher,
    USER_AGENT,
};
pub use gateway::{
    DEFAULT_GATEWAY_TIMEOUT, GATEWAYS_ENV, GatewayDescriptor, GatewayMethod, GatewayRaceFetcher,
    default_gateways, gateways_from_env, normalize_content_path, parse_gateway_override,
};
