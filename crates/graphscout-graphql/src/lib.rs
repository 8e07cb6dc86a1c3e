//! # graphscout graphql
//!
//! GraphQL access for the graphscout agent.
//!
//! ## Architecture
//!
//! - [`client`] - [`GraphQLClient`]: schema fetch with a per-endpoint cache,
//!   execution, validation, deployment discovery
//! - [`introspection`] - introspection query and result model
//! - [`schema`] - [`Schema`] lookups and SDL rendering
//! - [`validation`] - syntax and structural checks against a schema
//! - [`cid`] - deployment CID discovery over the two metadata conventions
//! - [`manifest`] - subgraph manifests fetched through IPFS gateways
//!
//! ## Example
//!
//! ```rust,no_run
//! use graphscout_graphql::GraphQLClient;
//!
//! # async fn example() -> graphscout_graphql::Result<()> {
//! let client = GraphQLClient::builder("https://indexer.example.com/subgraphs/name/tokens")
//!     .authorization("Bearer token")
//!     .build()?;
//!
//! let problems = client.validate("{ tokens(first: 5) { id symbol } }").await?;
//! if problems.is_empty() {
//!     let response = client.execute("{ tokens(first: 5) { id symbol } }", None).await?;
//!     println!("{:?}", response.data);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![warn(clippy::all)]

pub mod cid;
pub mod client;
pub mod error;
pub mod introspection;
pub mod manifest;
pub mod schema;
pub mod validation;

pub use cid::{CidResolver, MetadataShape, strip_ipfs_scheme};
pub use client::{GraphQLClient, GraphQLClientBuilder, GraphQLResponse, schema_cache_key};
pub use error::{GraphQLError, Result};
pub use introspection::{INTROSPECTION_QUERY, IntrospectionSchema, parse_introspection};
pub use manifest::{DataSource, ManifestResolver, SubgraphManifest};
pub use schema::{OperationKind, Schema};
