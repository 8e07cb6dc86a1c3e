//! # graphscout security
//!
//! Endpoint validation for the graphscout outbound network layer.
//!
//! GraphQL endpoints reach graphscout as user input. Before any request is
//! issued, and again for every redirect hop, the URL passes through
//! [`EndpointValidator`], which enforces the SSRF policy described in
//! [`ssrf`].

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![warn(clippy::all)]

pub mod ssrf;

pub use ssrf::{
    ALLOWED_LOW_PORTS, BLOCKED_HOSTNAMES, EndpointValidator, MAX_URL_LENGTH, SecurityError,
    SecurityPolicy,
};
