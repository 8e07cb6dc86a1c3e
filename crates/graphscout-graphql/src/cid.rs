//! Deployment content identifier discovery.
//!
//! Indexed GraphQL services expose the IPFS CID of the deployed subgraph
//! through one of two metadata conventions. Both are tried in order; the
//! field names are a wire contract and must not change.

use graphscout_http::{FetchBudget, FetchRequest, ParsedBody, SecureFetcher};
use reqwest::header::HeaderMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;

/// Metadata query listing every deployment by name
pub const METADATA_DEPLOYMENTS_QUERY: &str = "{ _metadata { deployments } }";

/// Metadata query returning the single active deployment
pub const META_DEPLOYMENT_QUERY: &str = "{ _meta { deployment } }";

/// The two supported metadata conventions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataShape {
    /// `_metadata.deployments`: name to CID map, last entry wins
    Deployments,
    /// `_meta.deployment`: a single CID
    Deployment,
}

impl MetadataShape {
    /// Shapes in the order they are tried
    pub const ALL: [Self; 2] = [Self::Deployments, Self::Deployment];

    /// Query text for this shape
    pub fn query(self) -> &'static str {
        match self {
            Self::Deployments => METADATA_DEPLOYMENTS_QUERY,
            Self::Deployment => META_DEPLOYMENT_QUERY,
        }
    }

    /// Pull the CID out of a response body, if present and non-empty
    pub fn extract(self, body: &Value) -> Option<String> {
        let data = body.get("data")?;
        let raw = match self {
            Self::Deployments => data
                .get("_metadata")?
                .get("deployments")?
                .as_object()?
                .values()
                .last()?
                .as_str()?,
            Self::Deployment => data.get("_meta")?.get("deployment")?.as_str()?,
        };
        let cid = strip_ipfs_scheme(raw.trim());
        (!cid.is_empty()).then(|| cid.to_string())
    }
}

/// Remove a literal `ipfs://` prefix
pub fn strip_ipfs_scheme(cid: &str) -> &str {
    cid.strip_prefix("ipfs://").unwrap_or(cid)
}

/// Discovers deployment CIDs over the bounded fetch path
#[derive(Debug, Clone)]
pub struct CidResolver {
    fetcher: SecureFetcher,
    budget: FetchBudget,
}

impl CidResolver {
    /// Create a resolver using the discovery budget
    pub fn new(fetcher: SecureFetcher) -> Self {
        Self {
            fetcher,
            budget: FetchBudget::discovery(),
        }
    }

    /// Override the budget
    #[must_use]
    pub fn with_budget(mut self, budget: FetchBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Discover the deployment CID served by `endpoint`.
    ///
    /// Returns an empty string when neither metadata convention yields a
    /// CID.
    ///
    /// # Errors
    ///
    /// Only security violations are returned; every other failure falls
    /// through to the next convention.
    #[tracing::instrument(skip(self, headers))]
    pub async fn fetch_cid_from_endpoint(&self, endpoint: &str, headers: &HeaderMap) -> Result<String> {
        self.fetcher.validator().validate(endpoint)?;

        for shape in MetadataShape::ALL {
            let request = FetchRequest::new(self.budget).with_headers(headers.clone());
            let body = serde_json::json!({ "query": shape.query() });

            match self.fetcher.fetch(endpoint, &body, request).await {
                Ok(ParsedBody::Json(value)) => match shape.extract(&value) {
                    Some(cid) => {
                        debug!("Resolved deployment {} via {:?}", cid, shape);
                        return Ok(cid);
                    }
                    None => debug!("{:?} returned no deployment", shape),
                },
                Ok(ParsedBody::Text(_)) => debug!("{:?} returned a non-JSON body", shape),
                Err(e) if e.is_security_violation() => return Err(e.into()),
                Err(e) => warn!("{:?} metadata query failed: {}", shape, e),
            }
        }

        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_deployments_takes_last_entry() {
        let body = json!({
            "data": { "_metadata": { "deployments": { "a": "ipfs://CID1", "b": "CID2" } } }
        });
        assert_eq!(MetadataShape::Deployments.extract(&body), Some("CID2".to_string()));

        let body = json!({
            "data": { "_metadata": { "deployments": { "b": "CID2", "a": "ipfs://CID1" } } }
        });
        assert_eq!(MetadataShape::Deployments.extract(&body), Some("CID1".to_string()));
    }

    #[test]
    fn test_single_deployment() {
        let body = json!({ "data": { "_meta": { "deployment": "ipfs://QmXyz" } } });
        assert_eq!(MetadataShape::Deployment.extract(&body), Some("QmXyz".to_string()));
    }

    #[test]
    fn test_missing_or_empty_yields_none() {
        assert_eq!(MetadataShape::Deployment.extract(&json!({ "data": null })), None);
        assert_eq!(
            MetadataShape::Deployment.extract(&json!({ "data": { "_meta": { "deployment": "ipfs://" } } })),
            None
        );
        assert_eq!(
            MetadataShape::Deployments.extract(&json!({ "data": { "_metadata": { "deployments": {} } } })),
            None
        );
        assert_eq!(
            MetadataShape::Deployments.extract(&json!({ "errors": [{ "message": "no field _metadata" }] })),
            None
        );
    }

    #[tokio::test]
    async fn test_security_violation_propagates() {
        let resolver = CidResolver::new(
            SecureFetcher::new(graphscout_security::SecurityPolicy::strict()).unwrap(),
        );
        let err = resolver
            .fetch_cid_from_endpoint("http://localhost:8000/subgraphs/name/x", &HeaderMap::new())
            .await
            .unwrap_err();
        assert!(err.is_security_violation());
    }
}
