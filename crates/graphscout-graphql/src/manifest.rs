//! Subgraph manifests fetched from IPFS.

use graphscout_http::GatewayRaceFetcher;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GraphQLError, Result};

/// IPLD link as written in manifests: `{ "/": "/ipfs/<cid>" }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Target path
    #[serde(rename = "/")]
    pub path: String,
}

/// `schema` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestSchema {
    /// Link to the GraphQL SDL file
    pub file: Link,
}

/// Where a data source reads from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceSource {
    /// Contract address
    #[serde(default)]
    pub address: Option<String>,
    /// ABI name
    #[serde(default)]
    pub abi: Option<String>,
    /// First indexed block
    #[serde(default)]
    pub start_block: Option<u64>,
}

/// One entry of `dataSources`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    /// Data source kind, e.g. `ethereum/contract`
    pub kind: String,
    /// Name
    pub name: String,
    /// Network, e.g. `mainnet`
    #[serde(default)]
    pub network: Option<String>,
    /// Source
    #[serde(default)]
    pub source: DataSourceSource,
}

/// Subgraph manifest (`subgraph.yaml` as deployed)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubgraphManifest {
    /// Manifest spec version
    pub spec_version: String,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Source repository
    #[serde(default)]
    pub repository: Option<String>,
    /// Schema link
    pub schema: ManifestSchema,
    /// Data sources
    #[serde(default)]
    pub data_sources: Vec<DataSource>,
}

impl SubgraphManifest {
    /// Parse manifest YAML
    ///
    /// # Errors
    ///
    /// Returns [`GraphQLError::Manifest`] if the document does not match the
    /// manifest model.
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| GraphQLError::manifest(e.to_string()))
    }

    /// Networks referenced by the data sources, deduplicated in order
    pub fn networks(&self) -> Vec<&str> {
        let mut networks: Vec<&str> = Vec::new();
        for network in self.data_sources.iter().filter_map(|d| d.network.as_deref()) {
            if !networks.contains(&network) {
                networks.push(network);
            }
        }
        networks
    }
}

/// Resolves manifests and their schema files through the gateway race
#[derive(Debug, Clone)]
pub struct ManifestResolver {
    gateways: GatewayRaceFetcher,
}

impl ManifestResolver {
    /// Create a resolver
    pub fn new(gateways: GatewayRaceFetcher) -> Self {
        Self { gateways }
    }

    /// Fetch and parse the manifest stored under `cid`
    ///
    /// # Errors
    ///
    /// Returns a fetch error when every gateway fails, or
    /// [`GraphQLError::Manifest`] when the content is not a manifest.
    pub async fn fetch_manifest(&self, cid: &str) -> Result<SubgraphManifest> {
        let text = self.gateways.fetch_content(cid).await?;
        let manifest = SubgraphManifest::from_yaml(&text)?;
        debug!(
            "Manifest {} has {} data sources",
            cid,
            manifest.data_sources.len()
        );
        Ok(manifest)
    }

    /// Fetch the SDL linked from `manifest.schema.file`
    ///
    /// # Errors
    ///
    /// Returns a fetch error when every gateway fails.
    pub async fn fetch_schema_sdl(&self, manifest: &SubgraphManifest) -> Result<String> {
        Ok(self.gateways.fetch_content(&manifest.schema.file.path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MANIFEST: &str = r#"
specVersion: 0.0.5
description: ERC20 token transfers
repository: https://github.com/example/erc20-subgraph
schema:
  file:
    /: /ipfs/QmSchema
dataSources:
  - kind: ethereum/contract
    name: Token
    network: mainnet
    source:
      address: "0x1f9840a85d5af5bf1d1762f925bdaddc4201f984"
      abi: ERC20
      startBlock: 10861674
    mapping:
      kind: ethereum/events
      apiVersion: 0.0.7
  - kind: ethereum/contract
    name: Pool
    network: mainnet
"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = SubgraphManifest::from_yaml(MANIFEST).unwrap();
        assert_eq!(manifest.spec_version, "0.0.5");
        assert_eq!(manifest.schema.file.path, "/ipfs/QmSchema");
        assert_eq!(manifest.data_sources.len(), 2);
        assert_eq!(manifest.data_sources[0].source.start_block, Some(10_861_674));
        assert_eq!(manifest.data_sources[1].source, DataSourceSource::default());
        assert_eq!(manifest.networks(), vec!["mainnet"]);
    }

    #[test]
    fn test_rejects_non_manifest() {
        let err = SubgraphManifest::from_yaml("type Query { ok: Boolean }").unwrap_err();
        assert!(matches!(err, GraphQLError::Manifest(_)));
    }
}
