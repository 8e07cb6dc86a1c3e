//! Manifest and schema retrieval through mock IPFS gateways

use graphscout_graphql::{GraphQLError, ManifestResolver};
use graphscout_http::{FetchError, GatewayDescriptor, GatewayMethod, GatewayRaceFetcher};
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MANIFEST: &str = "specVersion: 0.0.5
schema:
  file:
    /: /ipfs/QmSchema
dataSources:
  - kind: ethereum/contract
    name: Token
    network: arbitrum-one
";

const SDL: &str = "type Token @entity { id: ID! symbol: String! }";

fn resolver(server: &MockServer) -> ManifestResolver {
    let gateways = GatewayRaceFetcher::new()
        .unwrap()
        .with_gateways(vec![GatewayDescriptor::new(
            format!("{}/ipfs/", server.uri()),
            GatewayMethod::Get,
        )]);
    ManifestResolver::new(gateways)
}

#[tokio::test]
async fn test_manifest_and_schema_are_resolved() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ipfs/QmManifest"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MANIFEST))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ipfs/QmSchema"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SDL))
        .mount(&server)
        .await;

    let resolver = resolver(&server);
    let manifest = resolver.fetch_manifest("ipfs://QmManifest").await.unwrap();
    assert_eq!(manifest.networks(), vec!["arbitrum-one"]);

    let sdl = resolver.fetch_schema_sdl(&manifest).await.unwrap();
    assert_eq!(sdl, SDL);
}

#[tokio::test]
async fn test_gateway_failure_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = resolver(&server).fetch_manifest("QmGone").await.unwrap_err();
    assert!(matches!(
        err,
        GraphQLError::Fetch(FetchError::AllGatewaysFailed { .. })
    ));
}

#[tokio::test]
async fn test_non_manifest_content_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("- just\n- a list\n"))
        .mount(&server)
        .await;

    let err = resolver(&server).fetch_manifest("QmList").await.unwrap_err();
    assert!(matches!(err, GraphQLError::Manifest(_)));
}
