//! End-to-end command runs against a mock indexer

use clap::Parser;
use graphscout_cli::{AgentConfig, Cli, CliError, execute};
use pretty_assertions::assert_eq;
use serde_json::Value;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INTROSPECTION: &str = include_str!("fixtures/introspection.json");

struct Harness {
    server: MockServer,
    dir: TempDir,
}

impl Harness {
    async fn start() -> Self {
        let server = MockServer::start().await;
        let introspection: Value = serde_json::from_str(INTROSPECTION).unwrap();
        Mock::given(method("POST"))
            .and(body_string_contains("IntrospectionQuery"))
            .respond_with(ResponseTemplate::new(200).set_body_json(introspection))
            .mount(&server)
            .await;
        Self {
            server,
            dir: TempDir::new().unwrap(),
        }
    }

    fn config_path(&self) -> std::path::PathBuf {
        self.dir.path().join("config.yaml")
    }

    fn cli(&self, trusted: bool, args: &[&str]) -> Cli {
        let endpoint = format!("{}/graphql", self.server.uri());
        let config = self.config_path().display().to_string();
        let mut argv = vec![
            "graphscout",
            "--no-color",
            "--format",
            "compact",
            "--endpoint",
            endpoint.as_str(),
            "--config",
            config.as_str(),
        ];
        if trusted {
            argv.push("--allow-private-networks");
        }
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }
}

#[tokio::test]
async fn test_valid_query_succeeds() {
    let harness = Harness::start().await;
    let cli = harness.cli(true, &["validate", "{ tokens(first: 2) { id symbol } }"]);
    execute(cli).await.unwrap();
}

#[tokio::test]
async fn test_invalid_query_reports_count() {
    let harness = Harness::start().await;
    let cli = harness.cli(true, &["validate", "{ tokens { id name } }"]);

    let err = execute(cli).await.unwrap_err();
    assert!(matches!(err, CliError::InvalidQuery { count: 1 }));
    assert_eq!(err.exit_code(), 1);
}

#[tokio::test]
async fn test_query_from_file() {
    let harness = Harness::start().await;
    let query_path = harness.dir.path().join("query.graphql");
    std::fs::write(&query_path, "{ token(id: \"0x1\") { id decimals } }").unwrap();
    let arg = format!("@{}", query_path.display());

    execute(harness.cli(true, &["validate", arg.as_str()])).await.unwrap();
}

#[tokio::test]
async fn test_loopback_endpoint_blocked_by_default() {
    let harness = Harness::start().await;
    let err = execute(harness.cli(false, &["schema"])).await.unwrap_err();

    assert!(err.is_security_violation());
    assert_eq!(err.exit_code(), 3);
}

#[tokio::test]
async fn test_cid_save_persists_deployment() {
    let harness = Harness::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("_metadata"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"data":{"_metadata":{"deployments":{"arbitrum":"ipfs://QmSaved"}}}}"#,
            "application/json",
        ))
        .mount(&harness.server)
        .await;

    execute(harness.cli(true, &["cid", "--save"])).await.unwrap();

    let stored = AgentConfig::load(Some(harness.config_path().as_path())).unwrap();
    assert_eq!(stored.cid.as_deref(), Some("QmSaved"));
    assert_eq!(
        stored.endpoint,
        Some(format!("{}/graphql", harness.server.uri()))
    );
    assert!(stored.allow_private_networks);
}

#[tokio::test]
async fn test_manifest_without_cid() {
    let harness = Harness::start().await;
    let err = execute(harness.cli(true, &["manifest"])).await.unwrap_err();
    assert!(matches!(err, CliError::MissingCid));
}

#[tokio::test]
async fn test_execute_rejects_non_object_variables() {
    let harness = Harness::start().await;
    let cli = harness.cli(
        true,
        &["execute", "{ tokens { id } }", "--variables", "[1]"],
    );
    let err = execute(cli).await.unwrap_err();
    assert!(matches!(err, CliError::InvalidArguments(_)));
}
