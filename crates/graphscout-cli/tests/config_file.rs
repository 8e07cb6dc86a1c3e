//! Config file persistence

use graphscout_cli::AgentConfig;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

#[test]
fn test_save_then_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.yaml");

    let config = AgentConfig {
        endpoint: Some("https://indexer.example.com/subgraphs/name/tokens".to_string()),
        authorization: None,
        allow_private_networks: false,
        cid: Some("QmDeployment".to_string()),
    };
    config.save(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(!text.contains("authorization"));

    assert_eq!(AgentConfig::load(Some(path.as_path())).unwrap(), config);
}

#[test]
fn test_missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let config = AgentConfig::load(Some(dir.path().join("absent.yaml").as_path())).unwrap();
    assert_eq!(config.cid, None);
    assert!(!config.allow_private_networks);
}

#[test]
fn test_malformed_file_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "allow_private_networks: [not, a, bool]\n").unwrap();

    assert!(matches!(
        AgentConfig::load(Some(path.as_path())),
        Err(graphscout_cli::CliError::Config(_))
    ));
}
