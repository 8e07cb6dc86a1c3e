//! Agent configuration: YAML file layered under `GRAPHSCOUT_*` environment
//! variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cli::ConnectionArgs;
use crate::error::{CliError, CliResult};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "GRAPHSCOUT";

/// Persisted agent settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// GraphQL endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Authorization header value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization: Option<String>,

    /// Disable private network blocking
    pub allow_private_networks: bool,

    /// Last discovered deployment CID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
}

/// `<config dir>/graphscout/config.yaml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("graphscout").join("config.yaml"))
}

impl AgentConfig {
    /// Load from `path` (missing file is fine) and the environment
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Config`] if the file or an environment value
    /// cannot be parsed.
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            debug!("Loading config from {}", path.display());
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Yaml)
                    .required(false),
            );
        }

        let config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Write as YAML, creating parent directories
    ///
    /// # Errors
    ///
    /// Returns an I/O or YAML error if the file cannot be written.
    pub fn save(&self, path: &Path) -> CliResult<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        debug!("Saved config to {}", path.display());
        Ok(())
    }

    /// Apply command-line overrides
    #[must_use]
    pub fn with_overrides(mut self, args: &ConnectionArgs) -> Self {
        if let Some(endpoint) = &args.endpoint {
            self.endpoint = Some(endpoint.clone());
        }
        if let Some(authorization) = &args.authorization {
            self.authorization = Some(authorization.clone());
        }
        self.allow_private_networks |= args.allow_private_networks;
        self
    }

    /// Endpoint, or an error telling the user how to set one
    ///
    /// # Errors
    ///
    /// Returns [`CliError::MissingEndpoint`] when no endpoint is configured.
    pub fn require_endpoint(&self) -> CliResult<&str> {
        self.endpoint.as_deref().ok_or(CliError::MissingEndpoint)
    }

    /// Copy with the authorization value masked, for display
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self {
            authorization: self.authorization.as_ref().map(|_| "<redacted>".to_string()),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_overrides_win() {
        let config = AgentConfig {
            endpoint: Some("https://a.example/graphql".to_string()),
            cid: Some("QmOld".to_string()),
            ..AgentConfig::default()
        };
        let args = ConnectionArgs {
            endpoint: Some("https://b.example/graphql".to_string()),
            authorization: Some("Bearer t".to_string()),
            allow_private_networks: true,
            config: None,
        };

        let merged = config.with_overrides(&args);
        assert_eq!(merged.endpoint.as_deref(), Some("https://b.example/graphql"));
        assert_eq!(merged.authorization.as_deref(), Some("Bearer t"));
        assert!(merged.allow_private_networks);
        assert_eq!(merged.cid.as_deref(), Some("QmOld"));
    }

    #[test]
    fn test_redaction() {
        let config = AgentConfig {
            authorization: Some("Bearer secret".to_string()),
            ..AgentConfig::default()
        };
        assert_eq!(config.redacted().authorization.as_deref(), Some("<redacted>"));
        assert_eq!(AgentConfig::default().redacted().authorization, None);
    }

    #[test]
    fn test_missing_endpoint() {
        assert!(matches!(
            AgentConfig::default().require_endpoint(),
            Err(CliError::MissingEndpoint)
        ));
    }
}
