//! CLI error types with user-facing suggestions

use std::fmt;

use graphscout_graphql::GraphQLError;
use graphscout_http::FetchError;
use owo_colors::OwoColorize;
use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// CLI errors
#[derive(Error, Debug)]
pub enum CliError {
    /// GraphQL client failure
    #[error(transparent)]
    GraphQL(#[from] GraphQLError),

    /// Outbound fetch failure outside the GraphQL client (IPFS)
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Invalid command arguments
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// No endpoint on the command line, in the environment or in the config
    #[error("No GraphQL endpoint configured")]
    MissingEndpoint,

    /// `manifest` was run without a CID and none is stored
    #[error("No deployment CID given and none stored in the config file")]
    MissingCid,

    /// Validation found problems; they were already printed
    #[error("Query failed validation with {count} error(s)")]
    InvalidQuery {
        /// Number of validation messages
        count: usize,
    },

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}

impl CliError {
    /// Whether the underlying failure is an endpoint security violation
    pub fn is_security_violation(&self) -> bool {
        match self {
            Self::GraphQL(e) => e.is_security_violation(),
            Self::Fetch(e) => e.is_security_violation(),
            _ => false,
        }
    }

    /// Hints for resolving the error
    pub fn suggestions(&self) -> Vec<&'static str> {
        if self.is_security_violation() {
            return vec![
                "Use a public https endpoint on port 443 or 80",
                "Remove user:password from the URL and pass --authorization instead",
                "For a trusted local deployment, pass --allow-private-networks",
            ];
        }

        match self {
            Self::MissingEndpoint => vec![
                "Pass --endpoint <URL>",
                "Set GRAPHSCOUT_ENDPOINT",
                "Store one with `graphscout --endpoint <URL> config save`",
            ],
            Self::MissingCid => vec![
                "Pass the CID as an argument",
                "Run `graphscout cid --save` to store the endpoint's deployment",
            ],
            Self::InvalidArguments(_) => vec![
                "Variables must be a JSON object",
                "Use @path to read a query from a file",
            ],
            Self::GraphQL(GraphQLError::Fetch(fetch)) | Self::Fetch(fetch) => {
                fetch_suggestions(fetch)
            }
            Self::GraphQL(GraphQLError::Introspection(_)) => vec![
                "Check that the endpoint allows introspection",
            ],
            Self::Config(_) => vec!["Check the config file syntax (YAML)"],
            _ => vec![],
        }
    }

    /// Category shown in the error banner
    pub fn category(&self) -> ErrorCategory {
        if self.is_security_violation() {
            return ErrorCategory::Security;
        }
        match self {
            Self::GraphQL(GraphQLError::Fetch(_)) | Self::Fetch(_) => ErrorCategory::Network,
            Self::GraphQL(_) => ErrorCategory::Endpoint,
            Self::InvalidArguments(_) | Self::MissingEndpoint | Self::MissingCid => {
                ErrorCategory::User
            }
            Self::InvalidQuery { .. } => ErrorCategory::Validation,
            Self::Json(_) | Self::Yaml(_) => ErrorCategory::Parsing,
            Self::Io(_) => ErrorCategory::System,
            Self::Config(_) => ErrorCategory::Config,
        }
    }

    /// Process exit code
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Validation => 1,
            ErrorCategory::User | ErrorCategory::Config => 2,
            ErrorCategory::Security => 3,
            _ => 4,
        }
    }
}

fn fetch_suggestions(error: &FetchError) -> Vec<&'static str> {
    match error {
        FetchError::Timeout { .. } => vec![
            "Check that the endpoint is reachable",
            "The indexer may be overloaded; retry later",
        ],
        FetchError::TooManyRedirects { .. } => vec!["Use the final URL directly"],
        FetchError::ResponseTooLarge { .. } => vec!["Reduce the query's `first:` arguments"],
        FetchError::Status { status: 401 | 403, .. } => {
            vec!["Check the --authorization value"]
        }
        FetchError::AllGatewaysFailed { .. } => vec![
            "Check the CID",
            "Override the gateway pool with GRAPHSCOUT_IPFS_GATEWAYS",
        ],
        _ => vec![],
    }
}

/// Error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Endpoint rejected by the SSRF checks
    Security,
    /// Transport failure
    Network,
    /// Endpoint answered with something unusable
    Endpoint,
    /// Bad input
    User,
    /// Query did not validate
    Validation,
    /// Serialization failure
    Parsing,
    /// Local I/O
    System,
    /// Config file or environment
    Config,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Security => write!(f, "Security"),
            Self::Network => write!(f, "Network"),
            Self::Endpoint => write!(f, "Endpoint"),
            Self::User => write!(f, "User Input"),
            Self::Validation => write!(f, "Validation"),
            Self::Parsing => write!(f, "Parsing"),
            Self::System => write!(f, "System"),
            Self::Config => write!(f, "Configuration"),
        }
    }
}

/// Render an error with its category and suggestions
pub fn format_error(error: &CliError, colored: bool) -> String {
    let mut out = String::new();
    let category = error.category();

    if colored {
        out.push_str(&format!(
            "{} {}: {}\n",
            "✗".bright_red().bold(),
            category.to_string().bright_red().bold(),
            error
        ));
    } else {
        out.push_str(&format!("✗ {category}: {error}\n"));
    }

    let suggestions = error.suggestions();
    if !suggestions.is_empty() {
        if colored {
            out.push_str(&format!("\n{}\n", "Suggestions:".bright_yellow().bold()));
        } else {
            out.push_str("\nSuggestions:\n");
        }
        for suggestion in suggestions {
            if colored {
                out.push_str(&format!("  {} {}\n", "•".bright_blue(), suggestion));
            } else {
                out.push_str(&format!("  • {suggestion}\n"));
            }
        }
    }

    out
}

/// Print an error to stderr and return the exit code to use
pub fn display_error(error: &CliError, colored: bool) -> i32 {
    eprint!("{}", format_error(error, colored));
    error.exit_code()
}
