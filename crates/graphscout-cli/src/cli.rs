//! CLI argument parsing

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// graphscout - inspect, validate and query untrusted GraphQL endpoints
#[derive(Parser, Debug)]
#[command(
    name = "graphscout",
    version,
    about = "Inspect, validate and query GraphQL indexers behind an SSRF-hardened client",
    long_about = "graphscout talks to user-supplied GraphQL endpoints on behalf of a \
                  natural-language query agent.\n\
                  Every endpoint and redirect hop is checked against private networks, \
                  cloud metadata hosts, disallowed ports and embedded credentials.\n\n\
                  SECURITY WARNINGS:\n\
                  - --allow-private-networks disables private-range blocking; use it only \
                  for trusted local deployments\n\
                  - Authorization values passed via --authorization may end up in shell history; \
                  prefer GRAPHSCOUT_AUTHORIZATION or the config file"
)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Endpoint connection settings
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Output format
    #[arg(long, short = 'f', global = true, value_enum, default_value = "human")]
    pub format: OutputFormat,

    /// Enable verbose logging (-v, -vv, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all logging except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Endpoint connection settings; each overrides the config file
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// GraphQL endpoint URL
    #[arg(long, short = 'e', global = true, env = "GRAPHSCOUT_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Authorization header value, sent verbatim
    #[arg(long, global = true, env = "GRAPHSCOUT_AUTHORIZATION", hide_env_values = true)]
    pub authorization: Option<String>,

    /// Allow endpoints on private, loopback and link-local networks
    #[arg(long, global = true)]
    pub allow_private_networks: bool,

    /// Config file (default: <config dir>/graphscout/config.yaml)
    #[arg(long, short = 'c', global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch the endpoint schema via introspection
    Schema {
        /// Print the schema as SDL
        #[arg(long)]
        sdl: bool,
    },

    /// Validate a query against the endpoint schema
    Validate {
        /// Query text, or @path to read it from a file
        query: String,
    },

    /// Execute a query
    Execute {
        /// Query text, or @path to read it from a file
        query: String,

        /// Variables as a JSON object
        #[arg(long)]
        variables: Option<String>,
    },

    /// Discover the deployment CID served by the endpoint
    Cid {
        /// Store the discovered CID in the config file
        #[arg(long)]
        save: bool,
    },

    /// Fetch raw content from the IPFS gateway pool
    Ipfs {
        /// Content path (`Qm...`, `ipfs://Qm...` or `/ipfs/Qm.../file`)
        path: String,
    },

    /// Fetch and summarise a subgraph manifest
    Manifest {
        /// Manifest CID (default: the CID stored in the config file)
        cid: Option<String>,

        /// Also fetch the GraphQL schema the manifest links to
        #[arg(long)]
        schema: bool,
    },

    /// Inspect or persist configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Configuration commands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Write the effective configuration to the config file
    Save,
}

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// Pretty-printed JSON
    Json,
    /// Single-line JSON
    Compact,
    /// YAML
    Yaml,
}

impl Cli {
    /// Log filter derived from `-v`/`-q`; `RUST_LOG` takes precedence
    pub fn log_filter(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    /// Install the tracing subscriber, logging to stderr
    pub fn init_tracing(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.log_filter()));

        // Ignore the error when a subscriber is already installed
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }
}
