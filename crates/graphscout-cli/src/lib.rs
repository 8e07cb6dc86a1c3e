//! # graphscout CLI
//!
//! Command-line front end for the graphscout client stack. Every outbound
//! request goes through the SSRF-hardened fetchers in `graphscout-http`.
//!
//! ## Usage
//!
//! ```bash
//! # Summarise the schema of an indexer
//! graphscout --endpoint https://indexer.example.com/subgraphs/name/tokens schema
//!
//! # Validate, then execute a query
//! graphscout validate '{ tokens(first: 5) { id symbol } }'
//! graphscout execute @query.graphql --variables '{"first": 5}'
//!
//! # Discover the deployment and inspect its manifest
//! graphscout cid --save
//! graphscout manifest --schema
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod formatter;

use clap::Parser;

pub use cli::{Cli, Commands, ConfigCommands, ConnectionArgs, OutputFormat};
pub use config::AgentConfig;
pub use error::{CliError, CliResult, display_error, format_error};

use commands::Context;
use formatter::Formatter;

/// Parse arguments, install logging and run the selected command
///
/// # Errors
///
/// Returns the failing command's error; `main` turns it into an exit code.
pub async fn run() -> CliResult<()> {
    let cli = Cli::parse();
    cli.init_tracing();
    execute(cli).await
}

/// Run an already parsed command line
///
/// # Errors
///
/// Returns any configuration, network, security or validation failure.
pub async fn execute(cli: Cli) -> CliResult<()> {
    let config_path = cli
        .connection
        .config
        .clone()
        .or_else(config::default_config_path);
    let config = AgentConfig::load(config_path.as_deref())?.with_overrides(&cli.connection);

    let mut ctx = Context {
        config,
        config_path,
        formatter: Formatter::new(cli.format, formatter::use_color(cli.no_color)),
    };

    match cli.command {
        Commands::Schema { sdl } => commands::schema(&ctx, sdl).await,
        Commands::Validate { query } => commands::validate(&ctx, &query).await,
        Commands::Execute { query, variables } => {
            commands::execute(&ctx, &query, variables.as_deref()).await
        }
        Commands::Cid { save } => commands::cid(&mut ctx, save).await,
        Commands::Ipfs { path } => commands::ipfs(&ctx, &path).await,
        Commands::Manifest { cid, schema } => commands::manifest(&ctx, cid, schema).await,
        Commands::Config(command) => commands::config(&ctx, &command),
    }
}
