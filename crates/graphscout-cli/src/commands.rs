//! Command handlers

use std::path::PathBuf;

use graphscout_graphql::introspection::TypeKind;
use graphscout_graphql::{GraphQLClient, ManifestResolver};
use graphscout_http::GatewayRaceFetcher;
use graphscout_security::SecurityPolicy;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::cli::ConfigCommands;
use crate::config::AgentConfig;
use crate::error::{CliError, CliResult};
use crate::formatter::Formatter;

/// State shared by every command
#[derive(Debug)]
pub struct Context {
    /// Effective configuration (file, environment, flags)
    pub config: AgentConfig,
    /// Where `config save` and `cid --save` write
    pub config_path: Option<PathBuf>,
    /// Output formatter
    pub formatter: Formatter,
}

impl Context {
    fn client(&self) -> CliResult<GraphQLClient> {
        let endpoint = self.config.require_endpoint()?;
        let policy = if self.config.allow_private_networks {
            SecurityPolicy::trusted()
        } else {
            SecurityPolicy::strict()
        };

        let mut builder = GraphQLClient::builder(endpoint).policy(policy);
        if let Some(authorization) = &self.config.authorization {
            builder = builder.authorization(authorization.clone());
        }
        Ok(builder.build()?)
    }

    fn writable_config_path(&self) -> CliResult<&PathBuf> {
        self.config_path.as_ref().ok_or_else(|| {
            CliError::InvalidArguments(
                "no config directory available; pass --config <PATH>".to_string(),
            )
        })
    }
}

/// `name: kind` row of a schema summary
#[derive(Debug, Serialize)]
struct TypeSummary<'a> {
    name: &'a str,
    kind: TypeKind,
    fields: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SchemaSummary<'a> {
    endpoint: &'a str,
    query_type: &'a str,
    types: Vec<TypeSummary<'a>>,
}

/// Resolve `@path` arguments to file contents
pub fn read_query(arg: &str) -> CliResult<String> {
    match arg.strip_prefix('@') {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => Ok(arg.to_string()),
    }
}

/// Parse `--variables`; only JSON objects are accepted
pub fn parse_variables(raw: Option<&str>) -> CliResult<Option<Value>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match serde_json::from_str(raw)? {
        value @ Value::Object(_) => Ok(Some(value)),
        other => Err(CliError::InvalidArguments(format!(
            "variables must be a JSON object, got {other}"
        ))),
    }
}

/// `schema`
pub async fn schema(ctx: &Context, sdl: bool) -> CliResult<()> {
    let client = ctx.client()?;
    let schema = client.fetch_schema().await?;

    if sdl {
        return ctx.formatter.display_scalar("sdl", &schema.to_sdl());
    }

    let summary = SchemaSummary {
        endpoint: client.endpoint(),
        query_type: schema.query_type_name(),
        types: schema
            .types()
            .filter(|ty| !ty.name.starts_with("__"))
            .map(|ty| TypeSummary {
                name: &ty.name,
                kind: ty.kind,
                fields: ty
                    .fields
                    .as_ref()
                    .map(Vec::len)
                    .or_else(|| ty.input_fields.as_ref().map(Vec::len))
                    .unwrap_or(0),
            })
            .collect(),
    };

    if !ctx.formatter.is_human() {
        return ctx.formatter.display(&summary);
    }

    ctx.formatter
        .print_header(&format!("Schema for {}", summary.endpoint));
    ctx.formatter.print_kv("Query root", summary.query_type);
    ctx.formatter
        .print_kv("Types", &summary.types.len().to_string());
    println!();
    for ty in &summary.types {
        println!("  {:<14} {} ({} fields)", format!("{:?}", ty.kind), ty.name, ty.fields);
    }
    Ok(())
}

/// `validate`; validation problems become [`CliError::InvalidQuery`]
pub async fn validate(ctx: &Context, query: &str) -> CliResult<()> {
    let query = read_query(query)?;
    let messages = ctx.client()?.validate(&query).await?;
    ctx.formatter.display_validation(&messages)?;

    if messages.is_empty() {
        Ok(())
    } else {
        Err(CliError::InvalidQuery {
            count: messages.len(),
        })
    }
}

/// `execute`
pub async fn execute(ctx: &Context, query: &str, variables: Option<&str>) -> CliResult<()> {
    let query = read_query(query)?;
    let variables = parse_variables(variables)?;

    let response = ctx.client()?.execute(&query, variables).await?;
    if response.has_errors() {
        debug!("Endpoint returned {} GraphQL error(s)", response.error_messages().len());
    }
    ctx.formatter.display_response(&response)
}

/// `cid`
pub async fn cid(ctx: &mut Context, save: bool) -> CliResult<()> {
    let cid = ctx.client()?.fetch_cid().await?;

    if cid.is_empty() {
        ctx.formatter
            .print_info("Endpoint does not expose deployment metadata");
    } else if save {
        ctx.config.cid = Some(cid.clone());
        let path = ctx.writable_config_path()?;
        ctx.config.save(path)?;
        info!("Stored deployment {} in {}", cid, path.display());
    }

    ctx.formatter.display_scalar("cid", &cid)
}

/// `ipfs`
pub async fn ipfs(ctx: &Context, path: &str) -> CliResult<()> {
    let content = GatewayRaceFetcher::new()?.fetch_content(path).await?;
    ctx.formatter.display_scalar("content", &content)
}

/// `manifest`
pub async fn manifest(ctx: &Context, cid: Option<String>, with_schema: bool) -> CliResult<()> {
    let cid = cid
        .or_else(|| ctx.config.cid.clone())
        .ok_or(CliError::MissingCid)?;

    let resolver = ManifestResolver::new(GatewayRaceFetcher::new()?);
    let manifest = resolver.fetch_manifest(&cid).await?;
    let sdl = if with_schema {
        Some(resolver.fetch_schema_sdl(&manifest).await?)
    } else {
        None
    };

    if !ctx.formatter.is_human() {
        return ctx.formatter.display(&serde_json::json!({
            "cid": cid,
            "manifest": manifest,
            "schema": sdl,
        }));
    }

    ctx.formatter.display_manifest(&cid, &manifest)?;
    if let Some(sdl) = sdl {
        ctx.formatter.print_header("Schema");
        println!("{sdl}");
    }
    Ok(())
}

/// `config show` / `config save`
pub fn config(ctx: &Context, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let shown = ctx.config.redacted();
            if !ctx.formatter.is_human() {
                return ctx.formatter.display(&shown);
            }

            ctx.formatter.print_header("Configuration");
            if let Some(path) = &ctx.config_path {
                ctx.formatter.print_kv("File", &path.display().to_string());
            }
            ctx.formatter
                .print_kv("Endpoint", shown.endpoint.as_deref().unwrap_or("-"));
            ctx.formatter
                .print_kv("Authorization", shown.authorization.as_deref().unwrap_or("-"));
            ctx.formatter.print_kv(
                "Allow private networks",
                &shown.allow_private_networks.to_string(),
            );
            ctx.formatter
                .print_kv("Deployment CID", shown.cid.as_deref().unwrap_or("-"));
            Ok(())
        }
        ConfigCommands::Save => {
            let path = ctx.writable_config_path()?;
            ctx.config.save(path)?;
            ctx.formatter
                .print_info(&format!("Saved configuration to {}", path.display()));
            Ok(())
        }
    }
}
