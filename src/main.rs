//! # Media Index CLI (`media-index`)
//!
//! Runs the media index tools once from the command line, or starts a
//! long-lived MCP server over HTTP or stdio.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `media-index status <org> <repo>` | Check whether the media index exists |
//! | `media-index index <org> <repo>` | List unique media items |
//! | `media-index search <org> <repo> [filters]` | Filtered search |
//! | `media-index stats <org> <repo>` | Reference statistics |
//! | `media-index usage <org> <repo> --url/--name` | Where an item is used |
//! | `media-index tools` | List the tools and their schemas |
//! | `media-index serve mcp` | HTTP server (REST + MCP at `/mcp`) |
//! | `media-index serve stdio` | MCP over stdin/stdout |
//!
//! Every site command accepts `--path` for a sub-path of the site. Results are
//! printed as pretty JSON, exactly as the corresponding tool returns them.
//! Logs go to stderr and are controlled by `RUST_LOG`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use rmcp::ServiceExt;
use serde_json::{json, Map, Value};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use media_index::config::{self, Config};
use media_index::connector_admin::AdminSource;
use media_index::mcp::McpBridge;
use media_index::server;
use media_index::service::MediaService;
use media_index::traits::{ToolContext, ToolRegistry};

/// Media Index: a cached, queryable view over a site's media usage.
#[derive(Parser)]
#[command(name = "media-index", version, about)]
struct Cli {
    /// Path to configuration file (TOML). Defaults apply when it does not exist.
    #[arg(long, global = true, default_value = "./config/media.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Identity of the site to query.
#[derive(Args)]
struct SiteArgs {
    /// Organization name.
    org: String,
    /// Repository (site) name.
    repo: String,
    /// Sub-path of the site (e.g. `/blog`).
    #[arg(long)]
    path: Option<String>,
}

impl SiteArgs {
    fn to_params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("org".to_string(), json!(self.org));
        params.insert("repo".to_string(), json!(self.repo));
        if let Some(path) = &self.path {
            params.insert("path".to_string(), json!(path));
        }
        params
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether the site's media index has been initialized.
    Status {
        #[command(flatten)]
        site: SiteArgs,
    },

    /// List every unique media item with its usage count.
    Index {
        #[command(flatten)]
        site: SiteArgs,
    },

    /// Search media items. Filters combine with AND.
    Search {
        #[command(flatten)]
        site: SiteArgs,

        /// Substring of the media type (case-sensitive).
        #[arg(long = "type")]
        media_type: Option<String>,

        /// Exact path of the using document.
        #[arg(long)]
        doc: Option<String>,

        /// Substring of the item name (case-insensitive).
        #[arg(long)]
        name: Option<String>,

        /// Substring of the alt text (case-insensitive).
        #[arg(long)]
        alt: Option<String>,

        /// Only items not used by any document.
        #[arg(long)]
        unused_only: bool,

        /// Only items without alt text.
        #[arg(long)]
        missing_alt: bool,
    },

    /// Show reference statistics by type, usage and alt text.
    Stats {
        #[command(flatten)]
        site: SiteArgs,
    },

    /// Show every document that uses a media item.
    Usage {
        #[command(flatten)]
        site: SiteArgs,

        /// Url of the media item (query strings are ignored).
        #[arg(long, conflicts_with = "name", required_unless_present = "name")]
        url: Option<String>,

        /// Part of the media item's url (case-insensitive).
        #[arg(long)]
        name: Option<String>,
    },

    /// List the available tools with their parameter schemas.
    Tools,

    /// Start a long-running MCP server.
    Serve {
        #[command(subcommand)]
        service: ServeService,
    },
}

#[derive(Subcommand)]
enum ServeService {
    /// HTTP server: REST tool dispatch plus MCP streamable HTTP at `/mcp`.
    Mcp,
    /// MCP over stdin/stdout.
    Stdio,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout is reserved for results and the stdio transport
    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let cfg = config::load_config_or_default(&cli.config)?;

    let tools = Arc::new(ToolRegistry::with_builtins());

    if let Commands::Tools = cli.command {
        let infos = server::tool_infos(&tools);
        println!("{}", serde_json::to_string_pretty(&infos)?);
        return Ok(());
    }

    let ctx = build_context(&cfg)?;

    match cli.command {
        Commands::Status { site } => {
            run_tool(&tools, &ctx, "check_status", site.to_params()).await?;
        }
        Commands::Index { site } => {
            run_tool(&tools, &ctx, "get_index", site.to_params()).await?;
        }
        Commands::Search {
            site,
            media_type,
            doc,
            name,
            alt,
            unused_only,
            missing_alt,
        } => {
            let mut params = site.to_params();
            let filters = [("type", media_type), ("doc", doc), ("name", name), ("alt", alt)];
            for (key, value) in filters {
                if let Some(v) = value {
                    params.insert(key.to_string(), json!(v));
                }
            }
            params.insert("unusedOnly".to_string(), json!(unused_only));
            params.insert("missingAlt".to_string(), json!(missing_alt));
            run_tool(&tools, &ctx, "search", params).await?;
        }
        Commands::Stats { site } => {
            run_tool(&tools, &ctx, "get_stats", site.to_params()).await?;
        }
        Commands::Usage { site, url, name } => {
            // find_usage only reads the cache, so load the index first
            let loaded = call_tool(&tools, &ctx, "get_index", site.to_params()).await?;
            if loaded.get("error").is_some() {
                println!("{}", serde_json::to_string_pretty(&loaded)?);
                return Ok(());
            }

            let mut params = site.to_params();
            if let Some(url) = url {
                params.insert("mediaUrl".to_string(), json!(url));
            }
            if let Some(name) = name {
                params.insert("mediaName".to_string(), json!(name));
            }
            run_tool(&tools, &ctx, "find_usage", params).await?;
        }
        Commands::Serve { service } => match service {
            ServeService::Mcp => {
                server::run_server(&cfg, ctx, tools).await?;
            }
            ServeService::Stdio => {
                tracing::info!("serving MCP over stdio");
                let running = McpBridge::new(ctx, tools).serve(rmcp::transport::stdio()).await?;
                running.waiting().await?;
            }
        },
        Commands::Tools => unreachable!("handled before the media source is built"),
    }

    Ok(())
}

fn build_context(cfg: &Config) -> Result<ToolContext> {
    let source = AdminSource::new(cfg.source.clone())?;
    let service = MediaService::new(Arc::new(source));
    Ok(ToolContext::new(Arc::new(service)))
}

async fn call_tool(
    tools: &ToolRegistry,
    ctx: &ToolContext,
    name: &str,
    params: Map<String, Value>,
) -> Result<Value> {
    let tool = tools
        .find(name)
        .ok_or_else(|| anyhow::anyhow!("no tool registered with name: {}", name))?;
    tool.execute(Value::Object(params), ctx).await
}

async fn run_tool(
    tools: &ToolRegistry,
    ctx: &ToolContext,
    name: &str,
    params: Map<String, Value>,
) -> Result<()> {
    let result = call_tool(tools, ctx, name, params).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
