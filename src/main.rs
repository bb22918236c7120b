//! ihpp - HTTP inspecting proxy configuration service
//!
//! Tracks which proxy configurations have run, links captured sessions to
//! them, and keeps the config file in sync with the live proxy set.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ihpp_api::{ApiServer, ApiServerConfig};
use ihpp_control::{ActiveRegistry, ProxyEntry, ProxyLifecycle, SysConfig, SysConfigHandle};
use ihpp_db::{ConfigStore, HistoryQuery};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_DATABASE_URL: &str = "sqlite://ihpp.db?mode=rwc";
const DEFAULT_API_ADDR: &str = "127.0.0.1:20000";

/// ihpp - Inspect HTTP proxy configuration service
#[derive(Parser, Debug)]
#[command(name = "ihpp")]
#[command(about = "Track proxy configurations, their sessions and the config file")]
#[command(version)]
#[command(long_version = concat!(env!("GIT_TAG"), "\nCommit: ", env!("GIT_HASH"), "\nBuilt: ", env!("BUILD_TIME")))]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register configured proxies and serve the REST API
    #[command(long_about = r#"
Load the config file (TOML, or YAML for .yaml/.yml), record each proxy
entry in the configuration store and serve the REST API.

EXAMPLES:
  # Use a config file
  ihpp serve --config ./ihpp.toml

  # Proxies from flags only
  ihpp serve --proxy 127.0.0.1:20003=http://localhost:3000

ENVIRONMENT VARIABLES:
  IHPP_CONFIG        Config file path
  IHPP_DATABASE_URL  Database URL (default: sqlite://ihpp.db?mode=rwc)
  IHPP_API_ADDR      API bind address (default: 127.0.0.1:20000)
    "#)]
    Serve {
        /// Config file path
        #[arg(short, long, env = "IHPP_CONFIG")]
        config: Option<PathBuf>,

        /// Database URL
        #[arg(long, env = "IHPP_DATABASE_URL")]
        database_url: Option<String>,

        /// API bind address
        #[arg(long, env = "IHPP_API_ADDR")]
        api_addr: Option<SocketAddr>,

        /// Proxy as LISTEN=TARGET; replaces proxies from the config file
        #[arg(long = "proxy", value_name = "LISTEN=TARGET", value_parser = parse_proxy)]
        proxies: Vec<ProxyEntry>,

        /// Truncate captured bodies for proxies given with --proxy
        #[arg(long)]
        truncate_log_body: bool,
    },

    /// Print the stored configuration history
    History {
        /// Database URL
        #[arg(long, env = "IHPP_DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
        database_url: String,

        /// Only show configs whose settings contain this text (min. 3 characters)
        #[arg(short, long)]
        query: Option<String>,

        /// Maximum number of rows
        #[arg(short, long, default_value = "20")]
        limit: u64,
    },
}

fn parse_proxy(value: &str) -> Result<ProxyEntry, String> {
    ProxyEntry::parse_flag(value)
        .ok_or_else(|| format!("expected LISTEN=TARGET, got '{}'", value))
}

/// Setup logging with the specified log level
fn setup_logging(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };

    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();
}

async fn open_store(database_url: &str) -> Result<ConfigStore> {
    let db = ihpp_db::connect(database_url)
        .await
        .with_context(|| format!("Failed to connect to database: {}", database_url))?;

    ihpp_db::migrate(&db)
        .await
        .context("Failed to run database migrations")?;

    Ok(ConfigStore::new(db))
}

async fn serve(
    config: Option<PathBuf>,
    database_url: Option<String>,
    api_addr: Option<SocketAddr>,
    proxies: Vec<ProxyEntry>,
    truncate_log_body: bool,
) -> Result<()> {
    let mut sys_config = match config {
        Some(ref path) => SysConfig::load(path).map_err(anyhow::Error::msg)?,
        None => SysConfig::default(),
    };

    if !proxies.is_empty() {
        if sys_config.config_file.is_some() {
            warn!("--proxy given; ignoring proxies from the config file");
        }
        sys_config.proxies = proxies
            .into_iter()
            .map(|p| p.with_truncate_log_body(truncate_log_body))
            .collect();
    }

    let database_url = database_url
        .or_else(|| sys_config.database_url.clone())
        .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

    let api_addr = match api_addr {
        Some(addr) => addr,
        None => sys_config
            .api_addr
            .as_deref()
            .unwrap_or(DEFAULT_API_ADDR)
            .parse()
            .context("Invalid api_addr in config file")?,
    };

    if let Some(ref path) = sys_config.config_file {
        info!("Config file: {}", path.display());
    }
    info!("Database: {}", database_url);

    let store = open_store(&database_url).await?;
    let registry = Arc::new(ActiveRegistry::new());
    let sys_config = SysConfigHandle::new(sys_config);

    // Proxies become active once the transport reports them started.
    let lifecycle =
        ProxyLifecycle::new(Some(store.clone()), registry.clone(), sys_config.clone());
    for entry in sys_config.get().proxies {
        let config_id = lifecycle
            .proxy_configured(&entry)
            .await
            .with_context(|| format!("Failed to register proxy {}", entry.listen))?;
        info!(
            "Proxy {} -> {} registered as config {}",
            entry.listen, entry.target, config_id
        );
    }

    let server = ApiServer::new(
        ApiServerConfig {
            bind_addr: api_addr,
            enable_cors: true,
        },
        store,
        registry,
        sys_config,
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    tokio::select! {
        _ = &mut ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        result = server.start() => {
            if let Err(e) = result {
                error!("API server error: {:#}", e);
                return Err(e);
            }
        }
    }

    info!("ihpp stopped");
    Ok(())
}

async fn history(database_url: &str, query: Option<String>, limit: u64) -> Result<()> {
    let store = open_store(database_url).await?;

    let rows = store
        .list_history(&HistoryQuery {
            search: query,
            limit: Some(limit),
        })
        .await
        .context("Failed to list configuration history")?;

    if rows.is_empty() {
        println!("No configurations recorded");
        return Ok(());
    }

    for row in rows {
        let settings = match ProxyEntry::from_snapshot_json(&row.config_json) {
            Ok(entry) => format!("{} -> {}", entry.listen, entry.target),
            Err(_) => row.config_json.clone(),
        };
        println!(
            "{}  {}  {}  {}",
            row.created_at.format("%Y-%m-%d %H:%M:%S"),
            row.id,
            row.source_path,
            settings
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    match cli.command {
        Commands::Serve {
            config,
            database_url,
            api_addr,
            proxies,
            truncate_log_body,
        } => serve(config, database_url, api_addr, proxies, truncate_log_body).await,
        Commands::History {
            database_url,
            query,
            limit,
        } => history(&database_url, query, limit).await,
    }
}
