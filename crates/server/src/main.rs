use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use anyhow::Context;
use astralite_engine::{DatasetBundle, DatasetCache, DatasetFetcher};
use astralite_server::ServerConfig;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "astralite-server", version, about = "Weekly Astralite production planner")]
struct Cli {
    /// Bind address. Defaults to 127.0.0.1:8787.
    #[arg(long)]
    bind: Option<SocketAddr>,
    /// YAML config file. Flags override its fields.
    #[arg(long)]
    config: Option<PathBuf>,
    /// SQLite dataset cache. Defaults to ~/.astralite/datasets.db.
    #[arg(long)]
    cache_db: Option<PathBuf>,
    /// Serve datasets from the cache only, never the network.
    #[arg(long)]
    offline: bool,
    /// Directory of extra assets served under /static.
    #[arg(long)]
    static_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };

    let bind = cli
        .bind
        .or(config.bind)
        .unwrap_or_else(|| SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8787));
    let cache_db = cli.cache_db.or(config.cache_db).unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".astralite")
            .join("datasets.db")
    });
    let offline = cli.offline || config.offline.unwrap_or(false);
    let static_dir = cli.static_dir.or(config.static_dir);

    let cache = DatasetCache::new(cache_db);
    let fetcher = DatasetFetcher::new(config.source, Some(cache), offline);
    let bundle = DatasetBundle::load(&fetcher)
        .await
        .context("load gameplay datasets")?;
    let state = astralite_server::build_state(&bundle)?;

    astralite_server::serve(bind, state, static_dir).await
}
