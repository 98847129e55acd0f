//! Tâb game server - CLI entry point.

#![warn(missing_docs)]

mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use tab_game::StickDice;
use tab_server::{
    Broadcaster, GameService, JsonFileStore, MemoryStore, Repository, ServerConfig, ranking,
    router,
};
use tracing::{info, instrument, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tab_server=debug")),
        )
        .init();

    let cli = Cli::parse();
    let config = ServerConfig::load_or_default(&cli.config)?;

    match cli.command {
        Command::Serve {
            host,
            port,
            data_dir,
            ephemeral,
        } => {
            let mut config = config;
            if let Some(host) = host {
                config = config.with_host(host);
            }
            if let Some(port) = port {
                config = config.with_port(port);
            }
            if let Some(data_dir) = data_dir {
                config = config.with_data_dir(data_dir);
            }
            run_server(config, ephemeral).await
        }
        Command::Ranking {
            group,
            size,
            data_dir,
        } => {
            let data_dir = data_dir.unwrap_or_else(|| config.data_dir().clone());
            print_ranking(&data_dir, group, size, *config.ranking_limit())
        }
    }
}

/// Run the HTTP game server until ctrl-c.
#[instrument(skip(config), fields(addr = %config.bind_address()))]
async fn run_server(config: ServerConfig, ephemeral: bool) -> Result<()> {
    let store: Arc<dyn Repository> = if ephemeral {
        warn!("Ephemeral mode, nothing will be persisted");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(JsonFileStore::open(config.data_dir()).context("Failed to open data directory")?)
    };

    let broadcaster = Broadcaster::new(*config.subscriber_buffer());
    let service = GameService::new(
        store,
        Arc::new(StickDice),
        broadcaster.clone(),
        *config.ranking_limit(),
    );
    let restored = service.restore().await?;
    info!(restored, "Sessions loaded");

    let keep_alive = broadcaster.spawn_keep_alive(config.keep_alive());
    let app = router(Arc::new(service));

    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address()))?;
    info!("Server ready at http://{}/", config.bind_address());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    keep_alive.shutdown().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

/// Print the leaderboard stored in `data_dir`.
fn print_ranking(data_dir: &Path, group: u32, size: usize, limit: usize) -> Result<()> {
    let store = JsonFileStore::open(data_dir).context("Failed to open data directory")?;
    let rows = ranking(&store.users()?, group, size, limit);
    if rows.is_empty() {
        println!("No finished games for group {} on {} columns", group, size);
        return Ok(());
    }
    println!("{:>4}  {:<20} {:>5} {:>6}", "#", "nickname", "wins", "games");
    for (place, row) in rows.iter().enumerate() {
        println!(
            "{:>4}  {:<20} {:>5} {:>6}",
            place + 1,
            row.nickname,
            row.wins,
            row.games_played
        );
    }
    Ok(())
}
