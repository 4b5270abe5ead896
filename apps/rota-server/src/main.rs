mod backend;
mod config;
mod directory;
mod dispatch;
mod email;
mod error;
mod handlers;
mod metrics;
mod server;

#[cfg(test)]
mod tests;

use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusHandle;
use rota_engine::RoundEngine;
use rota_notify::{Channel, ChannelRouter, TracingSender};
use rota_storage::{RoundId, RoundStore, UserId};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot, watch};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use backend::StoreBackend;
use config::ServerConfig;
use directory::FileDirectory;
use dispatch::OutboxDispatcher;
use email::EmailSender;
use handlers::health::{health_router, HealthState};
use server::AppState;

const DEFAULT_DATABASE_URL: &str = "sqlite://rota.db?mode=rwc";

// ────────────────────────────────────── CLI Types ──────────────────────────────────────

#[derive(Parser)]
#[command(name = "rota-server")]
#[command(about = "Rota server CLI for administration and serving")]
struct Cli {
    /// Database URL (sqlite://path/to/rota.db or memory:)
    #[arg(long, global = true, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server
    Serve {
        /// API address
        #[arg(long, default_value = "0.0.0.0:8000")]
        addr: String,

        /// Health check and metrics address
        #[arg(long, default_value = "0.0.0.0:8080")]
        health_addr: String,
    },
    /// Inspect stored rounds
    Round {
        #[command(subcommand)]
        round_cmd: RoundCommand,
    },
}

#[derive(Subcommand)]
enum RoundCommand {
    /// Show one round
    Show {
        /// Round id
        id: String,
    },
    /// List rounds created by a user, newest first
    List {
        /// Creator's user id
        #[arg(long)]
        creator: String,
    },
}

// ────────────────────────────────────── Admin commands ──────────────────────────────────────

fn print_round(round: &rota_storage::Round) {
    println!("Round:      {}", round.id);
    println!("Creator:    {}", round.creator_id);
    println!("Target:     {}", round.target_id);
    println!("Mode:       {}", round.mode());
    println!("Status:     {}", round.status);
    println!("Pointer:    {}", round.pointer_index());
    for (i, candidate) in round.candidates.iter().enumerate() {
        let marker = if round.has_declined(candidate) {
            " (declined)"
        } else if round.accepted_candidate() == Some(candidate) {
            " (accepted)"
        } else {
            ""
        };
        println!("  {}. {}{}", i + 1, candidate, marker);
    }
    println!("Updated:    {}", round.updated_at);
}

async fn cmd_round_show(db_url: &str, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let backend = StoreBackend::open(db_url).await?;
    let round = backend.get_round(&RoundId(Uuid::parse_str(id)?)).await?;
    print_round(&round);
    Ok(())
}

async fn cmd_round_list(db_url: &str, creator: &str) -> Result<(), Box<dyn std::error::Error>> {
    let backend = StoreBackend::open(db_url).await?;
    let rounds = backend
        .list_rounds_by_creator(&UserId(Uuid::parse_str(creator)?))
        .await?;

    if rounds.is_empty() {
        println!("No rounds found.");
    } else {
        for round in rounds {
            println!(
                "{}  {:<10}  {:<9}  {} candidates",
                round.id,
                round.mode(),
                round.status,
                round.candidates.len()
            );
        }
    }

    Ok(())
}

// ────────────────────────────────────── Serve ──────────────────────────────────────

/// Wire the engine and the outbox dispatcher around one store.
fn build_services(
    backend: StoreBackend,
    directory: Arc<FileDirectory>,
    config: &ServerConfig,
) -> Result<(RoundEngine<StoreBackend>, OutboxDispatcher<StoreBackend>), email::EmailError> {
    let store = Arc::new(backend);
    let engine = RoundEngine::new(
        store.clone(),
        directory.clone(),
        directory.clone(),
        directory.clone(),
    )
    .with_channels(config.channels.clone());

    let mut senders = ChannelRouter::new().with(Channel::InApp, Arc::new(TracingSender));
    if let Some(email_config) = &config.email {
        let provider = email::create_provider(email_config)?;
        senders = senders.with(
            Channel::Email,
            Arc::new(EmailSender::new(provider, directory, email_config)),
        );
    }

    let dispatcher = OutboxDispatcher::new(
        store,
        Arc::new(senders),
        config.outbox_batch,
        config.outbox_poll,
    );
    Ok((engine, dispatcher))
}

async fn cmd_serve(
    db_url: &str,
    addr: &str,
    health_addr: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env()?;
    let metrics = crate::metrics::init_metrics()?;
    cmd_serve_with_ready(db_url, addr, health_addr, config, Some(metrics), None).await
}

async fn cmd_serve_with_ready(
    db_url: &str,
    addr: &str,
    health_addr: &str,
    config: ServerConfig,
    metrics: Option<PrometheusHandle>,
    ready_tx: Option<oneshot::Sender<(SocketAddr, SocketAddr)>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = addr.parse()?;
    let health_addr: SocketAddr = health_addr.parse()?;

    let backend = StoreBackend::open(db_url).await?;
    let backend_kind = backend.kind();

    let directory = match &config.directory_path {
        Some(path) => FileDirectory::load(path)?,
        None => FileDirectory::default(),
    };
    info!(users = directory.user_count(), "directory loaded");

    let (engine, dispatcher) = build_services(backend, Arc::new(directory), &config)?;
    let app = server::router(AppState::new(engine));

    // /readyz flips to ok once both listeners are bound
    let (readiness_tx, readiness_rx) = watch::channel(false);
    let health_app = health_router(HealthState::new(readiness_rx, metrics));

    let api_listener = tokio::net::TcpListener::bind(addr).await?;
    let api_actual_addr = api_listener.local_addr()?;

    let health_listener = tokio::net::TcpListener::bind(health_addr).await?;
    let health_actual_addr = health_listener.local_addr()?;

    info!(
        addr = %api_actual_addr,
        health_addr = %health_actual_addr,
        backend = backend_kind,
        channels = ?config.channels,
        "rota-server listening"
    );

    let _ = readiness_tx.send(true);

    if let Some(tx) = ready_tx {
        let _ = tx.send((api_actual_addr, health_actual_addr));
    }

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut shutdown_api = shutdown_tx.subscribe();
    let mut shutdown_health = shutdown_tx.subscribe();
    let dispatcher_task = tokio::spawn(dispatcher.run(shutdown_tx.subscribe()));

    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        shutdown_signal(readiness_tx).await;
        let _ = shutdown_tx_clone.send(());
    });

    let api_server = axum::serve(api_listener, app).with_graceful_shutdown(async move {
        let _ = shutdown_api.recv().await;
    });
    let health_server = axum::serve(health_listener, health_app).with_graceful_shutdown(async move {
        let _ = shutdown_health.recv().await;
    });

    let (api_result, health_result) = tokio::join!(api_server, health_server);
    api_result?;
    health_result?;

    dispatcher_task.await?;
    Ok(())
}

async fn shutdown_signal(readiness_tx: watch::Sender<bool>) {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigterm, mut sigint) =
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                error!(error = %e, "failed to install signal handlers");
                return std::future::pending().await;
            }
        };

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down gracefully...");
        }
    }

    // Mark not ready so the load balancer drains traffic
    let _ = readiness_tx.send(false);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// ────────────────────────────────────── Main ──────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let cli = Cli::parse();
    let db_url = cli
        .database_url
        .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

    match cli.command {
        Command::Serve { addr, health_addr } => {
            cmd_serve(&db_url, &addr, &health_addr).await?;
        }
        Command::Round { round_cmd } => match round_cmd {
            RoundCommand::Show { id } => {
                cmd_round_show(&db_url, &id).await?;
            }
            RoundCommand::List { creator } => {
                cmd_round_list(&db_url, &creator).await?;
            }
        },
    }

    Ok(())
}
