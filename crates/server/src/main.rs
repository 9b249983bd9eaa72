//! Forum engine host.
//!
//! Loads configuration, prepares the schema and keeps the voting engine
//! wired until shutdown. Request framing is owned by the embedding service.

use std::sync::Arc;

use forum_common::{Config, get_metrics};
use forum_core::ForumServices;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "forum=debug,sea_orm=info".into()),
        )
        .init();

    info!("Starting forum engine...");

    // Load configuration
    let config = Config::load()?;

    // Connect to database
    let db = forum_db::init(&config).await?;
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    forum_db::migrate(&db).await?;
    info!("Migrations completed");

    let services = ForumServices::new(Arc::new(db), &config);
    info!(
        conflict_retries = config.voting.conflict_retries,
        default_limit = config.listing.default_limit,
        max_limit = config.listing.max_limit,
        "Voting engine ready"
    );

    shutdown_signal().await;

    let snapshot = get_metrics().snapshot();
    info!(
        votes_cast = snapshot.votes_cast,
        votes_changed = snapshot.votes_changed,
        votes_retracted = snapshot.votes_retracted,
        vote_conflicts = snapshot.vote_conflicts,
        "Shutdown complete"
    );
    tracing::debug!(metrics = %get_metrics().to_prometheus(), "Final metrics");
    drop(services);

    Ok(())
}
