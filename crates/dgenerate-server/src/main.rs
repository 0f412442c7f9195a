//! # dgenerate-server
//!
//! Game backend for "guess the prompt". Players look at AI-generated media,
//! guess the prompt, and earn reward tokens for close guesses.
//!
//! This binary provides:
//! - **Challenge feed** and operator registration of new challenges
//! - **Guess scoring** with a durable guess ledger and derived player stats
//! - **Reward dispatch** through a JSON-RPC ledger gateway (best effort,
//!   after the guess is recorded)
//! - **Media storage** for challenge images and videos
//! - **Per-IP and per-wallet rate limiting**

mod api;
mod config;
mod error;
mod ledger;
mod ledger_rpc;
mod media_store;
mod rate_limit;
mod reward;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dgenerate_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::ledger::GuessLedger;
use crate::ledger_rpc::RpcLedgerClient;
use crate::media_store::MediaStore;
use crate::rate_limit::RateLimiter;
use crate::reward::RewardDispatcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,dgenerate_server=debug")),
        )
        .init();

    info!("Starting dgenerate server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(
        instance = %config.instance_name,
        http = %config.http_addr,
        database = %config.database_path.display(),
        ledger_rpc = %config.ledger_rpc_url,
        admin_enabled = config.admin_token.is_some(),
        "Loaded configuration"
    );

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let db = Arc::new(Mutex::new(Database::open_at(&config.database_path)?));

    let media = Arc::new(
        MediaStore::new(
            config.media_storage_path.clone(),
            config.media_public_base_url.clone(),
            config.max_media_size,
        )
        .await?,
    );

    // Each RPC call is bounded by the dispatch timeout; the dispatcher also
    // bounds the whole sequence.
    let ledger_client = RpcLedgerClient::new(
        config.ledger_rpc_url.clone(),
        config.ledger.clone(),
        config.explorer_cluster.clone(),
        config.dispatch_timeout,
    )?;
    let dispatcher = RewardDispatcher::new(Arc::new(ledger_client), config.dispatch_timeout);

    let rate_limiter = RateLimiter::new(config.rate_limit_per_sec, config.rate_limit_burst);
    let guess_limiter = RateLimiter::new(config.guess_limit_per_sec, config.guess_limit_burst);

    let app_state = AppState {
        ledger: Arc::new(GuessLedger::new(db.clone())),
        db,
        dispatcher,
        media,
        rate_limiter: rate_limiter.clone(),
        guess_limiter: guess_limiter.clone(),
        config: Arc::new(config.clone()),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic rate limiter cleanup (every 5 minutes, evict buckets idle >10 min)
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            rate_limiter.purge_stale(600.0).await;
            guess_limiter.purge_stale(600.0).await;
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
