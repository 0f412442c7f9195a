//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development (devnet ledger gateway on localhost,
//! SQLite file and media directory under the working directory).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use dgenerate_shared::constants::{
    APP_NAME, DEFAULT_DISPATCH_TIMEOUT_SECS, DEFAULT_HTTP_PORT, MAX_MEDIA_SIZE,
};

/// Identity of the reward program on the ledger. Every mint is keyed by this
/// triple; none of it comes from the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerIdentity {
    /// Program id of the reward program.
    /// Env: `LEDGER_PROGRAM_ID`
    pub program_id: String,

    /// Mint address of the reward token.
    /// Env: `LEDGER_TOKEN_MINT`
    pub token_mint: String,

    /// Program state account holding the current reward amount.
    /// Env: `LEDGER_GAME_STATE`
    pub game_state: String,

    /// Backend wallet that pays for recipient token accounts.
    /// Env: `LEDGER_PAYER`
    pub payer: String,
}

impl Default for LedgerIdentity {
    fn default() -> Self {
        Self {
            program_id: "EPKw6RHc8Bf7m8BpKxv66NMmzqwnn7tSRwcyJ9cNbNnD".to_string(),
            token_mint: "AvuRwgvgvk4cvUTFhmdJSHAV8BCb4bLYP3DbLB6ugpD7".to_string(),
            game_state: "3iJN6JPCgjrhBKyMaRDe9Kjy5X5U562padf1NKEGohhM".to_string(),
            payer: String::new(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./data/dgenerate.db`
    pub database_path: PathBuf,

    /// Directory where uploaded media files are written.
    /// Env: `MEDIA_STORAGE_PATH`
    /// Default: `./media`
    pub media_storage_path: PathBuf,

    /// Prefix used to build public media URLs (no trailing slash).
    /// Env: `MEDIA_PUBLIC_BASE_URL`
    /// Default: `http://localhost:8080/media`
    pub media_public_base_url: String,

    /// Maximum media upload size in bytes.
    /// Env: `MAX_MEDIA_SIZE`
    /// Default: 50 MiB
    pub max_media_size: usize,

    /// Human-readable name for this instance.
    /// Env: `INSTANCE_NAME`
    pub instance_name: String,

    /// Bearer token for challenge registration, media upload and direct mint.
    /// Env: `ADMIN_TOKEN`
    /// Default: empty (admin endpoints disabled).
    pub admin_token: Option<String>,

    /// JSON-RPC endpoint of the ledger gateway.
    /// Env: `LEDGER_RPC_URL`
    /// Default: `http://127.0.0.1:8899`
    pub ledger_rpc_url: String,

    pub ledger: LedgerIdentity,

    /// Cluster name appended to explorer links (`devnet`, `testnet`).
    /// Env: `LEDGER_EXPLORER_CLUSTER`, empty for mainnet.
    pub explorer_cluster: Option<String>,

    /// Upper bound for one reward dispatch.
    /// Env: `DISPATCH_TIMEOUT_SECS`
    /// Default: 30
    pub dispatch_timeout: Duration,

    /// Per-IP request rate (tokens/s) and burst.
    /// Env: `RATE_LIMIT_PER_SEC`, `RATE_LIMIT_BURST`
    pub rate_limit_per_sec: f64,
    pub rate_limit_burst: f64,

    /// Per-wallet guess rate (guesses/s) and burst.
    /// Env: `GUESS_LIMIT_PER_SEC`, `GUESS_LIMIT_BURST`
    pub guess_limit_per_sec: f64,
    pub guess_limit_burst: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./data/dgenerate.db"),
            media_storage_path: PathBuf::from("./media"),
            media_public_base_url: format!("http://localhost:{DEFAULT_HTTP_PORT}/media"),
            max_media_size: MAX_MEDIA_SIZE,
            instance_name: APP_NAME.to_string(),
            admin_token: None,
            ledger_rpc_url: "http://127.0.0.1:8899".to_string(),
            ledger: LedgerIdentity::default(),
            explorer_cluster: Some("devnet".to_string()),
            dispatch_timeout: Duration::from_secs(DEFAULT_DISPATCH_TIMEOUT_SECS),
            rate_limit_per_sec: 10.0,
            rate_limit_burst: 30.0,
            guess_limit_per_sec: 1.0,
            guess_limit_burst: 5.0,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup. `from_env` is the
    /// production entry point; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            parse_into(&mut config.http_addr, "HTTP_ADDR", &addr);
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Some(path) = lookup("MEDIA_STORAGE_PATH") {
            config.media_storage_path = PathBuf::from(path);
        }

        if let Some(url) = lookup("MEDIA_PUBLIC_BASE_URL") {
            config.media_public_base_url = url.trim_end_matches('/').to_string();
        }

        if let Some(val) = lookup("MAX_MEDIA_SIZE") {
            parse_into(&mut config.max_media_size, "MAX_MEDIA_SIZE", &val);
        }

        if let Some(name) = lookup("INSTANCE_NAME") {
            config.instance_name = name;
        }

        if let Some(token) = lookup("ADMIN_TOKEN") {
            if !token.is_empty() {
                config.admin_token = Some(token);
            }
        }

        // -- Ledger --

        if let Some(url) = lookup("LEDGER_RPC_URL") {
            config.ledger_rpc_url = url;
        }

        if let Some(v) = lookup("LEDGER_PROGRAM_ID") {
            config.ledger.program_id = v;
        }

        if let Some(v) = lookup("LEDGER_TOKEN_MINT") {
            config.ledger.token_mint = v;
        }

        if let Some(v) = lookup("LEDGER_GAME_STATE") {
            config.ledger.game_state = v;
        }

        if let Some(v) = lookup("LEDGER_PAYER") {
            config.ledger.payer = v;
        }

        if let Some(cluster) = lookup("LEDGER_EXPLORER_CLUSTER") {
            config.explorer_cluster = Some(cluster).filter(|c| !c.is_empty());
        }

        if let Some(val) = lookup("DISPATCH_TIMEOUT_SECS") {
            let mut secs = config.dispatch_timeout.as_secs();
            parse_into(&mut secs, "DISPATCH_TIMEOUT_SECS", &val);
            if secs == 0 {
                tracing::warn!("DISPATCH_TIMEOUT_SECS must be positive, using default");
            } else {
                config.dispatch_timeout = Duration::from_secs(secs);
            }
        }

        // -- Rate limiting --

        if let Some(val) = lookup("RATE_LIMIT_PER_SEC") {
            parse_into(&mut config.rate_limit_per_sec, "RATE_LIMIT_PER_SEC", &val);
        }
        if let Some(val) = lookup("RATE_LIMIT_BURST") {
            parse_into(&mut config.rate_limit_burst, "RATE_LIMIT_BURST", &val);
        }
        if let Some(val) = lookup("GUESS_LIMIT_PER_SEC") {
            parse_into(&mut config.guess_limit_per_sec, "GUESS_LIMIT_PER_SEC", &val);
        }
        if let Some(val) = lookup("GUESS_LIMIT_BURST") {
            parse_into(&mut config.guess_limit_burst, "GUESS_LIMIT_BURST", &val);
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

/// Overwrite `slot` with the parsed value, or warn and keep the default.
fn parse_into<T: FromStr>(slot: &mut T, key: &str, raw: &str) {
    match raw.trim().parse::<T>() {
        Ok(v) => *slot = v,
        Err(_) => {
            tracing::warn!(key, value = %raw, "Invalid value, using default");
        }
    }
}
