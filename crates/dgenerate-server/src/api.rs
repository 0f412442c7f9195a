use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use dgenerate_shared::constants::{
    CORRECT_THRESHOLD, DEFAULT_FEED_LIMIT, MAX_FEED_LIMIT, MAX_PROMPT_LEN, REWARD_HINT_TOKENS,
    TOKEN_DECIMALS, TOKEN_SYMBOL,
};
use dgenerate_shared::types::{ChallengeId, Difficulty, MediaType, WalletId};
use dgenerate_shared::DgenError;
use dgenerate_store::{Challenge, ChallengeFilter, Database, Guess, StoreError, User};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::ledger::GuessLedger;
use crate::media_store::MediaStore;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::reward::{MintOutcome, RewardDispatcher};

/// Multipart framing allowance on top of the media size limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub ledger: Arc<GuessLedger>,
    pub dispatcher: RewardDispatcher,
    pub media: Arc<MediaStore>,
    pub rate_limiter: RateLimiter,
    pub guess_limiter: RateLimiter<WalletId>,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    let body_limit = state.media.max_size().saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .route("/challenges", get(list_challenges).post(create_challenge))
        .route("/challenges/:id", get(get_challenge).delete(retire_challenge))
        .route("/guesses", post(submit_guess))
        .route("/users/:wallet_id/stats", get(user_stats))
        .route("/users/:wallet_id/guesses", get(user_guesses))
        .route("/leaderboard", get(leaderboard))
        .route("/media/upload", post(media_upload))
        .route("/media/:filename", get(media_download))
        .route("/rewards/mint", post(mint_reward))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─── Request / response bodies ───

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
    token_symbol: &'static str,
    token_decimals: u32,
    correct_threshold: f64,
    reward_hint: u64,
    program_id: String,
    token_mint: String,
    game_state: String,
    admin_enabled: bool,
}

#[derive(Default, Deserialize)]
struct FeedQuery {
    limit: Option<String>,
    #[serde(rename = "type")]
    media_type: Option<String>,
    difficulty: Option<String>,
}

#[derive(Default, Deserialize)]
struct LimitQuery {
    limit: Option<String>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CreateChallengeRequest {
    media_url: String,
    prompt: String,
    media_type: Option<String>,
    difficulty: Option<String>,
    metadata: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SubmitGuessRequest {
    #[serde(alias = "imageId")]
    challenge_id: String,
    wallet_id: String,
    guess_text: String,
    #[serde(alias = "actualPrompt")]
    reference_prompt: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitGuessResponse {
    success: bool,
    is_correct: bool,
    similarity_score: f64,
    tokens_earned: u64,
    guess: Guess,
    user_stats: Option<User>,
    /// `None` for incorrect guesses; otherwise the dispatcher outcome.
    minting: Option<MintOutcome>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct MintRequest {
    recipient_wallet: String,
    amount: Option<u64>,
}

// ─── Handlers ───

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    let config = &state.config;
    Json(ServerInfoResponse {
        name: config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        token_symbol: TOKEN_SYMBOL,
        token_decimals: TOKEN_DECIMALS,
        correct_threshold: CORRECT_THRESHOLD,
        reward_hint: REWARD_HINT_TOKENS,
        program_id: config.ledger.program_id.clone(),
        token_mint: config.ledger.token_mint.clone(),
        game_state: config.ledger.game_state.clone(),
        admin_enabled: config.admin_token.is_some(),
    })
}

async fn list_challenges(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<serde_json::Value>, ServerError> {
    // Unknown type/difficulty values are ignored rather than rejected.
    let filter = ChallengeFilter {
        limit: clamp_limit(query.limit.as_deref()),
        media_type: query.media_type.and_then(|t| t.parse::<MediaType>().ok()),
        difficulty: query.difficulty.and_then(|d| d.parse::<Difficulty>().ok()),
    };

    let challenges = state
        .db
        .lock()
        .await
        .list_challenges(&filter)
        .map_err(|e| read_error("challenges", e))?;

    Ok(Json(serde_json::json!({ "challenges": challenges })))
}

async fn get_challenge(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let id = ChallengeId::parse(&id)?;
    let challenge = state
        .db
        .lock()
        .await
        .get_challenge(id)
        .map_err(|e| read_error("Challenge", e))?;

    Ok(Json(serde_json::json!({ "challenge": challenge })))
}

async fn create_challenge(
    headers: HeaderMap,
    State(state): State<AppState>,
    payload: Result<Json<CreateChallengeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<serde_json::Value>), ServerError> {
    verify_admin_token(&headers, &state.config)?;
    let Json(req) = payload.map_err(bad_json)?;

    if req.media_url.trim().is_empty() {
        return Err(DgenError::MissingField("mediaUrl").into());
    }
    if req.prompt.trim().is_empty() {
        return Err(DgenError::MissingField("prompt").into());
    }
    if req.prompt.len() > MAX_PROMPT_LEN {
        return Err(DgenError::TooLong {
            field: "prompt",
            len: req.prompt.len(),
            max: MAX_PROMPT_LEN,
        }
        .into());
    }
    let media_type = match req.media_type.as_deref() {
        Some(t) => t.parse::<MediaType>()?,
        None => MediaType::default(),
    };
    let difficulty = match req.difficulty.as_deref() {
        Some(d) => d.parse::<Difficulty>()?,
        None => Difficulty::default(),
    };

    let challenge = Challenge::new(
        req.media_url.trim(),
        media_type,
        req.prompt.trim(),
        difficulty,
        req.metadata,
    );

    state
        .db
        .lock()
        .await
        .insert_challenge(&challenge)
        .map_err(|e| ServerError::persistence("Failed to save challenge", e))?;

    info!(
        id = %challenge.id,
        media_type = challenge.media_type.as_str(),
        difficulty = challenge.difficulty.as_str(),
        "Challenge registered"
    );

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "challenge": challenge })),
    ))
}

async fn retire_challenge(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    let id = ChallengeId::parse(&id)?;

    let retired = state
        .db
        .lock()
        .await
        .retire_challenge(id)
        .map_err(|e| ServerError::persistence("Failed to retire challenge", e))?;
    if !retired {
        return Err(ServerError::NotFound(format!("Challenge {id}")));
    }

    info!(id = %id, "Challenge retired");
    Ok(Json(serde_json::json!({ "retired": true })))
}

/// Score a guess, persist it, and mint the reward if it is correct.
///
/// The guess is durable before minting starts; a failed mint is reported in
/// `minting` and the request still succeeds.
async fn submit_guess(
    State(state): State<AppState>,
    payload: Result<Json<SubmitGuessRequest>, JsonRejection>,
) -> Result<Json<SubmitGuessResponse>, ServerError> {
    let Json(req) = payload.map_err(bad_json)?;

    // Malformed wallets fall through to the ledger's validation.
    if let Ok(wallet) = WalletId::parse(&req.wallet_id) {
        if !state.guess_limiter.check(&wallet).await {
            debug!(wallet = %wallet.short(), "Guess rate limit exceeded");
            return Err(ServerError::RateLimited);
        }
    }

    let guess = state
        .ledger
        .record_guess(
            &req.challenge_id,
            &req.wallet_id,
            &req.guess_text,
            &req.reference_prompt,
        )
        .await?;

    // The guess is already durable; a stats read failure must not fail it.
    let user_stats = match state.ledger.user_stats(&guess.wallet_id).await {
        Ok(stats) => stats,
        Err(e) => {
            warn!(wallet = %guess.wallet_id.short(), error = %e, "Failed to load user stats");
            None
        }
    };

    let minting = if guess.is_correct {
        Some(
            state
                .dispatcher
                .dispatch_reward(&guess.wallet_id, guess.tokens_earned)
                .await,
        )
    } else {
        None
    };

    Ok(Json(SubmitGuessResponse {
        success: true,
        is_correct: guess.is_correct,
        similarity_score: guess.similarity_score,
        tokens_earned: guess.tokens_earned,
        guess,
        user_stats,
        minting,
    }))
}

async fn user_stats(
    State(state): State<AppState>,
    Path(wallet_id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let wallet = WalletId::parse(&wallet_id)?;
    let stats = state
        .ledger
        .user_stats(&wallet)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
        .ok_or_else(|| ServerError::NotFound(format!("User {wallet}")))?;

    Ok(Json(serde_json::json!({ "userStats": stats })))
}

async fn user_guesses(
    State(state): State<AppState>,
    Path(wallet_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let wallet = WalletId::parse(&wallet_id)?;
    let guesses = state
        .db
        .lock()
        .await
        .list_guesses_for_wallet(&wallet, clamp_limit(query.limit.as_deref()))
        .map_err(|e| read_error("guesses", e))?;

    Ok(Json(serde_json::json!({ "guesses": guesses })))
}

async fn leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let entries = state
        .db
        .lock()
        .await
        .leaderboard(clamp_limit(query.limit.as_deref()))
        .map_err(|e| read_error("leaderboard", e))?;

    Ok(Json(serde_json::json!({ "leaderboard": entries })))
}

async fn media_upload(
    headers: HeaderMap,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ServerError> {
    verify_admin_token(&headers, &state.config)?;

    let multipart_err = |e: axum::extract::multipart::MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServerError::BodyTooLarge {
                max: state.media.max_size(),
            }
        } else {
            ServerError::BadRequest(format!("Multipart error: {}", e.body_text()))
        }
    };

    while let Some(field) = multipart.next_field().await.map_err(multipart_err)? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or(DgenError::MissingField("filename"))?;
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_default();
        let data = field.bytes().await.map_err(multipart_err)?;

        let stored = state.media.store(&filename, &content_type, &data).await?;

        info!(
            filename = %stored.filename,
            size = stored.size,
            media_type = stored.media_type.as_str(),
            "Media uploaded"
        );

        return Ok(Json(serde_json::json!({
            "url": stored.url,
            "filename": stored.filename,
            "size": stored.size,
            "mediaType": stored.media_type,
        })));
    }

    Err(ServerError::BadRequest(
        "Missing 'file' field in multipart form".to_string(),
    ))
}

async fn media_download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ServerError> {
    let (data, content_type) = state.media.get(&filename).await?;
    Ok(([(header::CONTENT_TYPE, content_type)], data).into_response())
}

/// Operator-triggered mint outside the guess flow.
async fn mint_reward(
    headers: HeaderMap,
    State(state): State<AppState>,
    payload: Result<Json<MintRequest>, JsonRejection>,
) -> Result<Json<MintOutcome>, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    let Json(req) = payload.map_err(bad_json)?;

    let wallet = WalletId::parse(&req.recipient_wallet).map_err(|e| match e {
        DgenError::MissingField(_) => DgenError::MissingField("recipientWallet"),
        other => other,
    })?;
    let amount = req
        .amount
        .filter(|a| *a > 0)
        .ok_or(DgenError::MissingField("amount"))?;

    match state.dispatcher.dispatch_reward(&wallet, amount).await {
        outcome @ MintOutcome::Minted(_) => Ok(Json(outcome)),
        MintOutcome::Failed(failure) => Err(ServerError::MintFailed(
            failure
                .details
                .unwrap_or_else(|| serde_json::Value::String(failure.error)),
        )),
    }
}

// ─── Helpers ───

/// `limit` query parameter: default 10, clamped to `1..=100`, garbage ignored.
fn clamp_limit(raw: Option<&str>) -> u32 {
    raw.and_then(|l| l.trim().parse::<i64>().ok())
        .map(|l| l.clamp(1, MAX_FEED_LIMIT as i64) as u32)
        .unwrap_or(DEFAULT_FEED_LIMIT)
}

fn bad_json(rejection: JsonRejection) -> ServerError {
    ServerError::BadRequest(rejection.body_text())
}

fn read_error(what: &str, e: StoreError) -> ServerError {
    match e {
        StoreError::NotFound => ServerError::NotFound(what.to_string()),
        other => ServerError::Internal(format!("Failed to load {what}: {other}")),
    }
}

fn verify_admin_token(headers: &HeaderMap, config: &ServerConfig) -> Result<(), ServerError> {
    let Some(ref expected) = config.admin_token else {
        return Err(ServerError::Forbidden(
            "Admin API is disabled (no ADMIN_TOKEN configured)".into(),
        ));
    };

    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or(auth);

    use subtle::ConstantTimeEq;
    let token_bytes = token.as_bytes();
    let expected_bytes = expected.as_bytes();
    if token_bytes.len() != expected_bytes.len()
        || token_bytes.ct_eq(expected_bytes).unwrap_u8() != 1
    {
        return Err(ServerError::Forbidden("Invalid admin token".into()));
    }

    Ok(())
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::reward::fake::FakeLedger;

    const ADMIN: &str = "admin-secret";
    const PROMPT: &str = "A beautiful sunset over mountains with flying cars";

    struct TestApp {
        router: Router,
        db: Arc<Mutex<Database>>,
        ledger: Arc<FakeLedger>,
        _media_dir: TempDir,
    }

    async fn test_app(fake: FakeLedger) -> TestApp {
        let db = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let media_dir = TempDir::new().unwrap();
        let media = MediaStore::new(
            media_dir.path().to_path_buf(),
            "https://cdn.example/media",
            1024,
        )
        .await
        .unwrap();
        let fake = Arc::new(fake);

        let config = ServerConfig {
            admin_token: Some(ADMIN.to_string()),
            ..ServerConfig::default()
        };

        let state = AppState {
            db: db.clone(),
            ledger: Arc::new(GuessLedger::new(db.clone())),
            dispatcher: RewardDispatcher::new(fake.clone(), Duration::from_secs(5)),
            media: Arc::new(media),
            rate_limiter: RateLimiter::new(100.0, 100.0),
            guess_limiter: RateLimiter::new(1.0, 5.0),
            config: Arc::new(config),
        };

        TestApp {
            router: build_router(state),
            db,
            ledger: fake,
            _media_dir: media_dir,
        }
    }

    async fn seed_challenge(app: &TestApp, media_type: MediaType, difficulty: Difficulty) -> String {
        let challenge = Challenge::new(
            "https://cdn.example/media/x.png",
            media_type,
            PROMPT,
            difficulty,
            None,
        );
        app.db.lock().await.insert_challenge(&challenge).unwrap();
        challenge.id.to_string()
    }

    async fn send(app: &TestApp, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn guess_body(challenge_id: &str, wallet: &str, guess: &str) -> Value {
        json!({
            "challengeId": challenge_id,
            "walletId": wallet,
            "guessText": guess,
            "referencePrompt": PROMPT,
        })
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app(FakeLedger::with_reward(100)).await;
        let (status, body) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_correct_guess_mints_reward() {
        let app = test_app(FakeLedger::with_reward(100_000_000_000)).await;
        let cid = seed_challenge(&app, MediaType::Image, Difficulty::Medium).await;

        let (status, body) = send(
            &app,
            post_json("/guesses", guess_body(&cid, "wallet-1", "sunset over mountains"), None),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["isCorrect"], true);
        assert_eq!(body["similarityScore"], 80.0);
        assert_eq!(body["tokensEarned"], 100);
        assert_eq!(body["userStats"]["totalGuesses"], 1);
        assert_eq!(body["minting"]["success"], true);
        assert_eq!(body["minting"]["amount"], 100_000_000_000u64);
        assert_eq!(body["minting"]["requestedAmount"], 100);
        assert_eq!(app.ledger.minted_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_mint_still_records_guess() {
        let fake = FakeLedger {
            fail_mint: Some("custom program error: 0x1".into()),
            ..FakeLedger::with_reward(100)
        };
        let app = test_app(fake).await;
        let cid = seed_challenge(&app, MediaType::Image, Difficulty::Medium).await;

        let (status, body) = send(
            &app,
            post_json("/guesses", guess_body(&cid, "wallet-1", "sunset over mountains"), None),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isCorrect"], true);
        assert_eq!(body["minting"]["error"], "Minting failed");
        assert!(body["minting"]["details"]["hint"].is_string());

        let id = Uuid::parse_str(body["guess"]["id"].as_str().unwrap()).unwrap();
        let stored = app.db.lock().await.get_guess(id).unwrap();
        assert!(stored.is_correct);
    }

    #[tokio::test]
    async fn test_unreadable_stats_do_not_fail_a_recorded_guess() {
        let app = test_app(FakeLedger::with_reward(100)).await;
        let cid = seed_challenge(&app, MediaType::Image, Difficulty::Medium).await;
        app.db
            .lock()
            .await
            .conn()
            .execute(
                "INSERT INTO users (wallet_id, created_at, updated_at)
                 VALUES ('wallet-1', 'garbage', 'garbage')",
                [],
            )
            .unwrap();

        let (status, body) = send(
            &app,
            post_json("/guesses", guess_body(&cid, "wallet-1", "sunset over mountains"), None),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isCorrect"], true);
        assert!(body["userStats"].is_null());
        assert_eq!(body["minting"]["success"], true);
        assert_eq!(app.ledger.minted_count(), 1);

        let id = Uuid::parse_str(body["guess"]["id"].as_str().unwrap()).unwrap();
        assert!(app.db.lock().await.get_guess(id).unwrap().is_correct);
    }

    #[tokio::test]
    async fn test_incorrect_guess_skips_minting() {
        let app = test_app(FakeLedger::with_reward(100)).await;
        let cid = seed_challenge(&app, MediaType::Image, Difficulty::Medium).await;

        let (status, body) = send(
            &app,
            post_json("/guesses", guess_body(&cid, "wallet-1", "a bowl of fruit"), None),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isCorrect"], false);
        assert_eq!(body["tokensEarned"], 0);
        assert!(body["minting"].is_null());
        assert_eq!(app.ledger.minted_count(), 0);
    }

    #[tokio::test]
    async fn test_legacy_field_aliases_accepted() {
        let app = test_app(FakeLedger::with_reward(100)).await;
        let cid = seed_challenge(&app, MediaType::Image, Difficulty::Medium).await;

        let body = json!({
            "imageId": cid,
            "walletId": "wallet-1",
            "guessText": PROMPT,
            "actualPrompt": PROMPT,
        });
        let (status, body) = send(&app, post_json("/guesses", body, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["similarityScore"], 100.0);
    }

    #[tokio::test]
    async fn test_missing_guess_field_is_400() {
        let app = test_app(FakeLedger::with_reward(100)).await;
        let cid = seed_challenge(&app, MediaType::Image, Difficulty::Medium).await;

        let body = json!({ "challengeId": cid, "walletId": "wallet-1", "referencePrompt": PROMPT });
        let (status, body) = send(&app, post_json("/guesses", body, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required field: guessText");

        let (status, _) = send(
            &app,
            Request::builder()
                .method("POST")
                .uri("/guesses")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_challenge_is_500_with_details() {
        let app = test_app(FakeLedger::with_reward(100)).await;
        let body = guess_body(&ChallengeId::new().to_string(), "wallet-1", "anything");
        let (status, body) = send(&app, post_json("/guesses", body, None)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to save guess");
        assert!(body["details"].is_string());
    }

    #[tokio::test]
    async fn test_guess_rate_limit_per_wallet() {
        let app = test_app(FakeLedger::with_reward(100)).await;
        let cid = seed_challenge(&app, MediaType::Image, Difficulty::Medium).await;

        for _ in 0..5 {
            let (status, _) =
                send(&app, post_json("/guesses", guess_body(&cid, "spammer", "a dog"), None)).await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, _) =
            send(&app, post_json("/guesses", guess_body(&cid, "spammer", "a dog"), None)).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

        let (status, _) =
            send(&app, post_json("/guesses", guess_body(&cid, "someone-else", "a dog"), None))
                .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_feed_filters_and_limit() {
        let app = test_app(FakeLedger::with_reward(100)).await;
        seed_challenge(&app, MediaType::Image, Difficulty::Easy).await;
        seed_challenge(&app, MediaType::Video, Difficulty::Hard).await;

        let (_, body) = send(&app, get("/challenges?type=video")).await;
        let items = body["challenges"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["mediaType"], "video");

        let (_, body) = send(&app, get("/challenges?type=hologram&difficulty=easy")).await;
        let items = body["challenges"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["difficulty"], "easy");

        let (_, body) = send(&app, get("/challenges?limit=0")).await;
        assert_eq!(body["challenges"].as_array().unwrap().len(), 1);

        let (_, body) = send(&app, get("/challenges?limit=abc")).await;
        assert_eq!(body["challenges"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_create_and_retire_challenge() {
        let app = test_app(FakeLedger::with_reward(100)).await;
        let req = json!({ "mediaUrl": "https://cdn.example/media/a.png", "prompt": "a red fox" });

        let (status, _) = send(&app, post_json("/challenges", req.clone(), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&app, post_json("/challenges", req.clone(), Some("wrong"))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(&app, post_json("/challenges", req, Some(ADMIN))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["challenge"]["mediaType"], "image");
        assert_eq!(body["challenge"]["difficulty"], "medium");
        let id = body["challenge"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, get(&format!("/challenges/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["challenge"]["prompt"], "a red fox");

        let retire = Request::builder()
            .method("DELETE")
            .uri(format!("/challenges/{id}"))
            .header(header::AUTHORIZATION, format!("Bearer {ADMIN}"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, retire).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&app, get("/challenges")).await;
        assert!(body["challenges"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_challenge_rejects_bad_difficulty() {
        let app = test_app(FakeLedger::with_reward(100)).await;
        let req = json!({
            "mediaUrl": "https://cdn.example/media/a.png",
            "prompt": "a red fox",
            "difficulty": "impossible",
        });
        let (status, _) = send(&app, post_json("/challenges", req, Some(ADMIN))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_challenge_and_user_are_404() {
        let app = test_app(FakeLedger::with_reward(100)).await;
        let (status, _) = send(&app, get(&format!("/challenges/{}", ChallengeId::new()))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, get("/users/nobody/stats")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stats_and_leaderboard() {
        let app = test_app(FakeLedger::with_reward(100)).await;
        let cid = seed_challenge(&app, MediaType::Image, Difficulty::Medium).await;

        for (wallet, guess) in [
            ("alice", "sunset over mountains"),
            ("alice", "a dog"),
            ("bob", "a dog"),
        ] {
            send(&app, post_json("/guesses", guess_body(&cid, wallet, guess), None)).await;
        }

        let (status, body) = send(&app, get("/users/alice/stats")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["userStats"]["totalGuesses"], 2);
        assert_eq!(body["userStats"]["correctGuesses"], 1);
        assert_eq!(body["userStats"]["totalTokensEarned"], 100);

        let (_, body) = send(&app, get("/users/alice/guesses?limit=1")).await;
        assert_eq!(body["guesses"].as_array().unwrap().len(), 1);

        let (_, body) = send(&app, get("/leaderboard")).await;
        let board = body["leaderboard"].as_array().unwrap();
        assert_eq!(board.len(), 2);
        assert_eq!(board[0]["walletId"], "alice");
        assert_eq!(board[0]["accuracy"], 50.0);
        assert_eq!(board[1]["walletId"], "bob");
    }

    fn upload(filename: &str, content_type: &str, data: &str) -> Request<Body> {
        let boundary = "dgenboundary";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n{data}\r\n--{boundary}--\r\n"
        );
        Request::builder()
            .method("POST")
            .uri("/media/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .header(header::AUTHORIZATION, format!("Bearer {ADMIN}"))
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_media_upload_and_collision() {
        let app = test_app(FakeLedger::with_reward(100)).await;

        let (status, body) = send(&app, upload("fox.png", "image/png", "first")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["url"], "https://cdn.example/media/fox.png");
        assert_eq!(body["size"], 5);

        let (status, _) = send(&app, upload("fox.png", "image/png", "second")).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let resp = app.router.clone().oneshot(get("/media/fox.png")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/png");
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"first");

        let (status, _) = send(&app, upload("notes.txt", "text/plain", "hi")).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_direct_mint() {
        let app = test_app(FakeLedger::with_reward(7)).await;

        let req = json!({ "recipientWallet": "wallet-9", "amount": 100 });
        let (status, _) = send(&app, post_json("/rewards/mint", req.clone(), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(&app, post_json("/rewards/mint", req, Some(ADMIN))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["amount"], 7);
        assert_eq!(body["recipient"], "wallet-9");

        let (status, body) = send(
            &app,
            post_json("/rewards/mint", json!({ "recipientWallet": "wallet-9" }), Some(ADMIN)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required field: amount");
    }

    #[tokio::test]
    async fn test_direct_mint_failure_is_500() {
        let fake = FakeLedger {
            fail_mint: Some("Assertion failed".into()),
            ..FakeLedger::with_reward(7)
        };
        let app = test_app(fake).await;
        let req = json!({ "recipientWallet": "wallet-9", "amount": 100 });
        let (status, body) = send(&app, post_json("/rewards/mint", req, Some(ADMIN))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to mint tokens");
        assert_eq!(body["details"]["code"], -32002);
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), 10);
        assert_eq!(clamp_limit(Some("0")), 1);
        assert_eq!(clamp_limit(Some("-5")), 1);
        assert_eq!(clamp_limit(Some("500")), 100);
        assert_eq!(clamp_limit(Some("25")), 25);
        assert_eq!(clamp_limit(Some("ten")), 10);
    }
}
