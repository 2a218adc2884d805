use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use axum::extract::{Path, State as AxumState};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time;
use tracing::{info, warn};

use toto_engine::{Engine, EngineConfig, EngineError, TtlCache, WebhookOutcome};
use toto_gateway::shkeeper::API_KEY_HEADER;
use toto_gateway::{
    approve_withdrawal_flow, process_notification, request_deposit, verify_webhook_secret,
    ShkeeperClient,
};
use toto_types::{
    DepositId, GamePool, MatchOutcome, MatchPick, PoolId, PoolMatch, UserId, WithdrawalId,
};

#[derive(Clone, Debug)]
struct ApiConfig {
    host: String,
    port: u16,
    shkeeper_base_url: String,
    shkeeper_api_key: String,
    webhook_secret: String,
    callback_url: String,
    sweep_interval_secs: u64,
    cache_evict_interval_secs: u64,
    pools_cache_ttl_ms: u64,
}

impl ApiConfig {
    fn from_env() -> Self {
        Self {
            host: read_string("TOTO_HOST", "0.0.0.0"),
            port: read_u16("TOTO_PORT", 8080),
            shkeeper_base_url: read_string("SHKEEPER_BASE_URL", "http://localhost:5000/"),
            shkeeper_api_key: read_string("SHKEEPER_API_KEY", ""),
            webhook_secret: read_string("TOTO_WEBHOOK_SECRET", ""),
            callback_url: read_string(
                "TOTO_CALLBACK_URL",
                "http://localhost:8080/webhooks/shkeeper",
            ),
            sweep_interval_secs: read_u64("TOTO_SWEEP_INTERVAL_SECS", 300),
            cache_evict_interval_secs: read_u64("TOTO_CACHE_EVICT_INTERVAL_SECS", 1_800),
            pools_cache_ttl_ms: read_u64("TOTO_POOLS_CACHE_TTL_MS", 10_000),
        }
    }
}

fn read_string(key: &str, fallback: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| fallback.to_string())
}

fn read_u16(key: &str, fallback: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u16>().ok())
        .unwrap_or(fallback)
}

fn read_u64(key: &str, fallback: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(fallback)
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Clone)]
struct AppState {
    engine: Arc<Mutex<Engine>>,
    provider: Arc<ShkeeperClient>,
    pools_cache: Arc<std::sync::Mutex<TtlCache<&'static str, Vec<PoolSummary>>>>,
    webhook_secret: Arc<String>,
    callback_url: Arc<String>,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let status = match &err {
            EngineError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::Conflict { .. } => StatusCode::CONFLICT,
            EngineError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
            EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<toto_gateway::Error> for ApiError {
    fn from(err: toto_gateway::Error) -> Self {
        match err {
            toto_gateway::Error::Engine(inner) => inner.into(),
            toto_gateway::Error::InvalidNotification(message) => Self {
                status: StatusCode::BAD_REQUEST,
                message,
            },
            toto_gateway::Error::Provider { .. } | toto_gateway::Error::Reqwest(_) => Self {
                status: StatusCode::BAD_GATEWAY,
                message: err.to_string(),
            },
            toto_gateway::Error::Url(_) => ApiError::internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Deserialize)]
struct CreateUserRequest {
    name: String,
    referrer: Option<UserId>,
}

#[derive(Serialize)]
struct IdResponse<T: Serialize> {
    id: T,
}

#[derive(Deserialize)]
struct MatchInput {
    home: String,
    away: String,
    #[serde(rename = "kickoffMs")]
    kickoff_ms: u64,
}

#[derive(Deserialize)]
struct CreatePoolRequest {
    name: String,
    #[serde(rename = "deadlineMs")]
    deadline_ms: u64,
    matches: Vec<MatchInput>,
}

#[derive(Deserialize)]
struct ResultInput {
    #[serde(rename = "matchIndex")]
    match_index: usize,
    /// "1", "X" or "2"; omitted when `cancelled` is set.
    outcome: Option<String>,
    #[serde(default)]
    cancelled: bool,
}

#[derive(Deserialize)]
struct SubmitResultsRequest {
    results: Vec<ResultInput>,
}

#[derive(Deserialize)]
struct PickInput {
    #[serde(rename = "matchIndex")]
    match_index: usize,
    chosen: Vec<String>,
}

#[derive(Deserialize)]
struct SubmitPredictionRequest {
    #[serde(rename = "userId")]
    user_id: UserId,
    picks: Vec<PickInput>,
}

#[derive(Deserialize)]
struct ClaimRequest {
    #[serde(rename = "userId")]
    user_id: UserId,
}

#[derive(Deserialize)]
struct DepositRequest {
    #[serde(rename = "userId")]
    user_id: UserId,
    currency: String,
    network: String,
    amount: u64,
}

#[derive(Deserialize)]
struct WithdrawalRequestBody {
    #[serde(rename = "userId")]
    user_id: UserId,
    amount: u64,
    #[serde(rename = "walletAddress")]
    wallet_address: String,
    network: String,
}

#[derive(Deserialize)]
struct AdminActionRequest {
    admin: String,
}

#[derive(Deserialize)]
struct ManualConfirmRequest {
    admin: String,
    amount: u64,
}

#[derive(Clone, Serialize)]
struct PoolSummary {
    id: PoolId,
    name: String,
    status: &'static str,
    #[serde(rename = "deadlineMs")]
    deadline_ms: u64,
    #[serde(rename = "totalPot")]
    total_pot: u64,
    #[serde(rename = "prizePool")]
    prize_pool: u64,
}

impl From<&GamePool> for PoolSummary {
    fn from(pool: &GamePool) -> Self {
        Self {
            id: pool.id,
            name: pool.name.clone(),
            status: pool.status.as_str(),
            deadline_ms: pool.deadline_ms,
            total_pot: pool.total_pot,
            prize_pool: pool.prize_pool,
        }
    }
}

fn parse_outcome(raw: &str) -> ApiResult<MatchOutcome> {
    match raw {
        "1" => Ok(MatchOutcome::Home),
        "X" | "x" => Ok(MatchOutcome::Draw),
        "2" => Ok(MatchOutcome::Away),
        other => Err(ApiError {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: format!("unknown outcome {other:?} (expected 1, X or 2)"),
        }),
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn create_user(
    AxumState(state): AxumState<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> ApiResult<Json<IdResponse<UserId>>> {
    let id = state
        .engine
        .lock()
        .await
        .create_user(request.name, request.referrer)?;
    Ok(Json(IdResponse { id }))
}

async fn create_pool(
    AxumState(state): AxumState<AppState>,
    Json(request): Json<CreatePoolRequest>,
) -> ApiResult<Json<IdResponse<PoolId>>> {
    let matches = request
        .matches
        .into_iter()
        .map(|input| PoolMatch::new(input.home, input.away, input.kickoff_ms))
        .collect();
    let id = state
        .engine
        .lock()
        .await
        .create_pool(request.name, request.deadline_ms, matches)?;
    state.pools_cache.lock().unwrap().clear();
    Ok(Json(IdResponse { id }))
}

async fn list_pools(AxumState(state): AxumState<AppState>) -> Json<Vec<PoolSummary>> {
    let now = now_ms();
    if let Some(cached) = state.pools_cache.lock().unwrap().get(&"pools", now) {
        return Json(cached.clone());
    }
    let summaries: Vec<PoolSummary> = state
        .engine
        .lock()
        .await
        .pools()
        .into_iter()
        .map(PoolSummary::from)
        .collect();
    state
        .pools_cache
        .lock()
        .unwrap()
        .insert("pools", summaries.clone(), now);
    Json(summaries)
}

async fn submit_results(
    AxumState(state): AxumState<AppState>,
    Path(pool): Path<PoolId>,
    Json(request): Json<SubmitResultsRequest>,
) -> ApiResult<Json<toto_engine::ResultsOutcome>> {
    let mut updates = Vec::with_capacity(request.results.len());
    for input in request.results {
        let update = if input.cancelled {
            toto_engine::ResultUpdate::Cancel
        } else {
            let raw = input.outcome.as_deref().ok_or(ApiError {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                message: "result needs an outcome or cancelled=true".to_string(),
            })?;
            toto_engine::ResultUpdate::Outcome(parse_outcome(raw)?)
        };
        updates.push(toto_engine::MatchResultUpdate {
            match_index: input.match_index,
            update,
        });
    }
    let outcome = state.engine.lock().await.submit_results(&pool, updates)?;
    state.pools_cache.lock().unwrap().clear();
    Ok(Json(outcome))
}

async fn close_pool(
    AxumState(state): AxumState<AppState>,
    Path(pool): Path<PoolId>,
) -> ApiResult<StatusCode> {
    state.engine.lock().await.close_pool(&pool, now_ms())?;
    state.pools_cache.lock().unwrap().clear();
    Ok(StatusCode::NO_CONTENT)
}

async fn cancel_pool(
    AxumState(state): AxumState<AppState>,
    Path(pool): Path<PoolId>,
) -> ApiResult<Json<toto_engine::CancelOutcome>> {
    let outcome = state.engine.lock().await.cancel_pool(&pool, now_ms())?;
    state.pools_cache.lock().unwrap().clear();
    Ok(Json(outcome))
}

async fn settle_pool(
    AxumState(state): AxumState<AppState>,
    Path(pool): Path<PoolId>,
) -> ApiResult<Json<toto_engine::SettlementOutcome>> {
    let outcome = state.engine.lock().await.settle_pool(&pool, now_ms())?;
    state.pools_cache.lock().unwrap().clear();
    Ok(Json(outcome))
}

async fn submit_prediction(
    AxumState(state): AxumState<AppState>,
    Path(pool): Path<PoolId>,
    Json(request): Json<SubmitPredictionRequest>,
) -> ApiResult<Json<IdResponse<toto_types::PredictionId>>> {
    let mut picks = Vec::with_capacity(request.picks.len());
    for input in request.picks {
        let mut chosen = Vec::with_capacity(input.chosen.len());
        for raw in &input.chosen {
            chosen.push(parse_outcome(raw)?);
        }
        picks.push(MatchPick {
            match_index: input.match_index,
            chosen,
        });
    }
    let id = state
        .engine
        .lock()
        .await
        .submit_prediction(&request.user_id, &pool, picks, now_ms())?;
    Ok(Json(IdResponse { id }))
}

async fn claim_prize(
    AxumState(state): AxumState<AppState>,
    Path(pool): Path<PoolId>,
    Json(request): Json<ClaimRequest>,
) -> ApiResult<Json<toto_engine::ClaimOutcome>> {
    let outcome = state
        .engine
        .lock()
        .await
        .claim_prize(&request.user_id, &pool)?;
    Ok(Json(outcome))
}

async fn create_deposit(
    AxumState(state): AxumState<AppState>,
    Json(request): Json<DepositRequest>,
) -> ApiResult<Json<toto_gateway::DepositCreated>> {
    let created = request_deposit(
        &state.engine,
        state.provider.as_ref(),
        state.callback_url.as_str(),
        &request.user_id,
        request.currency,
        request.network,
        request.amount,
        now_ms(),
    )
    .await?;
    Ok(Json(created))
}

async fn create_withdrawal(
    AxumState(state): AxumState<AppState>,
    Json(request): Json<WithdrawalRequestBody>,
) -> ApiResult<Json<IdResponse<WithdrawalId>>> {
    let id = state.engine.lock().await.request_withdrawal(
        &request.user_id,
        request.amount,
        request.wallet_address,
        request.network,
        now_ms(),
    )?;
    Ok(Json(IdResponse { id }))
}

async fn approve_withdrawal(
    AxumState(state): AxumState<AppState>,
    Path(id): Path<WithdrawalId>,
    Json(request): Json<AdminActionRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let task_id = approve_withdrawal_flow(
        &state.engine,
        state.provider.as_ref(),
        &id,
        &request.admin,
        now_ms(),
    )
    .await?;
    Ok(Json(serde_json::json!({ "taskId": task_id })))
}

async fn reject_withdrawal(
    AxumState(state): AxumState<AppState>,
    Path(id): Path<WithdrawalId>,
    Json(request): Json<AdminActionRequest>,
) -> ApiResult<StatusCode> {
    state
        .engine
        .lock()
        .await
        .reject_withdrawal(&id, &request.admin, now_ms())?;
    Ok(StatusCode::NO_CONTENT)
}

async fn confirm_deposit(
    AxumState(state): AxumState<AppState>,
    Path(id): Path<DepositId>,
    Json(request): Json<ManualConfirmRequest>,
) -> ApiResult<Json<WebhookOutcome>> {
    let outcome = state.engine.lock().await.confirm_deposit_manual(
        &id,
        request.amount,
        &request.admin,
        now_ms(),
    )?;
    Ok(Json(outcome))
}

async fn reject_deposit(
    AxumState(state): AxumState<AppState>,
    Path(id): Path<DepositId>,
    Json(request): Json<AdminActionRequest>,
) -> ApiResult<StatusCode> {
    state
        .engine
        .lock()
        .await
        .reject_deposit_manual(&id, &request.admin)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Webhook consumer. Every handled branch — including redeliveries — returns
/// 2xx so the provider stops retrying; unexpected failures fall through to
/// the error mapping and become retryable server errors.
async fn shkeeper_webhook(
    AxumState(state): AxumState<AppState>,
    headers: HeaderMap,
    Json(notification): Json<toto_gateway::PaymentNotification>,
) -> ApiResult<Json<serde_json::Value>> {
    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    if !verify_webhook_secret(provided, state.webhook_secret.as_str()) {
        return Err(ApiError {
            status: StatusCode::UNAUTHORIZED,
            message: "invalid webhook secret".to_string(),
        });
    }

    let outcome = process_notification(&state.engine, &notification, now_ms()).await?;
    Ok(Json(serde_json::json!({ "outcome": outcome })))
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/users", post(create_user))
        .route("/pools", get(list_pools))
        .route("/pools/:id/predictions", post(submit_prediction))
        .route("/pools/:id/claim", post(claim_prize))
        .route("/deposits", post(create_deposit))
        .route("/withdrawals", post(create_withdrawal))
        .route("/admin/pools", post(create_pool))
        .route("/admin/pools/:id/results", post(submit_results))
        .route("/admin/pools/:id/close", post(close_pool))
        .route("/admin/pools/:id/cancel", post(cancel_pool))
        .route("/admin/pools/:id/settle", post(settle_pool))
        .route("/admin/withdrawals/:id/approve", post(approve_withdrawal))
        .route("/admin/withdrawals/:id/reject", post(reject_withdrawal))
        .route("/admin/deposits/:id/confirm", post(confirm_deposit))
        .route("/admin/deposits/:id/reject", post(reject_deposit))
        .route("/webhooks/shkeeper", post(shkeeper_webhook))
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = ApiConfig::from_env();
    let engine_config = EngineConfig::default();
    engine_config
        .validate()
        .map_err(|err| anyhow::anyhow!("invalid engine config: {err}"))?;

    let engine = Arc::new(Mutex::new(Engine::new(engine_config)));
    let provider = Arc::new(
        ShkeeperClient::new(
            &config.shkeeper_base_url,
            config.shkeeper_api_key.clone(),
            config.callback_url.clone(),
        )
        .context("invalid SHKEEPER_BASE_URL")?,
    );
    let pools_cache = Arc::new(std::sync::Mutex::new(TtlCache::new(
        config.pools_cache_ttl_ms,
    )));

    let state = AppState {
        engine: engine.clone(),
        provider,
        pools_cache: pools_cache.clone(),
        webhook_secret: Arc::new(config.webhook_secret.clone()),
        callback_url: Arc::new(config.callback_url.clone()),
    };

    // Pool closure sweep
    let sweep_engine = engine.clone();
    let sweep_interval = config.sweep_interval_secs;
    tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_secs(sweep_interval));
        loop {
            interval.tick().await;
            let report = sweep_engine.lock().await.close_due_pools(now_ms());
            if !report.closed.is_empty() || !report.failed.is_empty() {
                info!(
                    closed = report.closed.len(),
                    failed = report.failed.len(),
                    "pool closure sweep"
                );
            }
        }
    });

    // Cache eviction
    let evict_interval = config.cache_evict_interval_secs;
    tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_secs(evict_interval));
        loop {
            interval.tick().await;
            let evicted = pools_cache.lock().unwrap().evict_expired(now_ms());
            if evicted > 0 {
                info!(evicted, "cache eviction sweep");
            }
        }
    });

    let app = router(state);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid listen addr")?;
    info!(%addr, "toto api listening");

    if config.webhook_secret.is_empty() {
        warn!("TOTO_WEBHOOK_SECRET is empty; webhook authentication will reject all deliveries");
    }

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
