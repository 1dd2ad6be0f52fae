//! In-memory coin shop used as the target of load runs and end-to-end tests.
use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequestParts, Path, Request, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use lazy_static::lazy_static;
#[allow(unused)]
use metrics::{counter, gauge, histogram};
use rand::{distributions::Alphanumeric, Rng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard,
};
use std::time::Duration;
use tower_http::trace::TraceLayer;
#[allow(unused)]
use tracing::{debug, error, info, warn};

/// Coins every newly registered user starts with.
pub const STARTING_COINS: i64 = 1000;

const TOKEN_LEN: usize = 32;
const MAX_USERNAME_LEN: usize = 32;

lazy_static! {
    /// Merch on sale and its price in coins.
    pub static ref CATALOG: HashMap<&'static str, i64> = HashMap::from([
        ("t-shirt", 80),
        ("cup", 20),
        ("book", 50),
        ("pen", 10),
        ("powerbank", 200),
        ("hoody", 300),
        ("umbrella", 200),
        ("socks", 10),
        ("wallet", 50),
        ("pink-hoody", 500),
    ]);
}

/// Faults injected into every request.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    /// Fixed latency added before handling.
    pub delay: Duration,
    /// Standard deviation of normally distributed latency added on top of `delay`.
    pub jitter: Duration,
    /// Requests beyond this rate are answered with `500`.
    pub max_tps: Option<NonZeroU32>,
}

pub fn router(config: ServiceConfig) -> Router {
    let state = Arc::new(ShopState::new(config));

    Router::new()
        .route("/api/auth", post(auth))
        .route("/api/sendCoin", post(send_coin))
        .route("/api/info", get(info))
        .route("/api/buy/:item", get(buy))
        .layer(middleware::from_fn_with_state(state.clone(), inject_faults))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(addr: SocketAddr, config: ServiceConfig) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, router(config)).await?;
    Ok(())
}

/// Serve on an ephemeral localhost port in the background, returning the bound address.
pub async fn spawn(config: ServiceConfig) -> anyhow::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router(config)).await {
            error!("Mock service stopped: {err}");
        }
    });
    Ok(addr)
}

/** State **/

pub struct ShopState {
    ledger: Mutex<Ledger>,
    limiter: Option<DefaultDirectRateLimiter>,
    config: ServiceConfig,
}

impl ShopState {
    fn new(config: ServiceConfig) -> Self {
        Self {
            ledger: Mutex::new(Ledger::default()),
            limiter: config.max_tps.map(rate_limiter),
            config,
        }
    }

    fn ledger(&self) -> Result<MutexGuard<'_, Ledger>, ApiError> {
        self.ledger.lock().map_err(|_| {
            error!("Ledger lock poisoned");
            ApiError::Internal
        })
    }

    fn delay(&self) -> Duration {
        let ServiceConfig { delay, jitter, .. } = &self.config;
        if jitter.is_zero() {
            return *delay;
        }

        match Normal::new(delay.as_secs_f64(), jitter.as_secs_f64()) {
            Ok(normal) => Duration::from_secs_f64(normal.sample(&mut rand::thread_rng()).max(0.)),
            Err(_) => *delay,
        }
    }
}

#[derive(Debug, Default)]
struct Account {
    password: String,
    token: Option<String>,
    coins: i64,
    inventory: BTreeMap<String, i64>,
    received: Vec<CoinTransaction>,
    sent: Vec<CoinTransaction>,
}

/// Accounts and issued tokens.
#[derive(Debug, Default)]
pub struct Ledger {
    accounts: HashMap<String, Account>,
    tokens: HashMap<String, String>,
}

impl Ledger {
    /// Log in, registering unknown users. Each user keeps a single token across logins.
    pub fn auth(&mut self, username: &str, password: &str) -> Result<String, ApiError> {
        if username.is_empty() || password.is_empty() || username.len() >= MAX_USERNAME_LEN {
            return Err(ApiError::Unauthorized);
        }

        let account = self
            .accounts
            .entry(username.to_string())
            .or_insert_with(|| {
                debug!("Registered {username}");
                Account {
                    password: password.to_string(),
                    coins: STARTING_COINS,
                    ..Default::default()
                }
            });
        if account.password != password {
            return Err(ApiError::Unauthorized);
        }

        if let Some(token) = &account.token {
            return Ok(token.clone());
        }

        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();
        account.token = Some(token.clone());
        self.tokens.insert(token.clone(), username.to_string());
        Ok(token)
    }

    pub fn user_for_token(&self, token: &str) -> Option<&str> {
        self.tokens.get(token).map(String::as_str)
    }

    pub fn send_coin(&mut self, from: &str, to: &str, amount: i64) -> Result<(), ApiError> {
        if amount <= 0 || from == to || !self.accounts.contains_key(to) {
            return Err(ApiError::BadRequest);
        }

        let sender = self.accounts.get_mut(from).ok_or(ApiError::Unauthorized)?;
        if sender.coins < amount {
            return Err(ApiError::BadRequest);
        }
        sender.coins -= amount;
        sender.sent.push(CoinTransaction {
            user: to.to_string(),
            amount,
        });

        let recipient = self.accounts.get_mut(to).ok_or(ApiError::BadRequest)?;
        recipient.coins += amount;
        recipient.received.push(CoinTransaction {
            user: from.to_string(),
            amount,
        });
        Ok(())
    }

    pub fn buy(&mut self, username: &str, item: &str) -> Result<(), ApiError> {
        let (name, price) = CATALOG
            .get_key_value(item)
            .ok_or(ApiError::BadRequest)?;
        let account = self
            .accounts
            .get_mut(username)
            .ok_or(ApiError::Unauthorized)?;
        if account.coins < *price {
            return Err(ApiError::BadRequest);
        }

        account.coins -= price;
        *account.inventory.entry(name.to_string()).or_default() += 1;
        Ok(())
    }

    pub fn info(&self, username: &str) -> Result<InfoResponse, ApiError> {
        let account = self.accounts.get(username).ok_or(ApiError::Unauthorized)?;
        Ok(InfoResponse {
            coins: account.coins,
            inventory: non_empty(
                account
                    .inventory
                    .iter()
                    .map(|(kind, quantity)| Item {
                        kind: kind.clone(),
                        quantity: *quantity,
                    })
                    .collect(),
            ),
            coin_history: CoinHistory {
                received: non_empty(account.received.clone()),
                sent: non_empty(account.sent.clone()),
            },
        })
    }
}

// Empty lists go out as `null`.
fn non_empty<T>(list: Vec<T>) -> Option<Vec<T>> {
    (!list.is_empty()).then_some(list)
}

/** Wire types **/

#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendCoinRequest {
    pub to_user: String,
    pub amount: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub coins: i64,
    pub inventory: Option<Vec<Item>>,
    pub coin_history: CoinHistory,
}

#[derive(Debug, Serialize)]
pub struct Item {
    #[serde(rename = "type")]
    pub kind: String,
    pub quantity: i64,
}

#[derive(Debug, Serialize)]
pub struct CoinHistory {
    pub received: Option<Vec<CoinTransaction>>,
    pub sent: Option<Vec<CoinTransaction>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoinTransaction {
    pub user: String,
    pub amount: i64,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub errors: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiError {
    BadRequest,
    Unauthorized,
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, errors) = match self {
            ApiError::BadRequest => (StatusCode::BAD_REQUEST, "Bad request."),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized."),
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error."),
        };
        (status, Json(ErrorResponse { errors })).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!("Rejected body: {rejection}");
        ApiError::BadRequest
    }
}

/// Username behind the request's bearer token.
pub struct AuthUser(pub String);

#[async_trait]
impl FromRequestParts<Arc<ShopState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ShopState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(ApiError::BadRequest)?
            .to_str()
            .map_err(|_| ApiError::Unauthorized)?;
        let token = header.strip_prefix("Bearer ").unwrap_or(header);

        state
            .ledger()?
            .user_for_token(token)
            .map(|user| AuthUser(user.to_string()))
            .ok_or(ApiError::Unauthorized)
    }
}

/** Handlers **/

async fn auth(
    State(state): State<Arc<ShopState>>,
    body: Result<Json<AuthRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(req) = body?;
    let token = state.ledger()?.auth(&req.username, &req.password)?;
    Ok(Json(AuthResponse { token }))
}

async fn send_coin(
    State(state): State<Arc<ShopState>>,
    AuthUser(user): AuthUser,
    body: Result<Json<SendCoinRequest>, JsonRejection>,
) -> Result<(), ApiError> {
    let Json(req) = body?;
    state.ledger()?.send_coin(&user, &req.to_user, req.amount)
}

async fn info(
    State(state): State<Arc<ShopState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<InfoResponse>, ApiError> {
    state.ledger()?.info(&user).map(Json)
}

async fn buy(
    State(state): State<Arc<ShopState>>,
    AuthUser(user): AuthUser,
    Path(item): Path<String>,
) -> Result<(), ApiError> {
    state.ledger()?.buy(&user, &item)
}

async fn inject_faults(
    State(state): State<Arc<ShopState>>,
    request: Request,
    next: Next,
) -> Response {
    counter!("mock_service_requests").increment(1);
    TPS_MEASURE.fetch_add(1, Ordering::Relaxed);

    let delay = state.delay();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    if let Some(limiter) = &state.limiter {
        if limiter.check().is_err() {
            debug!("Over the TPS limit");
            return ApiError::Internal.into_response();
        }
    }

    next.run(request).await
}

/** Utils **/

pub fn rate_limiter(tps: NonZeroU32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(tps))
}

/** TPS Printer **/

static TPS_MEASURE: AtomicU64 = AtomicU64::new(0);

pub async fn tps_measure_task() {
    loop {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let transactions = TPS_MEASURE.swap(0, Ordering::Relaxed);
        println!("{transactions} TPS");
    }
}
