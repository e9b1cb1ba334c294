//! HTTP API gateway for hrcounsel.
//!
//! Exposes `POST /ask` (one conversation turn) and `GET /health`.
//!
//! Layers applied to every route:
//! - CORS allow-list from `[gateway].cors_origins`
//! - Request body size limit
//! - In-memory rate limiting per bearer credential (`/health` exempt)
//! - HTTP trace logging
//!
//! Built on Axum.

pub mod wiring;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use hrcounsel_assistant::{AskRequest, AskResponse, ConversationSession};
use hrcounsel_config::{AppConfig, GatewayConfig};
use hrcounsel_core::AssistantError;

pub use wiring::{build_services, Services, Stores};

/// Shared application state for the gateway.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<ConversationSession>,
}

/// Build the Axum router with all gateway routes and layers.
pub fn build_router(state: AppState, gateway: &GatewayConfig) -> Router {
    let rate_limiter = Arc::new(RateLimiter::new(
        gateway.rate_limit_per_minute as usize,
        Duration::from_secs(60),
    ));

    Router::new()
        .route("/health", get(health_handler))
        .route("/ask", post(ask_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(gateway.body_limit_bytes))
        .layer(middleware::from_fn(move |req, next| {
            let limiter = rate_limiter.clone();
            rate_limit_middleware(limiter, req, next)
        }))
        .layer(cors_layer(&gateway.cors_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Only the configured origins are allowed; none by default.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(3600))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let services = build_services(&config).await?;
    let state = AppState {
        session: services.session,
    };
    let app = build_router(state, &config.gateway);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Rate Limiter ---

/// Simple in-memory sliding-window rate limiter.
///
/// Tracks request timestamps per client key (the bearer credential).
/// Thread-safe via `std::sync::Mutex` (non-async, held briefly).
struct RateLimiter {
    max_requests: usize,
    window: Duration,
    clients: std::sync::Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Record a request for `client_key`. Returns `true` if allowed.
    fn check(&self, client_key: &str) -> bool {
        let now = Instant::now();
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());

        // Evict idle clients once the table gets large
        if clients.len() > 10_000 {
            clients.retain(|_, timestamps| {
                timestamps
                    .last()
                    .is_some_and(|t| now.duration_since(*t) < self.window)
            });
        }

        let timestamps = clients.entry(client_key.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() >= self.max_requests {
            return false;
        }

        timestamps.push(now);
        true
    }
}

/// Returns 429 once a credential exceeds its budget. `/health` is exempt.
async fn rate_limit_middleware(limiter: Arc<RateLimiter>, req: axum::extract::Request, next: Next) -> Response {
    if req.uri().path() == "/health" {
        return next.run(req).await;
    }

    let client_key = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .unwrap_or("anonymous")
        .to_string();

    if !limiter.check(&client_key) {
        warn!(client = %client_key.chars().take(20).collect::<String>(), "Rate limit exceeded");
        return error_response(StatusCode::TOO_MANY_REQUESTS, "Too many requests", "RATE_LIMITED");
    }

    next.run(req).await
}

// --- Errors ---

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

fn error_response(status: StatusCode, error: impl Into<String>, code: &'static str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code,
        }),
    )
        .into_response()
}

/// A failed `/ask`, rendered as `{error, code}`.
#[derive(Debug)]
enum ApiError {
    Turn(AssistantError),
    Body(JsonRejection),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Turn(e) => match &e {
                AssistantError::InvalidInput(message) => {
                    error_response(StatusCode::BAD_REQUEST, message.clone(), e.code())
                }
                AssistantError::Unauthenticated(_) => {
                    error_response(StatusCode::UNAUTHORIZED, "Unauthorized", e.code())
                }
                _ => error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", e.code()),
            },
            ApiError::Body(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                error_response(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large", "PAYLOAD_TOO_LARGE")
            }
            ApiError::Body(rejection) => {
                error_response(StatusCode::BAD_REQUEST, rejection.body_text(), "INVALID_INPUT")
            }
        }
    }
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Extract the token from an `Authorization` value; the scheme name is case-insensitive.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim_start();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

async fn ask_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, ApiError> {
    let Json(request) = payload.map_err(ApiError::Body)?;

    let credential = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token);

    state
        .session
        .ask(credential, request)
        .await
        .map(Json)
        .map_err(ApiError::Turn)
}
