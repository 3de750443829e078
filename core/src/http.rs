use axum::{
    Json, Router,
    extract::{
        Request, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{
        HeaderMap, StatusCode,
        header::{ACCEPT, CONTENT_TYPE, LOCATION},
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::info;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use crate::auth::session;
use crate::config::SERVICE_VERSION;
use crate::error::ServiceError;
use crate::service::{TrackerService, health};

mod admission;
mod insights;
mod pages;
mod portfolio;

pub use admission::ConcurrencyLimit;

#[derive(Clone)]
pub struct AppState {
    pub service: TrackerService,
    pub metrics: PrometheusHandle,
}

pub fn router(service: TrackerService, metrics: PrometheusHandle) -> Router {
    let limit = ConcurrencyLimit::new(service.config().server_config.max_concurrent_requests);
    info!("admitting at most {} concurrent requests", limit.max());
    let state = AppState { service, metrics };

    Router::new()
        .route("/", get(get_root))
        .route("/health", get(get_health))
        .route("/ready", get(get_ready))
        .route("/metrics", get(get_metrics))
        .route("/login", get(pages::get_login_page))
        .route("/auth/login", post(pages::post_login))
        .route("/auth/logout", get(pages::get_logout))
        .route("/auth/status", get(pages::get_auth_status))
        .route("/portfolio/current", get(portfolio::get_current_portfolio))
        .route("/portfolio/history", get(portfolio::get_portfolio_history))
        .route("/portfolio/snapshot", post(portfolio::post_snapshot))
        .route(
            "/positions",
            get(portfolio::list_positions).post(portfolio::create_position),
        )
        .route(
            "/positions/{position_id}",
            get(portfolio::get_position).put(portfolio::update_position),
        )
        .route(
            "/positions/{position_id}/history",
            get(portfolio::get_position_history),
        )
        .route("/exposure/clusters", get(insights::get_cluster_exposure))
        .route("/catalysts/upcoming", get(insights::get_upcoming_catalysts))
        .route(
            "/alerts/positions-needing-attention",
            get(insights::get_positions_needing_attention),
        )
        .route("/alerts/review-status", get(insights::get_review_status))
        .route("/alerts/summary", get(insights::get_alert_summary))
        .route("/freshness/topics", get(insights::get_topic_freshness))
        .route(
            "/freshness/market/{market_slug}",
            get(insights::get_market_freshness),
        )
        .route("/freshness/decay-rates", get(insights::get_decay_rates))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(middleware::from_fn_with_state(limit, admission::admission_middleware))
        .with_state(state)
}

#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub(crate) fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "detail": self.message }));
        (self.status, body).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidParams(msg) => ApiError::new(StatusCode::BAD_REQUEST, msg),
            ServiceError::NotFound(msg) => ApiError::new(StatusCode::NOT_FOUND, msg),
            ServiceError::Unauthorized(msg) => ApiError::new(StatusCode::UNAUTHORIZED, msg),
            ServiceError::MarketData(e) => {
                log::error!("market data error: {e}");
                ApiError::new(StatusCode::BAD_GATEWAY, "market data unavailable")
            }
            ServiceError::Db(e) => {
                log::error!("database error: {e}");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
            ServiceError::Other(e) => {
                log::error!("internal error: {e:#}");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::new(rejection.status(), rejection.body_text())
    }
}

/// Rejects `value` outside `min..=max` with a 400 naming the parameter.
pub(crate) fn bounded(name: &str, value: i64, min: i64, max: Option<i64>) -> Result<i64, ApiError> {
    let too_small = value < min;
    let too_large = max.is_some_and(|max| value > max);
    if too_small || too_large {
        let range = match max {
            Some(max) => format!("between {min} and {max}"),
            None => format!("at least {min}"),
        };
        return Err(ApiError::bad_request(format!("{name} must be {range}")));
    }
    Ok(value)
}

pub(crate) fn redirect(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}

async fn auth_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let path = req.uri().path();
    if is_public_path(path) {
        return next.run(req).await;
    }

    let authenticated = session::token_from_headers(req.headers())
        .and_then(|token| state.service.session_user(token))
        .is_some();
    if authenticated {
        return next.run(req).await;
    }

    if wants_json(req.headers(), path) {
        ApiError::new(StatusCode::UNAUTHORIZED, "Not authenticated").into_response()
    } else {
        redirect("/login")
    }
}

fn is_public_path(path: &str) -> bool {
    if matches!(
        path,
        "/login" | "/auth/login" | "/auth/logout" | "/auth/status" | "/health" | "/ready" | "/metrics"
    ) {
        return true;
    }
    path.starts_with("/static/")
}

fn wants_json(headers: &HeaderMap, path: &str) -> bool {
    let accepts_json = headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"));
    accepts_json || path.starts_with("/api")
}

#[derive(Serialize)]
struct ServiceInfo {
    service: &'static str,
    version: &'static str,
    health: &'static str,
    metrics: &'static str,
}

async fn get_root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: "Polymarket Tracker",
        version: SERVICE_VERSION,
        health: "/health",
        metrics: "/metrics",
    })
}

async fn get_health() -> Json<health::Liveness> {
    Json(health::liveness())
}

async fn get_ready(State(state): State<AppState>) -> Response {
    let report = state.service.readiness().await;
    let status = if report.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report)).into_response()
}

async fn get_metrics(State(state): State<AppState>) -> Response {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
        .into_response()
}
