use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use log::warn;
use tokio::sync::Semaphore;

use super::ApiError;
use crate::telemetry;

/// Caps in-flight requests. Requests over the cap are refused at once with
/// 503 instead of queueing.
#[derive(Clone)]
pub struct ConcurrencyLimit {
    permits: Arc<Semaphore>,
    max: usize,
}

impl ConcurrencyLimit {
    pub fn new(max: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max)),
            max,
        }
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

pub(super) async fn admission_middleware(
    State(limit): State<ConcurrencyLimit>,
    req: Request,
    next: Next,
) -> Response {
    let Ok(_permit) = limit.permits.clone().try_acquire_owned() else {
        warn!(
            "rejecting {} {}: {} requests already in flight",
            req.method(),
            req.uri().path(),
            limit.max
        );
        telemetry::record_request_rejected();
        return ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable").into_response();
    };
    next.run(req).await
}
