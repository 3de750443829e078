use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{PathRejection, QueryRejection},
    },
};
use serde::Deserialize;

use super::{ApiError, AppState, bounded};
use crate::service::alerts::{AlertSummary, AttentionReport, ReviewStatus};
use crate::service::exposure::{ExposureReport, UpcomingCatalysts};
use crate::service::freshness::{self, DecayRateTable, MarketFreshness, TopicReport};

#[derive(Debug, Deserialize)]
pub(super) struct CatalystParams {
    days: Option<i64>,
}

pub(super) async fn get_cluster_exposure(
    State(state): State<AppState>,
) -> Result<Json<ExposureReport>, ApiError> {
    Ok(Json(state.service.cluster_exposure().await?))
}

pub(super) async fn get_upcoming_catalysts(
    State(state): State<AppState>,
    params: Result<Query<CatalystParams>, QueryRejection>,
) -> Result<Json<UpcomingCatalysts>, ApiError> {
    let Query(params) = params?;
    let days = bounded("days", params.days.unwrap_or(7), 1, Some(90))?;
    Ok(Json(state.service.upcoming_catalysts(days).await?))
}

pub(super) async fn get_positions_needing_attention(
    State(state): State<AppState>,
) -> Result<Json<AttentionReport>, ApiError> {
    Ok(Json(state.service.positions_needing_attention().await?))
}

pub(super) async fn get_review_status(
    State(state): State<AppState>,
) -> Result<Json<ReviewStatus>, ApiError> {
    Ok(Json(state.service.review_status().await?))
}

pub(super) async fn get_alert_summary(
    State(state): State<AppState>,
) -> Result<Json<AlertSummary>, ApiError> {
    Ok(Json(state.service.alert_summary().await?))
}

pub(super) async fn get_topic_freshness(
    State(state): State<AppState>,
) -> Result<Json<TopicReport>, ApiError> {
    Ok(Json(state.service.topic_freshness().await?))
}

pub(super) async fn get_market_freshness(
    State(state): State<AppState>,
    slug: Result<Path<String>, PathRejection>,
) -> Result<Json<MarketFreshness>, ApiError> {
    let Path(slug) = slug?;
    Ok(Json(state.service.market_freshness(&slug).await?))
}

pub(super) async fn get_decay_rates() -> Json<DecayRateTable> {
    Json(freshness::decay_rates())
}
