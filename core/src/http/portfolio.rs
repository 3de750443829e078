use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
};
use serde::Deserialize;

use super::{ApiError, AppState, bounded};
use crate::service::positions::{
    CreatePositionRequest, PositionView, UpdatePositionRequest, parse_status_filter,
};
use crate::service::tracker::{PortfolioCurrent, PortfolioHistory, PositionHistory, SnapshotTaken};

const DEFAULT_HISTORY_LIMIT: i64 = 100;
const MAX_HISTORY_LIMIT: i64 = 1000;

#[derive(Debug, Deserialize)]
pub(super) struct HistoryParams {
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct PositionListParams {
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct PositionHistoryParams {
    limit: Option<i64>,
}

fn history_limit(limit: Option<i64>) -> Result<u64, ApiError> {
    let limit = bounded(
        "limit",
        limit.unwrap_or(DEFAULT_HISTORY_LIMIT),
        1,
        Some(MAX_HISTORY_LIMIT),
    )?;
    Ok(limit.unsigned_abs())
}

pub(super) async fn get_current_portfolio(
    State(state): State<AppState>,
) -> Result<Json<PortfolioCurrent>, ApiError> {
    Ok(Json(state.service.current_portfolio().await?))
}

pub(super) async fn get_portfolio_history(
    State(state): State<AppState>,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> Result<Json<PortfolioHistory>, ApiError> {
    let Query(params) = params?;
    let limit = history_limit(params.limit)?;
    let offset = bounded("offset", params.offset.unwrap_or(0), 0, None)?.unsigned_abs();
    Ok(Json(state.service.portfolio_history(limit, offset).await?))
}

pub(super) async fn post_snapshot(
    State(state): State<AppState>,
) -> Result<Json<SnapshotTaken>, ApiError> {
    Ok(Json(state.service.trigger_snapshot().await?))
}

pub(super) async fn list_positions(
    State(state): State<AppState>,
    params: Result<Query<PositionListParams>, QueryRejection>,
) -> Result<Json<Vec<PositionView>>, ApiError> {
    let Query(params) = params?;
    let status = parse_status_filter(params.status.as_deref())?;
    Ok(Json(state.service.list_positions(status).await?))
}

pub(super) async fn get_position(
    State(state): State<AppState>,
    position_id: Result<Path<i32>, PathRejection>,
) -> Result<Json<PositionView>, ApiError> {
    let Path(position_id) = position_id?;
    Ok(Json(state.service.get_position(position_id).await?))
}

pub(super) async fn get_position_history(
    State(state): State<AppState>,
    position_id: Result<Path<i32>, PathRejection>,
    params: Result<Query<PositionHistoryParams>, QueryRejection>,
) -> Result<Json<PositionHistory>, ApiError> {
    let Path(position_id) = position_id?;
    let Query(params) = params?;
    let limit = history_limit(params.limit)?;
    Ok(Json(state.service.position_history(position_id, limit).await?))
}

pub(super) async fn create_position(
    State(state): State<AppState>,
    body: Result<Json<CreatePositionRequest>, JsonRejection>,
) -> Result<Json<PositionView>, ApiError> {
    let Json(req) = body?;
    Ok(Json(state.service.create_position(req).await?))
}

pub(super) async fn update_position(
    State(state): State<AppState>,
    position_id: Result<Path<i32>, PathRejection>,
    body: Result<Json<UpdatePositionRequest>, JsonRejection>,
) -> Result<Json<PositionView>, ApiError> {
    let Path(position_id) = position_id?;
    let Json(update) = body?;
    Ok(Json(state.service.update_position(position_id, update).await?))
}
