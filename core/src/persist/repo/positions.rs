use std::collections::HashMap;

use crate::error::PersistDbError;
use crate::persist::PersistCtx;
use entities::sea_orm_active_enums::{PositionDirection, PositionStatus, ThesisStatus};
use entities::{cluster, market, position, position_snapshot};
use rust_decimal::Decimal;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Unchanged, ColumnTrait, ConnectionTrait, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};

use super::common::now;
use super::markets::get_clusters_by_ids;

pub type PositionRow = (position::Model, Option<market::Model>);

#[derive(Debug, Clone)]
pub struct NewPosition {
    pub market_id: i32,
    pub direction: PositionDirection,
    pub shares: Decimal,
    pub entry_price: Decimal,
    pub entry_reasoning: Option<String>,
}

/// Positions with their market, newest entry first. `None` lists every status.
pub async fn list_positions(
    ctx: &PersistCtx,
    status: Option<PositionStatus>,
) -> Result<Vec<PositionRow>, PersistDbError> {
    let mut query = position::Entity::find().find_also_related(market::Entity);
    if let Some(status) = status {
        query = query.filter(position::Column::Status.eq(status));
    }
    let rows = query
        .order_by_desc(position::Column::EntryDate)
        .all(ctx.db.as_ref())
        .await?;
    Ok(rows)
}

pub async fn get_open_positions_with_markets(
    ctx: &PersistCtx,
) -> Result<Vec<PositionRow>, PersistDbError> {
    get_open_positions_with_markets_on(ctx.db.as_ref()).await
}

/// Open positions with their market, oldest entry first.
pub async fn get_open_positions_with_markets_on<C: ConnectionTrait>(
    conn: &C,
) -> Result<Vec<PositionRow>, PersistDbError> {
    let rows = position::Entity::find()
        .find_also_related(market::Entity)
        .filter(position::Column::Status.eq(PositionStatus::Open))
        .order_by_asc(position::Column::EntryDate)
        .all(conn)
        .await?;
    Ok(rows)
}

/// Open positions that have a market, paired with the market's cluster if any.
pub async fn get_open_positions_with_clusters(
    ctx: &PersistCtx,
) -> Result<Vec<(position::Model, market::Model, Option<cluster::Model>)>, PersistDbError> {
    let rows = get_open_positions_with_markets(ctx).await?;

    let mut cluster_ids: Vec<i32> = rows
        .iter()
        .filter_map(|(_, m)| m.as_ref().and_then(|m| m.cluster_id))
        .collect();
    cluster_ids.sort_unstable();
    cluster_ids.dedup();

    let clusters: HashMap<i32, cluster::Model> = get_clusters_by_ids(ctx, cluster_ids)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    Ok(rows
        .into_iter()
        .filter_map(|(p, m)| m.map(|m| (p, m)))
        .map(|(p, m)| {
            let cluster = m.cluster_id.and_then(|id| clusters.get(&id).cloned());
            (p, m, cluster)
        })
        .collect())
}

pub async fn get_position_with_market(
    ctx: &PersistCtx,
    position_id: i32,
) -> Result<PositionRow, PersistDbError> {
    position::Entity::find_by_id(position_id)
        .find_also_related(market::Entity)
        .one(ctx.db.as_ref())
        .await?
        .ok_or(PersistDbError::PositionNotFound(position_id))
}

pub async fn ensure_position_exists(ctx: &PersistCtx, position_id: i32) -> Result<(), PersistDbError> {
    position::Entity::find_by_id(position_id)
        .one(ctx.db.as_ref())
        .await?
        .map(|_| ())
        .ok_or(PersistDbError::PositionNotFound(position_id))
}

/// Price history of one position, newest first.
pub async fn get_position_history(
    ctx: &PersistCtx,
    position_id: i32,
    limit: u64,
) -> Result<Vec<position_snapshot::Model>, PersistDbError> {
    let rows = position_snapshot::Entity::find()
        .filter(position_snapshot::Column::PositionId.eq(position_id))
        .order_by_desc(position_snapshot::Column::Timestamp)
        .limit(limit)
        .all(ctx.db.as_ref())
        .await?;
    Ok(rows)
}

/// Opens a position priced at its entry: value equals cost, no PnL yet.
pub async fn insert_position(
    ctx: &PersistCtx,
    new: NewPosition,
) -> Result<position::Model, PersistDbError> {
    let cost_basis = new
        .shares
        .checked_mul(new.entry_price)
        .ok_or(PersistDbError::OutOfRange("cost_basis"))?;
    let ts = now();
    let model = position::ActiveModel {
        market_id: Set(Some(new.market_id)),
        direction: Set(new.direction),
        shares: Set(new.shares),
        entry_price: Set(new.entry_price),
        entry_date: Set(ts),
        current_price: Set(Some(new.entry_price)),
        current_value: Set(Some(cost_basis)),
        unrealized_pnl: Set(Some(Decimal::ZERO)),
        cost_basis: Set(cost_basis),
        status: Set(Some(PositionStatus::Open)),
        thesis_status: Set(Some(ThesisStatus::Intact)),
        entry_reasoning: Set(new.entry_reasoning),
        created_at: Set(Some(ts)),
        updated_at: Set(Some(ts)),
        ..Default::default()
    };

    position::Entity::insert(model)
        .exec_with_returning(ctx.db.as_ref())
        .await
        .map_err(PersistDbError::from)
}

/// Writes back the mutable columns of an edited position.
pub async fn update_position(
    ctx: &PersistCtx,
    edited: position::Model,
) -> Result<position::Model, PersistDbError> {
    let model = position::ActiveModel {
        id: Unchanged(edited.id),
        shares: Set(edited.shares),
        cost_basis: Set(edited.cost_basis),
        current_price: Set(edited.current_price),
        current_value: Set(edited.current_value),
        unrealized_pnl: Set(edited.unrealized_pnl),
        realized_pnl: Set(edited.realized_pnl),
        status: Set(edited.status),
        thesis_status: Set(edited.thesis_status),
        exit_price: Set(edited.exit_price),
        exit_date: Set(edited.exit_date),
        exit_reasoning: Set(edited.exit_reasoning),
        updated_at: Set(Some(now())),
        ..Default::default()
    };

    model.update(ctx.db.as_ref()).await.map_err(|e| match e {
        sea_orm::DbErr::RecordNotUpdated => PersistDbError::PositionNotFound(edited.id),
        other => PersistDbError::from(other),
    })
}

/// Stores a fresh mark for a position. Returns whether a row was touched.
pub async fn set_position_mark_on<C: ConnectionTrait>(
    conn: &C,
    position_id: i32,
    price: Decimal,
    value: Decimal,
    unrealized_pnl: Decimal,
    at: DateTimeWithTimeZone,
) -> Result<bool, PersistDbError> {
    let res = position::Entity::update_many()
        .col_expr(position::Column::CurrentPrice, Expr::value(price))
        .col_expr(position::Column::CurrentValue, Expr::value(value))
        .col_expr(position::Column::UnrealizedPnl, Expr::value(unrealized_pnl))
        .col_expr(position::Column::UpdatedAt, Expr::value(at))
        .filter(position::Column::Id.eq(position_id))
        .exec(conn)
        .await?;
    Ok(res.rows_affected > 0)
}

pub async fn set_position_mark(
    ctx: &PersistCtx,
    position_id: i32,
    price: Decimal,
    value: Decimal,
    unrealized_pnl: Decimal,
) -> Result<bool, PersistDbError> {
    set_position_mark_on(ctx.db.as_ref(), position_id, price, value, unrealized_pnl, now()).await
}
