use std::collections::HashMap;

use crate::error::PersistDbError;
use crate::persist::PersistCtx;
use entities::{portfolio_snapshot, position, position_snapshot};
use log::{info, warn};
use rust_decimal::Decimal;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{ConnectionTrait, EntityTrait, QueryOrder, QuerySelect, Set, TransactionTrait};

use super::common::token_for_direction;
use super::positions::{get_open_positions_with_markets_on, set_position_mark_on};

pub const SNAPSHOT_GRANULARITY: &str = "minute";

#[derive(Debug, Clone)]
pub struct NewPortfolioSnapshot {
    pub timestamp: DateTimeWithTimeZone,
    pub cash_balance: Decimal,
    pub position_value: Decimal,
}

/// A quoted price for one CLOB token in the wallet.
#[derive(Debug, Clone)]
pub struct TokenMark {
    pub token_id: String,
    pub price: Decimal,
    pub value: Decimal,
}

#[derive(Debug, Clone)]
pub struct RecordedSnapshot {
    pub snapshot: portfolio_snapshot::Model,
    pub synced_positions: usize,
}

/// Change against the previous total, and the same change in percent when
/// the previous total was positive.
pub fn daily_change(
    previous_total: Option<Decimal>,
    total: Decimal,
) -> (Option<Decimal>, Option<Decimal>) {
    match previous_total {
        Some(prev) if !prev.is_zero() => {
            let Some(pnl) = total.checked_sub(prev) else {
                return (None, None);
            };
            let pct = if prev > Decimal::ZERO {
                pnl.checked_div(prev)
                    .and_then(|r| r.checked_mul(Decimal::ONE_HUNDRED))
                    .map(|p| p.round_dp(4))
            } else {
                None
            };
            (Some(pnl), pct)
        }
        _ => (None, None),
    }
}

pub async fn get_latest_portfolio_snapshot(
    ctx: &PersistCtx,
) -> Result<Option<portfolio_snapshot::Model>, PersistDbError> {
    get_latest_portfolio_snapshot_on(ctx.db.as_ref()).await
}

async fn get_latest_portfolio_snapshot_on<C: ConnectionTrait>(
    conn: &C,
) -> Result<Option<portfolio_snapshot::Model>, PersistDbError> {
    let row = portfolio_snapshot::Entity::find()
        .order_by_desc(portfolio_snapshot::Column::Timestamp)
        .one(conn)
        .await?;
    Ok(row)
}

/// Snapshot history, newest first.
pub async fn get_portfolio_history(
    ctx: &PersistCtx,
    limit: u64,
    offset: u64,
) -> Result<Vec<portfolio_snapshot::Model>, PersistDbError> {
    let rows = portfolio_snapshot::Entity::find()
        .order_by_desc(portfolio_snapshot::Column::Timestamp)
        .limit(limit)
        .offset(offset)
        .all(ctx.db.as_ref())
        .await?;
    Ok(rows)
}

/// Stores a portfolio snapshot and marks every open position whose token
/// appears in `marks`, in a single transaction.
pub async fn record_portfolio_snapshot(
    ctx: &PersistCtx,
    new: NewPortfolioSnapshot,
    marks: Vec<TokenMark>,
) -> Result<RecordedSnapshot, PersistDbError> {
    ctx.db
        .transaction(|txn| {
            Box::pin(async move {
                let previous = get_latest_portfolio_snapshot_on(txn).await?;
                let total_value = new
                    .cash_balance
                    .checked_add(new.position_value)
                    .ok_or(PersistDbError::OutOfRange("total_value"))?;
                let (daily_pnl, daily_pnl_pct) =
                    daily_change(previous.map(|p| p.total_value), total_value);

                let snapshot = portfolio_snapshot::ActiveModel {
                    timestamp: Set(new.timestamp),
                    cash_balance: Set(new.cash_balance),
                    position_value: Set(new.position_value),
                    total_value: Set(total_value),
                    daily_pnl: Set(daily_pnl),
                    daily_pnl_pct: Set(daily_pnl_pct),
                    granularity: Set(Some(SNAPSHOT_GRANULARITY.to_string())),
                    ..Default::default()
                };
                let snapshot = portfolio_snapshot::Entity::insert(snapshot)
                    .exec_with_returning(txn)
                    .await?;

                let synced_positions = sync_open_positions(txn, &marks, new.timestamp).await?;

                Ok::<_, PersistDbError>(RecordedSnapshot {
                    snapshot,
                    synced_positions,
                })
            })
        })
        .await
        .map_err(PersistDbError::from)
}

async fn sync_open_positions<C: ConnectionTrait>(
    conn: &C,
    marks: &[TokenMark],
    at: DateTimeWithTimeZone,
) -> Result<usize, PersistDbError> {
    if marks.is_empty() {
        return Ok(0);
    }

    let open = get_open_positions_with_markets_on(conn).await?;
    let by_token: HashMap<String, position::Model> = open
        .into_iter()
        .filter_map(|(p, m)| {
            let token = token_for_direction(m.as_ref()?, p.direction)?.to_string();
            Some((token, p))
        })
        .collect();

    let mut synced = 0;
    for mark in marks {
        let Some(position) = by_token.get(&mark.token_id) else {
            continue;
        };

        let Some(unrealized) = mark.value.checked_sub(position.cost_basis) else {
            warn!("persist.snapshot mark for position {} is out of range", position.id);
            continue;
        };
        set_position_mark_on(conn, position.id, mark.price, mark.value, unrealized, at).await?;

        let snap = position_snapshot::ActiveModel {
            position_id: Set(Some(position.id)),
            timestamp: Set(at),
            price: Set(mark.price),
            value: Set(mark.value),
            ..Default::default()
        };
        position_snapshot::Entity::insert(snap).exec(conn).await?;
        synced += 1;
    }

    if synced > 0 {
        info!("persist.snapshot synced {synced} open positions");
    }
    Ok(synced)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn first_snapshot_has_no_daily_change() {
        assert_eq!(daily_change(None, dec("100")), (None, None));
    }

    #[test]
    fn zero_previous_total_has_no_daily_change() {
        assert_eq!(daily_change(Some(Decimal::ZERO), dec("100")), (None, None));
    }

    #[test]
    fn computes_change_and_percent() {
        let (pnl, pct) = daily_change(Some(dec("200")), dec("230"));
        assert_eq!(pnl, Some(dec("30")));
        assert_eq!(pct, Some(dec("15")));
    }

    #[test]
    fn negative_previous_total_skips_percent() {
        let (pnl, pct) = daily_change(Some(dec("-10")), dec("5"));
        assert_eq!(pnl, Some(dec("15")));
        assert_eq!(pct, None);
    }

    #[test]
    fn overflowing_change_is_dropped() {
        assert_eq!(daily_change(Some(Decimal::MIN), Decimal::MAX), (None, None));

        let (pnl, pct) = daily_change(Some(Decimal::ONE), Decimal::MAX);
        assert_eq!(pnl, Some(Decimal::MAX - Decimal::ONE));
        assert_eq!(pct, None);
    }
}
