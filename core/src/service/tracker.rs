use log::{error, info, warn};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::Serialize;

use entities::sea_orm_active_enums::{PositionDirection, PositionStatus};
use entities::{portfolio_snapshot, position_snapshot};

use crate::error::ServiceResult;
use crate::persist::repo::{
    self, NewPortfolioSnapshot, TokenMark,
    common::{now, token_for_direction},
};
use crate::service::TrackerService;
use crate::telemetry;

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioSnapshotView {
    pub id: i32,
    pub timestamp: DateTimeWithTimeZone,
    pub cash_balance: Decimal,
    pub position_value: Decimal,
    pub total_value: Decimal,
    pub daily_pnl: Option<Decimal>,
    pub daily_pnl_pct: Option<Decimal>,
    pub granularity: Option<String>,
}

impl From<portfolio_snapshot::Model> for PortfolioSnapshotView {
    fn from(m: portfolio_snapshot::Model) -> Self {
        Self {
            id: m.id,
            timestamp: m.timestamp,
            cash_balance: m.cash_balance,
            position_value: m.position_value,
            total_value: m.total_value,
            daily_pnl: m.daily_pnl,
            daily_pnl_pct: m.daily_pnl_pct,
            granularity: m.granularity,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PositionSummary {
    pub id: i32,
    pub market_title: String,
    pub direction: PositionDirection,
    pub shares: Decimal,
    pub entry_price: Decimal,
    pub current_price: Option<Decimal>,
    pub current_value: Decimal,
    pub unrealized_pnl: Decimal,
    pub status: Option<PositionStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioCurrent {
    pub cash_balance: Decimal,
    pub position_value: Decimal,
    pub total_value: Decimal,
    pub unrealized_pnl: Decimal,
    pub positions: Vec<PositionSummary>,
    pub last_updated: Option<DateTimeWithTimeZone>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioHistory {
    pub snapshots: Vec<PortfolioSnapshotView>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotTaken {
    pub status: &'static str,
    pub snapshot_id: Option<i32>,
    pub total_value: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PositionSnapshotView {
    pub id: i32,
    pub position_id: i32,
    pub timestamp: DateTimeWithTimeZone,
    pub price: Decimal,
    pub value: Decimal,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    pub spread: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PositionHistory {
    pub position_id: i32,
    pub snapshots: Vec<PositionSnapshotView>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Completed { snapshot_id: i32, repriced: usize },
    Skipped,
}

/// Value and unrealized PnL of `shares` marked at `price`, or `None` when
/// either does not fit a decimal.
pub fn mark_to_market(
    shares: Decimal,
    price: Decimal,
    cost_basis: Decimal,
) -> Option<(Decimal, Decimal)> {
    let value = shares.checked_mul(price)?;
    Some((value, value.checked_sub(cost_basis)?))
}

impl TrackerService {
    /// Values the wallet, stores a portfolio snapshot and marks the open
    /// positions it holds.
    pub async fn take_portfolio_snapshot(&self) -> ServiceResult<portfolio_snapshot::Model> {
        let balance = self.market_api().wallet_balance().await;

        let marks: Vec<TokenMark> = balance
            .positions
            .iter()
            .filter_map(|p| {
                Some(TokenMark {
                    token_id: p.token_id.clone()?,
                    price: p.current_price,
                    value: p.value,
                })
            })
            .collect();

        let new = NewPortfolioSnapshot {
            timestamp: now(),
            cash_balance: balance.cash_balance,
            position_value: balance.total_position_value,
        };

        let recorded = repo::record_portfolio_snapshot(self.persist_ctx(), new, marks)
            .await
            .inspect_err(|e| error!("Failed to take portfolio snapshot: {e}"))?;

        let snapshot = recorded.snapshot;
        info!(
            "Portfolio snapshot created: total=${:.2}, positions=${:.2}",
            snapshot.total_value, snapshot.position_value
        );
        telemetry::set_portfolio_total_value(snapshot.total_value.to_f64().unwrap_or_default());
        Ok(snapshot)
    }

    /// Reprices each open position from the CLOB midpoint of its token.
    pub async fn update_position_prices(&self) -> ServiceResult<usize> {
        let rows = repo::get_open_positions_with_markets(self.persist_ctx()).await?;

        let mut updated = 0;
        for (position, market) in rows {
            let Some(market) = market else { continue };
            let Some(token) = token_for_direction(&market, position.direction) else {
                continue;
            };
            let Some(price) = self.market_api().market_price(token).await else {
                continue;
            };

            let Some((value, unrealized)) =
                mark_to_market(position.shares, price, position.cost_basis)
            else {
                warn!("Mark for position {} at {price} is out of range", position.id);
                continue;
            };
            match repo::set_position_mark(self.persist_ctx(), position.id, price, value, unrealized)
                .await
            {
                Ok(true) => updated += 1,
                Ok(false) => {}
                Err(e) => warn!("Failed to update price for position {}: {e}", position.id),
            }
        }

        if updated > 0 {
            info!("Updated prices for {updated} positions");
            telemetry::record_positions_repriced(updated);
        }
        Ok(updated)
    }

    pub async fn current_portfolio(&self) -> ServiceResult<PortfolioCurrent> {
        let latest = repo::get_latest_portfolio_snapshot(self.persist_ctx()).await?;
        let rows = repo::list_positions(self.persist_ctx(), Some(PositionStatus::Open)).await?;

        let mut position_value = Decimal::ZERO;
        let mut unrealized_pnl = Decimal::ZERO;
        let positions = rows
            .into_iter()
            .map(|(p, m)| {
                let value = p.current_value.unwrap_or_default();
                let unrealized = p.unrealized_pnl.unwrap_or_default();
                position_value += value;
                unrealized_pnl += unrealized;
                PositionSummary {
                    id: p.id,
                    market_title: m.map(|m| m.title).unwrap_or_else(|| "Unknown".into()),
                    direction: p.direction,
                    shares: p.shares,
                    entry_price: p.entry_price,
                    current_price: p.current_price,
                    current_value: value,
                    unrealized_pnl: unrealized,
                    status: p.status,
                }
            })
            .collect();

        let cash_balance = latest.as_ref().map(|s| s.cash_balance).unwrap_or_default();
        Ok(PortfolioCurrent {
            cash_balance,
            position_value,
            total_value: cash_balance + position_value,
            unrealized_pnl,
            positions,
            last_updated: latest.map(|s| s.timestamp),
        })
    }

    pub async fn portfolio_history(&self, limit: u64, offset: u64) -> ServiceResult<PortfolioHistory> {
        let snapshots: Vec<PortfolioSnapshotView> =
            repo::get_portfolio_history(self.persist_ctx(), limit, offset)
                .await?
                .into_iter()
                .map(Into::into)
                .collect();
        Ok(PortfolioHistory {
            count: snapshots.len(),
            snapshots,
        })
    }

    pub async fn position_history(&self, position_id: i32, limit: u64) -> ServiceResult<PositionHistory> {
        repo::ensure_position_exists(self.persist_ctx(), position_id).await?;
        let snapshots: Vec<PositionSnapshotView> =
            repo::get_position_history(self.persist_ctx(), position_id, limit)
                .await?
                .into_iter()
                .map(|s| snapshot_view(s, position_id))
                .collect();
        Ok(PositionHistory {
            position_id,
            count: snapshots.len(),
            snapshots,
        })
    }

    pub async fn trigger_snapshot(&self) -> ServiceResult<SnapshotTaken> {
        let snapshot = self.take_portfolio_snapshot().await?;
        Ok(SnapshotTaken {
            status: "success",
            snapshot_id: Some(snapshot.id),
            total_value: snapshot.total_value.to_f64(),
        })
    }

    /// One scheduled poll: snapshot, then reprice. A poll that finds another
    /// one still running is skipped.
    pub async fn poll_once(&self) -> anyhow::Result<PollOutcome> {
        let Ok(_guard) = self.inner.poll_guard.try_lock() else {
            warn!("previous portfolio poll still running, skipping");
            telemetry::record_poll("skipped");
            return Ok(PollOutcome::Skipped);
        };

        info!("Starting scheduled portfolio poll...");
        let result = async {
            let snapshot = self.take_portfolio_snapshot().await?;
            info!("Snapshot complete: total=${:.2}", snapshot.total_value);
            let repriced = self.update_position_prices().await?;
            Ok::<_, crate::error::ServiceError>(PollOutcome::Completed {
                snapshot_id: snapshot.id,
                repriced,
            })
        }
        .await;

        match result {
            Ok(outcome) => {
                telemetry::record_poll("success");
                Ok(outcome)
            }
            Err(e) => {
                telemetry::record_poll("failure");
                Err(anyhow::Error::new(e).context("Portfolio poll failed"))
            }
        }
    }
}

fn snapshot_view(s: position_snapshot::Model, position_id: i32) -> PositionSnapshotView {
    PositionSnapshotView {
        id: s.id,
        position_id: s.position_id.unwrap_or(position_id),
        timestamp: s.timestamp,
        price: s.price,
        value: s.value,
        bid: s.bid,
        ask: s.ask,
        spread: s.spread,
    }
}
