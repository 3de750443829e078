use rust_decimal::Decimal;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};

use entities::sea_orm_active_enums::{PositionDirection, PositionStatus, ThesisStatus};
use entities::{market, position};

use crate::error::{ServiceError, ServiceResult};
use crate::persist::repo::{self, NewPosition, common::now};
use crate::service::TrackerService;

#[derive(Debug, Clone, Serialize)]
pub struct PositionView {
    pub id: i32,
    pub market_id: Option<i32>,
    pub market_title: Option<String>,
    pub direction: PositionDirection,
    pub shares: Decimal,
    pub entry_price: Decimal,
    pub entry_date: DateTimeWithTimeZone,
    pub exit_price: Option<Decimal>,
    pub exit_date: Option<DateTimeWithTimeZone>,
    pub current_price: Option<Decimal>,
    pub current_value: Option<Decimal>,
    pub unrealized_pnl: Option<Decimal>,
    pub realized_pnl: Option<Decimal>,
    pub cost_basis: Decimal,
    pub status: Option<PositionStatus>,
    pub thesis_status: Option<ThesisStatus>,
    pub entry_reasoning: Option<String>,
    pub exit_reasoning: Option<String>,
    pub created_at: Option<DateTimeWithTimeZone>,
    pub updated_at: Option<DateTimeWithTimeZone>,
}

impl PositionView {
    pub fn new(p: position::Model, market: Option<&market::Model>) -> Self {
        Self {
            id: p.id,
            market_id: p.market_id,
            market_title: market.map(|m| m.title.clone()),
            direction: p.direction,
            shares: p.shares,
            entry_price: p.entry_price,
            entry_date: p.entry_date,
            exit_price: p.exit_price,
            exit_date: p.exit_date,
            current_price: p.current_price,
            current_value: p.current_value,
            unrealized_pnl: p.unrealized_pnl,
            realized_pnl: p.realized_pnl,
            cost_basis: p.cost_basis,
            status: p.status,
            thesis_status: p.thesis_status,
            entry_reasoning: p.entry_reasoning,
            exit_reasoning: p.exit_reasoning,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePositionRequest {
    pub market_id: i32,
    pub direction: PositionDirection,
    pub shares: Decimal,
    pub entry_price: Decimal,
    #[serde(default)]
    pub entry_reasoning: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePositionRequest {
    pub shares: Option<Decimal>,
    pub current_price: Option<Decimal>,
    pub status: Option<PositionStatus>,
    pub thesis_status: Option<ThesisStatus>,
    pub exit_price: Option<Decimal>,
    pub exit_reasoning: Option<String>,
    pub realized_pnl: Option<Decimal>,
}

/// `all` lists every position; anything else must name a status.
pub fn parse_status_filter(raw: Option<&str>) -> ServiceResult<Option<PositionStatus>> {
    match raw.map(str::trim).unwrap_or("open") {
        "all" => Ok(None),
        "open" => Ok(Some(PositionStatus::Open)),
        "closed" => Ok(Some(PositionStatus::Closed)),
        "pending" => Ok(Some(PositionStatus::Pending)),
        other => Err(ServiceError::InvalidParams(format!(
            "status must be one of open, closed, pending, all (got {other:?})"
        ))),
    }
}

/// Upper bound on share counts, matching the `numeric(18, 6)` share column.
pub const MAX_SHARES: Decimal = Decimal::from_parts(0xD4A5_1000, 0xE8, 0, false, 0); // 1_000_000_000_000
/// Upper bound on per-share prices, matching the `numeric(10, 4)` price columns.
pub const MAX_PRICE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

fn check_shares(shares: Decimal) -> ServiceResult<()> {
    if shares >= MAX_SHARES {
        return Err(ServiceError::InvalidParams(format!(
            "shares must be below {MAX_SHARES}"
        )));
    }
    Ok(())
}

fn check_price(field: &str, price: Decimal) -> ServiceResult<()> {
    if price < Decimal::ZERO {
        return Err(ServiceError::InvalidParams(format!("{field} must not be negative")));
    }
    if price >= MAX_PRICE {
        return Err(ServiceError::InvalidParams(format!(
            "{field} must be below {MAX_PRICE}"
        )));
    }
    Ok(())
}

fn product(shares: Decimal, price: Decimal, what: &str) -> ServiceResult<Decimal> {
    shares
        .checked_mul(price)
        .ok_or_else(|| ServiceError::InvalidParams(format!("{what} out of range")))
}

/// Applies an edit and re-derives cost, value and unrealized PnL.
pub fn apply_position_update(
    mut p: position::Model,
    update: UpdatePositionRequest,
    at: DateTimeWithTimeZone,
) -> ServiceResult<position::Model> {
    if let Some(shares) = update.shares {
        p.shares = shares;
        p.cost_basis = product(shares, p.entry_price, "cost_basis")?;
    }
    if let Some(price) = update.current_price {
        p.current_price = Some(price);
    }
    if let Some(status) = update.status {
        p.status = Some(status);
        if status == PositionStatus::Closed && p.exit_date.is_none() {
            p.exit_date = Some(at);
        }
    }
    if let Some(thesis) = update.thesis_status {
        p.thesis_status = Some(thesis);
    }
    if let Some(exit_price) = update.exit_price {
        p.exit_price = Some(exit_price);
    }
    if let Some(reasoning) = update.exit_reasoning {
        p.exit_reasoning = Some(reasoning);
    }
    if let Some(realized) = update.realized_pnl {
        p.realized_pnl = Some(realized);
    }

    if let Some(price) = p.current_price
        && !price.is_zero()
        && !p.shares.is_zero()
    {
        let value = product(p.shares, price, "current_value")?;
        let unrealized = value
            .checked_sub(p.cost_basis)
            .ok_or_else(|| ServiceError::InvalidParams("unrealized_pnl out of range".into()))?;
        p.current_value = Some(value);
        p.unrealized_pnl = Some(unrealized);
    }
    Ok(p)
}

fn validate_new_position(req: &CreatePositionRequest) -> ServiceResult<()> {
    if req.shares <= Decimal::ZERO {
        return Err(ServiceError::InvalidParams("shares must be positive".into()));
    }
    check_shares(req.shares)?;
    check_price("entry_price", req.entry_price)
}

fn validate_update(update: &UpdatePositionRequest) -> ServiceResult<()> {
    if let Some(shares) = update.shares {
        if shares < Decimal::ZERO {
            return Err(ServiceError::InvalidParams("shares must not be negative".into()));
        }
        check_shares(shares)?;
    }
    if let Some(price) = update.current_price {
        check_price("current_price", price)?;
    }
    if let Some(price) = update.exit_price {
        check_price("exit_price", price)?;
    }
    Ok(())
}

impl TrackerService {
    pub async fn list_positions(&self, status: Option<PositionStatus>) -> ServiceResult<Vec<PositionView>> {
        let rows = repo::list_positions(self.persist_ctx(), status).await?;
        Ok(rows
            .into_iter()
            .map(|(p, m)| PositionView::new(p, m.as_ref()))
            .collect())
    }

    pub async fn get_position(&self, position_id: i32) -> ServiceResult<PositionView> {
        let (p, m) = repo::get_position_with_market(self.persist_ctx(), position_id).await?;
        Ok(PositionView::new(p, m.as_ref()))
    }

    pub async fn create_position(&self, req: CreatePositionRequest) -> ServiceResult<PositionView> {
        validate_new_position(&req)?;
        let market = repo::get_market(self.persist_ctx(), req.market_id).await?;

        let created = repo::insert_position(
            self.persist_ctx(),
            NewPosition {
                market_id: req.market_id,
                direction: req.direction,
                shares: req.shares,
                entry_price: req.entry_price,
                entry_reasoning: req.entry_reasoning,
            },
        )
        .await?;

        Ok(PositionView::new(created, Some(&market)))
    }

    pub async fn update_position(
        &self,
        position_id: i32,
        update: UpdatePositionRequest,
    ) -> ServiceResult<PositionView> {
        validate_update(&update)?;

        let (existing, market) =
            repo::get_position_with_market(self.persist_ctx(), position_id).await?;
        let edited = apply_position_update(existing, update, now())?;
        let saved = repo::update_position(self.persist_ctx(), edited).await?;
        Ok(PositionView::new(saved, market.as_ref()))
    }
}
