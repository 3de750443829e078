use chrono::{TimeZone, Utc};
use entities::sea_orm_active_enums::{PositionDirection, PositionStatus, ThesisStatus};
use entities::{market, portfolio_snapshot, position, position_snapshot};
use rust_decimal::Decimal;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value;
use tracker_service::polymarket::{OrderBook, model::BookLevel};

pub fn ts(y: i32, m: u32, d: u32) -> DateTimeWithTimeZone {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0)
        .single()
        .unwrap()
        .fixed_offset()
}

pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

pub fn market(id: i32) -> market::Model {
    market::Model {
        id,
        slug: format!("market-{id}"),
        title: format!("Market {id}"),
        description: None,
        resolution_criteria: None,
        condition_id: None,
        clob_token_id_yes: Some(format!("yes-{id}")),
        clob_token_id_no: Some(format!("no-{id}")),
        end_date: None,
        resolved_at: None,
        resolution_outcome: None,
        volume_24h: None,
        liquidity: None,
        cluster_id: None,
        created_at: None,
        updated_at: None,
    }
}

pub fn open_position(id: i32, market_id: i32, shares: &str, entry: &str, current: &str) -> position::Model {
    let shares = dec(shares);
    let entry_price = dec(entry);
    let current_price = dec(current);
    let cost_basis = shares * entry_price;
    let current_value = shares * current_price;
    position::Model {
        id,
        market_id: Some(market_id),
        direction: PositionDirection::Yes,
        shares,
        entry_price,
        entry_date: ts(2025, 1, 6),
        exit_price: None,
        exit_date: None,
        current_price: Some(current_price),
        current_value: Some(current_value),
        unrealized_pnl: Some(current_value - cost_basis),
        realized_pnl: None,
        cost_basis,
        status: Some(PositionStatus::Open),
        thesis_status: Some(ThesisStatus::Intact),
        recommendation_id: None,
        analysis_folder: None,
        entry_reasoning: None,
        exit_reasoning: None,
        created_at: None,
        updated_at: None,
    }
}

pub fn snapshot(id: i32, cash: &str, positions: &str) -> portfolio_snapshot::Model {
    let cash_balance = dec(cash);
    let position_value = dec(positions);
    portfolio_snapshot::Model {
        id,
        timestamp: ts(2025, 1, 7),
        cash_balance,
        position_value,
        total_value: cash_balance + position_value,
        daily_pnl: None,
        daily_pnl_pct: None,
        granularity: Some("minute".into()),
        created_at: None,
    }
}

pub fn position_snapshot(id: i32, position_id: i32, price: &str, value: &str) -> position_snapshot::Model {
    position_snapshot::Model {
        id,
        position_id: Some(position_id),
        timestamp: ts(2025, 1, 7),
        price: dec(price),
        value: dec(value),
        bid: None,
        ask: None,
        spread: None,
        created_at: None,
    }
}

/// A one-level book on each side.
pub fn book(bid: &str, ask: &str) -> OrderBook {
    let level = |price: &str| BookLevel {
        price: Value::String(price.to_string()),
        size: Value::String("100".to_string()),
    };
    OrderBook {
        bids: vec![level(bid)],
        asks: vec![level(ask)],
    }
}
