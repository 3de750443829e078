use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A wallet position as reported by the data API, valued at the quoted price.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletPosition {
    pub token_id: Option<String>,
    pub condition_id: Option<String>,
    pub outcome: String,
    pub size: Decimal,
    pub avg_price: Decimal,
    pub current_price: Decimal,
    pub value: Decimal,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
}

impl WalletPosition {
    /// Parses one raw data-API entry. Missing numeric fields count as zero,
    /// present but unparseable ones reject the entry.
    pub fn from_raw(raw: &Value) -> Result<Self, String> {
        let obj = raw
            .as_object()
            .ok_or_else(|| "position entry is not an object".to_string())?;

        let size = decimal_field(obj.get("size"), "size")?;
        let avg_price = decimal_field(obj.get("avgPrice"), "avgPrice")?;
        let current_price = decimal_field(obj.get("currentPrice"), "currentPrice")?;
        let realized_pnl = decimal_field(obj.get("realizedPnl"), "realizedPnl")?;
        let value = size
            .checked_mul(current_price)
            .ok_or_else(|| "size * currentPrice out of range".to_string())?;
        let unrealized_pnl = current_price
            .checked_sub(avg_price)
            .and_then(|d| d.checked_mul(size))
            .ok_or_else(|| "unrealized pnl out of range".to_string())?;

        Ok(Self {
            token_id: string_field(obj.get("asset")),
            condition_id: string_field(obj.get("conditionId")),
            outcome: string_field(obj.get("outcome")).unwrap_or_else(|| "Unknown".to_string()),
            size,
            avg_price,
            current_price,
            value,
            unrealized_pnl,
            realized_pnl,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WalletBalance {
    pub cash_balance: Decimal,
    pub total_position_value: Decimal,
    pub positions: Vec<WalletPosition>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderBook {
    #[serde(default)]
    pub bids: Vec<BookLevel>,
    #[serde(default)]
    pub asks: Vec<BookLevel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookLevel {
    #[serde(default)]
    pub price: Value,
    #[serde(default)]
    pub size: Value,
}

impl BookLevel {
    pub fn price(&self) -> Result<Decimal, String> {
        decimal_field(Some(&self.price), "price")
    }
}

impl OrderBook {
    /// Midpoint of the top of book. A one-sided book quotes that side.
    pub fn midpoint(&self) -> Result<Option<Decimal>, String> {
        let best_bid = self.bids.first().map(BookLevel::price).transpose()?;
        let best_ask = self.asks.first().map(BookLevel::price).transpose()?;
        Ok(match (best_bid, best_ask) {
            (Some(bid), Some(ask)) => Some(
                bid.checked_add(ask)
                    .ok_or_else(|| "bid + ask out of range".to_string())?
                    / Decimal::TWO,
            ),
            (Some(bid), None) => Some(bid),
            (None, Some(ask)) => Some(ask),
            (None, None) => None,
        })
    }
}

fn decimal_field(value: Option<&Value>, name: &str) -> Result<Decimal, String> {
    match value {
        None | Some(Value::Null) => Ok(Decimal::ZERO),
        Some(Value::Number(n)) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .map_err(|e| format!("{name}: {e}")),
        Some(Value::String(s)) => Decimal::from_str(s.trim())
            .or_else(|_| Decimal::from_scientific(s.trim()))
            .map_err(|e| format!("{name}: {e}")),
        Some(other) => Err(format!("{name}: unexpected value {other}")),
    }
}

fn string_field(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}
