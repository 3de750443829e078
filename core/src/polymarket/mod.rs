//! Read-only client for the public Polymarket APIs.
//!
//! * data API: wallet positions
//! * CLOB API: order books, used for midpoint pricing
//! * Gamma API: market metadata and search

use std::collections::HashMap;

use async_trait::async_trait;
use log::{error, warn};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::PolymarketConfig;
use crate::error::MarketDataError;

pub mod model;

pub use model::{OrderBook, WalletBalance, WalletPosition};

#[async_trait]
pub trait MarketDataApi: Send + Sync {
    async fn fetch_wallet_positions(&self) -> Result<Vec<Value>, MarketDataError>;

    async fn fetch_order_book(&self, token_id: &str) -> Result<OrderBook, MarketDataError>;

    async fn fetch_market_metadata(&self, condition_id: &str) -> Result<Value, MarketDataError>;

    async fn fetch_markets(&self, query: &str, limit: u32) -> Result<Vec<Value>, MarketDataError>;

    /// Raw wallet positions. Failures are logged and yield an empty list.
    async fn wallet_positions(&self) -> Vec<Value> {
        match self.fetch_wallet_positions().await {
            Ok(positions) => positions,
            Err(e) => {
                error!("Failed to fetch positions: {e}");
                Vec::new()
            }
        }
    }

    /// Values every wallet position at its quoted price. On-chain cash is not
    /// tracked, so `cash_balance` is always zero.
    async fn wallet_balance(&self) -> WalletBalance {
        let mut balance = WalletBalance::default();
        for raw in self.wallet_positions().await {
            let parsed = WalletPosition::from_raw(&raw).and_then(|position| {
                balance
                    .total_position_value
                    .checked_add(position.value)
                    .map(|total| (total, position))
                    .ok_or_else(|| "total position value out of range".to_string())
            });
            match parsed {
                Ok((total, position)) => {
                    balance.total_position_value = total;
                    balance.positions.push(position);
                }
                Err(e) => warn!("Failed to process position {raw}: {e}"),
            }
        }
        balance
    }

    async fn market_price(&self, token_id: &str) -> Option<Decimal> {
        let book = match self.fetch_order_book(token_id).await {
            Ok(book) => book,
            Err(e) => {
                warn!("Failed to fetch price for {token_id}: {e}");
                return None;
            }
        };
        match book.midpoint() {
            Ok(price) => price,
            Err(e) => {
                warn!("Failed to fetch price for {token_id}: {e}");
                None
            }
        }
    }

    async fn market_prices(&self, token_ids: &[String]) -> HashMap<String, Decimal> {
        let mut prices = HashMap::with_capacity(token_ids.len());
        for token_id in token_ids {
            if let Some(price) = self.market_price(token_id).await {
                prices.insert(token_id.clone(), price);
            }
        }
        prices
    }

    async fn market_metadata(&self, condition_id: &str) -> Option<Value> {
        match self.fetch_market_metadata(condition_id).await {
            Ok(meta) => Some(meta),
            Err(e) => {
                warn!("Failed to fetch market metadata for {condition_id}: {e}");
                None
            }
        }
    }

    async fn search_markets(&self, query: &str, limit: u32) -> Vec<Value> {
        match self.fetch_markets(query, limit).await {
            Ok(markets) => markets,
            Err(e) => {
                warn!("Market search failed: {e}");
                Vec::new()
            }
        }
    }
}

pub struct PolymarketClient {
    http: Client,
    wallet: String,
    data_api: String,
    gamma_api: String,
    clob_api: String,
}

impl PolymarketClient {
    pub fn new(config: &PolymarketConfig) -> Result<Self, MarketDataError> {
        let http = Client::builder()
            .timeout(config.http_timeout())
            .user_agent(concat!("polymarket-tracker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MarketDataError::Client(e.to_string()))?;

        Ok(Self {
            http,
            wallet: config.wallet.trim().to_lowercase(),
            data_api: config.data_api.trim_end_matches('/').to_string(),
            gamma_api: config.gamma_api.trim_end_matches('/').to_string(),
            clob_api: config.clob_api.trim_end_matches('/').to_string(),
        })
    }

    pub fn wallet(&self) -> &str {
        &self.wallet
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, String)],
    ) -> Result<T, MarketDataError> {
        let response = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|source| MarketDataError::Request {
                url: url.clone(),
                source,
            })?;

        response
            .json::<T>()
            .await
            .map_err(|e| MarketDataError::Payload {
                url,
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl MarketDataApi for PolymarketClient {
    async fn fetch_wallet_positions(&self) -> Result<Vec<Value>, MarketDataError> {
        let url = format!("{}/positions", self.data_api);
        let data: Value = self.get_json(url, &[("user", self.wallet.clone())]).await?;
        Ok(match data {
            Value::Array(items) => items,
            _ => Vec::new(),
        })
    }

    async fn fetch_order_book(&self, token_id: &str) -> Result<OrderBook, MarketDataError> {
        let url = format!("{}/book", self.clob_api);
        self.get_json(url, &[("token_id", token_id.to_string())])
            .await
    }

    async fn fetch_market_metadata(&self, condition_id: &str) -> Result<Value, MarketDataError> {
        let url = format!("{}/markets/{condition_id}", self.gamma_api);
        self.get_json(url, &[]).await
    }

    async fn fetch_markets(&self, query: &str, limit: u32) -> Result<Vec<Value>, MarketDataError> {
        let url = format!("{}/markets", self.gamma_api);
        let data: Value = self
            .get_json(url, &[("_q", query.to_string()), ("_limit", limit.to_string())])
            .await?;
        Ok(match data {
            Value::Array(items) => items,
            _ => Vec::new(),
        })
    }
}
