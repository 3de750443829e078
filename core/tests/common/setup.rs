use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, header::ACCEPT, header::COOKIE},
    response::Response,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use sea_orm::{DatabaseConnection, Statement};
use serde_json::Value;
use tokio::sync::Notify;
use tracker_service::{
    auth::{ACCESS_TOKEN_COOKIE, JwtKeys, password::hash_password_with_cost},
    config::{
        AppConfig, AuthConfig, DEFAULT_CLOB_API, DEFAULT_DATA_API, DEFAULT_GAMMA_API,
        DatabaseConfig, PolymarketConfig, ResearchConfig, ServerConfig,
    },
    error::MarketDataError,
    http,
    persist::PersistCtx,
    polymarket::{MarketDataApi, OrderBook},
    service::TrackerService,
};

pub const TEST_USER: &str = "admin";
pub const TEST_PASSWORD: &str = "correct horse battery";

/// bcrypt at the minimum cost so the login tests stay fast.
pub fn password_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password_with_cost(TEST_PASSWORD, 4).expect("hash test password"))
}

pub fn test_config() -> AppConfig {
    AppConfig {
        server_config: ServerConfig {
            host: "127.0.0.1".into(),
            port: 8000,
            log_level: log::Level::Info,
            max_concurrent_requests: 50,
            scratch_dir: PathBuf::from("/tmp/polymarket-tracker-test"),
            allow_root: true,
            cookie_secure: false,
        },
        database_config: DatabaseConfig {
            host: "localhost".into(),
            port: 5432,
            user: "postgres".into(),
            password: String::new(),
            database: "polybot".into(),
            sslmode: "disable".into(),
            max_connections: 1,
            run_migrations: false,
        },
        polymarket_config: PolymarketConfig {
            wallet: "0xabc".into(),
            poll_interval_secs: 60,
            data_api: DEFAULT_DATA_API.into(),
            gamma_api: DEFAULT_GAMMA_API.into(),
            clob_api: DEFAULT_CLOB_API.into(),
            http_timeout_secs: 5,
        },
        auth: AuthConfig {
            username: TEST_USER.into(),
            password_hash: password_hash().into(),
            jwt_secret: "test-secret".into(),
            access_ttl_hours: 1,
        },
        research: ResearchConfig {
            dir: PathBuf::from("/nonexistent/research"),
        },
    }
}

/// Holds a wallet fetch open until the test releases it.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

/// In-memory market data keyed by CLOB token id.
#[derive(Default)]
pub struct StubMarketData {
    pub positions: Vec<Value>,
    pub books: HashMap<String, OrderBook>,
    pub gate: Option<Arc<Gate>>,
}

#[async_trait]
impl MarketDataApi for StubMarketData {
    async fn fetch_wallet_positions(&self) -> Result<Vec<Value>, MarketDataError> {
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        Ok(self.positions.clone())
    }

    async fn fetch_order_book(&self, token_id: &str) -> Result<OrderBook, MarketDataError> {
        self.books
            .get(token_id)
            .cloned()
            .ok_or_else(|| MarketDataError::Payload {
                url: format!("stub://book/{token_id}"),
                reason: "unknown token".into(),
            })
    }

    async fn fetch_market_metadata(&self, condition_id: &str) -> Result<Value, MarketDataError> {
        Err(MarketDataError::Payload {
            url: format!("stub://markets/{condition_id}"),
            reason: "not stubbed".into(),
        })
    }

    async fn fetch_markets(&self, _query: &str, _limit: u32) -> Result<Vec<Value>, MarketDataError> {
        Ok(Vec::new())
    }
}

pub fn service_with(config: AppConfig, db: DatabaseConnection) -> TrackerService {
    service_with_market(config, PersistCtx::from_conn(db), StubMarketData::default())
}

pub fn service_with_market(
    config: AppConfig,
    ctx: PersistCtx,
    market: StubMarketData,
) -> TrackerService {
    TrackerService::new_with_dependencies(config, ctx, Arc::new(market))
}

/// Every statement a mock connection saw. Panics while a service still
/// shares the connection.
pub fn executed_statements(ctx: PersistCtx) -> Vec<Statement> {
    let Ok(db) = Arc::try_unwrap(ctx.db) else {
        panic!("mock connection is still shared");
    };
    db.into_transaction_log()
        .iter()
        .flat_map(|t| t.statements().to_vec())
        .collect()
}

pub fn app_with(config: AppConfig, db: DatabaseConnection) -> Router {
    let metrics = PrometheusBuilder::new().build_recorder().handle();
    http::router(service_with(config, db), metrics)
}

pub fn session_cookie_header(config: &AppConfig) -> String {
    let token = JwtKeys::from_config(&config.auth)
        .issue(TEST_USER)
        .expect("issue token");
    format!("{ACCESS_TOKEN_COOKIE}={token}")
}

pub fn get(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

pub fn get_json(path: &str) -> Request<Body> {
    Request::builder()
        .uri(path)
        .header(ACCEPT, "application/json")
        .body(Body::empty())
        .unwrap()
}

pub fn authed_get(config: &AppConfig, path: &str) -> Request<Body> {
    Request::builder()
        .uri(path)
        .header(ACCEPT, "application/json")
        .header(COOKIE, session_cookie_header(config))
        .body(Body::empty())
        .unwrap()
}

pub async fn body_text(resp: Response) -> String {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(resp: Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
