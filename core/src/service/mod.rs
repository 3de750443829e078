use std::sync::Arc;

use log::info;
use migration::{Migrator, MigratorTrait};
use tokio::sync::Mutex;

use crate::auth::JwtKeys;
use crate::config::AppConfig;
use crate::persist::PersistCtx;
use crate::polymarket::{MarketDataApi, PolymarketClient};

pub mod alerts;
mod auth;
pub mod exposure;
pub mod freshness;
pub mod health;
pub mod positions;
pub mod tracker;

pub struct Inner {
    config: AppConfig,
    persist_ctx: PersistCtx,
    market_api: Arc<dyn MarketDataApi>,
    jwt: JwtKeys,
    poll_guard: Mutex<()>,
}

#[derive(Clone)]
pub struct TrackerService {
    inner: Arc<Inner>,
}

impl TrackerService {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let persist_ctx = PersistCtx::connect(&config.database_config).await?;

        if config.database_config.run_migrations {
            info!("running database migrations");
            Migrator::up(persist_ctx.db.as_ref(), None).await?;
        }

        let client = PolymarketClient::new(&config.polymarket_config)?;
        info!("tracking wallet {}", client.wallet());

        Ok(Self::new_with_dependencies(
            config,
            persist_ctx,
            Arc::new(client),
        ))
    }

    pub fn new_with_dependencies(
        config: AppConfig,
        persist_ctx: PersistCtx,
        market_api: Arc<dyn MarketDataApi>,
    ) -> Self {
        let jwt = JwtKeys::from_config(&config.auth);
        Self {
            inner: Arc::new(Inner {
                config,
                persist_ctx,
                market_api,
                jwt,
                poll_guard: Mutex::new(()),
            }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn persist_ctx(&self) -> &PersistCtx {
        &self.inner.persist_ctx
    }

    pub fn market_api(&self) -> &dyn MarketDataApi {
        self.inner.market_api.as_ref()
    }

    pub(crate) fn jwt(&self) -> &JwtKeys {
        &self.inner.jwt
    }
}
