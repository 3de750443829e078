//! `SeaORM` entities for the tracker schema.
//!
//! The tables live in the `polybot` database and are shared with the trading
//! bot that creates recommendations and positions.

pub mod catalyst;
pub mod cluster;
pub mod market;
pub mod portfolio_snapshot;
pub mod position;
pub mod position_snapshot;
pub mod sea_orm_active_enums;

pub mod prelude {
    pub use super::catalyst::Entity as Catalyst;
    pub use super::cluster::Entity as Cluster;
    pub use super::market::Entity as Market;
    pub use super::portfolio_snapshot::Entity as PortfolioSnapshot;
    pub use super::position::Entity as Position;
    pub use super::position_snapshot::Entity as PositionSnapshot;
}
