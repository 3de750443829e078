//! `SeaORM` Entity for portfolio positions.

use super::sea_orm_active_enums::{PositionDirection, PositionStatus, ThesisStatus};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "positions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub market_id: Option<i32>,
    pub direction: PositionDirection,
    #[sea_orm(column_type = "Decimal(Some((18, 6)))")]
    pub shares: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 4)))")]
    pub entry_price: Decimal,
    pub entry_date: DateTimeWithTimeZone,
    #[sea_orm(column_type = "Decimal(Some((10, 4)))", nullable)]
    pub exit_price: Option<Decimal>,
    pub exit_date: Option<DateTimeWithTimeZone>,
    #[sea_orm(column_type = "Decimal(Some((10, 4)))", nullable)]
    pub current_price: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((18, 6)))", nullable)]
    pub current_value: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((18, 6)))", nullable)]
    pub unrealized_pnl: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((18, 6)))", nullable)]
    pub realized_pnl: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((18, 6)))")]
    pub cost_basis: Decimal,
    pub status: Option<PositionStatus>,
    pub thesis_status: Option<ThesisStatus>,
    pub recommendation_id: Option<i32>,
    #[sea_orm(column_type = "String(StringLen::N(255))", nullable)]
    pub analysis_folder: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub entry_reasoning: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub exit_reasoning: Option<String>,
    #[sea_orm(default_expr = "Expr::current_timestamp()", nullable)]
    pub created_at: Option<DateTimeWithTimeZone>,
    #[sea_orm(default_expr = "Expr::current_timestamp()", nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::market::Entity",
        from = "Column::MarketId",
        to = "super::market::Column::Id"
    )]
    Market,
    #[sea_orm(has_many = "super::position_snapshot::Entity")]
    PositionSnapshot,
}

impl Related<super::market::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Market.def()
    }
}

impl Related<super::position_snapshot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PositionSnapshot.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
