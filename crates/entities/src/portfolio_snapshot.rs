//! `SeaORM` Entity for point-in-time portfolio valuations.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "portfolio_snapshots")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub timestamp: DateTimeWithTimeZone,
    #[sea_orm(column_type = "Decimal(Some((18, 6)))")]
    pub cash_balance: Decimal,
    #[sea_orm(column_type = "Decimal(Some((18, 6)))")]
    pub position_value: Decimal,
    #[sea_orm(column_type = "Decimal(Some((18, 6)))")]
    pub total_value: Decimal,
    #[sea_orm(column_type = "Decimal(Some((18, 6)))", nullable)]
    pub daily_pnl: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((10, 4)))", nullable)]
    pub daily_pnl_pct: Option<Decimal>,
    #[sea_orm(column_type = "String(StringLen::N(50))", nullable)]
    pub granularity: Option<String>,
    #[sea_orm(default_expr = "Expr::current_timestamp()", nullable)]
    pub created_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
