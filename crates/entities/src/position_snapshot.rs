//! `SeaORM` Entity for per-position price observations.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "position_snapshots")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub position_id: Option<i32>,
    pub timestamp: DateTimeWithTimeZone,
    #[sea_orm(column_type = "Decimal(Some((10, 4)))")]
    pub price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((18, 6)))")]
    pub value: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 4)))", nullable)]
    pub bid: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((10, 4)))", nullable)]
    pub ask: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((10, 4)))", nullable)]
    pub spread: Option<Decimal>,
    #[sea_orm(default_expr = "Expr::current_timestamp()", nullable)]
    pub created_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::position::Entity",
        from = "Column::PositionId",
        to = "super::position::Column::Id",
        on_delete = "Cascade"
    )]
    Position,
}

impl Related<super::position::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Position.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
