//! `SeaORM` Entity for scheduled events that can move a cluster.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "catalysts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(column_type = "String(StringLen::N(255))")]
    pub title: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub event_date: DateTimeWithTimeZone,
    pub affected_cluster_id: Option<i32>,
    #[sea_orm(column_type = "String(StringLen::N(50))", nullable)]
    pub risk_direction: Option<String>,
    #[sea_orm(column_type = "String(StringLen::N(255))", nullable)]
    pub recommended_action: Option<String>,
    #[sea_orm(default_value = false, nullable)]
    pub action_taken: Option<bool>,
    #[sea_orm(default_value = false, nullable)]
    pub reminder_sent: Option<bool>,
    #[sea_orm(default_expr = "Expr::current_timestamp()", nullable)]
    pub created_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::cluster::Entity",
        from = "Column::AffectedClusterId",
        to = "super::cluster::Column::Id"
    )]
    Cluster,
}

impl Related<super::cluster::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cluster.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
