use crate::error::PersistDbError;
use crate::persist::PersistCtx;
use entities::sea_orm_active_enums::PositionStatus;
use entities::{catalyst, cluster, market, position};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{ColumnTrait, EntityTrait, JoinType, QueryFilter, QueryOrder, QuerySelect, RelationTrait};

/// Catalysts with `from <= event_date <= to`, soonest first.
pub async fn get_catalysts_between(
    ctx: &PersistCtx,
    from: DateTimeWithTimeZone,
    to: DateTimeWithTimeZone,
) -> Result<Vec<(catalyst::Model, Option<cluster::Model>)>, PersistDbError> {
    let rows = catalyst::Entity::find()
        .find_also_related(cluster::Entity)
        .filter(catalyst::Column::EventDate.gte(from))
        .filter(catalyst::Column::EventDate.lte(to))
        .order_by_asc(catalyst::Column::EventDate)
        .all(ctx.db.as_ref())
        .await?;
    Ok(rows)
}

pub async fn get_open_positions_in_cluster(
    ctx: &PersistCtx,
    cluster_id: i32,
) -> Result<Vec<position::Model>, PersistDbError> {
    let rows = position::Entity::find()
        .join(JoinType::InnerJoin, position::Relation::Market.def())
        .filter(market::Column::ClusterId.eq(cluster_id))
        .filter(position::Column::Status.eq(PositionStatus::Open))
        .all(ctx.db.as_ref())
        .await?;
    Ok(rows)
}
