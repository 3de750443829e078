use crate::error::PersistDbError;
use crate::persist::PersistCtx;
use entities::{cluster, market};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

pub async fn get_market(ctx: &PersistCtx, market_id: i32) -> Result<market::Model, PersistDbError> {
    market::Entity::find_by_id(market_id)
        .one(ctx.db.as_ref())
        .await?
        .ok_or(PersistDbError::MarketNotFound(market_id))
}

pub async fn get_clusters_by_ids(
    ctx: &PersistCtx,
    ids: Vec<i32>,
) -> Result<Vec<cluster::Model>, PersistDbError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = cluster::Entity::find()
        .filter(cluster::Column::Id.is_in(ids))
        .all(ctx.db.as_ref())
        .await?;
    Ok(rows)
}
