//! Round trips against a live Postgres. Run with `--ignored` after pointing
//! the `POSTGRES_*` variables at a scratch database.

use anyhow::Result;
use entities::market;
use entities::sea_orm_active_enums::{PositionDirection, PositionStatus};
use envconfig::Envconfig;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set, Statement};
use serial_test::serial;
use test_log::test;
use tracker_service::config::DatabaseConfig;
use tracker_service::persist::{
    PersistCtx,
    repo::{self, NewPortfolioSnapshot, NewPosition, TokenMark, common::now},
};

mod common;

use common::fixtures::dec;

async fn setup_clean_db() -> Result<PersistCtx> {
    dotenv::dotenv().ok();
    let cfg = DatabaseConfig::init_from_env()?;
    let ctx = PersistCtx::connect(&cfg).await?;
    Migrator::up(ctx.db.as_ref(), None).await?;

    for table in [
        "position_snapshots",
        "portfolio_snapshots",
        "positions",
        "catalysts",
        "markets",
        "clusters",
    ] {
        ctx.db
            .as_ref()
            .execute(Statement::from_string(
                ctx.db.get_database_backend(),
                format!("DELETE FROM {table};"),
            ))
            .await?;
    }
    Ok(ctx)
}

async fn insert_market(ctx: &PersistCtx, slug: &str) -> Result<market::Model> {
    let model = market::ActiveModel {
        slug: Set(slug.to_string()),
        title: Set(format!("Title of {slug}")),
        clob_token_id_yes: Set(Some(format!("{slug}-yes"))),
        clob_token_id_no: Set(Some(format!("{slug}-no"))),
        ..Default::default()
    };
    Ok(model.insert(ctx.db.as_ref()).await?)
}

#[test(tokio::test)]
#[ignore = "requires Postgres"]
#[serial]
async fn snapshot_marks_matching_open_positions() -> Result<()> {
    let ctx = setup_clean_db().await?;
    let m = insert_market(&ctx, "rates").await?;
    let p = repo::insert_position(
        &ctx,
        NewPosition {
            market_id: m.id,
            direction: PositionDirection::Yes,
            shares: dec("100"),
            entry_price: dec("0.40"),
            entry_reasoning: None,
        },
    )
    .await?;

    let first = repo::record_portfolio_snapshot(
        &ctx,
        NewPortfolioSnapshot {
            timestamp: now(),
            cash_balance: dec("0"),
            position_value: dec("50"),
        },
        vec![TokenMark {
            token_id: "rates-yes".into(),
            price: dec("0.50"),
            value: dec("50"),
        }],
    )
    .await?;
    assert_eq!(first.synced_positions, 1);
    assert_eq!(first.snapshot.daily_pnl, None);

    let second = repo::record_portfolio_snapshot(
        &ctx,
        NewPortfolioSnapshot {
            timestamp: now(),
            cash_balance: dec("0"),
            position_value: dec("55"),
        },
        Vec::new(),
    )
    .await?;
    assert_eq!(second.snapshot.daily_pnl, Some(dec("5")));
    assert_eq!(second.snapshot.daily_pnl_pct, Some(dec("10")));

    let (stored, _) = repo::get_position_with_market(&ctx, p.id).await?;
    assert_eq!(stored.current_price, Some(dec("0.50")));
    assert_eq!(stored.unrealized_pnl, Some(dec("10")));

    let history = repo::get_position_history(&ctx, p.id, 10).await?;
    assert_eq!(history.len(), 1);

    let latest = repo::get_latest_portfolio_snapshot(&ctx).await?;
    assert_eq!(latest.map(|s| s.id), Some(second.snapshot.id));
    Ok(())
}

#[test(tokio::test)]
#[ignore = "requires Postgres"]
#[serial]
async fn status_filter_and_update() -> Result<()> {
    let ctx = setup_clean_db().await?;
    let m = insert_market(&ctx, "election").await?;
    let p = repo::insert_position(
        &ctx,
        NewPosition {
            market_id: m.id,
            direction: PositionDirection::No,
            shares: dec("10"),
            entry_price: dec("0.30"),
            entry_reasoning: Some("mispriced".into()),
        },
    )
    .await?;

    let mut closed = p.clone();
    closed.status = Some(PositionStatus::Closed);
    repo::update_position(&ctx, closed).await?;

    assert!(repo::list_positions(&ctx, Some(PositionStatus::Open)).await?.is_empty());
    assert_eq!(repo::list_positions(&ctx, None).await?.len(), 1);

    let mut ghost = p;
    ghost.id += 1000;
    let err = repo::update_position(&ctx, ghost).await.unwrap_err();
    assert!(matches!(
        err,
        tracker_service::error::PersistDbError::PositionNotFound(_)
    ));
    Ok(())
}
