use std::collections::HashMap;
use std::sync::Arc;

use entities::{portfolio_snapshot, position};
use sea_orm::{DatabaseBackend, DbErr, MockDatabase, MockExecResult};
use serde_json::json;
use test_log::test;
use tracker_service::{persist::PersistCtx, service::tracker::PollOutcome};

mod common;

use common::fixtures::{book, market, open_position, position_snapshot, snapshot};
use common::setup::{Gate, StubMarketData, executed_statements, service_with_market, test_config};

fn updated(rows: u64) -> MockExecResult {
    MockExecResult {
        last_insert_id: 0,
        rows_affected: rows,
    }
}

fn books(entries: &[(&str, &str, &str)]) -> HashMap<String, tracker_service::polymarket::OrderBook> {
    entries
        .iter()
        .map(|(token, bid, ask)| (token.to_string(), book(bid, ask)))
        .collect()
}

#[test(tokio::test)]
async fn reprices_open_positions_at_the_book_midpoint() {
    let mut orphan = open_position(3, 0, "10", "0.5", "0.5");
    orphan.market_id = None;
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![
            (open_position(1, 3, "100", "0.40", "0.50"), Some(market(3))),
            (open_position(2, 4, "20", "0.30", "0.30"), Some(market(4))),
            (orphan, None::<entities::market::Model>),
        ]])
        .append_exec_results([updated(1)])
        .into_connection();
    let ctx = PersistCtx::from_conn(db);
    let service = service_with_market(
        test_config(),
        ctx.clone(),
        StubMarketData {
            books: books(&[("yes-3", "0.60", "0.64")]),
            ..Default::default()
        },
    );

    let repriced = service.update_position_prices().await.unwrap();
    assert_eq!(repriced, 1);

    drop(service);
    let updates: Vec<_> = executed_statements(ctx)
        .into_iter()
        .filter(|s| s.sql.starts_with("UPDATE \"positions\""))
        .collect();
    assert_eq!(updates.len(), 1);
    let values = format!("{:?}", updates[0].values);
    assert!(values.contains("0.62"), "{values}");
    assert!(values.contains("22.00"), "{values}");
}

#[test(tokio::test)]
async fn mark_that_touches_no_row_is_not_counted() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![(
            open_position(1, 3, "100", "0.40", "0.50"),
            Some(market(3)),
        )]])
        .append_exec_results([updated(0)])
        .into_connection();
    let service = service_with_market(
        test_config(),
        PersistCtx::from_conn(db),
        StubMarketData {
            books: books(&[("yes-3", "0.60", "0.64")]),
            ..Default::default()
        },
    );

    assert_eq!(service.update_position_prices().await.unwrap(), 0);
}

#[test(tokio::test)]
async fn poll_snapshots_wallet_then_reprices() {
    let held = open_position(1, 3, "100", "0.40", "0.50");
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        // snapshot transaction: previous, insert, open positions, history row
        .append_query_results([vec![snapshot(1, "0", "50")]])
        .append_query_results([vec![snapshot(2, "0", "55")]])
        .append_query_results([vec![(held.clone(), Some(market(3)))]])
        .append_query_results([vec![position_snapshot(1, 1, "0.55", "55")]])
        // reprice
        .append_query_results([vec![(held, Some(market(3)))]])
        .append_exec_results([updated(1), updated(1)])
        .into_connection();
    let ctx = PersistCtx::from_conn(db);
    let service = service_with_market(
        test_config(),
        ctx.clone(),
        StubMarketData {
            positions: vec![json!({
                "asset": "yes-3",
                "size": "100",
                "avgPrice": "0.40",
                "currentPrice": "0.55",
            })],
            books: books(&[("yes-3", "0.60", "0.64")]),
            ..Default::default()
        },
    );

    let outcome = service.poll_once().await.unwrap();
    assert_eq!(
        outcome,
        PollOutcome::Completed {
            snapshot_id: 2,
            repriced: 1
        }
    );

    drop(service);
    let sql: Vec<String> = executed_statements(ctx).into_iter().map(|s| s.sql).collect();
    let history_inserts = sql
        .iter()
        .filter(|s| s.starts_with("INSERT INTO \"position_snapshots\""))
        .count();
    assert_eq!(history_inserts, 1);
    let mark_updates = sql
        .iter()
        .filter(|s| s.starts_with("UPDATE \"positions\""))
        .count();
    assert_eq!(mark_updates, 2);
}

#[test(tokio::test)]
async fn failed_snapshot_fails_the_poll_before_repricing() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_errors([DbErr::Custom("connection reset".into())])
        .into_connection();
    let ctx = PersistCtx::from_conn(db);
    let service = service_with_market(test_config(), ctx.clone(), StubMarketData::default());

    let err = service.poll_once().await.unwrap_err();
    assert_eq!(err.to_string(), "Portfolio poll failed");

    drop(service);
    let sql: Vec<String> = executed_statements(ctx).into_iter().map(|s| s.sql).collect();
    assert!(!sql.iter().any(|s| s.contains("FROM \"positions\"")), "{sql:?}");
}

#[test(tokio::test)]
async fn overlapping_poll_is_skipped() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<portfolio_snapshot::Model>::new()])
        .append_query_results([vec![snapshot(1, "0", "0")]])
        .append_query_results([Vec::<position::Model>::new()])
        .into_connection();
    let gate = Arc::new(Gate::default());
    let service = service_with_market(
        test_config(),
        PersistCtx::from_conn(db),
        StubMarketData {
            gate: Some(gate.clone()),
            ..Default::default()
        },
    );

    let first = tokio::spawn({
        let service = service.clone();
        async move { service.poll_once().await }
    });
    gate.entered.notified().await;

    assert_eq!(service.poll_once().await.unwrap(), PollOutcome::Skipped);

    gate.release.notify_one();
    let outcome = first.await.unwrap().unwrap();
    assert_eq!(
        outcome,
        PollOutcome::Completed {
            snapshot_id: 1,
            repriced: 0
        }
    );
}
