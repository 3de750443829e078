use std::collections::HashMap;

use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::Serialize;

use entities::sea_orm_active_enums::PositionDirection;
use entities::{cluster, market, position};

use crate::error::ServiceResult;
use crate::persist::repo::{self, common::now};
use crate::service::TrackerService;

#[derive(Debug, Clone, Serialize)]
pub struct ExposedPosition {
    pub position_id: i32,
    pub market_title: String,
    pub direction: PositionDirection,
    pub value: f64,
    pub unrealized_pnl: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterExposure {
    pub cluster_id: i32,
    pub cluster_name: String,
    pub max_exposure_pct: Option<f64>,
    pub total_value: f64,
    pub total_unrealized_pnl: f64,
    pub position_count: usize,
    pub positions: Vec<ExposedPosition>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UnclusteredExposure {
    pub total_value: f64,
    pub position_count: usize,
    pub positions: Vec<ExposedPosition>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExposureReport {
    pub clusters: Vec<ClusterExposure>,
    pub unclustered: UnclusteredExposure,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpcomingCatalyst {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub event_date: DateTimeWithTimeZone,
    pub risk_direction: Option<String>,
    pub recommended_action: Option<String>,
    pub action_taken: Option<bool>,
    pub days_until: i64,
    pub affected_cluster: Option<String>,
    pub affected_position_count: usize,
    pub affected_position_value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpcomingCatalysts {
    pub catalysts: Vec<UpcomingCatalyst>,
    pub count: usize,
    pub days_range: i64,
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

struct ClusterTotals {
    cluster: cluster::Model,
    total_value: Decimal,
    total_unrealized: Decimal,
    positions: Vec<ExposedPosition>,
}

/// Groups open positions by their market's cluster, largest cluster first.
pub fn group_by_cluster(
    rows: Vec<(position::Model, market::Model, Option<cluster::Model>)>,
) -> ExposureReport {
    let mut order: Vec<i32> = Vec::new();
    let mut totals: HashMap<i32, ClusterTotals> = HashMap::new();
    let mut unclustered_value = Decimal::ZERO;
    let mut unclustered = UnclusteredExposure::default();

    for (p, m, c) in rows {
        let value = p.current_value.unwrap_or_default();
        let unrealized = p.unrealized_pnl.unwrap_or_default();
        let info = ExposedPosition {
            position_id: p.id,
            market_title: m.title,
            direction: p.direction,
            value: to_f64(value),
            unrealized_pnl: to_f64(unrealized),
        };

        match c {
            Some(c) => {
                let entry = totals.entry(c.id).or_insert_with(|| {
                    order.push(c.id);
                    ClusterTotals {
                        cluster: c,
                        total_value: Decimal::ZERO,
                        total_unrealized: Decimal::ZERO,
                        positions: Vec::new(),
                    }
                });
                entry.total_value += value;
                entry.total_unrealized += unrealized;
                entry.positions.push(info);
            }
            None => {
                unclustered_value += value;
                unclustered.positions.push(info);
            }
        }
    }

    let mut clusters: Vec<ClusterExposure> = order
        .into_iter()
        .filter_map(|id| totals.remove(&id))
        .map(|t| ClusterExposure {
            cluster_id: t.cluster.id,
            cluster_name: t.cluster.name,
            max_exposure_pct: t.cluster.max_exposure_pct.map(to_f64),
            total_value: to_f64(t.total_value),
            total_unrealized_pnl: to_f64(t.total_unrealized),
            position_count: t.positions.len(),
            positions: t.positions,
        })
        .collect();
    clusters.sort_by(|a, b| b.total_value.total_cmp(&a.total_value));

    unclustered.total_value = to_f64(unclustered_value);
    unclustered.position_count = unclustered.positions.len();

    ExposureReport {
        clusters,
        unclustered,
    }
}

impl TrackerService {
    pub async fn cluster_exposure(&self) -> ServiceResult<ExposureReport> {
        let rows = repo::get_open_positions_with_clusters(self.persist_ctx()).await?;
        Ok(group_by_cluster(rows))
    }

    /// Catalysts in the next `days` days with the open exposure of the
    /// cluster each one affects.
    pub async fn upcoming_catalysts(&self, days: i64) -> ServiceResult<UpcomingCatalysts> {
        let from = now();
        let to = from + Duration::days(days);
        let rows = repo::get_catalysts_between(self.persist_ctx(), from, to).await?;

        let mut exposure_by_cluster: HashMap<i32, (usize, Decimal)> = HashMap::new();
        let mut catalysts = Vec::with_capacity(rows.len());
        for (c, cluster) in rows {
            let (count, value) = match &cluster {
                Some(cl) => match exposure_by_cluster.get(&cl.id) {
                    Some(cached) => *cached,
                    None => {
                        let positions =
                            repo::get_open_positions_in_cluster(self.persist_ctx(), cl.id).await?;
                        let total: Decimal = positions
                            .iter()
                            .map(|p| p.current_value.unwrap_or_default())
                            .sum();
                        exposure_by_cluster.insert(cl.id, (positions.len(), total));
                        (positions.len(), total)
                    }
                },
                None => (0, Decimal::ZERO),
            };

            catalysts.push(UpcomingCatalyst {
                id: c.id,
                title: c.title,
                description: c.description,
                event_date: c.event_date,
                risk_direction: c.risk_direction,
                recommended_action: c.recommended_action,
                action_taken: c.action_taken,
                days_until: (c.event_date - from).num_days(),
                affected_cluster: cluster.map(|cl| cl.name),
                affected_position_count: count,
                affected_position_value: to_f64(value),
            });
        }

        Ok(UpcomingCatalysts {
            count: catalysts.len(),
            catalysts,
            days_range: days,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::repo::common::fixtures::{cluster, dec, market, position};

    #[test]
    fn groups_and_sorts_clusters_by_value() {
        let small = cluster(1, "rates");
        let big = cluster(2, "geopolitics");

        let mut p1 = position(1, 10, "10", "0.5");
        p1.current_value = Some(dec("5"));
        let mut p2 = position(2, 20, "100", "0.5");
        p2.current_value = Some(dec("40"));
        p2.unrealized_pnl = Some(dec("-10"));
        let mut p3 = position(3, 21, "10", "0.5");
        p3.current_value = Some(dec("12"));
        let mut p4 = position(4, 30, "10", "0.5");
        p4.current_value = None;

        let report = group_by_cluster(vec![
            (p1, market(10, Some(1)), Some(small)),
            (p2, market(20, Some(2)), Some(big.clone())),
            (p3, market(21, Some(2)), Some(big)),
            (p4, market(30, None), None),
        ]);

        assert_eq!(report.clusters.len(), 2);
        assert_eq!(report.clusters[0].cluster_name, "geopolitics");
        assert_eq!(report.clusters[0].total_value, 52.0);
        assert_eq!(report.clusters[0].total_unrealized_pnl, -10.0);
        assert_eq!(report.clusters[0].position_count, 2);
        assert_eq!(report.clusters[0].max_exposure_pct, Some(25.0));
        assert_eq!(report.clusters[1].cluster_name, "rates");

        assert_eq!(report.unclustered.position_count, 1);
        assert_eq!(report.unclustered.total_value, 0.0);
    }

    #[test]
    fn empty_portfolio_has_no_exposure() {
        let report = group_by_cluster(Vec::new());
        assert!(report.clusters.is_empty());
        assert_eq!(report.unclustered.position_count, 0);
    }
}
