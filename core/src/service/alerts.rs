//! Position alerts and the weekly review.
//!
//! Every open position is checked against four rules: drawdown from cost,
//! thesis health, a catalyst hitting its cluster within 48 hours, and the
//! market closing within three days. Each rule can only raise severity.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

use entities::sea_orm_active_enums::{PositionDirection, ThesisStatus};
use entities::{catalyst, cluster, market, position};

use crate::error::ServiceResult;
use crate::persist::repo;
use crate::service::TrackerService;

const CATALYST_HORIZON_HOURS: i64 = 48;
const EXPIRY_WARNING_DAYS: i64 = 3;
const SECS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
pub struct PositionAlert {
    pub position_id: i32,
    pub market_title: String,
    pub direction: PositionDirection,
    pub current_value: f64,
    pub unrealized_pnl: f64,
    pub cost_basis: f64,
    pub thesis_status: Option<ThesisStatus>,
    pub severity: Severity,
    pub reasons: Vec<String>,
    pub cluster: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttentionReport {
    pub alerts: Vec<PositionAlert>,
    pub count: usize,
    pub has_critical: bool,
    pub has_high: bool,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewPortfolioSummary {
    pub position_count: usize,
    pub total_value: f64,
    pub total_pnl: f64,
    pub pnl_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewPosition {
    pub market: String,
    pub direction: PositionDirection,
    pub entry_price: f64,
    pub current_price: f64,
    pub pnl_pct: f64,
    pub thesis_status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewStatus {
    pub review_week_of: NaiveDate,
    pub review_due: bool,
    pub days_until_due: u32,
    pub portfolio_summary: ReviewPortfolioSummary,
    pub positions: Vec<ReviewPosition>,
    pub template: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertSummary {
    pub attention_count: usize,
    pub has_critical: bool,
    pub has_high: bool,
    pub review_due: bool,
    pub days_until_review: u32,
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

/// Whole days from `now` to `then`, rounded down.
fn floor_days(now: DateTime<Utc>, then: DateTime<Utc>) -> i64 {
    (then - now).num_seconds().div_euclid(SECS_PER_DAY)
}

/// Reasons and severity for one position. `None` when nothing needs attention.
pub fn evaluate_position(
    p: &position::Model,
    m: &market::Model,
    cluster: Option<&cluster::Model>,
    catalysts_by_cluster: &HashMap<i32, catalyst::Model>,
    now: DateTime<Utc>,
) -> Option<PositionAlert> {
    let mut reasons = Vec::new();
    let mut severity = Severity::Low;

    if p.cost_basis > Decimal::ZERO {
        let current = p.current_value.unwrap_or_default();
        let drawdown = to_f64((p.cost_basis - current) / p.cost_basis);
        if drawdown > 0.30 {
            reasons.push(format!("Drawdown: {:.1}%", drawdown * 100.0));
            let level = if drawdown > 0.50 {
                Severity::High
            } else {
                Severity::Medium
            };
            severity = severity.max(level);
        }
    }

    match p.thesis_status {
        Some(status @ (ThesisStatus::Degraded | ThesisStatus::Invalidated)) => {
            reasons.push(format!("Thesis: {}", status.as_str()));
            let level = if status == ThesisStatus::Invalidated {
                Severity::Critical
            } else {
                Severity::High
            };
            severity = severity.max(level);
        }
        Some(ThesisStatus::Weakened) => {
            reasons.push("Thesis: weakened".to_string());
            severity = severity.max(Severity::Medium);
        }
        _ => {}
    }

    if let Some(c) = cluster
        && let Some(catalyst) = catalysts_by_cluster.get(&c.id)
    {
        let hours_until = (catalyst.event_date.with_timezone(&Utc) - now).num_seconds() as f64 / 3600.0;
        reasons.push(format!("Catalyst in {hours_until:.0}h: {}", catalyst.title));
        severity = severity.max(Severity::High);
    }

    if let Some(end) = m.end_date {
        let days_until_expiry = floor_days(now, end.with_timezone(&Utc));
        if days_until_expiry <= EXPIRY_WARNING_DAYS {
            reasons.push(format!("Expires in {days_until_expiry} days"));
            severity = severity.max(Severity::Medium);
        }
    }

    if reasons.is_empty() {
        return None;
    }

    Some(PositionAlert {
        position_id: p.id,
        market_title: m.title.clone(),
        direction: p.direction,
        current_value: to_f64(p.current_value.unwrap_or_default()),
        unrealized_pnl: to_f64(p.unrealized_pnl.unwrap_or_default()),
        cost_basis: to_f64(p.cost_basis),
        thesis_status: p.thesis_status,
        severity,
        reasons,
        cluster: cluster.map(|c| c.name.clone()),
    })
}

/// Most severe first; ties keep their input order.
pub fn rank_alerts(mut alerts: Vec<PositionAlert>, now: DateTime<Utc>) -> AttentionReport {
    alerts.sort_by(|a, b| b.severity.cmp(&a.severity));
    AttentionReport {
        count: alerts.len(),
        has_critical: alerts.iter().any(|a| a.severity == Severity::Critical),
        has_high: alerts.iter().any(|a| a.severity == Severity::High),
        alerts,
        checked_at: now,
    }
}

pub fn build_review(rows: &[(position::Model, market::Model)], today: NaiveDate) -> ReviewStatus {
    let weekday = today.weekday().num_days_from_monday();
    let monday = today - Duration::days(i64::from(weekday));

    let total_value: f64 = rows
        .iter()
        .map(|(p, _)| to_f64(p.current_value.unwrap_or_default()))
        .sum();
    let total_pnl: f64 = rows
        .iter()
        .map(|(p, _)| to_f64(p.unrealized_pnl.unwrap_or_default()))
        .sum();

    let positions: Vec<ReviewPosition> = rows
        .iter()
        .map(|(p, m)| {
            let cost = to_f64(p.cost_basis);
            let pnl = to_f64(p.unrealized_pnl.unwrap_or_default());
            ReviewPosition {
                market: m.title.clone(),
                direction: p.direction,
                entry_price: to_f64(p.entry_price),
                current_price: to_f64(p.current_price.unwrap_or_default()),
                pnl_pct: if cost > 0.0 { pnl / cost * 100.0 } else { 0.0 },
                thesis_status: p
                    .thesis_status
                    .map(|t| t.as_str().to_string())
                    .unwrap_or_else(|| "active".to_string()),
            }
        })
        .collect();

    let invested = total_value - total_pnl;
    let summary = ReviewPortfolioSummary {
        position_count: rows.len(),
        total_value,
        total_pnl,
        pnl_pct: if invested > 0.0 {
            total_pnl / invested * 100.0
        } else {
            0.0
        },
    };

    ReviewStatus {
        review_week_of: monday,
        review_due: weekday == 0,
        days_until_due: (7 - weekday) % 7,
        template: review_template(monday, &summary, &positions),
        portfolio_summary: summary,
        positions,
    }
}

fn review_template(
    monday: NaiveDate,
    summary: &ReviewPortfolioSummary,
    positions: &[ReviewPosition],
) -> String {
    let rows: Vec<String> = positions
        .iter()
        .map(|p| {
            let market: String = p.market.chars().take(30).collect();
            format!(
                "| {market} | {} | {:.2} | {:.2} | {:+.1}% | {} |",
                p.direction.as_str().to_uppercase(),
                p.entry_price,
                p.current_price,
                p.pnl_pct,
                p.thesis_status
            )
        })
        .collect();

    format!(
        "## Position Review: Week of {monday}\n\
         \n\
         ### Portfolio Summary\n\
         - **Total Value:** ${:.2}\n\
         - **Unrealized P&L:** ${:+.2}\n\
         - **Position Count:** {}\n\
         \n\
         ### Position Status\n\
         \n\
         | Market | Dir | Entry | Current | P&L % | Thesis |\n\
         |--------|-----|-------|---------|-------|--------|\n\
         {}\n\
         \n\
         ### Review Checklist\n\
         - [ ] All thesis statuses are current\n\
         - [ ] No positions exceed risk limits\n\
         - [ ] Upcoming catalysts have action plans\n\
         - [ ] Exit criteria are defined for each position\n",
        summary.total_value,
        summary.total_pnl,
        summary.position_count,
        rows.join("\n"),
    )
}

impl TrackerService {
    pub async fn positions_needing_attention(&self) -> ServiceResult<AttentionReport> {
        let now = Utc::now();
        let horizon = now + Duration::hours(CATALYST_HORIZON_HOURS);

        let rows = repo::get_open_positions_with_clusters(self.persist_ctx()).await?;
        let catalysts = repo::get_catalysts_between(
            self.persist_ctx(),
            now.fixed_offset(),
            horizon.fixed_offset(),
        )
        .await?;

        // soonest catalyst per cluster
        let mut catalysts_by_cluster: HashMap<i32, catalyst::Model> = HashMap::new();
        for (c, _) in catalysts {
            if let Some(cluster_id) = c.affected_cluster_id {
                catalysts_by_cluster.entry(cluster_id).or_insert(c);
            }
        }

        let alerts = rows
            .iter()
            .filter_map(|(p, m, c)| evaluate_position(p, m, c.as_ref(), &catalysts_by_cluster, now))
            .collect();
        Ok(rank_alerts(alerts, now))
    }

    pub async fn review_status(&self) -> ServiceResult<ReviewStatus> {
        let rows: Vec<(position::Model, market::Model)> =
            repo::get_open_positions_with_markets(self.persist_ctx())
                .await?
                .into_iter()
                .filter_map(|(p, m)| m.map(|m| (p, m)))
                .collect();
        Ok(build_review(&rows, Utc::now().date_naive()))
    }

    pub async fn alert_summary(&self) -> ServiceResult<AlertSummary> {
        let attention = self.positions_needing_attention().await?;
        let review = self.review_status().await?;
        Ok(AlertSummary {
            attention_count: attention.count,
            has_critical: attention.has_critical,
            has_high: attention.has_high,
            review_due: review.review_due,
            days_until_review: review.days_until_due,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::repo::common::fixtures::{cluster, dec, market, position, ts};

    fn now() -> DateTime<Utc> {
        ts(2025, 1, 8, 12).with_timezone(&Utc)
    }

    fn catalyst(cluster_id: i32, hours_from_now: i64) -> catalyst::Model {
        catalyst::Model {
            id: 1,
            title: "FOMC decision".into(),
            description: None,
            event_date: (now() + Duration::hours(hours_from_now)).fixed_offset(),
            affected_cluster_id: Some(cluster_id),
            risk_direction: None,
            recommended_action: None,
            action_taken: None,
            reminder_sent: None,
            created_at: None,
        }
    }

    #[test]
    fn healthy_position_has_no_alert() {
        let p = position(1, 1, "100", "0.5");
        assert!(evaluate_position(&p, &market(1, None), None, &HashMap::new(), now()).is_none());
    }

    #[test]
    fn drawdown_thresholds() {
        let mut p = position(1, 1, "100", "0.5");
        p.current_value = Some(dec("30"));
        let alert = evaluate_position(&p, &market(1, None), None, &HashMap::new(), now()).unwrap();
        assert_eq!(alert.severity, Severity::Medium);
        assert_eq!(alert.reasons, vec!["Drawdown: 40.0%".to_string()]);

        p.current_value = Some(dec("20"));
        let alert = evaluate_position(&p, &market(1, None), None, &HashMap::new(), now()).unwrap();
        assert_eq!(alert.severity, Severity::High);
    }

    #[test]
    fn thesis_status_drives_severity() {
        let mut p = position(1, 1, "100", "0.5");
        p.thesis_status = Some(ThesisStatus::Invalidated);
        let alert = evaluate_position(&p, &market(1, None), None, &HashMap::new(), now()).unwrap();
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(alert.reasons, vec!["Thesis: invalidated".to_string()]);

        p.thesis_status = Some(ThesisStatus::Weakened);
        let alert = evaluate_position(&p, &market(1, None), None, &HashMap::new(), now()).unwrap();
        assert_eq!(alert.severity, Severity::Medium);
    }

    #[test]
    fn weakened_thesis_does_not_lower_drawdown_severity() {
        let mut p = position(1, 1, "100", "0.5");
        p.current_value = Some(dec("10"));
        p.thesis_status = Some(ThesisStatus::Weakened);
        let alert = evaluate_position(&p, &market(1, None), None, &HashMap::new(), now()).unwrap();
        assert_eq!(alert.severity, Severity::High);
        assert_eq!(alert.reasons.len(), 2);
    }

    #[test]
    fn nearby_catalyst_in_cluster_is_high() {
        let p = position(1, 1, "100", "0.5");
        let c = cluster(7, "rates");
        let catalysts = HashMap::from([(7, catalyst(7, 30))]);
        let alert = evaluate_position(&p, &market(1, Some(7)), Some(&c), &catalysts, now()).unwrap();
        assert_eq!(alert.severity, Severity::High);
        assert_eq!(alert.reasons, vec!["Catalyst in 30h: FOMC decision".to_string()]);
        assert_eq!(alert.cluster.as_deref(), Some("rates"));
    }

    #[test]
    fn expiring_market_is_at_least_medium() {
        let p = position(1, 1, "100", "0.5");
        let mut m = market(1, None);
        m.end_date = Some((now() + Duration::hours(36)).fixed_offset());
        let alert = evaluate_position(&p, &m, None, &HashMap::new(), now()).unwrap();
        assert_eq!(alert.severity, Severity::Medium);
        assert_eq!(alert.reasons, vec!["Expires in 1 days".to_string()]);

        m.end_date = Some((now() - Duration::hours(1)).fixed_offset());
        let alert = evaluate_position(&p, &m, None, &HashMap::new(), now()).unwrap();
        assert_eq!(alert.reasons, vec!["Expires in -1 days".to_string()]);

        m.end_date = Some((now() + Duration::days(10)).fixed_offset());
        assert!(evaluate_position(&p, &m, None, &HashMap::new(), now()).is_none());
    }

    #[test]
    fn ranks_alerts_by_severity() {
        let m = market(1, None);
        let mut weak = position(1, 1, "100", "0.5");
        weak.thesis_status = Some(ThesisStatus::Weakened);
        let mut dead = position(2, 1, "100", "0.5");
        dead.thesis_status = Some(ThesisStatus::Invalidated);
        let mut degraded = position(3, 1, "100", "0.5");
        degraded.thesis_status = Some(ThesisStatus::Degraded);

        let alerts = [weak, dead, degraded]
            .iter()
            .filter_map(|p| evaluate_position(p, &m, None, &HashMap::new(), now()))
            .collect();
        let report = rank_alerts(alerts, now());

        let order: Vec<i32> = report.alerts.iter().map(|a| a.position_id).collect();
        assert_eq!(order, vec![2, 3, 1]);
        assert!(report.has_critical);
        assert!(report.has_high);
        assert_eq!(report.count, 3);
    }

    #[test]
    fn review_is_due_on_mondays() {
        let monday = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        let review = build_review(&[], monday);
        assert!(review.review_due);
        assert_eq!(review.days_until_due, 0);
        assert_eq!(review.review_week_of, monday);

        let thursday = NaiveDate::from_ymd_opt(2025, 1, 9).unwrap();
        let review = build_review(&[], thursday);
        assert!(!review.review_due);
        assert_eq!(review.days_until_due, 4);
        assert_eq!(review.review_week_of, monday);
        assert_eq!(review.portfolio_summary.pnl_pct, 0.0);
    }

    #[test]
    fn review_template_lists_positions() {
        let mut p = position(1, 1, "100", "0.40");
        p.current_price = Some(dec("0.50"));
        p.current_value = Some(dec("50"));
        p.unrealized_pnl = Some(dec("10"));
        let mut m = market(1, None);
        m.title = "Will the Fed cut rates in March 2025 meeting?".into();

        let review = build_review(&[(p, m)], NaiveDate::from_ymd_opt(2025, 1, 8).unwrap());
        assert_eq!(review.portfolio_summary.total_value, 50.0);
        assert_eq!(review.portfolio_summary.pnl_pct, 25.0);
        assert_eq!(review.positions[0].pnl_pct, 25.0);

        assert!(review.template.starts_with("## Position Review: Week of 2025-01-06\n"));
        assert!(review.template.contains("- **Unrealized P&L:** $+10.00\n"));
        assert!(
            review
                .template
                .contains("| Will the Fed cut rates in Marc | YES | 0.40 | 0.50 | +25.0% | intact |")
        );
        assert!(review.template.ends_with("- [ ] Exit criteria are defined for each position\n"));
    }
}
