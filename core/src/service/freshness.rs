//! Research freshness: how quickly information about a market goes stale,
//! and whether the research notes on disk are still inside that window.

use std::fs;
use std::path::Path;

use anyhow::anyhow;
use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use log::{debug, warn};
use serde::Serialize;
use serde_yaml::Value;

use crate::error::{ServiceError, ServiceResult};
use crate::service::TrackerService;

const META_FILE: &str = "_meta.yaml";
const DEFAULT_DECAY: &str = "7d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    Corporate,
    Ipo,
    Tech,
    Geopolitical,
    Housing,
    Climate,
    Default,
}

impl MarketType {
    pub fn as_str(self) -> &'static str {
        match self {
            MarketType::Corporate => "corporate",
            MarketType::Ipo => "ipo",
            MarketType::Tech => "tech",
            MarketType::Geopolitical => "geopolitical",
            MarketType::Housing => "housing",
            MarketType::Climate => "climate",
            MarketType::Default => "default",
        }
    }

    pub fn max_stale_hours(self) -> i64 {
        match self {
            MarketType::Corporate | MarketType::Ipo | MarketType::Tech => 48,
            MarketType::Geopolitical | MarketType::Default => 7 * 24,
            MarketType::Housing | MarketType::Climate => 14 * 24,
        }
    }

    pub fn is_fast_decay(self) -> bool {
        matches!(
            self,
            MarketType::Corporate | MarketType::Ipo | MarketType::Tech
        )
    }
}

const MARKET_KEYWORDS: &[(MarketType, &[&str])] = &[
    (MarketType::Ipo, &["ipo", "spacex", "openai", "anthropic"]),
    (MarketType::Tech, &["tech", "ai-model", "deepseek", "chatgpt"]),
    (
        MarketType::Geopolitical,
        &["iran", "russia", "china", "ukraine", "regime", "strike"],
    ),
    (
        MarketType::Housing,
        &["housing", "home-value", "median-home", "zillow", "parcl"],
    ),
    (
        MarketType::Climate,
        &["climate", "temperature", "hottest", "warming"],
    ),
];

/// Infers the market type from keywords in its slug; first match wins.
pub fn market_type(slug: &str) -> MarketType {
    let slug = slug.to_lowercase();
    MARKET_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| slug.contains(w)))
        .map(|(kind, _)| *kind)
        .unwrap_or(MarketType::Default)
}

/// Parses `<n><unit>` with unit `h`, `d`, `w` or `m` (30 days). Anything
/// else, including an empty string, means seven days.
pub fn parse_duration(raw: &str) -> Duration {
    let fallback = Duration::days(7);
    let raw = raw.trim().to_lowercase();
    let digits_end = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    if digits_end == 0 {
        return fallback;
    }
    let Ok(value) = raw[..digits_end].parse::<i64>() else {
        return fallback;
    };

    let parsed = match raw[digits_end..].chars().next() {
        Some('h') => Duration::try_hours(value),
        Some('d') => Duration::try_days(value),
        Some('w') => Duration::try_weeks(value),
        Some('m') => value.checked_mul(30).and_then(Duration::try_days),
        _ => None,
    };
    parsed.unwrap_or(fallback)
}

#[derive(Debug, Clone, Serialize)]
pub struct DecayRate {
    pub market_type: MarketType,
    pub max_stale_hours: i64,
    pub description: &'static str,
    pub action_if_stale: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecayRateTable {
    pub rates: Vec<DecayRate>,
    pub note: &'static str,
}

pub fn decay_rates() -> DecayRateTable {
    let rate = |market_type: MarketType,
                description: &'static str,
                action_if_stale: &'static str| DecayRate {
        market_type,
        max_stale_hours: market_type.max_stale_hours(),
        description,
        action_if_stale,
    };
    DecayRateTable {
        rates: vec![
            rate(
                MarketType::Corporate,
                "Corporate events, IPOs, M&A",
                "Must re-verify before entry",
            ),
            rate(
                MarketType::Ipo,
                "IPO-related markets",
                "Must re-verify before entry",
            ),
            rate(
                MarketType::Tech,
                "AI models, tech announcements",
                "Must re-verify before entry",
            ),
            rate(
                MarketType::Geopolitical,
                "Geopolitical events, conflicts",
                "Check for developments",
            ),
            rate(
                MarketType::Housing,
                "Housing price markets",
                "Usually OK, check for major shifts",
            ),
            rate(
                MarketType::Climate,
                "Climate and temperature markets",
                "Usually OK, check for data releases",
            ),
        ],
        note: "Based on SpaceX IPO loss - stale info can invalidate entire thesis",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NextCatalyst {
    pub event: Option<String>,
    pub date: String,
    pub days_until: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicFreshness {
    pub topic: String,
    pub description: String,
    pub status: String,
    pub is_fresh: bool,
    pub issues: Vec<String>,
    pub last_updated: Option<NaiveDateTime>,
    pub freshness_decay: String,
    pub next_catalyst: Option<NextCatalyst>,
    pub linked_market_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicReport {
    pub topics: Vec<TopicFreshness>,
    pub fresh_count: usize,
    pub stale_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub checked_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ClusterRef {
    pub name: String,
    pub primary_topic: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketFreshness {
    pub market: String,
    pub market_type: MarketType,
    pub max_stale_data_hours: f64,
    pub is_fast_decay: bool,
    pub recommendation: &'static str,
    pub issues: Vec<String>,
    pub cluster: Option<ClusterRef>,
    pub checked_at: NaiveDateTime,
}

fn yaml_str(meta: &Value, key: &str) -> Option<String> {
    match meta.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Dates in the notes are plain `YYYY-MM-DD`; full timestamps are accepted too.
fn parse_yaml_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.naive_utc())
        })
}

/// Freshness of one topic from its `_meta.yaml` contents.
pub fn evaluate_topic(dir_name: &str, meta: &Value, now: NaiveDateTime) -> TopicFreshness {
    let status = yaml_str(meta, "status").unwrap_or_else(|| "UNKNOWN".to_string());
    let freshness_decay = yaml_str(meta, "freshness_decay").unwrap_or_else(|| DEFAULT_DECAY.into());

    let mut topic = TopicFreshness {
        topic: yaml_str(meta, "topic").unwrap_or_else(|| dir_name.to_string()),
        description: yaml_str(meta, "description").unwrap_or_default(),
        status: status.clone(),
        is_fresh: true,
        issues: Vec::new(),
        last_updated: None,
        freshness_decay: freshness_decay.clone(),
        next_catalyst: None,
        linked_market_count: meta
            .get("linked_markets")
            .and_then(Value::as_sequence)
            .map_or(0, Vec::len),
    };

    if let Some(last_updated) = yaml_str(meta, "last_updated").and_then(|s| parse_yaml_date(&s)) {
        topic.last_updated = Some(last_updated);
        // a decay that runs past the calendar never expires
        let expires = last_updated
            .checked_add_signed(parse_duration(&freshness_decay))
            .unwrap_or(NaiveDateTime::MAX);
        if now > expires {
            let days_stale = (now - expires).num_days();
            topic.is_fresh = false;
            topic
                .issues
                .push(format!("{days_stale} days past decay threshold"));
        }
    }

    match status.as_str() {
        "STALE" => {
            topic.is_fresh = false;
            topic.issues.push("Marked as STALE".to_string());
        }
        "NEEDS_SEED" => {
            topic.is_fresh = false;
            topic.issues.push("Needs initial seeding".to_string());
        }
        _ => {}
    }

    let catalysts = meta
        .get("key_catalysts")
        .and_then(Value::as_sequence)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for catalyst in catalysts {
        let Some(date) = yaml_str(catalyst, "date").and_then(|s| parse_yaml_date(&s)) else {
            continue;
        };
        if date < now {
            continue;
        }
        let days_until = (date - now).num_days();
        let sooner = topic
            .next_catalyst
            .as_ref()
            .is_none_or(|current| days_until < current.days_until);
        if sooner {
            topic.next_catalyst = Some(NextCatalyst {
                event: yaml_str(catalyst, "event"),
                date: date.format("%Y-%m-%d").to_string(),
                days_until,
            });
        }
    }

    topic
}

/// Scans `topics_dir/*/_meta.yaml`. Stale topics sort first, then by name.
pub fn scan_topics(topics_dir: &Path, now: NaiveDateTime) -> TopicReport {
    let entries = match fs::read_dir(topics_dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("research directory {} unavailable: {e}", topics_dir.display());
            return TopicReport {
                topics: Vec::new(),
                fresh_count: 0,
                stale_count: 0,
                error: Some("Research directory not found".to_string()),
                checked_at: now,
            };
        }
    };

    let mut topics = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let meta_path = path.join(META_FILE);
        let Ok(raw) = fs::read_to_string(&meta_path) else {
            continue;
        };
        let meta: Value = match serde_yaml::from_str(&raw) {
            Ok(meta) => meta,
            Err(e) => {
                warn!("skipping unreadable {}: {e}", meta_path.display());
                continue;
            }
        };
        let dir_name = entry.file_name().to_string_lossy().into_owned();
        topics.push(evaluate_topic(&dir_name, &meta, now));
    }

    topics.sort_by(|a, b| (a.is_fresh, &a.topic).cmp(&(b.is_fresh, &b.topic)));
    let fresh_count = topics.iter().filter(|t| t.is_fresh).count();
    TopicReport {
        stale_count: topics.len() - fresh_count,
        fresh_count,
        topics,
        error: None,
        checked_at: now,
    }
}

/// Cluster in `clusters.yaml` whose market list contains `slug`. The file is
/// either `{clusters: {name: {...}}}` or the bare mapping.
pub fn find_cluster(clusters_file: &Path, slug: &str) -> Option<ClusterRef> {
    let raw = fs::read_to_string(clusters_file).ok()?;
    let data: Value = serde_yaml::from_str(&raw)
        .inspect_err(|e| warn!("failed to parse {}: {e}", clusters_file.display()))
        .ok()?;
    let clusters = data.get("clusters").unwrap_or(&data).as_mapping()?;

    clusters.iter().find_map(|(name, cluster)| {
        let listed = cluster
            .get("markets")
            .and_then(Value::as_sequence)
            .is_some_and(|markets| markets.iter().any(|m| m.as_str() == Some(slug)));
        listed.then(|| ClusterRef {
            name: name.as_str().map(str::to_string).unwrap_or_default(),
            primary_topic: yaml_str(cluster, "primary_topic"),
        })
    })
}

pub fn check_market(slug: &str, clusters_file: &Path, now: NaiveDateTime) -> MarketFreshness {
    let kind = market_type(slug);
    let mut result = MarketFreshness {
        market: slug.to_string(),
        market_type: kind,
        max_stale_data_hours: kind.max_stale_hours() as f64,
        is_fast_decay: kind.is_fast_decay(),
        recommendation: "proceed",
        issues: Vec::new(),
        cluster: find_cluster(clusters_file, slug),
        checked_at: now,
    };

    if result.is_fast_decay {
        result.issues.push(format!(
            "Fast-decay market ({}): verify news within 48h before entry",
            kind.as_str()
        ));
        result.recommendation = "verify_news";
    }
    result
}

impl TrackerService {
    pub async fn topic_freshness(&self) -> ServiceResult<TopicReport> {
        let dir = self.config().research.topics_dir();
        tokio::task::spawn_blocking(move || scan_topics(&dir, Utc::now().naive_utc()))
            .await
            .map_err(|e| ServiceError::Other(anyhow!("topic scan aborted: {e}")))
    }

    pub async fn market_freshness(&self, slug: &str) -> ServiceResult<MarketFreshness> {
        let file = self.config().research.clusters_file();
        let slug = slug.to_string();
        tokio::task::spawn_blocking(move || check_market(&slug, &file, Utc::now().naive_utc()))
            .await
            .map_err(|e| ServiceError::Other(anyhow!("market freshness check aborted: {e}")))
    }
}
