use crate::ledger::ScoredEvent;
use crate::taxonomy::{ActionType, CompetencyCategory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryStats {
    pub category: CompetencyCategory,
    pub count: i64,
    pub points: i64,
    pub avg_points: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeStats {
    pub action_type: ActionType,
    pub count: i64,
    pub points: i64,
    pub avg_points: i64,
}

/// Rollup of one subject's full event history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analytics {
    pub total_actions: i64,
    pub total_points: i64,
    pub verified_actions: i64,
    /// Always all three categories, in declaration order, zeros included.
    pub by_category: Vec<CategoryStats>,
    /// Only observed types, in first-encountered order.
    pub by_type: Vec<TypeStats>,
    /// At most five, most recent first.
    pub recent_actions: Vec<ScoredEvent>,
    /// Serialized as the type name, or the `"none"` sentinel when no events
    /// exist, never JSON null.
    #[serde(
        serialize_with = "top_type_to_json",
        deserialize_with = "top_type_from_json"
    )]
    pub top_action_type: Option<ActionType>,
    /// Events per week over the whole observed history.
    pub learning_velocity: f64,
    pub average_action_value: i64,
}

impl Analytics {
    pub fn empty() -> Self {
        Self {
            total_actions: 0,
            total_points: 0,
            verified_actions: 0,
            by_category: CompetencyCategory::ALL
                .into_iter()
                .map(|category| CategoryStats {
                    category,
                    count: 0,
                    points: 0,
                    avg_points: 0,
                })
                .collect(),
            by_type: Vec::new(),
            recent_actions: Vec::new(),
            top_action_type: None,
            learning_velocity: 0.0,
            average_action_value: 0,
        }
    }
}

/// Derive the full rollup from one already-fetched snapshot, assumed ordered
/// action_date descending. `now` is injected so velocity is testable.
pub fn compute(events: &[ScoredEvent], now: DateTime<Utc>) -> Analytics {
    // Empty history short-circuits to a stable all-zero shape. Required, not
    // cosmetic: velocity and averages below divide by observed history.
    if events.is_empty() {
        return Analytics::empty();
    }

    let total_actions = events.len() as i64;
    let total_points: i64 = events.iter().map(|e| e.total_points).sum();
    let verified_actions = events.iter().filter(|e| e.evidence.verified).count() as i64;

    let by_category = CompetencyCategory::ALL
        .into_iter()
        .map(|category| {
            let mut count = 0i64;
            let mut points = 0i64;
            for ev in events.iter().filter(|e| e.category == category) {
                count += 1;
                points += ev.total_points;
            }
            CategoryStats {
                category,
                count,
                points,
                avg_points: ratio(points, count),
            }
        })
        .collect();

    let mut by_type: Vec<TypeStats> = Vec::new();
    for ev in events {
        match by_type.iter_mut().find(|s| s.action_type == ev.action_type) {
            Some(stats) => {
                stats.count += 1;
                stats.points += ev.total_points;
            }
            None => by_type.push(TypeStats {
                action_type: ev.action_type,
                count: 1,
                points: ev.total_points,
                avg_points: 0,
            }),
        }
    }
    for stats in &mut by_type {
        stats.avg_points = ratio(stats.points, stats.count);
    }

    // Strict greater keeps the first-encountered type on ties.
    let mut top = &by_type[0];
    for stats in &by_type[1..] {
        if stats.count > top.count {
            top = stats;
        }
    }
    let top_action_type = Some(top.action_type);

    // Oldest event is the tail of the descending snapshot.
    let oldest = &events[events.len() - 1];
    let days = (now - oldest.action_date).num_days().max(1);
    let learning_velocity = round_1dp(total_actions as f64 / days as f64 * 7.0);

    Analytics {
        total_actions,
        total_points,
        verified_actions,
        by_category,
        by_type,
        recent_actions: events.iter().take(5).cloned().collect(),
        top_action_type,
        learning_velocity,
        average_action_value: ratio(total_points, total_actions),
    }
}

fn top_type_to_json<S>(value: &Option<ActionType>, ser: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match value {
        Some(t) => t.serialize(ser),
        None => ser.serialize_str("none"),
    }
}

fn top_type_from_json<'de, D>(de: D) -> Result<Option<ActionType>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(de)?;
    if raw == "none" {
        return Ok(None);
    }
    raw.parse().map(Some).map_err(serde::de::Error::custom)
}

fn ratio(points: i64, count: i64) -> i64 {
    if count == 0 {
        0
    } else {
        (points as f64 / count as f64).round() as i64
    }
}

fn round_1dp(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
