pub mod schema;
pub mod service;
pub mod store;

use crate::points::ScoringContext;
use crate::taxonomy::{ActionType, CompetencyCategory, DealSizeRange, ImpactLevel, StakeholderLevel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("missing required field: {0}")]
    Validation(&'static str),
    #[error("event not found: {0}")]
    NotFound(String),
    #[error("durable store failure")]
    Persistence(#[source] anyhow::Error),
}

/// Failure of the best-effort competency point sink. Never escapes `log`.
#[derive(Debug, Error)]
#[error("point award failed for {subject_id}: {reason}")]
pub struct AwardError {
    pub subject_id: String,
    pub reason: String,
}

/// One scored real-world sales action. Scoring fields are written exactly once
/// at creation; later taxonomy changes never rewrite historical points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredEvent {
    pub id: String,
    pub subject_id: String,
    pub action_type: ActionType,
    pub category: CompetencyCategory,
    pub subcategory: Option<String>,
    pub description: String,
    pub impact_level: ImpactLevel,
    pub base_points: i64,
    pub multiplier: f64,
    pub total_points: i64,
    /// When the action happened, as opposed to when it was recorded.
    pub action_date: DateTime<Utc>,
    pub context: EventContext,
    pub evidence: Evidence,
    pub outcome: Outcome,
    /// Open caller-defined map (skills_demonstrated, lessons_learned, ...).
    /// Never consumed by scoring or aggregation.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScoredEvent {
    pub fn scoring_context(&self) -> ScoringContext {
        ScoringContext {
            deal_size: self.context.deal_size,
            stakeholder_level: self.context.stakeholder_level,
            duration_minutes: self.context.duration_minutes,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventContext {
    pub deal_size: Option<DealSizeRange>,
    pub stakeholder_level: Option<StakeholderLevel>,
    pub industry: Option<String>,
    pub duration_minutes: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Evidence {
    pub link: Option<String>,
    pub evidence_type: Option<String>,
    pub verified: bool,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Outcome {
    pub achieved: bool,
    pub description: Option<String>,
    pub follow_up_required: bool,
    pub follow_up_date: Option<DateTime<Utc>>,
}

/// Input to `ActionLedger::log`.
#[derive(Debug, Clone)]
pub struct LogParams {
    pub subject_id: String,
    pub action_type: ActionType,
    pub description: String,
    pub impact_level: ImpactLevel,
    /// Usually `action_type.default_category()`; callers may override for
    /// edge-case classification. Immutable afterwards.
    pub category: CompetencyCategory,
    pub subcategory: Option<String>,
    pub context: EventContext,
    pub evidence_link: Option<String>,
    pub evidence_type: Option<String>,
    pub metadata: Map<String, Value>,
    /// Defaults to now when absent.
    pub action_date: Option<DateTime<Utc>>,
}

impl LogParams {
    pub fn new(subject_id: &str, action_type: ActionType, description: &str) -> Self {
        Self {
            subject_id: subject_id.to_string(),
            action_type,
            description: description.to_string(),
            impact_level: ImpactLevel::default(),
            category: action_type.default_category(),
            subcategory: None,
            context: EventContext::default(),
            evidence_link: None,
            evidence_type: None,
            metadata: Map::new(),
            action_date: None,
        }
    }
}

/// Mutable slice of an event. Scoring fields and category have no
/// representation here, which is what makes them write-once.
#[derive(Debug, Clone, Default)]
pub struct EventUpdate {
    pub description: Option<String>,
    pub subcategory: Option<String>,
    pub evidence_link: Option<String>,
    pub evidence_type: Option<String>,
    pub outcome_achieved: Option<bool>,
    pub outcome_description: Option<String>,
    pub follow_up_required: Option<bool>,
    pub follow_up_date: Option<DateTime<Utc>>,
    /// Merged key-by-key into the stored map. Keys absent here survive; a
    /// colliding key takes the new value.
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub action_type: Option<ActionType>,
    pub category: Option<CompetencyCategory>,
    pub impact_level: Option<ImpactLevel>,
    pub verified: Option<bool>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Persisted fields a `verify` or `update` call may touch. Built internally by
/// the service, consumed by `DurableStore::update_fields`.
#[derive(Debug, Clone)]
pub struct StoredUpdate {
    pub description: Option<String>,
    pub subcategory: Option<String>,
    pub evidence_link: Option<String>,
    pub evidence_type: Option<String>,
    pub verified: Option<bool>,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub outcome_achieved: Option<bool>,
    pub outcome_description: Option<String>,
    pub follow_up_required: Option<bool>,
    pub follow_up_date: Option<DateTime<Utc>>,
    pub metadata: Option<Map<String, Value>>,
    pub updated_at: DateTime<Utc>,
}

impl StoredUpdate {
    /// All-empty update stamped with the mutation time.
    pub fn at(updated_at: DateTime<Utc>) -> Self {
        Self {
            description: None,
            subcategory: None,
            evidence_link: None,
            evidence_type: None,
            verified: None,
            verified_by: None,
            verified_at: None,
            outcome_achieved: None,
            outcome_description: None,
            follow_up_required: None,
            follow_up_date: None,
            metadata: None,
            updated_at,
        }
    }
}

/// Opaque durable persistence for scored events.
pub trait DurableStore {
    fn insert(&self, event: &ScoredEvent) -> Result<(), LedgerError>;
    /// Applies the set fields; `metadata` merges into the stored map rather
    /// than replacing it.
    fn update_fields(&self, id: &str, fields: &StoredUpdate) -> Result<ScoredEvent, LedgerError>;
    /// Ordered by action_date descending, ties by insertion order.
    fn find(&self, subject_id: &str, filter: &EventFilter) -> Result<Vec<ScoredEvent>, LedgerError>;
}

/// Downstream competency point award. Best-effort: a failed award must not
/// lose the already-durable event, so the service logs and moves on.
pub trait PointSink {
    fn award(&self, subject_id: &str, points: i64, reason: &str) -> Result<(), AwardError>;
}
