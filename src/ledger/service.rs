use crate::analytics::{self, Analytics};
use crate::ledger::{
    DurableStore, EventFilter, EventUpdate, Evidence, LedgerError, LogParams, Outcome,
    PointSink, ScoredEvent, StoredUpdate,
};
use crate::notify::ChangeNotifier;
use crate::points::{self, PointBreakdown, ScoringContext};
use crate::taxonomy::{ActionType, ImpactLevel};
use chrono::Utc;
use uuid::Uuid;

/// The scoring engine. Explicitly constructed with its collaborators; owns
/// the event lifecycle, delegates durability and fan-out.
pub struct ActionLedger<S, P, N> {
    store: S,
    sink: P,
    notifier: N,
}

impl<S, P, N> ActionLedger<S, P, N>
where
    S: DurableStore,
    P: PointSink,
    N: ChangeNotifier,
{
    pub fn new(store: S, sink: P, notifier: N) -> Self {
        Self {
            store,
            sink,
            notifier,
        }
    }

    /// Score and persist one action. At-most-once: a failed insert is
    /// surfaced as-is, never retried, since a retry could double-award.
    pub fn log(&self, params: LogParams) -> Result<ScoredEvent, LedgerError> {
        if params.subject_id.trim().is_empty() {
            return Err(LedgerError::Validation("subject_id"));
        }
        if params.description.trim().is_empty() {
            return Err(LedgerError::Validation("description"));
        }

        let breakdown = points::compute(
            params.action_type,
            params.impact_level,
            &ScoringContext {
                deal_size: params.context.deal_size,
                stakeholder_level: params.context.stakeholder_level,
                duration_minutes: params.context.duration_minutes,
            },
        );

        let now = Utc::now();
        let event = ScoredEvent {
            id: Uuid::new_v4().to_string(),
            subject_id: params.subject_id,
            action_type: params.action_type,
            category: params.category,
            subcategory: params.subcategory,
            description: params.description,
            impact_level: params.impact_level,
            base_points: breakdown.base_points,
            multiplier: breakdown.multiplier,
            total_points: breakdown.total_points,
            action_date: params.action_date.unwrap_or(now),
            context: params.context,
            evidence: Evidence {
                link: params.evidence_link,
                evidence_type: params.evidence_type,
                verified: false,
                verified_by: None,
                verified_at: None,
            },
            outcome: Outcome::default(),
            metadata: params.metadata,
            created_at: now,
            updated_at: now,
        };

        self.store.insert(&event)?;

        // The event is already durable; a sink fault must not undo the log.
        let reason = format!("{}: {}", event.action_type, event.description);
        if let Err(err) = self
            .sink
            .award(&event.subject_id, event.total_points, &reason)
        {
            tracing::warn!(subject = %event.subject_id, event = %event.id, %err, "point award failed");
        }

        self.notifier.publish(&event.subject_id, &event);
        Ok(event)
    }

    /// Mark an event as validated by a third party. Re-verification is
    /// last-write-wins on verifier and timestamp; points are never rescored.
    pub fn verify(&self, event_id: &str, verifier_id: &str) -> Result<ScoredEvent, LedgerError> {
        let now = Utc::now();
        let fields = StoredUpdate {
            verified: Some(true),
            verified_by: Some(verifier_id.to_string()),
            verified_at: Some(now),
            ..StoredUpdate::at(now)
        };
        let event = self.store.update_fields(event_id, &fields)?;
        self.notifier.publish(&event.subject_id, &event);
        Ok(event)
    }

    /// Mutate non-scoring fields. `EventUpdate` cannot express scoring fields
    /// or category, so write-once holds by construction.
    pub fn update(&self, event_id: &str, update: EventUpdate) -> Result<ScoredEvent, LedgerError> {
        let fields = StoredUpdate {
            description: update.description,
            subcategory: update.subcategory,
            evidence_link: update.evidence_link,
            evidence_type: update.evidence_type,
            outcome_achieved: update.outcome_achieved,
            outcome_description: update.outcome_description,
            follow_up_required: update.follow_up_required,
            follow_up_date: update.follow_up_date,
            metadata: update.metadata,
            ..StoredUpdate::at(Utc::now())
        };
        let event = self.store.update_fields(event_id, &fields)?;
        self.notifier.publish(&event.subject_id, &event);
        Ok(event)
    }

    /// Read path: action_date descending, insertion order on ties.
    pub fn query(
        &self,
        subject_id: &str,
        filter: &EventFilter,
    ) -> Result<Vec<ScoredEvent>, LedgerError> {
        self.store.find(subject_id, filter)
    }

    /// One fetch, everything derived from that snapshot. Store failures
    /// propagate unwrapped.
    pub fn compute_analytics(&self, subject_id: &str) -> Result<Analytics, LedgerError> {
        let events = self.store.find(subject_id, &EventFilter::default())?;
        Ok(analytics::compute(&events, Utc::now()))
    }

    /// Projected score for a not-yet-logged action. No side effects.
    pub fn preview(
        &self,
        action: ActionType,
        impact: ImpactLevel,
        ctx: &ScoringContext,
    ) -> PointBreakdown {
        points::compute(action, impact, ctx)
    }
}
