use chrono::{Duration, Utc};
use std::fs;
use tally::ledger::service::ActionLedger;
use tally::ledger::store::{SqlitePointSink, SqliteStore};
use tally::ledger::{EventFilter, EventUpdate, LedgerError, LogParams};
use tally::notify::{NdjsonNotifier, NullNotifier};
use tally::points;
use tally::taxonomy::{
    ActionType, CompetencyCategory, DealSizeRange, ImpactLevel, StakeholderLevel,
};
use tempfile::tempdir;

fn open_ledger(
    db_path: &std::path::Path,
) -> ActionLedger<SqliteStore, SqlitePointSink, NullNotifier> {
    let store = SqliteStore::open(db_path).unwrap();
    let sink = SqlitePointSink::open(db_path).unwrap();
    ActionLedger::new(store, sink, NullNotifier)
}

#[test]
fn log_then_query_round_trips_scoring() {
    let tmp = tempdir().unwrap();
    let ledger = open_ledger(&tmp.path().join("ledger.db"));

    let mut params = LogParams::new("u1", ActionType::DealClosure, "closed the Q3 renewal");
    params.impact_level = ImpactLevel::Critical;
    params.context.deal_size = Some(DealSizeRange::Over250K);
    params.context.stakeholder_level = Some(StakeholderLevel::Executive);
    let logged = ledger.log(params).unwrap();

    let standalone = points::compute(
        ActionType::DealClosure,
        ImpactLevel::Critical,
        &logged.scoring_context(),
    );
    assert_eq!(logged.base_points, 1000);
    assert_eq!(logged.multiplier, 5.4);
    assert_eq!(logged.total_points, 5400);
    assert_eq!(logged.total_points, standalone.total_points);

    let events = ledger.query("u1", &EventFilter::default()).unwrap();
    assert_eq!(events.len(), 1);
    let fetched = &events[0];
    assert_eq!(fetched.id, logged.id);
    assert_eq!(fetched.total_points, 5400);
    assert_eq!(fetched.category, CompetencyCategory::SalesExecution);
    assert_eq!(fetched.context.deal_size, Some(DealSizeRange::Over250K));
    assert!(!fetched.evidence.verified);
}

#[test]
fn query_orders_by_action_date_desc_with_insertion_tiebreak() {
    let tmp = tempdir().unwrap();
    let ledger = open_ledger(&tmp.path().join("ledger.db"));
    let base = Utc::now() - Duration::days(10);

    let mut older = LogParams::new("u1", ActionType::CustomerMeeting, "first");
    older.action_date = Some(base);
    let mut newer = LogParams::new("u1", ActionType::CustomerMeeting, "second");
    newer.action_date = Some(base + Duration::days(2));
    let mut tied_a = LogParams::new("u1", ActionType::CustomerMeeting, "tied first");
    tied_a.action_date = Some(base + Duration::days(5));
    let mut tied_b = LogParams::new("u1", ActionType::CustomerMeeting, "tied second");
    tied_b.action_date = Some(base + Duration::days(5));

    ledger.log(older).unwrap();
    ledger.log(newer).unwrap();
    ledger.log(tied_a).unwrap();
    ledger.log(tied_b).unwrap();

    let events = ledger.query("u1", &EventFilter::default()).unwrap();
    let descriptions: Vec<_> = events.iter().map(|e| e.description.as_str()).collect();
    assert_eq!(
        descriptions,
        vec!["tied first", "tied second", "second", "first"]
    );
}

#[test]
fn filters_and_pagination_narrow_the_read_path() {
    let tmp = tempdir().unwrap();
    let ledger = open_ledger(&tmp.path().join("ledger.db"));
    let base = Utc::now() - Duration::days(30);

    for i in 0..6 {
        let action = if i % 2 == 0 {
            ActionType::CustomerMeeting
        } else {
            ActionType::ProposalCreation
        };
        let mut params = LogParams::new("u1", action, &format!("action {i}"));
        params.action_date = Some(base + Duration::days(i));
        ledger.log(params).unwrap();
    }
    ledger
        .log(LogParams::new("u2", ActionType::DealClosure, "other subject"))
        .unwrap();

    let meetings = ledger
        .query(
            "u1",
            &EventFilter {
                action_type: Some(ActionType::CustomerMeeting),
                ..EventFilter::default()
            },
        )
        .unwrap();
    assert_eq!(meetings.len(), 3);

    let executing = ledger
        .query(
            "u1",
            &EventFilter {
                category: Some(CompetencyCategory::SalesExecution),
                ..EventFilter::default()
            },
        )
        .unwrap();
    assert_eq!(executing.len(), 3);

    let windowed = ledger
        .query(
            "u1",
            &EventFilter {
                since: Some(base + Duration::days(2)),
                until: Some(base + Duration::days(4)),
                ..EventFilter::default()
            },
        )
        .unwrap();
    assert_eq!(windowed.len(), 3);

    let page = ledger
        .query(
            "u1",
            &EventFilter {
                limit: Some(2),
                offset: Some(2),
                ..EventFilter::default()
            },
        )
        .unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].description, "action 3");
}

#[test]
fn log_awards_points_into_the_sink() {
    let tmp = tempdir().unwrap();
    let db_path = tmp.path().join("ledger.db");
    let ledger = open_ledger(&db_path);

    ledger
        .log(LogParams::new("u1", ActionType::ReferralGeneration, "intro to CFO"))
        .unwrap();
    ledger
        .log(LogParams::new("u1", ActionType::CustomerMeeting, "kickoff"))
        .unwrap();

    // 400 * 1.5 + 100 * 1.5
    let sink = SqlitePointSink::open(&db_path).unwrap();
    assert_eq!(sink.total_for("u1").unwrap(), 750);
    assert_eq!(sink.total_for("u2").unwrap(), 0);
}

#[test]
fn verify_round_trips_and_rejects_unknown_ids() {
    let tmp = tempdir().unwrap();
    let ledger = open_ledger(&tmp.path().join("ledger.db"));

    let logged = ledger
        .log(LogParams::new("u1", ActionType::CaseStudyDevelopment, "acme writeup"))
        .unwrap();
    let verified = ledger.verify(&logged.id, "mgr-7").unwrap();
    assert!(verified.evidence.verified);
    assert_eq!(verified.evidence.verified_by.as_deref(), Some("mgr-7"));
    assert_eq!(verified.total_points, logged.total_points);

    let only_verified = ledger
        .query(
            "u1",
            &EventFilter {
                verified: Some(true),
                ..EventFilter::default()
            },
        )
        .unwrap();
    assert_eq!(only_verified.len(), 1);

    let still_unverified = ledger
        .query(
            "u1",
            &EventFilter {
                verified: Some(false),
                ..EventFilter::default()
            },
        )
        .unwrap();
    assert!(still_unverified.is_empty());

    let err = ledger.verify("no-such-event", "mgr-7").unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));
}

#[test]
fn update_touches_only_non_scoring_fields() {
    let tmp = tempdir().unwrap();
    let ledger = open_ledger(&tmp.path().join("ledger.db"));

    let mut params = LogParams::new("u1", ActionType::RoiPresentation, "board deck");
    params.impact_level = ImpactLevel::High;
    let logged = ledger.log(params).unwrap();

    let follow_up = Utc::now() + Duration::days(7);
    let updated = ledger
        .update(
            &logged.id,
            EventUpdate {
                description: Some("board deck, revised".to_string()),
                outcome_achieved: Some(true),
                outcome_description: Some("budget approved".to_string()),
                follow_up_required: Some(true),
                follow_up_date: Some(follow_up),
                ..EventUpdate::default()
            },
        )
        .unwrap();

    assert_eq!(updated.description, "board deck, revised");
    assert!(updated.outcome.achieved);
    assert!(updated.outcome.follow_up_required);
    // Scoring and classification are write-once.
    assert_eq!(updated.action_type, logged.action_type);
    assert_eq!(updated.category, logged.category);
    assert_eq!(updated.impact_level, logged.impact_level);
    assert_eq!(updated.base_points, logged.base_points);
    assert_eq!(updated.multiplier, logged.multiplier);
    assert_eq!(updated.total_points, logged.total_points);

    let err = ledger
        .update("no-such-event", EventUpdate::default())
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));
}

#[test]
fn update_merges_metadata_without_dropping_logged_keys() {
    let tmp = tempdir().unwrap();
    let ledger = open_ledger(&tmp.path().join("ledger.db"));

    let mut params = LogParams::new("u1", ActionType::CustomerMeeting, "discovery call");
    params.metadata.insert(
        "skills_demonstrated".to_string(),
        serde_json::json!(["active listening"]),
    );
    let logged = ledger.log(params).unwrap();

    let mut lessons = serde_json::Map::new();
    lessons.insert(
        "lessons_learned".to_string(),
        serde_json::Value::String("ask budget early".to_string()),
    );
    let updated = ledger
        .update(
            &logged.id,
            EventUpdate {
                metadata: Some(lessons),
                ..EventUpdate::default()
            },
        )
        .unwrap();
    assert_eq!(
        updated.metadata["skills_demonstrated"],
        serde_json::json!(["active listening"])
    );
    assert_eq!(updated.metadata["lessons_learned"], "ask budget early");

    // A colliding key takes the update's value; the rest stays put.
    let mut revised = serde_json::Map::new();
    revised.insert(
        "lessons_learned".to_string(),
        serde_json::Value::String("confirm budget in writing".to_string()),
    );
    let updated = ledger
        .update(
            &logged.id,
            EventUpdate {
                metadata: Some(revised),
                ..EventUpdate::default()
            },
        )
        .unwrap();
    assert_eq!(
        updated.metadata["lessons_learned"],
        "confirm budget in writing"
    );
    assert!(updated.metadata.contains_key("skills_demonstrated"));
}

#[test]
fn reverification_is_last_write_wins_without_rescoring() {
    let tmp = tempdir().unwrap();
    let db_path = tmp.path().join("ledger.db");
    let ledger = open_ledger(&db_path);

    let logged = ledger
        .log(LogParams::new("u1", ActionType::ValuePropositionDelivery, "pitch"))
        .unwrap();
    let first = ledger.verify(&logged.id, "mgr-1").unwrap();
    let second = ledger.verify(&logged.id, "mgr-2").unwrap();

    assert!(second.evidence.verified);
    assert_eq!(second.evidence.verified_by.as_deref(), Some("mgr-2"));
    assert!(second.evidence.verified_at >= first.evidence.verified_at);
    assert_eq!(second.base_points, logged.base_points);
    assert_eq!(second.multiplier, logged.multiplier);
    assert_eq!(second.total_points, logged.total_points);

    // Exactly one award, from the original log.
    let sink = SqlitePointSink::open(&db_path).unwrap();
    assert_eq!(sink.total_for("u1").unwrap(), logged.total_points);
}

#[test]
fn analytics_reads_one_consistent_snapshot() {
    let tmp = tempdir().unwrap();
    let ledger = open_ledger(&tmp.path().join("ledger.db"));
    let base = Utc::now() - Duration::days(13);

    let mut closure = LogParams::new("u1", ActionType::DealClosure, "signed");
    closure.impact_level = ImpactLevel::Critical;
    closure.action_date = Some(base);
    ledger.log(closure).unwrap();

    for i in 1..=3 {
        let mut params = LogParams::new("u1", ActionType::CustomerMeeting, &format!("sync {i}"));
        params.action_date = Some(base + Duration::days(i * 3));
        ledger.log(params).unwrap();
    }

    let got = ledger.compute_analytics("u1").unwrap();
    assert_eq!(got.total_actions, 4);
    assert_eq!(got.total_points, 3000 + 3 * 150);
    assert_eq!(got.top_action_type, Some(ActionType::CustomerMeeting));
    let category_count: i64 = got.by_category.iter().map(|c| c.count).sum();
    assert_eq!(category_count, got.total_actions);
    // 4 events over 13 whole days, times 7: 2.2 per week.
    assert_eq!(got.learning_velocity, 2.2);

    let empty = ledger.compute_analytics("nobody").unwrap();
    assert_eq!(empty.total_actions, 0);
    assert_eq!(empty.by_category.len(), 3);
}

#[test]
fn ndjson_mirror_records_each_change() {
    let tmp = tempdir().unwrap();
    let db_path = tmp.path().join("ledger.db");
    let mirror_path = tmp.path().join("mirror.ndjson");
    let ledger = ActionLedger::new(
        SqliteStore::open(&db_path).unwrap(),
        SqlitePointSink::open(&db_path).unwrap(),
        NdjsonNotifier::new(mirror_path.clone()),
    );

    let logged = ledger
        .log(LogParams::new("u1", ActionType::ProspectQualification, "BANT check"))
        .unwrap();
    ledger.verify(&logged.id, "mgr-1").unwrap();

    let mirrored = fs::read_to_string(&mirror_path).unwrap();
    let lines: Vec<_> = mirrored.lines().collect();
    assert_eq!(lines.len(), 2);
    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["subject"], "u1");
    assert_eq!(first["points"], 225);
    assert_eq!(first["verified"], false);
    let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(second["verified"], true);
}
