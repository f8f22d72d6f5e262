use crate::ledger::ScoredEvent;
use serde_json::json;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Fan-out for logged, verified, and updated events. Delivery semantics are
/// the implementation's concern; the ledger fires once per successful write.
pub trait ChangeNotifier {
    fn publish(&self, subject_id: &str, event: &ScoredEvent);
}

impl ChangeNotifier for Box<dyn ChangeNotifier> {
    fn publish(&self, subject_id: &str, event: &ScoredEvent) {
        (**self).publish(subject_id, event);
    }
}

/// Drops every notification. Default for callers that have no listeners.
pub struct NullNotifier;

impl ChangeNotifier for NullNotifier {
    fn publish(&self, _subject_id: &str, _event: &ScoredEvent) {}
}

/// Appends one JSON line per change to a mirror file so external consumers
/// can tail the ledger. Mirror faults must not fail the write that triggered
/// them, so they are logged and swallowed here.
pub struct NdjsonNotifier {
    path: PathBuf,
}

impl NdjsonNotifier {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn append(&self, subject_id: &str, event: &ScoredEvent) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = json!({
            "subject": subject_id,
            "event": event.id,
            "action": event.action_type,
            "points": event.total_points,
            "verified": event.evidence.verified,
            "updated_at": event.updated_at.to_rfc3339(),
        });
        writeln!(f, "{line}")?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ChangeNotifier for NdjsonNotifier {
    fn publish(&self, subject_id: &str, event: &ScoredEvent) {
        if let Err(err) = self.append(subject_id, event) {
            tracing::warn!(path = %self.path.display(), %err, "event mirror write failed");
        }
    }
}
