use rusqlite::{Connection, Result};

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS actions (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            subject_id TEXT NOT NULL,
            action_type TEXT NOT NULL,
            category TEXT NOT NULL,
            subcategory TEXT,
            description TEXT NOT NULL,
            impact_level TEXT NOT NULL CHECK(impact_level IN ('low','medium','high','critical')),
            base_points INTEGER NOT NULL,
            multiplier REAL NOT NULL,
            total_points INTEGER NOT NULL CHECK(total_points >= 0),
            action_date TEXT NOT NULL,
            deal_size TEXT,
            stakeholder_level TEXT,
            industry TEXT,
            duration_minutes INTEGER,
            evidence_link TEXT,
            evidence_type TEXT,
            verified INTEGER NOT NULL DEFAULT 0,
            verified_by TEXT,
            verified_at TEXT,
            outcome_achieved INTEGER NOT NULL DEFAULT 0,
            outcome_description TEXT,
            follow_up_required INTEGER NOT NULL DEFAULT 0,
            follow_up_date TEXT,
            metadata_json TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_actions_subject_date ON actions(subject_id, action_date);

        CREATE TABLE IF NOT EXISTS point_awards (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            subject_id TEXT NOT NULL,
            points INTEGER NOT NULL,
            reason TEXT NOT NULL,
            awarded_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_awards_subject ON point_awards(subject_id);
        ",
    )?;

    Ok(())
}
