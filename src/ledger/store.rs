use crate::ledger::{
    AwardError, DurableStore, EventContext, EventFilter, Evidence, LedgerError, Outcome,
    PointSink, ScoredEvent, StoredUpdate, schema,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use std::path::Path;
use std::str::FromStr;

const EVENT_COLUMNS: &str = "id, subject_id, action_type, category, subcategory, description, \
     impact_level, base_points, multiplier, total_points, action_date, deal_size, \
     stakeholder_level, industry, duration_minutes, evidence_link, evidence_type, verified, \
     verified_by, verified_at, outcome_achieved, outcome_description, follow_up_required, \
     follow_up_date, metadata_json, created_at, updated_at";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create db parent dir {}", parent.display()))?;
        }
        let conn =
            Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    pub fn get(&self, id: &str) -> Result<Option<ScoredEvent>, LedgerError> {
        self.conn
            .query_row(
                &format!("SELECT {EVENT_COLUMNS} FROM actions WHERE id = ?1"),
                params![id],
                event_from_row,
            )
            .optional()
            .map_err(|e| LedgerError::Persistence(e.into()))
    }
}

impl DurableStore for SqliteStore {
    fn insert(&self, event: &ScoredEvent) -> Result<(), LedgerError> {
        let metadata = serde_json::to_string(&event.metadata)
            .map_err(|e| LedgerError::Persistence(e.into()))?;
        self.conn
            .execute(
                &format!(
                    "INSERT INTO actions ({EVENT_COLUMNS}) VALUES \
                     (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, \
                      ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27)"
                ),
                params![
                    event.id,
                    event.subject_id,
                    event.action_type.as_str(),
                    event.category.as_str(),
                    event.subcategory,
                    event.description,
                    event.impact_level.as_str(),
                    event.base_points,
                    event.multiplier,
                    event.total_points,
                    event.action_date.to_rfc3339(),
                    event.context.deal_size.map(|d| d.as_str()),
                    event.context.stakeholder_level.map(|s| s.as_str()),
                    event.context.industry,
                    event.context.duration_minutes,
                    event.evidence.link,
                    event.evidence.evidence_type,
                    event.evidence.verified,
                    event.evidence.verified_by,
                    event.evidence.verified_at.map(|t| t.to_rfc3339()),
                    event.outcome.achieved,
                    event.outcome.description,
                    event.outcome.follow_up_required,
                    event.outcome.follow_up_date.map(|t| t.to_rfc3339()),
                    metadata,
                    event.created_at.to_rfc3339(),
                    event.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| LedgerError::Persistence(e.into()))?;
        Ok(())
    }

    fn update_fields(&self, id: &str, fields: &StoredUpdate) -> Result<ScoredEvent, LedgerError> {
        let mut sets = vec!["updated_at = ?1".to_string()];
        let mut args: Vec<SqlValue> = vec![SqlValue::Text(fields.updated_at.to_rfc3339())];

        fn push(sets: &mut Vec<String>, args: &mut Vec<SqlValue>, col: &str, v: SqlValue) {
            args.push(v);
            sets.push(format!("{col} = ?{}", args.len()));
        }
        if let Some(v) = &fields.description {
            push(&mut sets, &mut args, "description", SqlValue::Text(v.clone()));
        }
        if let Some(v) = &fields.subcategory {
            push(&mut sets, &mut args, "subcategory", SqlValue::Text(v.clone()));
        }
        if let Some(v) = &fields.evidence_link {
            push(&mut sets, &mut args, "evidence_link", SqlValue::Text(v.clone()));
        }
        if let Some(v) = &fields.evidence_type {
            push(&mut sets, &mut args, "evidence_type", SqlValue::Text(v.clone()));
        }
        if let Some(v) = fields.verified {
            push(&mut sets, &mut args, "verified", SqlValue::Integer(v.into()));
        }
        if let Some(v) = &fields.verified_by {
            push(&mut sets, &mut args, "verified_by", SqlValue::Text(v.clone()));
        }
        if let Some(v) = fields.verified_at {
            push(&mut sets, &mut args, "verified_at", SqlValue::Text(v.to_rfc3339()));
        }
        if let Some(v) = fields.outcome_achieved {
            push(&mut sets, &mut args, "outcome_achieved", SqlValue::Integer(v.into()));
        }
        if let Some(v) = &fields.outcome_description {
            push(
                &mut sets,
                &mut args,
                "outcome_description",
                SqlValue::Text(v.clone()),
            );
        }
        if let Some(v) = fields.follow_up_required {
            push(
                &mut sets,
                &mut args,
                "follow_up_required",
                SqlValue::Integer(v.into()),
            );
        }
        if let Some(v) = fields.follow_up_date {
            push(
                &mut sets,
                &mut args,
                "follow_up_date",
                SqlValue::Text(v.to_rfc3339()),
            );
        }
        if let Some(v) = &fields.metadata {
            // Caller-owned map: merge key-by-key so adding one key never
            // drops keys recorded at log time.
            let current = self
                .get(id)?
                .ok_or_else(|| LedgerError::NotFound(id.to_string()))?;
            let mut merged = current.metadata;
            merged.extend(v.clone());
            let json =
                serde_json::to_string(&merged).map_err(|e| LedgerError::Persistence(e.into()))?;
            push(&mut sets, &mut args, "metadata_json", SqlValue::Text(json));
        }

        args.push(SqlValue::Text(id.to_string()));
        let sql = format!(
            "UPDATE actions SET {} WHERE id = ?{}",
            sets.join(", "),
            args.len()
        );
        let changed = self
            .conn
            .execute(&sql, params_from_iter(args))
            .map_err(|e| LedgerError::Persistence(e.into()))?;
        if changed == 0 {
            return Err(LedgerError::NotFound(id.to_string()));
        }
        self.get(id)?.ok_or_else(|| LedgerError::NotFound(id.to_string()))
    }

    fn find(&self, subject_id: &str, filter: &EventFilter) -> Result<Vec<ScoredEvent>, LedgerError> {
        let mut sql = format!("SELECT {EVENT_COLUMNS} FROM actions WHERE subject_id = ?1");
        let mut args: Vec<SqlValue> = vec![SqlValue::Text(subject_id.to_string())];

        if let Some(t) = filter.action_type {
            args.push(SqlValue::Text(t.as_str().to_string()));
            sql.push_str(&format!(" AND action_type = ?{}", args.len()));
        }
        if let Some(c) = filter.category {
            args.push(SqlValue::Text(c.as_str().to_string()));
            sql.push_str(&format!(" AND category = ?{}", args.len()));
        }
        if let Some(i) = filter.impact_level {
            args.push(SqlValue::Text(i.as_str().to_string()));
            sql.push_str(&format!(" AND impact_level = ?{}", args.len()));
        }
        if let Some(v) = filter.verified {
            args.push(SqlValue::Integer(v.into()));
            sql.push_str(&format!(" AND verified = ?{}", args.len()));
        }
        if let Some(since) = filter.since {
            args.push(SqlValue::Text(since.to_rfc3339()));
            sql.push_str(&format!(" AND action_date >= ?{}", args.len()));
        }
        if let Some(until) = filter.until {
            args.push(SqlValue::Text(until.to_rfc3339()));
            sql.push_str(&format!(" AND action_date <= ?{}", args.len()));
        }

        // Ties on action_date resolve by insertion order via seq.
        sql.push_str(" ORDER BY action_date DESC, seq ASC");
        if filter.limit.is_some() || filter.offset.is_some() {
            let limit = filter.limit.map(|n| n as i64).unwrap_or(-1);
            sql.push_str(&format!(" LIMIT {limit}"));
            if let Some(offset) = filter.offset {
                sql.push_str(&format!(" OFFSET {offset}"));
            }
        }

        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| LedgerError::Persistence(e.into()))?;
        let rows = stmt
            .query_map(params_from_iter(args), event_from_row)
            .map_err(|e| LedgerError::Persistence(e.into()))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| LedgerError::Persistence(e.into()))?;
        Ok(rows)
    }
}

/// Appends awards to a rollup table in the same database. Stands in for the
/// external competency point system during local use and tests.
pub struct SqlitePointSink {
    conn: Connection,
}

impl SqlitePointSink {
    pub fn open(path: &Path) -> Result<Self> {
        let conn =
            Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    pub fn total_for(&self, subject_id: &str) -> Result<i64> {
        let total = self.conn.query_row(
            "SELECT COALESCE(SUM(points), 0) FROM point_awards WHERE subject_id = ?1",
            params![subject_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }
}

impl PointSink for SqlitePointSink {
    fn award(&self, subject_id: &str, points: i64, reason: &str) -> Result<(), AwardError> {
        self.conn
            .execute(
                "INSERT INTO point_awards (subject_id, points, reason, awarded_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![subject_id, points, reason, Utc::now().to_rfc3339()],
            )
            .map_err(|e| AwardError {
                subject_id: subject_id.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<ScoredEvent> {
    let metadata_str: String = row.get(24)?;
    Ok(ScoredEvent {
        id: row.get(0)?,
        subject_id: row.get(1)?,
        action_type: parse_col(row, 2)?,
        category: parse_col(row, 3)?,
        subcategory: row.get(4)?,
        description: row.get(5)?,
        impact_level: parse_col(row, 6)?,
        base_points: row.get(7)?,
        multiplier: row.get(8)?,
        total_points: row.get(9)?,
        action_date: row.get::<_, DateTime<Utc>>(10)?,
        context: EventContext {
            deal_size: parse_opt_col(row, 11)?,
            stakeholder_level: parse_opt_col(row, 12)?,
            industry: row.get(13)?,
            duration_minutes: row.get(14)?,
        },
        evidence: Evidence {
            link: row.get(15)?,
            evidence_type: row.get(16)?,
            verified: row.get(17)?,
            verified_by: row.get(18)?,
            verified_at: row.get(19)?,
        },
        outcome: Outcome {
            achieved: row.get(20)?,
            description: row.get(21)?,
            follow_up_required: row.get(22)?,
            follow_up_date: row.get(23)?,
        },
        metadata: serde_json::from_str(&metadata_str).unwrap_or_default(),
        created_at: row.get(25)?,
        updated_at: row.get(26)?,
    })
}

fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            e.into(),
        )
    })
}

fn parse_opt_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr<Err = String>,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        s.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                e.into(),
            )
        })
    })
    .transpose()
}
