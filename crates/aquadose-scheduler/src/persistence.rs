//! SQLite-backed persistence for schedules and the delivery audit trail.
//!
//! The attempt table is append-only: the engine writes one row per
//! attempt and never updates or deletes them. Progress is always the
//! sum of completed rows, so a restart cannot lose delivered volume.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::params;

use aquadose_core::error::{DoseError, Result};

use crate::deliveries::{
    AttemptRecord, AttemptStatus, CompletionReason, DeliveryMode, ScheduleSpec, ScheduleStatus,
    SubjectAssignment,
};

/// SQLite store for all scheduler data.
pub struct DoseDb {
    conn: rusqlite::Connection,
}

impl DoseDb {
    /// Open or create the database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = rusqlite::Connection::open(path)
            .map_err(|e| DoseError::Persistence(format!("db open: {e}")))?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Default database path (~/.aquadose/aquadose.db).
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".aquadose")
            .join("aquadose.db")
    }

    fn migrate(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
            -- Delivery schedules
            CREATE TABLE IF NOT EXISTS schedules (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                delivery_mode TEXT NOT NULL,     -- 'instant', 'staggered'
                window_start TEXT NOT NULL,
                window_end TEXT NOT NULL,
                subjects TEXT NOT NULL,          -- JSON array of assignments
                target_volume_ml REAL NOT NULL,
                cycles_per_window INTEGER,
                status TEXT NOT NULL DEFAULT 'pending',
                completion_reason TEXT,
                progress TEXT,                   -- JSON: subject -> delivered mL
                created_at TEXT NOT NULL,
                completed_at TEXT
            );

            -- Append-only delivery attempt audit trail
            CREATE TABLE IF NOT EXISTS delivery_attempts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                schedule_id TEXT NOT NULL,
                subject_id TEXT NOT NULL,
                channel_id INTEGER NOT NULL,
                requested_ml REAL NOT NULL,
                dispensed_ml REAL NOT NULL,
                trigger_count INTEGER NOT NULL,
                status TEXT NOT NULL,            -- 'completed', 'failed'
                error TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_attempts_subject
                ON delivery_attempts (schedule_id, subject_id);
         ",
            )
            .map_err(|e| DoseError::Persistence(format!("migration: {e}")))?;
        Ok(())
    }

    // ─── Schedules ──────────────────────────────────────

    /// Upsert a schedule and its status.
    pub fn save_schedule(&self, spec: &ScheduleSpec, status: ScheduleStatus) -> Result<()> {
        let subjects = serde_json::to_string(&spec.subjects)
            .map_err(|e| DoseError::Persistence(format!("serialize subjects: {e}")))?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO schedules
                 (id, name, delivery_mode, window_start, window_end, subjects,
                  target_volume_ml, cycles_per_window, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    spec.schedule_id,
                    spec.name,
                    spec.delivery_mode.as_str(),
                    spec.window_start.to_rfc3339(),
                    spec.window_end.to_rfc3339(),
                    subjects,
                    spec.target_volume_ml,
                    spec.cycles_per_window,
                    status.as_str(),
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| DoseError::Persistence(format!("save schedule: {e}")))?;
        Ok(())
    }

    /// Load one schedule with its stored status.
    pub fn load_schedule(&self, schedule_id: &str) -> Result<Option<(ScheduleSpec, ScheduleStatus)>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, delivery_mode, window_start, window_end, subjects,
                        target_volume_ml, cycles_per_window, status
                 FROM schedules WHERE id = ?1",
            )
            .map_err(|e| DoseError::Persistence(format!("load schedule: {e}")))?;

        let mut rows = stmt
            .query_map([schedule_id], row_to_schedule)
            .map_err(|e| DoseError::Persistence(format!("load schedule: {e}")))?;

        match rows.next() {
            Some(Ok(found)) => Ok(Some(found)),
            Some(Err(e)) => Err(DoseError::Persistence(format!("load schedule: {e}"))),
            None => Ok(None),
        }
    }

    /// Load every schedule persisted with the given status.
    pub fn load_schedules_by_status(&self, status: ScheduleStatus) -> Result<Vec<ScheduleSpec>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, delivery_mode, window_start, window_end, subjects,
                        target_volume_ml, cycles_per_window, status
                 FROM schedules WHERE status = ?1 ORDER BY created_at",
            )
            .map_err(|e| DoseError::Persistence(format!("load schedules: {e}")))?;

        let rows = stmt
            .query_map([status.as_str()], row_to_schedule)
            .map_err(|e| DoseError::Persistence(format!("load schedules: {e}")))?;

        let mut out = Vec::new();
        for row in rows {
            let (spec, _) = row.map_err(|e| DoseError::Persistence(format!("load schedules: {e}")))?;
            out.push(spec);
        }
        Ok(out)
    }

    /// Persist a status transition plus a per-subject progress snapshot.
    pub fn update_schedule_status(
        &self,
        schedule_id: &str,
        status: ScheduleStatus,
        progress: &HashMap<String, f64>,
        reason: Option<CompletionReason>,
    ) -> Result<()> {
        let snapshot = serde_json::to_string(progress)
            .map_err(|e| DoseError::Persistence(format!("serialize progress: {e}")))?;
        let completed_at = matches!(status, ScheduleStatus::Completed | ScheduleStatus::Failed)
            .then(|| Utc::now().to_rfc3339());
        self.conn
            .execute(
                "UPDATE schedules
                 SET status = ?1, progress = ?2, completion_reason = ?3, completed_at = ?4
                 WHERE id = ?5",
                params![
                    status.as_str(),
                    snapshot,
                    reason.map(|r| r.as_str()),
                    completed_at,
                    schedule_id,
                ],
            )
            .map_err(|e| DoseError::Persistence(format!("update schedule status: {e}")))?;
        Ok(())
    }

    /// Stored status and completion reason, mostly for diagnostics.
    pub fn schedule_status(
        &self,
        schedule_id: &str,
    ) -> Result<Option<(ScheduleStatus, Option<String>)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, completion_reason FROM schedules WHERE id = ?1")
            .map_err(|e| DoseError::Persistence(format!("schedule status: {e}")))?;
        let mut rows = stmt
            .query_map([schedule_id], |row| {
                Ok((
                    ScheduleStatus::parse(&row.get::<_, String>(0)?),
                    row.get::<_, Option<String>>(1)?,
                ))
            })
            .map_err(|e| DoseError::Persistence(format!("schedule status: {e}")))?;
        match rows.next() {
            Some(Ok(found)) => Ok(Some(found)),
            Some(Err(e)) => Err(DoseError::Persistence(format!("schedule status: {e}"))),
            None => Ok(None),
        }
    }

    // ─── Delivery attempts ──────────────────────────────────────

    /// Append one attempt row. Never updates or deletes.
    pub fn append_attempt(&self, record: &AttemptRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO delivery_attempts
                 (schedule_id, subject_id, channel_id, requested_ml, dispensed_ml,
                  trigger_count, status, error, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.schedule_id,
                    record.subject_id,
                    record.channel_id,
                    record.requested_ml,
                    record.dispensed_ml,
                    record.trigger_count,
                    record.status.as_str(),
                    record.error,
                    record.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| DoseError::Persistence(format!("append attempt: {e}")))?;
        Ok(())
    }

    /// Total volume confirmed delivered to one subject, in mL.
    pub fn sum_delivered(&self, schedule_id: &str, subject_id: &str) -> Result<f64> {
        self.conn
            .query_row(
                "SELECT COALESCE(SUM(dispensed_ml), 0.0) FROM delivery_attempts
                 WHERE schedule_id = ?1 AND subject_id = ?2 AND status = 'completed'",
                params![schedule_id, subject_id],
                |row| row.get(0),
            )
            .map_err(|e| DoseError::Persistence(format!("sum delivered: {e}")))
    }

    /// Every attempt row for one subject, oldest first.
    pub fn attempts_for(&self, schedule_id: &str, subject_id: &str) -> Result<Vec<AttemptRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT schedule_id, subject_id, channel_id, requested_ml, dispensed_ml,
                        trigger_count, status, error, created_at
                 FROM delivery_attempts
                 WHERE schedule_id = ?1 AND subject_id = ?2 ORDER BY id",
            )
            .map_err(|e| DoseError::Persistence(format!("attempts: {e}")))?;

        let rows = stmt
            .query_map(params![schedule_id, subject_id], |row| {
                let status: String = row.get(6)?;
                let created_at: String = row.get(8)?;
                Ok(AttemptRecord {
                    schedule_id: row.get(0)?,
                    subject_id: row.get(1)?,
                    channel_id: row.get(2)?,
                    requested_ml: row.get(3)?,
                    dispensed_ml: row.get(4)?,
                    trigger_count: row.get(5)?,
                    status: if status == "failed" {
                        AttemptStatus::Failed
                    } else {
                        AttemptStatus::Completed
                    },
                    error: row.get(7)?,
                    created_at: parse_rfc3339(&created_at),
                })
            })
            .map_err(|e| DoseError::Persistence(format!("attempts: {e}")))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| DoseError::Persistence(format!("attempts: {e}")))?);
        }
        Ok(out)
    }

    /// Recent attempts across all schedules, newest first, as JSON rows.
    pub fn recent_attempts(&self, limit: usize) -> Vec<serde_json::Value> {
        let mut stmt = match self.conn.prepare(
            "SELECT id, schedule_id, subject_id, channel_id, dispensed_ml, trigger_count,
                    status, error, created_at
             FROM delivery_attempts ORDER BY id DESC LIMIT ?1",
        ) {
            Ok(s) => s,
            Err(_) => return Vec::new(),
        };
        stmt.query_map([limit as i64], |row| {
            Ok(serde_json::json!({
                "id": row.get::<_, i64>(0)?,
                "schedule_id": row.get::<_, String>(1)?,
                "subject_id": row.get::<_, String>(2)?,
                "channel_id": row.get::<_, i64>(3)?,
                "dispensed_ml": row.get::<_, f64>(4)?,
                "trigger_count": row.get::<_, i64>(5)?,
                "status": row.get::<_, String>(6)?,
                "error": row.get::<_, Option<String>>(7)?,
                "created_at": row.get::<_, String>(8)?,
            }))
        })
        .ok()
        .map(|r| r.filter_map(|x| x.ok()).collect())
        .unwrap_or_default()
    }

    /// Drop the attempts table to simulate a broken store in tests.
    #[cfg(test)]
    pub(crate) fn break_attempts_table(&self) {
        self.conn
            .execute_batch("DROP TABLE delivery_attempts")
            .unwrap();
    }
}

type ScheduleRow = (ScheduleSpec, ScheduleStatus);

fn row_to_schedule(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScheduleRow> {
    let subjects_json: String = row.get(5)?;
    let subjects: Vec<SubjectAssignment> =
        serde_json::from_str(&subjects_json).unwrap_or_default();
    let window_start: String = row.get(3)?;
    let window_end: String = row.get(4)?;
    let mode: String = row.get(2)?;
    let status: String = row.get(8)?;
    Ok((
        ScheduleSpec {
            schedule_id: row.get(0)?,
            name: row.get(1)?,
            delivery_mode: DeliveryMode::parse(&mode),
            window_start: parse_rfc3339(&window_start),
            window_end: parse_rfc3339(&window_end),
            subjects,
            target_volume_ml: row.get(6)?,
            cycles_per_window: row.get(7)?,
        },
        ScheduleStatus::parse(&status),
    ))
}

fn parse_rfc3339(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
