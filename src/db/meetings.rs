//! Meeting record store.
//!
//! Raw SQL over rusqlite, no ORM. Every status transition is a single
//! conditional UPDATE and the transcript append is a single `json_insert`,
//! so concurrent triggers resolve inside SQLite rather than in application
//! read-modify-write code.

use crate::db::init::{migrate, open_db};
use crate::meeting::status::{MeetingKind, MeetingStatus};
use crate::transcript::TranscriptEntry;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const MEETING_COLUMNS: &str = "id, bot_id, kind, name, meeting_url, status, \
     transcript_email, email_sent, created_at, updated_at, ended_at";

const TERMINAL_SET_SQL: &str = "('completed', 'inactive', 'failed')";

/// A meeting row, minus the transcript blob (fetched separately).
#[derive(Debug, Clone)]
pub struct MeetingRecord {
    pub id: String,
    pub bot_id: String,
    pub kind: MeetingKind,
    pub name: Option<String>,
    pub meeting_url: Option<String>,
    pub status: MeetingStatus,
    pub transcript_email: Option<String>,
    pub email_sent: bool,
    pub created_at: String,
    pub updated_at: String,
    pub ended_at: Option<String>,
}

/// Fields supplied when a meeting row is created.
#[derive(Debug, Clone)]
pub struct NewMeeting {
    pub bot_id: String,
    pub kind: MeetingKind,
    pub name: Option<String>,
    pub meeting_url: Option<String>,
    pub transcript_email: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("a live meeting already exists for bot {0}")]
    DuplicateLiveMeeting(String),
}

/// Cloneable handle to the meetings database.
///
/// Each call opens its own short-lived connection on the blocking pool; WAL
/// mode plus the busy timeout make that safe under concurrent callers.
#[derive(Clone)]
pub struct MeetingStore {
    db_path: Arc<PathBuf>,
}

impl MeetingStore {
    /// Open the store at `db_path`, running migrations.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        let conn = open_db(&db_path)?;
        migrate(&conn)?;
        Ok(Self {
            db_path: Arc::new(db_path),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db_path = Arc::clone(&self.db_path);
        tokio::task::spawn_blocking(move || {
            let conn = open_db(&db_path)?;
            f(&conn)
        })
        .await
        .context("Database task panicked")?
    }

    /// Insert a meeting row. Bot meetings start `joining`, sessions `active`.
    pub async fn create(&self, new: NewMeeting) -> Result<MeetingRecord> {
        self.with_conn(move |conn| {
            let id = uuid::Uuid::new_v4().to_string();
            let status = match new.kind {
                MeetingKind::Bot => MeetingStatus::Joining,
                MeetingKind::Session => MeetingStatus::Active,
            };

            let sql = format!(
                "INSERT INTO meetings (id, bot_id, kind, name, meeting_url, status, transcript_email)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 RETURNING {MEETING_COLUMNS}"
            );

            let result = conn.query_row(
                &sql,
                params![
                    id,
                    new.bot_id,
                    new.kind.as_str(),
                    new.name,
                    new.meeting_url,
                    status.as_str(),
                    new.transcript_email,
                ],
                Self::map_row,
            );

            match result {
                Ok(record) => Ok(record),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Err(StoreError::DuplicateLiveMeeting(new.bot_id).into())
                }
                Err(e) => Err(e).context("Failed to insert meeting"),
            }
        })
        .await
    }

    pub async fn get_by_id(&self, meeting_id: &str) -> Result<Option<MeetingRecord>> {
        let meeting_id = meeting_id.to_string();
        self.with_conn(move |conn| {
            let sql = format!("SELECT {MEETING_COLUMNS} FROM meetings WHERE id = ?1");
            conn.query_row(&sql, params![meeting_id], Self::map_row)
                .optional()
                .context("Failed to query meeting by id")
        })
        .await
    }

    /// Most recent meeting for `bot_id`, skipping any statuses in `exclude`.
    pub async fn get_by_bot_id(
        &self,
        bot_id: &str,
        exclude: &[MeetingStatus],
    ) -> Result<Option<MeetingRecord>> {
        let bot_id = bot_id.to_string();
        let exclude: Vec<MeetingStatus> = exclude.to_vec();
        self.with_conn(move |conn| {
            let mut sql = format!("SELECT {MEETING_COLUMNS} FROM meetings WHERE bot_id = ?1");
            if !exclude.is_empty() {
                let placeholders: Vec<String> =
                    (0..exclude.len()).map(|i| format!("?{}", i + 2)).collect();
                sql.push_str(&format!(" AND status NOT IN ({})", placeholders.join(", ")));
            }
            sql.push_str(" ORDER BY created_at DESC LIMIT 1");

            let mut query_params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(bot_id)];
            for status in &exclude {
                query_params.push(Box::new(status.as_str()));
            }
            let param_refs: Vec<&dyn rusqlite::ToSql> =
                query_params.iter().map(|p| p.as_ref()).collect();

            conn.query_row(&sql, param_refs.as_slice(), Self::map_row)
                .optional()
                .context("Failed to query meeting by bot id")
        })
        .await
    }

    /// Append one transcript entry atomically. Returns false when the
    /// meeting id matches no row; never errors for that case.
    pub async fn append_transcript(
        &self,
        meeting_id: &str,
        entry: &TranscriptEntry,
    ) -> Result<bool> {
        let meeting_id = meeting_id.to_string();
        let entry_json = serde_json::to_string(entry).context("Failed to serialize entry")?;
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE meetings
                     SET full_transcript = json_insert(full_transcript, '$[#]', json(?2)),
                         updated_at = CURRENT_TIMESTAMP
                     WHERE id = ?1",
                    params![meeting_id, entry_json],
                )
                .context("Failed to append transcript entry")?;
            Ok(changed > 0)
        })
        .await
    }

    /// Transcript entries for a meeting; `None` when the row is missing.
    pub async fn transcript(&self, meeting_id: &str) -> Result<Option<Vec<TranscriptEntry>>> {
        let meeting_id = meeting_id.to_string();
        self.with_conn(move |conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT full_transcript FROM meetings WHERE id = ?1",
                    params![meeting_id],
                    |row| row.get(0),
                )
                .optional()
                .context("Failed to query transcript")?;

            match raw {
                Some(text) => {
                    let entries: Vec<TranscriptEntry> = serde_json::from_str(&text)
                        .context("Failed to parse stored transcript")?;
                    Ok(Some(entries))
                }
                None => Ok(None),
            }
        })
        .await
    }

    /// Implicit joining → active promotion on first confirmed activity.
    pub async fn mark_active_if_joining(&self, bot_id: &str) -> Result<bool> {
        let bot_id = bot_id.to_string();
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE meetings SET status = 'active', updated_at = CURRENT_TIMESTAMP
                     WHERE bot_id = ?1 AND status = 'joining'",
                    params![bot_id],
                )
                .context("Failed to mark meeting active")?;
            Ok(changed > 0)
        })
        .await
    }

    /// Move the live row for `bot_id` to `status`. Returns the updated row,
    /// or `None` when no live row exists. `ended_at` is set once, on the
    /// first transition into a terminal status.
    pub async fn update_status(
        &self,
        bot_id: &str,
        status: MeetingStatus,
    ) -> Result<Option<MeetingRecord>> {
        let bot_id = bot_id.to_string();
        self.with_conn(move |conn| {
            let sql = format!(
                "UPDATE meetings
                 SET status = ?2,
                     updated_at = CURRENT_TIMESTAMP,
                     ended_at = CASE WHEN ?3 THEN COALESCE(ended_at, CURRENT_TIMESTAMP)
                                     ELSE ended_at END
                 WHERE bot_id = ?1 AND status NOT IN {TERMINAL_SET_SQL}
                 RETURNING {MEETING_COLUMNS}"
            );
            conn.query_row(
                &sql,
                params![bot_id, status.as_str(), status.is_terminal()],
                Self::map_row,
            )
            .optional()
            .context("Failed to update meeting status")
        })
        .await
    }

    /// Conditional transition: only fires while the row still holds
    /// `expected`. Returns whether a row changed.
    pub async fn update_status_if(
        &self,
        bot_id: &str,
        expected: MeetingStatus,
        status: MeetingStatus,
    ) -> Result<bool> {
        let bot_id = bot_id.to_string();
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE meetings
                     SET status = ?3,
                         updated_at = CURRENT_TIMESTAMP,
                         ended_at = CASE WHEN ?4 THEN COALESCE(ended_at, CURRENT_TIMESTAMP)
                                         ELSE ended_at END
                     WHERE bot_id = ?1 AND status = ?2",
                    params![
                        bot_id,
                        expected.as_str(),
                        status.as_str(),
                        status.is_terminal()
                    ],
                )
                .context("Failed to apply conditional status update")?;
            Ok(changed > 0)
        })
        .await
    }

    /// Atomically complete the live row for `bot_id`. Returns the completed
    /// row only when this call changed it; a second trigger gets `None`, so
    /// exactly one caller owns post-completion work.
    pub async fn complete_if_live(&self, bot_id: &str) -> Result<Option<MeetingRecord>> {
        let bot_id = bot_id.to_string();
        self.with_conn(move |conn| {
            let sql = format!(
                "UPDATE meetings
                 SET status = 'completed',
                     updated_at = CURRENT_TIMESTAMP,
                     ended_at = COALESCE(ended_at, CURRENT_TIMESTAMP)
                 WHERE bot_id = ?1 AND status NOT IN {TERMINAL_SET_SQL}
                 RETURNING {MEETING_COLUMNS}"
            );
            conn.query_row(&sql, params![bot_id], Self::map_row)
                .optional()
                .context("Failed to complete meeting")
        })
        .await
    }

    pub async fn mark_email_sent(&self, meeting_id: &str) -> Result<()> {
        let meeting_id = meeting_id.to_string();
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE meetings SET email_sent = 1, updated_at = CURRENT_TIMESTAMP
                     WHERE id = ?1",
                    params![meeting_id],
                )
                .context("Failed to mark email sent")?;
            anyhow::ensure!(changed > 0, "meeting {} not found", meeting_id);
            Ok(())
        })
        .await
    }

    /// Rows still joining/active whose `created_at` is older than `max_age`.
    pub async fn stuck_meetings(&self, max_age: Duration) -> Result<Vec<MeetingRecord>> {
        let modifier = format!("-{} seconds", max_age.as_secs());
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {MEETING_COLUMNS} FROM meetings
                 WHERE status IN ('joining', 'active') AND created_at < datetime('now', ?1)
                 ORDER BY created_at ASC"
            );
            let mut stmt = conn.prepare(&sql).context("Failed to prepare stuck query")?;
            let rows = stmt
                .query_map(params![modifier], Self::map_row)
                .context("Failed to query stuck meetings")?
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("Failed to map stuck meetings")?;
            Ok(rows)
        })
        .await
    }

    /// Bot ids of every live row, for liveness garbage collection.
    pub async fn live_bot_ids(&self) -> Result<Vec<String>> {
        self.with_conn(move |conn| {
            let sql =
                format!("SELECT bot_id FROM meetings WHERE status NOT IN {TERMINAL_SET_SQL}");
            let mut stmt = conn.prepare(&sql).context("Failed to prepare live-id query")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .context("Failed to query live bot ids")?
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("Failed to map live bot ids")?;
            Ok(ids)
        })
        .await
    }

    pub async fn list_live(&self) -> Result<Vec<MeetingRecord>> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {MEETING_COLUMNS} FROM meetings
                 WHERE status NOT IN {TERMINAL_SET_SQL}
                 ORDER BY created_at DESC"
            );
            let mut stmt = conn.prepare(&sql).context("Failed to prepare live query")?;
            let rows = stmt
                .query_map([], Self::map_row)
                .context("Failed to query live meetings")?
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("Failed to map live meetings")?;
            Ok(rows)
        })
        .await
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MeetingRecord> {
        let kind: String = row.get(2)?;
        let status: String = row.get(5)?;
        Ok(MeetingRecord {
            id: row.get(0)?,
            bot_id: row.get(1)?,
            kind: MeetingKind::parse(&kind).map_err(|_| rusqlite::Error::InvalidQuery)?,
            name: row.get(3)?,
            meeting_url: row.get(4)?,
            status: MeetingStatus::parse(&status).map_err(|_| rusqlite::Error::InvalidQuery)?,
            transcript_email: row.get(6)?,
            email_sent: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
            ended_at: row.get(10)?,
        })
    }
}
