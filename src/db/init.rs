use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

/// Open a connection to the meetings database at `db_path`.
///
/// Connections are short-lived (one per store call), so every open applies
/// the pragmas needed for concurrent readers and writers.
pub fn open_db(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let conn = Connection::open(db_path).context("Failed to open database connection")?;

    conn.pragma_update(None, "journal_mode", "WAL")
        .context("Failed to enable WAL mode")?;
    conn.busy_timeout(Duration::from_secs(5))
        .context("Failed to set busy timeout")?;

    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS meetings (
            id TEXT PRIMARY KEY,
            bot_id TEXT NOT NULL,
            kind TEXT NOT NULL DEFAULT 'bot',
            name TEXT,
            meeting_url TEXT,
            status TEXT NOT NULL DEFAULT 'joining',
            full_transcript TEXT NOT NULL DEFAULT '[]',
            transcript_email TEXT,
            email_sent INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            ended_at TIMESTAMP
        )",
        [],
    )
    .context("Failed to create meetings table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_meetings_status ON meetings(status)",
        [],
    )
    .context("Failed to create index on status")?;

    // At most one live row per bot id, guaranteed at the storage layer.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_meetings_live_bot
         ON meetings(bot_id) WHERE status IN ('joining', 'active', 'leaving')",
        [],
    )
    .context("Failed to create live-meeting index")?;

    Ok(())
}
