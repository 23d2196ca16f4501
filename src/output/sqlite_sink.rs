//! SQLite sink
//!
//! Every run gets a row in `runs`; every terminal frontier item a row in
//! `records`. Run statistics are written back when the run finishes so the
//! CLI can print them later with `--stats`.

use crate::output::stats::{CrawlStatistics, RejectionCounts};
use crate::output::traits::{CrawlRecord, FinalOutcome, Sink, SinkError, SinkResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per crawl run
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    pages_succeeded INTEGER NOT NULL DEFAULT 0,
    pages_failed INTEGER NOT NULL DEFAULT 0,
    pages_aborted INTEGER NOT NULL DEFAULT 0,
    total_attempts INTEGER NOT NULL DEFAULT 0,
    links_discovered INTEGER NOT NULL DEFAULT 0,
    urls_accepted INTEGER NOT NULL DEFAULT 0,
    rejected_duplicate INTEGER NOT NULL DEFAULT 0,
    rejected_capacity INTEGER NOT NULL DEFAULT 0,
    rejected_foreign_host INTEGER NOT NULL DEFAULT 0,
    rejected_binary INTEGER NOT NULL DEFAULT 0,
    rejected_invalid INTEGER NOT NULL DEFAULT 0,
    budget_pauses INTEGER NOT NULL DEFAULT 0
);

-- One row per terminal frontier item, in completion order
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    url TEXT NOT NULL,
    outcome TEXT NOT NULL,
    status_code INTEGER,
    content_type TEXT,
    failure_reason TEXT,
    attempts INTEGER NOT NULL,
    body_size INTEGER,
    body BLOB,
    completed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_records_run ON records(run_id);
CREATE INDEX IF NOT EXISTS idx_records_outcome ON records(outcome);
"#;

const STATUS_RUNNING: &str = "running";
const STATUS_COMPLETED: &str = "completed";
const STATUS_ABORTED: &str = "aborted";

/// Initializes the database schema; safe to call on an existing database
pub fn initialize_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)
}

/// Records crawl results into a SQLite database
pub struct SqliteSink {
    conn: Mutex<Connection>,
    run_id: i64,
}

impl SqliteSink {
    /// Opens (or creates) the database and starts a new run
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `config_hash` - Hash of the configuration that produced this run
    pub fn open(path: &Path, config_hash: &str) -> SinkResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;
        Self::start(conn, config_hash)
    }

    /// In-memory database, mostly for tests
    pub fn in_memory(config_hash: &str) -> SinkResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::start(conn, config_hash)
    }

    fn start(conn: Connection, config_hash: &str) -> SinkResult<Self> {
        initialize_schema(&conn)?;
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![Utc::now().to_rfc3339(), config_hash, STATUS_RUNNING],
        )?;
        let run_id = conn.last_insert_rowid();
        tracing::debug!(run_id, "Started run in database");

        Ok(Self {
            conn: Mutex::new(conn),
            run_id,
        })
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// Number of records stored for this run
    pub fn record_count(&self) -> SinkResult<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM records WHERE run_id = ?1",
            params![self.run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Sink for SqliteSink {
    async fn record(&self, record: CrawlRecord) -> SinkResult<()> {
        let (status_code, content_type, failure_reason) = match &record.outcome {
            FinalOutcome::Succeeded {
                status,
                content_type,
            } => (Some(i64::from(*status)), content_type.clone(), None),
            FinalOutcome::Failed { reason } => (None, None, Some(reason.clone())),
            FinalOutcome::Aborted => (None, None, None),
        };
        let body_size = record.body.as_ref().map(|b| b.len() as i64);

        self.conn().execute(
            "INSERT INTO records (run_id, url, outcome, status_code, content_type, failure_reason, attempts, body_size, body, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                self.run_id,
                record.url.as_str(),
                record.outcome.label(),
                status_code,
                content_type,
                failure_reason,
                i64::from(record.attempts),
                body_size,
                record.body,
                record.completed_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn finish(&self, stats: &CrawlStatistics) -> SinkResult<()> {
        let status = if stats.cancelled {
            STATUS_ABORTED
        } else {
            STATUS_COMPLETED
        };
        let finished_at = stats.finished_at.unwrap_or_else(Utc::now);

        self.conn().execute(
            "UPDATE runs SET
                started_at = ?1, finished_at = ?2, status = ?3,
                pages_succeeded = ?4, pages_failed = ?5, pages_aborted = ?6,
                total_attempts = ?7, links_discovered = ?8, urls_accepted = ?9,
                rejected_duplicate = ?10, rejected_capacity = ?11,
                rejected_foreign_host = ?12, rejected_binary = ?13, rejected_invalid = ?14,
                budget_pauses = ?15
             WHERE id = ?16",
            params![
                stats.started_at.to_rfc3339(),
                finished_at.to_rfc3339(),
                status,
                stats.pages_succeeded as i64,
                stats.pages_failed as i64,
                stats.pages_aborted as i64,
                stats.total_attempts as i64,
                stats.links_discovered as i64,
                stats.urls_accepted as i64,
                stats.rejections.duplicate as i64,
                stats.rejections.capacity as i64,
                stats.rejections.foreign_host as i64,
                stats.rejections.binary_resource as i64,
                stats.rejections.invalid as i64,
                stats.budget_pauses as i64,
                self.run_id,
            ],
        )?;
        tracing::debug!(run_id = self.run_id, status, "Run finished in database");
        Ok(())
    }
}

/// Loads the statistics of the most recent run in a database
///
/// Returns `Ok(None)` when the database holds no runs. A missing file is an
/// error; it is never created here.
pub fn load_statistics(path: &Path) -> SinkResult<Option<CrawlStatistics>> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;

    let row = conn
        .query_row(
            "SELECT started_at, finished_at, status,
                    pages_succeeded, pages_failed, pages_aborted,
                    total_attempts, links_discovered, urls_accepted,
                    rejected_duplicate, rejected_capacity,
                    rejected_foreign_host, rejected_binary, rejected_invalid,
                    budget_pauses
             FROM runs ORDER BY id DESC LIMIT 1",
            [],
            |row| {
                let counts: Vec<i64> = (3..15usize)
                    .map(|i| row.get::<_, i64>(i))
                    .collect::<Result<_, _>>()?;
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                    counts,
                ))
            },
        )
        .optional()?;

    let Some((started_at, finished_at, status, counts)) = row else {
        return Ok(None);
    };
    let count = |i: usize| counts.get(i).copied().unwrap_or(0).max(0) as u64;

    Ok(Some(CrawlStatistics {
        started_at: parse_timestamp(&started_at)?,
        finished_at: finished_at.as_deref().map(parse_timestamp).transpose()?,
        pages_succeeded: count(0),
        pages_failed: count(1),
        pages_aborted: count(2),
        total_attempts: count(3),
        links_discovered: count(4),
        urls_accepted: count(5),
        rejections: RejectionCounts {
            duplicate: count(6),
            capacity: count(7),
            foreign_host: count(8),
            binary_resource: count(9),
            invalid: count(10),
        },
        budget_pauses: count(11),
        cancelled: status == STATUS_ABORTED,
    }))
}

fn parse_timestamp(value: &str) -> SinkResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| SinkError::Corrupt(format!("bad timestamp '{}': {}", value, e)))
}
