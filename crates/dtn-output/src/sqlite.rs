//! SQLite output backend (feature `sqlite`).
//!
//! Creates a single `report.db` file in the configured output directory with
//! three tables: `messages`, `stats` and `summary`.  Undefined ratios are
//! stored as `NULL`.

use std::path::Path;

use rusqlite::Connection;

use crate::writer::ReportWriter;
use crate::{MessageRow, OutputResult, RunSummary, StatsRow};

/// Writes reports to an SQLite database.
pub struct SqliteWriter {
    conn:     Connection,
    finished: bool,
}

impl SqliteWriter {
    /// Open (or create) `report.db` in `dir` and initialise the schema.
    pub fn new(dir: &Path) -> OutputResult<Self> {
        let conn = Connection::open(dir.join("report.db"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous  = NORMAL;
             CREATE TABLE IF NOT EXISTS messages (
                 msg          INTEGER PRIMARY KEY,
                 source       INTEGER NOT NULL,
                 created_secs REAL    NOT NULL,
                 delivered    INTEGER NOT NULL,
                 destination  INTEGER,
                 latency_secs REAL,
                 hops         INTEGER NOT NULL,
                 copies       INTEGER NOT NULL,
                 drops        INTEGER NOT NULL
             );
             CREATE TABLE IF NOT EXISTS stats (
                 time_secs         REAL    NOT NULL,
                 contacts          INTEGER NOT NULL,
                 created           INTEGER NOT NULL,
                 delivered         INTEGER NOT NULL,
                 delivery_ratio    REAL    NOT NULL,
                 overhead_ratio    REAL,
                 mean_latency_secs REAL,
                 forwards          INTEGER NOT NULL
             );
             CREATE TABLE IF NOT EXISTS summary (
                 end_secs          REAL    NOT NULL,
                 contacts          INTEGER NOT NULL,
                 created           INTEGER NOT NULL,
                 started           INTEGER NOT NULL,
                 relayed           INTEGER NOT NULL,
                 delivered         INTEGER NOT NULL,
                 delivery_ratio    REAL    NOT NULL,
                 overhead_ratio    REAL,
                 mean_latency_secs REAL,
                 mean_hops         REAL,
                 dropped_ttl       INTEGER NOT NULL,
                 dropped_link_lost INTEGER NOT NULL,
                 dropped_evicted   INTEGER NOT NULL,
                 dropped_capacity  INTEGER NOT NULL,
                 dropped_policy    INTEGER NOT NULL
             );",
        )?;

        Ok(Self { conn, finished: false })
    }
}

fn opt(v: f64) -> Option<f64> {
    (!v.is_nan()).then_some(v)
}

impl ReportWriter for SqliteWriter {
    fn write_messages(&mut self, rows: &[MessageRow]) -> OutputResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO messages \
                 (msg, source, created_secs, delivered, destination, latency_secs, hops, copies, drops) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for row in rows {
                stmt.execute(rusqlite::params![
                    row.msg,
                    row.source,
                    row.created_secs,
                    row.delivered as i64,
                    row.delivered.then_some(row.destination),
                    opt(row.latency_secs),
                    row.hops as i64,
                    row.copies as i64,
                    row.drops as i64,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn write_stats(&mut self, row: &StatsRow) -> OutputResult<()> {
        self.conn.execute(
            "INSERT INTO stats \
             (time_secs, contacts, created, delivered, delivery_ratio, overhead_ratio, mean_latency_secs, forwards) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                row.time_secs,
                row.contacts as i64,
                row.created as i64,
                row.delivered as i64,
                row.delivery_ratio,
                opt(row.overhead_ratio),
                opt(row.mean_latency_secs),
                row.forwards as i64,
            ],
        )?;
        Ok(())
    }

    fn write_summary(&mut self, s: &RunSummary) -> OutputResult<()> {
        self.conn.execute(
            "INSERT INTO summary \
             (end_secs, contacts, created, started, relayed, delivered, delivery_ratio, \
              overhead_ratio, mean_latency_secs, mean_hops, dropped_ttl, dropped_link_lost, \
              dropped_evicted, dropped_capacity, dropped_policy) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            rusqlite::params![
                s.end_secs,
                s.contacts as i64,
                s.created as i64,
                s.started as i64,
                s.relayed as i64,
                s.delivered as i64,
                s.delivery_ratio,
                opt(s.overhead_ratio),
                opt(s.mean_latency_secs),
                opt(s.mean_hops),
                s.dropped_ttl as i64,
                s.dropped_link_lost as i64,
                s.dropped_evicted as i64,
                s.dropped_capacity as i64,
                s.dropped_policy as i64,
            ],
        )?;
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    }
}
