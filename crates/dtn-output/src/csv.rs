//! CSV output backend.
//!
//! Creates three files in the configured output directory:
//! - `messages.csv`
//! - `stats.csv`
//! - `summary.csv`

use std::fs::File;
use std::path::Path;

use csv::Writer;

use crate::writer::ReportWriter;
use crate::{MessageRow, OutputResult, RunSummary, StatsRow};

/// Writes reports to three CSV files.
pub struct CsvWriter {
    messages: Writer<File>,
    stats:    Writer<File>,
    summary:  Writer<File>,
    finished: bool,
}

impl CsvWriter {
    /// Open (or create) the three CSV files in `dir` and write the header rows.
    pub fn new(dir: &Path) -> OutputResult<Self> {
        let mut messages = Writer::from_path(dir.join("messages.csv"))?;
        messages.write_record([
            "msg", "source", "created_secs", "delivered", "destination",
            "latency_secs", "hops", "copies", "drops",
        ])?;

        let mut stats = Writer::from_path(dir.join("stats.csv"))?;
        stats.write_record([
            "time_secs", "contacts", "created", "delivered", "delivery_ratio",
            "overhead_ratio", "mean_latency_secs", "forwards",
        ])?;

        let mut summary = Writer::from_path(dir.join("summary.csv"))?;
        summary.write_record([
            "end_secs", "contacts", "created", "started", "relayed", "delivered",
            "delivery_ratio", "overhead_ratio", "mean_latency_secs", "mean_hops",
            "dropped_ttl", "dropped_link_lost", "dropped_evicted",
            "dropped_capacity", "dropped_policy",
        ])?;

        Ok(Self { messages, stats, summary, finished: false })
    }
}

/// Undefined ratios are written as empty cells rather than `NaN`.
fn opt(v: f64) -> String {
    if v.is_nan() { String::new() } else { v.to_string() }
}

impl ReportWriter for CsvWriter {
    fn write_messages(&mut self, rows: &[MessageRow]) -> OutputResult<()> {
        for row in rows {
            let destination = if row.delivered { row.destination.to_string() } else { String::new() };
            self.messages.write_record(&[
                row.msg.to_string(),
                row.source.to_string(),
                row.created_secs.to_string(),
                (row.delivered as u8).to_string(),
                destination,
                opt(row.latency_secs),
                row.hops.to_string(),
                row.copies.to_string(),
                row.drops.to_string(),
            ])?;
        }
        Ok(())
    }

    fn write_stats(&mut self, row: &StatsRow) -> OutputResult<()> {
        self.stats.write_record(&[
            row.time_secs.to_string(),
            row.contacts.to_string(),
            row.created.to_string(),
            row.delivered.to_string(),
            row.delivery_ratio.to_string(),
            opt(row.overhead_ratio),
            opt(row.mean_latency_secs),
            row.forwards.to_string(),
        ])?;
        Ok(())
    }

    fn write_summary(&mut self, s: &RunSummary) -> OutputResult<()> {
        self.summary.write_record(&[
            s.end_secs.to_string(),
            s.contacts.to_string(),
            s.created.to_string(),
            s.started.to_string(),
            s.relayed.to_string(),
            s.delivered.to_string(),
            s.delivery_ratio.to_string(),
            opt(s.overhead_ratio),
            opt(s.mean_latency_secs),
            opt(s.mean_hops),
            s.dropped_ttl.to_string(),
            s.dropped_link_lost.to_string(),
            s.dropped_evicted.to_string(),
            s.dropped_capacity.to_string(),
            s.dropped_policy.to_string(),
        ])?;
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.messages.flush()?;
        self.stats.flush()?;
        self.summary.flush()?;
        Ok(())
    }
}
