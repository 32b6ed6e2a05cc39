//! The `ReportWriter` trait implemented by all backend writers.

use crate::{MessageRow, OutputResult, RunSummary, StatsRow};

/// Trait implemented by CSV, SQLite, and Parquet writers.
///
/// Errors surface through [`ReportObserver::take_error`](crate::ReportObserver::take_error)
/// when the writer is driven by the observer.
pub trait ReportWriter {
    /// Write a batch of per-message outcomes.
    fn write_messages(&mut self, rows: &[MessageRow]) -> OutputResult<()>;

    /// Write one periodic stats row.
    fn write_stats(&mut self, row: &StatsRow) -> OutputResult<()>;

    fn write_summary(&mut self, summary: &RunSummary) -> OutputResult<()>;

    /// Flush and close all underlying file handles.
    ///
    /// Idempotent; safe to call more than once.
    fn finish(&mut self) -> OutputResult<()>;
}
