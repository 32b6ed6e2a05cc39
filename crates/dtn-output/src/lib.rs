//! `dtn-output` — report writers and event logs for the DTN simulator.
//!
//! Three report backends are provided behind Cargo features:
//!
//! | Feature   | Backend | Files created                                            |
//! |-----------|---------|----------------------------------------------------------|
//! | *(none)*  | CSV     | `messages.csv`, `stats.csv`, `summary.csv`               |
//! | `sqlite`  | SQLite  | `report.db`                                              |
//! | `parquet` | Parquet | `messages.parquet`, `stats.parquet`, `summary.parquet`   |
//!
//! All backends implement [`ReportWriter`] and are driven by
//! [`ReportObserver`], which implements `dtn_sim::SimObserver`.
//! [`EventLogSink`] is the plain-text alternative: one line per event.
//!
//! # Usage
//!
//! ```rust,ignore
//! use dtn_output::{CsvWriter, ReportObserver};
//!
//! let writer = CsvWriter::new(Path::new("./output"))?;
//! let mut obs = ReportObserver::new(writer, 100);
//! sim.run(&mut obs)?;
//! if let Some(e) = obs.take_error() {
//!     eprintln!("output error: {e}");
//! }
//! ```

pub mod csv;
pub mod error;
pub mod event_log;
pub mod observer;
pub mod row;
pub mod writer;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "parquet")]
pub mod parquet;


pub use self::csv::CsvWriter;
pub use error::{OutputError, OutputResult};
pub use event_log::EventLogSink;
pub use observer::ReportObserver;
pub use row::{MessageRow, RunSummary, StatsRow};
pub use writer::ReportWriter;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteWriter;

#[cfg(feature = "parquet")]
pub use self::parquet::ParquetWriter;
