//! Failures while persisting run reports.

use thiserror::Error;

/// A report backend could not create or write its output.  Observers keep
/// the first one and stop writing; see `ReportObserver::take_error`.
#[derive(Debug, Error)]
pub enum OutputError {
    /// Creating the output directory or writing a report file failed.
    #[error("report file: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV report: {0}")]
    Csv(#[from] csv::Error),

    #[cfg(feature = "sqlite")]
    #[error("SQLite report database: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Building a record batch from buffered rows failed.
    #[cfg(feature = "parquet")]
    #[error("Arrow record batch: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[cfg(feature = "parquet")]
    #[error("Parquet report: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

pub type OutputResult<T> = Result<T, OutputError>;
