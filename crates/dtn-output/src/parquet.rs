//! Parquet output backend (feature `parquet`).
//!
//! Creates three files in the configured output directory:
//! - `messages.parquet`
//! - `stats.parquet`
//! - `summary.parquet`
//!
//! Undefined ratios are written as nulls.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanBuilder, Float64Builder, UInt32Builder, UInt64Builder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::writer::ReportWriter;
use crate::{MessageRow, OutputResult, RunSummary, StatsRow};

fn message_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("msg",          DataType::UInt32,  false),
        Field::new("source",       DataType::UInt32,  false),
        Field::new("created_secs", DataType::Float64, false),
        Field::new("delivered",    DataType::Boolean, false),
        Field::new("destination",  DataType::UInt32,  true),
        Field::new("latency_secs", DataType::Float64, true),
        Field::new("hops",         DataType::UInt64,  false),
        Field::new("copies",       DataType::UInt64,  false),
        Field::new("drops",        DataType::UInt64,  false),
    ]))
}

fn stats_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("time_secs",         DataType::Float64, false),
        Field::new("contacts",          DataType::UInt64,  false),
        Field::new("created",           DataType::UInt64,  false),
        Field::new("delivered",         DataType::UInt64,  false),
        Field::new("delivery_ratio",    DataType::Float64, false),
        Field::new("overhead_ratio",    DataType::Float64, true),
        Field::new("mean_latency_secs", DataType::Float64, true),
        Field::new("forwards",          DataType::UInt64,  false),
    ]))
}

fn summary_schema() -> Arc<Schema> {
    let count = |name: &str| Field::new(name, DataType::UInt64, false);
    Arc::new(Schema::new(vec![
        Field::new("end_secs", DataType::Float64, false),
        count("contacts"),
        count("created"),
        count("started"),
        count("relayed"),
        count("delivered"),
        Field::new("delivery_ratio",    DataType::Float64, false),
        Field::new("overhead_ratio",    DataType::Float64, true),
        Field::new("mean_latency_secs", DataType::Float64, true),
        Field::new("mean_hops",         DataType::Float64, true),
        count("dropped_ttl"),
        count("dropped_link_lost"),
        count("dropped_evicted"),
        count("dropped_capacity"),
        count("dropped_policy"),
    ]))
}

fn snappy_props() -> WriterProperties {
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build()
}

fn opt(v: f64) -> Option<f64> {
    (!v.is_nan()).then_some(v)
}

fn u64_column(values: impl IntoIterator<Item = u64>) -> ArrayRef {
    let mut b = UInt64Builder::new();
    for v in values {
        b.append_value(v);
    }
    Arc::new(b.finish())
}

fn f64_column(values: impl IntoIterator<Item = Option<f64>>) -> ArrayRef {
    let mut b = Float64Builder::new();
    for v in values {
        b.append_option(v);
    }
    Arc::new(b.finish())
}

/// Writes reports to three Parquet files.
///
/// `finish()` **must** be called to write the Parquet file footers; files
/// written without calling `finish()` cannot be opened by Parquet readers.
pub struct ParquetWriter {
    messages:     Option<ArrowWriter<File>>,
    stats:        Option<ArrowWriter<File>>,
    summary:      Option<ArrowWriter<File>>,
    msg_schema:   Arc<Schema>,
    stats_schema: Arc<Schema>,
    summ_schema:  Arc<Schema>,
}

impl ParquetWriter {
    /// Create the three Parquet files in `dir`.
    pub fn new(dir: &Path) -> OutputResult<Self> {
        let msg_schema   = message_schema();
        let stats_schema = stats_schema();
        let summ_schema  = summary_schema();

        let open = |name: &str, schema: &Arc<Schema>| -> OutputResult<ArrowWriter<File>> {
            let file = File::create(dir.join(name))?;
            Ok(ArrowWriter::try_new(file, Arc::clone(schema), Some(snappy_props()))?)
        };

        Ok(Self {
            messages: Some(open("messages.parquet", &msg_schema)?),
            stats:    Some(open("stats.parquet", &stats_schema)?),
            summary:  Some(open("summary.parquet", &summ_schema)?),
            msg_schema,
            stats_schema,
            summ_schema,
        })
    }
}

impl ReportWriter for ParquetWriter {
    fn write_messages(&mut self, rows: &[MessageRow]) -> OutputResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let Some(writer) = self.messages.as_mut() else {
            return Ok(());
        };

        let mut msgs         = UInt32Builder::new();
        let mut sources      = UInt32Builder::new();
        let mut delivered    = BooleanBuilder::new();
        let mut destinations = UInt32Builder::new();

        for row in rows {
            msgs.append_value(row.msg);
            sources.append_value(row.source);
            delivered.append_value(row.delivered);
            destinations.append_option(row.delivered.then_some(row.destination));
        }

        let batch = RecordBatch::try_new(
            Arc::clone(&self.msg_schema),
            vec![
                Arc::new(msgs.finish()),
                Arc::new(sources.finish()),
                f64_column(rows.iter().map(|r| Some(r.created_secs))),
                Arc::new(delivered.finish()),
                Arc::new(destinations.finish()),
                f64_column(rows.iter().map(|r| opt(r.latency_secs))),
                u64_column(rows.iter().map(|r| r.hops)),
                u64_column(rows.iter().map(|r| r.copies)),
                u64_column(rows.iter().map(|r| r.drops)),
            ],
        )?;
        writer.write(&batch)?;
        Ok(())
    }

    fn write_stats(&mut self, row: &StatsRow) -> OutputResult<()> {
        let Some(writer) = self.stats.as_mut() else {
            return Ok(());
        };

        let batch = RecordBatch::try_new(
            Arc::clone(&self.stats_schema),
            vec![
                f64_column([Some(row.time_secs)]),
                u64_column([row.contacts]),
                u64_column([row.created]),
                u64_column([row.delivered]),
                f64_column([Some(row.delivery_ratio)]),
                f64_column([opt(row.overhead_ratio)]),
                f64_column([opt(row.mean_latency_secs)]),
                u64_column([row.forwards]),
            ],
        )?;
        writer.write(&batch)?;
        Ok(())
    }

    fn write_summary(&mut self, s: &RunSummary) -> OutputResult<()> {
        let Some(writer) = self.summary.as_mut() else {
            return Ok(());
        };

        let batch = RecordBatch::try_new(
            Arc::clone(&self.summ_schema),
            vec![
                f64_column([Some(s.end_secs)]),
                u64_column([s.contacts]),
                u64_column([s.created]),
                u64_column([s.started]),
                u64_column([s.relayed]),
                u64_column([s.delivered]),
                f64_column([Some(s.delivery_ratio)]),
                f64_column([opt(s.overhead_ratio)]),
                f64_column([opt(s.mean_latency_secs)]),
                f64_column([opt(s.mean_hops)]),
                u64_column([s.dropped_ttl]),
                u64_column([s.dropped_link_lost]),
                u64_column([s.dropped_evicted]),
                u64_column([s.dropped_capacity]),
                u64_column([s.dropped_policy]),
            ],
        )?;
        writer.write(&batch)?;
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        for w in [self.messages.take(), self.stats.take(), self.summary.take()].into_iter().flatten() {
            w.close()?;
        }
        Ok(())
    }
}
