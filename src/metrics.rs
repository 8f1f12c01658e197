//! Metric reporting
//!
//! A [`MetricsSink`] receives named values as the converter runs. The bundled
//! [`MetricsRecorder`] keeps them in memory, logs each one, and can dump the
//! collected records as JSON lines.

use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// A single reported metric value.
///
/// Values are stored as strings so that counts, durations and labels share one
/// record type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetricRecord {
    name: String,
    value: String,
    timestamp: DateTime<Utc>,
}

impl MetricRecord {
    /// Create a new metric record stamped with the current time.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            timestamp: Utc::now(),
        }
    }

    /// Get the metric name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the metric value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Get the time the metric was recorded.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Destination for metric updates
pub trait MetricsSink {
    /// Record `value` under `name`
    fn update_metric(&mut self, name: &str, value: &dyn Display);
}

/// In-memory metric store that also logs every update.
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    records: Vec<MetricRecord>,
}

impl MetricsRecorder {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All records, in reporting order.
    #[must_use]
    pub fn records(&self) -> &[MetricRecord] {
        &self.records
    }

    /// Most recent value reported under `name`.
    #[must_use]
    pub fn latest(&self, name: &str) -> Option<&MetricRecord> {
        self.records.iter().rev().find(|record| record.name() == name)
    }

    /// Write all records to `writer`, one JSON object per line.
    ///
    /// # Errors
    /// Returns [`crate::Error::Json`] or [`crate::Error::Io`] on failure.
    pub fn write_json_lines<W: Write>(&self, mut writer: W) -> Result<()> {
        for record in &self.records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Write all records to a JSON lines file at `path`.
    ///
    /// # Errors
    /// Same conditions as [`write_json_lines`](Self::write_json_lines).
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path.as_ref())?;
        self.write_json_lines(std::io::BufWriter::new(file))
    }

    /// Move every record of `other` into this recorder.
    pub fn absorb(&mut self, other: Self) {
        self.records.extend(other.records);
    }
}

impl MetricsSink for MetricsRecorder {
    fn update_metric(&mut self, name: &str, value: &dyn Display) {
        let record = MetricRecord::new(name, value.to_string());
        info!(metric = record.name(), value = record.value(), "metric updated");
        self.records.push(record);
    }
}
