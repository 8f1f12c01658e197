//! Record file → container conversion pipeline
//!
//! Linear read → encode → write per split. With the `parallel` feature the two
//! splits run on the rayon pool; each split still runs start to finish on one
//! thread.

use crate::cifar::read_split_file;
use crate::config::{ConvertConfig, SplitConfig};
use crate::container::write_container;
use crate::metrics::{MetricsRecorder, MetricsSink};
use crate::{Error, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, info_span};

/// Which dataset split is being converted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitKind {
    /// Training examples
    Training,
    /// Held-out test examples
    Test,
}

impl SplitKind {
    /// Lowercase name used in logs and metric keys
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Training => "training",
            Self::Test => "test",
        }
    }

    fn config(self, config: &ConvertConfig) -> &SplitConfig {
        match self {
            Self::Training => &config.training,
            Self::Test => &config.test,
        }
    }
}

/// Outcome of converting one split
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitReport {
    /// Split converted
    pub kind: SplitKind,
    /// Record file read
    pub input: PathBuf,
    /// Container file written
    pub output: PathBuf,
    /// Examples converted
    pub examples: usize,
    /// Seconds spent decoding the record file
    pub read_seconds: f64,
    /// Seconds spent writing the container
    pub write_seconds: f64,
}

/// Outcome of a full conversion run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionReport {
    /// Per-split results, training first
    pub splits: Vec<SplitReport>,
    /// Wall-clock seconds for the whole run
    pub elapsed_seconds: f64,
}

/// Convert one split described by `config`.
///
/// Reports `<split>.examples`, `<split>.read_seconds` and `<split>.write_seconds`
/// to `metrics`.
///
/// # Errors
/// Propagates reader and container errors; nothing is retried.
pub fn convert_split<M: MetricsSink>(
    config: &ConvertConfig,
    kind: SplitKind,
    metrics: &mut M,
) -> Result<SplitReport> {
    let _span = info_span!("convert_split", split = kind.name()).entered();
    let split_config = kind.config(config);
    let input = config.input_path(split_config);
    let output = config.output_path(split_config);

    let started = Instant::now();
    let split = read_split_file(&input, config.layout, split_config.examples)?;
    let read_seconds = started.elapsed().as_secs_f64();

    let started = Instant::now();
    write_container(&output, &split)?;
    let write_seconds = started.elapsed().as_secs_f64();

    let name = kind.name();
    metrics.update_metric(&format!("{name}.examples"), &split.examples());
    metrics.update_metric(&format!("{name}.read_seconds"), &read_seconds);
    metrics.update_metric(&format!("{name}.write_seconds"), &write_seconds);

    Ok(SplitReport {
        kind,
        input,
        output,
        examples: split.examples(),
        read_seconds,
        write_seconds,
    })
}

#[cfg(feature = "parallel")]
fn convert_both(config: &ConvertConfig) -> (Result<SplitReport>, Result<SplitReport>, MetricsRecorder) {
    let ((training, mut metrics), (test, test_metrics)) = rayon::join(
        || {
            let mut metrics = MetricsRecorder::new();
            (convert_split(config, SplitKind::Training, &mut metrics), metrics)
        },
        || {
            let mut metrics = MetricsRecorder::new();
            (convert_split(config, SplitKind::Test, &mut metrics), metrics)
        },
    );
    metrics.absorb(test_metrics);
    (training, test, metrics)
}

#[cfg(not(feature = "parallel"))]
fn convert_both(config: &ConvertConfig) -> (Result<SplitReport>, Result<SplitReport>, MetricsRecorder) {
    let mut metrics = MetricsRecorder::new();
    let training = convert_split(config, SplitKind::Training, &mut metrics);
    let test = convert_split(config, SplitKind::Test, &mut metrics);
    (training, test, metrics)
}

/// Convert the training and test splits.
///
/// Creates `output_dir` if needed. When `metrics_out` is configured the
/// collected metrics are saved there as JSON lines.
///
/// # Errors
/// - [`Error::Config`] if the configuration does not validate
/// - the first split error (training before test)
pub fn run(config: &ConvertConfig) -> Result<(ConversionReport, MetricsRecorder)> {
    config.validate()?;
    let started = Instant::now();

    std::fs::create_dir_all(&config.output_dir).map_err(|e| {
        Error::StorageError(format!(
            "Failed to create output directory {}: {e}",
            config.output_dir.display()
        ))
    })?;

    let (training, test, mut metrics) = convert_both(config);
    let splits = vec![training?, test?];

    let elapsed_seconds = started.elapsed().as_secs_f64();
    metrics.update_metric("elapsed_seconds", &elapsed_seconds);
    info!(elapsed_seconds, "conversion finished");

    if let Some(path) = &config.metrics_out {
        metrics.save(path)?;
    }

    Ok((
        ConversionReport {
            splits,
            elapsed_seconds,
        },
        metrics,
    ))
}
