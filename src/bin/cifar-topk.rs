//! Command line driver: convert CIFAR-10 record files, inspect containers, and
//! rank container rows.

use anyhow::{Context, Result};
use arrow::util::pretty::pretty_format_batches;
use cifar_topk::config::ConvertConfig;
use cifar_topk::container::{load_batch, load_container, DATA_COLUMN};
use cifar_topk::convert;
use cifar_topk::telemetry::init_tracing;
use cifar_topk::topk::{SortOrder, TopKSelection};
use clap::{Args, Parser, Subcommand, ValueHint};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Top-K selection and CIFAR-10 container conversion"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert CIFAR-10 binary record files into Parquet containers
    Convert(ConvertArgs),

    /// Print the attributes and label histogram of a container
    Inspect(InspectArgs),

    /// Print the top K rows of a container ranked by one column
    Rank(RankArgs),
}

#[derive(Args)]
struct ConvertArgs {
    /// JSON configuration file; flags below override its values
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Directory holding training.bin and test.bin
    #[arg(long, value_hint = ValueHint::DirPath)]
    input_dir: Option<PathBuf>,

    /// Directory receiving the containers
    #[arg(long, value_hint = ValueHint::DirPath)]
    output_dir: Option<PathBuf>,

    /// Number of training records to convert
    #[arg(long)]
    training_images: Option<usize>,

    /// Number of test records to convert
    #[arg(long)]
    test_images: Option<usize>,

    /// Convert every record in each file instead of a fixed count
    #[arg(long, conflicts_with_all = ["training_images", "test_images"])]
    infer_counts: bool,

    /// Write collected metrics to this file as JSON lines
    #[arg(long, value_hint = ValueHint::FilePath)]
    metrics_out: Option<PathBuf>,
}

impl ConvertArgs {
    fn into_config(self) -> Result<ConvertConfig> {
        let mut config = match &self.config {
            Some(path) => ConvertConfig::from_json_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => ConvertConfig::default(),
        };

        if let Some(dir) = self.input_dir {
            config.input_dir = dir;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if self.infer_counts {
            config.training.examples = None;
            config.test.examples = None;
        }
        if let Some(count) = self.training_images {
            config.training.examples = Some(count);
        }
        if let Some(count) = self.test_images {
            config.test.examples = Some(count);
        }
        if self.metrics_out.is_some() {
            config.metrics_out = self.metrics_out;
        }
        Ok(config)
    }
}

#[derive(Args)]
struct InspectArgs {
    /// Container file to read
    #[arg(long, value_hint = ValueHint::FilePath)]
    container: PathBuf,
}

#[derive(Args)]
struct RankArgs {
    /// Container file to read
    #[arg(long, value_hint = ValueHint::FilePath)]
    container: PathBuf,

    /// Column to rank by
    #[arg(long)]
    column: String,

    /// Number of rows to keep
    #[arg(long)]
    k: usize,

    /// Treat the smallest values as the top
    #[arg(long)]
    ascending: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Convert(args) => run_convert(args),
        Command::Inspect(args) => run_inspect(&args),
        Command::Rank(args) => run_rank(&args),
    }
}

fn run_convert(args: ConvertArgs) -> Result<()> {
    let config = args.into_config()?;
    let (report, _metrics) = convert::run(&config).context("conversion failed")?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_inspect(args: &InspectArgs) -> Result<()> {
    let container = load_container(&args.container)
        .with_context(|| format!("failed to load {}", args.container.display()))?;
    let layout = container.split.layout();

    println!("examples: {}", container.attributes.examples);
    println!(
        "layout: {}x{}x{}, {} classes",
        layout.width, layout.height, layout.depth, layout.classes
    );
    for (slot, dataset) in container.attributes.datasets.iter().enumerate() {
        println!(
            "dataset {slot}: name={} attributes={} kind={} dataType={} dimensions={} width={}",
            dataset.name,
            dataset.attributes,
            dataset.kind,
            dataset.data_type,
            dataset.dimensions,
            dataset.width
        );
    }

    let mut histogram = BTreeMap::new();
    for &label in container.split.labels() {
        *histogram.entry(label).or_insert(0usize) += 1;
    }
    for (label, count) in histogram {
        println!("label {label}: {count}");
    }
    Ok(())
}

fn run_rank(args: &RankArgs) -> Result<()> {
    let batch = load_batch(&args.container)
        .with_context(|| format!("failed to load {}", args.container.display()))?;
    let column = batch
        .schema()
        .index_of(&args.column)
        .with_context(|| format!("container has no column {}", args.column))?;
    let order = if args.ascending {
        SortOrder::Ascending
    } else {
        SortOrder::Descending
    };

    let top = batch.top_k(column, args.k, order)?;

    // Pixel blocks are too wide to print
    let printable: Vec<usize> = top
        .schema()
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, field)| field.name() != DATA_COLUMN)
        .map(|(index, _)| index)
        .collect();
    let top = top.project(&printable)?;
    println!("{}", pretty_format_batches(&[top])?);
    Ok(())
}
