use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use overcrab_core::config::{parse_duration, OverWindowConfig, RetentionConfig};
use overcrab_core::runtime::ParallelRunner;
use overcrab_core::serializer::{
    read_versioned_snapshot, write_versioned_snapshot, Timestamp, TimestampSerializer,
    TimestampSerializerSnapshot, TypeSerializer, TypeSerializerSnapshot,
};
use overcrab_core::window::{AggregateFunctionExecutor, OverWindowOperator};

mod aggregates;

use aggregates::{AggregateKind, Reading, ReadingAggregate, Stats};

type ReadingOperator =
    OverWindowOperator<String, Reading, f64, AggregateFunctionExecutor<ReadingAggregate, Stats>>;

#[derive(Parser, Debug)]
#[command(name = "overcrab", version, about = "Processing-time OVER window aggregation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Aggregate `key,value` lines over the last N+1 rows of each key
    Run {
        /// Input file, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        input: PathBuf,
        /// Rows preceding the current one that belong to its window
        #[arg(long, default_value_t = 2)]
        preceding: u64,
        #[arg(long, value_enum, default_value_t = AggregateKind::Sum)]
        agg: AggregateKind,
        #[arg(long, default_value_t = 1)]
        parallelism: usize,
        /// Minimum idle time before a key's state may be dropped (e.g. `30m`)
        #[arg(long, value_parser = parse_duration, default_value = "1h")]
        min_retention: Duration,
        /// Maximum idle time before a key's state is dropped; `0` keeps it forever
        #[arg(long, value_parser = parse_duration, default_value = "2h")]
        max_retention: Duration,
    },
    /// Check whether timestamps written at one precision can be restored at another
    Snapshot {
        #[arg(long)]
        written_precision: u32,
        #[arg(long)]
        configured_precision: u32,
    },
}

fn main() -> Result<()> {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            input,
            preceding,
            agg,
            parallelism,
            min_retention,
            max_retention,
        } => {
            let retention = if max_retention.is_zero() {
                RetentionConfig::disabled()
            } else {
                RetentionConfig::new(min_retention, max_retention)
            };
            let config = OverWindowConfig::new(preceding).with_retention(retention);
            config.validate()?;
            run(&input, config, agg, parallelism)?;
        }
        Commands::Snapshot {
            written_precision,
            configured_precision,
        } => snapshot(written_precision, configured_precision)?,
    }
    Ok(())
}

fn read_input(input: &Path) -> Result<Vec<(String, Reading)>> {
    let reader: Box<dyn BufRead> = if input.as_os_str() == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = File::open(input).with_context(|| format!("cannot open {}", input.display()))?;
        Box::new(BufReader::new(file))
    };

    let mut rows = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let reading = Reading::parse(&line).with_context(|| format!("line {}", number + 1))?;
        rows.push((reading.key.clone(), reading));
    }
    Ok(rows)
}

fn run(
    input: &Path,
    config: OverWindowConfig,
    agg: AggregateKind,
    parallelism: usize,
) -> Result<()> {
    let rows = read_input(input)?;
    tracing::info!(rows = rows.len(), preceding = config.lower_boundary, ?agg, "running");

    let runner = ParallelRunner::new(parallelism, |_subtask| {
        ReadingOperator::with_defaults(
            config,
            AggregateFunctionExecutor::new(ReadingAggregate::new(agg)),
        )
    })?;
    let outputs = runner.run(rows)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for row in outputs {
        writeln!(out, "{row}")?;
    }
    Ok(())
}

fn snapshot(written_precision: u32, configured_precision: u32) -> Result<()> {
    let written = TimestampSerializer::new(written_precision)?;
    let mut bytes = Vec::new();
    write_versioned_snapshot(written.snapshot_configuration().as_ref(), &mut bytes)?;
    println!("snapshot bytes: {bytes:02x?}");

    let restored = read_versioned_snapshot::<Timestamp, TimestampSerializerSnapshot>(
        &mut bytes.as_slice(),
    )?;
    let configured = TimestampSerializer::new(configured_precision)?;
    let compatibility = restored.resolve_schema_compatibility(&configured);
    println!(
        "written precision {} vs configured precision {}: {:?}",
        restored.precision(),
        configured.precision(),
        compatibility
    );
    if compatibility.is_incompatible() {
        bail!("state written at precision {written_precision} cannot be restored at precision {configured_precision}");
    }
    Ok(())
}
