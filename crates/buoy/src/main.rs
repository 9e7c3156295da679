use std::path::PathBuf;

use anyhow::{Context, Result};
use buoy_core::hooks::all_hooks_descriptors;
use buoy_core::IngestPipeline;
use buoy_reader::formats::{STA_TIME_COLUMN, STA_TIME_FORMAT};
use buoy_reader::{
    all_reader_descriptors, BuoyReader, CsvReader, InstrumentReader, StaReader, TimeSpec, Variant,
    VariantSet,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Buoy instrument ingest", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a configured pipeline over one input file
    Run(RunArgs),
    /// Read one file and print the resulting dataset
    Inspect(InspectArgs),
    /// List the available readers and hooks
    Readers,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Pipeline configuration (YAML)
    #[arg(long)]
    config: PathBuf,
    input: PathBuf,
}

#[derive(Args, Debug)]
struct InspectArgs {
    #[arg(long, value_enum)]
    reader: ReaderKind,
    /// Name used for variant inference (defaults to the file name)
    #[arg(long)]
    key: Option<String>,
    /// Explicit variants, e.g. `--variant gill,currents`
    #[arg(long, value_delimiter = ',')]
    variant: Vec<String>,
    #[arg(long)]
    time_column: Option<String>,
    #[arg(long)]
    time_format: Option<String>,
    input: PathBuf,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ReaderKind {
    Csv,
    Sta,
    Buoy,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Inspect(args) => handle_inspect(args),
        Command::Readers => {
            handle_readers();
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn handle_run(args: RunArgs) -> Result<()> {
    let pipeline = IngestPipeline::from_yaml_path(&args.config)
        .with_context(|| format!("failed to load pipeline {}", args.config.display()))?;
    let output = pipeline
        .run(&args.input)
        .with_context(|| format!("pipeline failed on {}", args.input.display()))?;

    info!(artifacts = output.artifacts.len(), "run complete");
    println!("{}", output.saved.data.display());
    println!("{}", output.saved.metadata.display());
    for artifact in &output.artifacts {
        println!("{}", artifact.display());
    }
    Ok(())
}

fn handle_inspect(args: InspectArgs) -> Result<()> {
    let reader = build_reader(&args)?;
    let dataset = match &args.key {
        Some(key) => reader.read_path_as(&args.input, key),
        None => reader.read_path(&args.input),
    }
    .with_context(|| format!("failed to read {}", args.input.display()))?;

    print!("{dataset}");
    Ok(())
}

fn build_reader(args: &InspectArgs) -> Result<Box<dyn InstrumentReader>> {
    let time = |default_column: &str, default_format: Option<&str>| {
        let base = TimeSpec::new(args.time_column.as_deref().unwrap_or(default_column));
        match args.time_format.as_deref().or(default_format) {
            Some(format) => base.with_format(format),
            None => base,
        }
    };

    let reader: Box<dyn InstrumentReader> = match args.reader {
        ReaderKind::Csv => Box::new(CsvReader::new(time("time", None))),
        ReaderKind::Sta => {
            Box::new(StaReader::new(time(STA_TIME_COLUMN, Some(STA_TIME_FORMAT))))
        }
        ReaderKind::Buoy => {
            let reader = BuoyReader::new(time("time", None));
            if args.variant.is_empty() {
                Box::new(reader)
            } else {
                let variants = args
                    .variant
                    .iter()
                    .map(|tag| tag.parse::<Variant>().map_err(anyhow::Error::msg))
                    .collect::<Result<VariantSet>>()?;
                Box::new(reader.with_variants(variants))
            }
        }
    };
    Ok(reader)
}

fn handle_readers() {
    println!("Readers:");
    for descriptor in all_reader_descriptors() {
        println!("  {:<8} {}", descriptor.code, descriptor.description);
    }
    println!("Hooks:");
    for descriptor in all_hooks_descriptors() {
        println!("  {:<8} {}", descriptor.code, descriptor.description);
    }
}
