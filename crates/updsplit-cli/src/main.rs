//! updsplit - Split UPDATE.APP style firmware containers into partition images
//!
//! Every input container is scanned for partition records, which are then
//! either listed or written to `<output>/<container name>/<TYPE>.img`.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, Level};
use tracing_subscriber::EnvFilter;
use updsplit_core::extract::DEFAULT_BUFFER_SIZE;
use updsplit_core::{
    Extractor, ExtractorConfig, FileLoad, PartitionRecord, RecordSet, Scanner, ScannerConfig,
};
use walkdir::WalkDir;

/// Split UPDATE.APP style firmware containers into partition images
#[derive(Parser, Debug)]
#[command(name = "updsplit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Container files, or directories to search for containers
    #[arg(required = true, value_name = "INPUT")]
    inputs: Vec<PathBuf>,

    /// Output directory, one subdirectory per container
    #[arg(short, long, default_value = "extracted")]
    output: PathBuf,

    /// Only extract partitions of this type (repeatable, exact match)
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    types: Vec<String>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Maximum number of partitions to read per container (0 = unlimited)
    #[arg(long, default_value = "0")]
    max_records: usize,

    /// Only list found partitions without extracting
    #[arg(long)]
    list_only: bool,

    /// Dry run - don't write files, just show what would be extracted
    #[arg(long)]
    dry_run: bool,

    /// Print a BLAKE3 digest of every extracted partition
    #[arg(long)]
    digest: bool,

    /// Copy buffer size in bytes (K and M suffixes accepted)
    #[arg(long, default_value_t = DEFAULT_BUFFER_SIZE, value_parser = parse_buffer_size)]
    buffer_size: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    run(&cli)
}

/// Scans the inputs, then lists, plans or extracts the selected partitions
fn run(cli: &Cli) -> Result<()> {
    let containers = collect_inputs(&cli.inputs)?;
    if containers.is_empty() {
        bail!("No container files found in the given inputs");
    }
    info!("Scanning {} container(s)", containers.len());

    let scanner = Scanner::with_config(ScannerConfig::new().max_records(cli.max_records));
    let mut set = RecordSet::with_scanner(scanner);
    let loads = set.load(&containers);
    report_loads(&loads);

    set.select_types(&cli.types);

    if cli.list_only {
        if set.is_empty() {
            println!("No partitions found");
        }
        for row in listing_rows(set.records()) {
            println!("{}", row);
        }
        return Ok(());
    }

    if set.selected().next().is_none() {
        println!("No partitions selected");
        return Ok(());
    }

    let config = ExtractorConfig::new()
        .buffer_size(cli.buffer_size)
        .digest(cli.digest);
    let extractor = Extractor::with_config(config);

    if cli.dry_run {
        for (destination, size) in dry_run_plan(&set, &extractor, &cli.output) {
            println!("Would write: {} ({} bytes)", destination.display(), size);
        }
        return Ok(());
    }

    let summary = set.extract(&extractor, &cli.output);
    for outcome in &summary.outcomes {
        // failures are logged by the extractor
        if let Ok(payload) = &outcome.result {
            match &payload.digest {
                Some(digest) => println!("Wrote {}  {}", outcome.destination.display(), digest),
                None => println!("Wrote {}", outcome.destination.display()),
            }
        }
    }

    println!(
        "Summary: {} extracted, {} failed",
        summary.success_count(),
        summary.failure_count()
    );

    if summary.failure_count() > 0 {
        bail!("{} partition(s) could not be extracted", summary.failure_count());
    }
    Ok(())
}

/// Expands directories into the regular files below them
fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        if !input.is_dir() {
            // Missing or unreadable files are reported by the scan itself
            files.push(input.clone());
            continue;
        }

        debug!("Searching directory: {}", input.display());
        for entry in WalkDir::new(input).follow_links(false).sort_by_file_name() {
            let entry = entry
                .with_context(|| format!("Failed to walk directory: {}", input.display()))?;
            let path = entry.path();

            if !entry.file_type().is_file() {
                continue;
            }

            if is_hidden(path) {
                trace!("Skipping hidden file: {}", path.display());
                continue;
            }

            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

fn report_loads(loads: &[FileLoad]) {
    for load in loads {
        match &load.result {
            Ok(0) => info!("No partitions found in {}", load.path.display()),
            Ok(count) => info!("Found {} partition(s) in {}", count, load.path.display()),
            // already logged by the scanner
            Err(_) => {}
        }
    }
}

/// Header plus one row per record, selected records marked with `*`
fn listing_rows(records: &[PartitionRecord]) -> Vec<String> {
    if records.is_empty() {
        return Vec::new();
    }

    let mut rows = Vec::with_capacity(records.len() + 1);
    rows.push(format!(
        "  {:<24} {:>12} {:>12} {:<16} {:>12} {:<16} {:<16}",
        "SOURCE", "START", "END", "TYPE", "SIZE", "DATE", "TIME"
    ));
    for record in records {
        rows.push(format!(
            "{} {:<24} {:>12} {:>12} {:<16} {:>12} {:<16} {:<16}",
            if record.selected { "*" } else { " " },
            record.source_name(),
            record.start_hex(),
            record.end_hex(),
            record.partition_type,
            record.size,
            record.date,
            record.time
        ));
    }
    rows
}

/// Destination and size of every selected record, without touching the disk
fn dry_run_plan(set: &RecordSet, extractor: &Extractor, output: &Path) -> Vec<(PathBuf, u64)> {
    set.selected()
        .map(|record| (extractor.destination(record, output), record.size))
        .collect()
}

/// Parses a byte count with an optional `K` or `M` (binary) suffix
fn parse_buffer_size(value: &str) -> std::result::Result<usize, String> {
    let value = value.trim();
    let (digits, multiplier) = match value.chars().last() {
        Some('k' | 'K') => (&value[..value.len() - 1], 1024),
        Some('m' | 'M') => (&value[..value.len() - 1], 1024 * 1024),
        _ => (value, 1),
    };

    let count: usize = digits
        .parse()
        .map_err(|_| format!("invalid buffer size: '{}'", value))?;
    let size = count
        .checked_mul(multiplier)
        .ok_or_else(|| format!("buffer size too large: '{}'", value))?;
    if size == 0 {
        return Err("buffer size must be greater than zero".to_string());
    }
    Ok(size)
}
