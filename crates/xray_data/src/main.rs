//! `xray-data`: inspect a chest X-ray dataset tree from the command line.
//!
//! - `count` prints the per-split, per-class image counts
//! - `scan` decodes every split once and reports batches and unreadable files

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use xray_data::{DataConfig, DecodeErrorPolicy, Split, Stage, XrayDataModule};

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "xray-data")]
#[command(version)]
#[command(about = "Index and load chest X-ray image datasets")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Command {
    /// Print the number of images per split and class
    Count(SourceArgs),

    /// Decode every image once and report what was loaded
    Scan(ScanArgs),
}

/// Where the dataset and its settings come from
#[derive(Args, Debug, Clone, PartialEq)]
struct SourceArgs {
    /// JSON data config; every field is optional
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Dataset root, overrides the config's `root`
    #[arg(long, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Pool train+val and carve a fresh validation split
    #[arg(long)]
    resplit: bool,
}

#[derive(Args, Debug, Clone, PartialEq)]
struct ScanArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Only scan this split (train, val or test)
    #[arg(long)]
    split: Option<Split>,

    /// Worker threads, overrides the config's `num_workers`
    #[arg(long)]
    workers: Option<usize>,

    /// Batch size, overrides the config's `batch_size`
    #[arg(long)]
    batch_size: Option<usize>,

    /// Keep going past unreadable images instead of stopping at the first
    #[arg(long)]
    skip_errors: bool,
}

fn load_config(args: &SourceArgs) -> Result<DataConfig> {
    let mut config = match &args.config {
        Some(path) => DataConfig::from_json_file(path)?,
        None => DataConfig::default(),
    };
    if let Some(root) = &args.root {
        config.root = root.clone();
    }
    if args.resplit {
        config.resplit = true;
    }
    Ok(config)
}

fn count(args: &SourceArgs) -> Result<()> {
    let mut module = XrayDataModule::new(load_config(args)?)?;
    module.setup(Stage::All)?;

    print!("{}", module.label_counts()?);
    println!();
    for (name, idx) in module.class_to_idx()? {
        println!("{} -> {}", name, idx);
    }
    Ok(())
}

fn scan(args: &ScanArgs) -> Result<()> {
    let mut config = load_config(&args.source)?;
    if let Some(workers) = args.workers {
        config.num_workers = workers;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if args.skip_errors {
        config.decode_error_policy = DecodeErrorPolicy::Skip;
    }

    let mut module = XrayDataModule::new(config)?;
    module.setup(Stage::All)?;

    let splits = match args.split {
        Some(split) => vec![split],
        None => Split::ALL.to_vec(),
    };
    for split in splits {
        let loader = module.dataloader(split)?;
        let start = Instant::now();

        let mut iter = loader.iter()?;
        let mut batches = 0;
        let mut records = 0;
        for batch in iter.by_ref() {
            let batch = batch.with_context(|| format!("Scan of {} split failed", split))?;
            batches += 1;
            records += batch.batch_size();
        }

        info!(%split, elapsed_ms = start.elapsed().as_millis() as u64, "scan finished");
        println!(
            "{:<6} batches={:<6} records={:<7} skipped={}",
            split,
            batches,
            records,
            iter.skipped().len()
        );
        for path in iter.skipped() {
            println!("  skipped {}", path.display());
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Command::Count(args) => count(args),
        Command::Scan(args) => scan(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scan() {
        let cli = Cli::parse_from([
            "xray-data", "scan", "--root", "/data", "--split", "test", "--workers", "4",
            "--skip-errors",
        ]);
        match cli.command {
            Command::Scan(args) => {
                assert_eq!(args.source.root, Some(PathBuf::from("/data")));
                assert_eq!(args.split, Some(Split::Test));
                assert_eq!(args.workers, Some(4));
                assert!(args.skip_errors);
            }
            other => panic!("expected scan, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_overrides_config_root() -> Result<()> {
        let args = SourceArgs {
            config: None,
            root: Some(PathBuf::from("/elsewhere")),
            resplit: true,
        };
        let config = load_config(&args)?;
        assert_eq!(config.root, PathBuf::from("/elsewhere"));
        assert!(config.resplit);
        Ok(())
    }
}
