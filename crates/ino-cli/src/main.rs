#![forbid(unsafe_code)]

use anyhow::{Context, Result, anyhow, bail};
use ino_core::{InspectConfig, render_report};
use ino_types::{BlockSize, GroupNumber, SectorNumber};
use std::env;
use std::fmt::Display;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

/// Partition offset of the deployment images this tool was written for.
/// A CLI default only — the library takes the offset as configuration.
const DEFAULT_PARTITION_OFFSET_SECTORS: u64 = 2050;

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_usage();
        return Ok(());
    };

    match command.as_str() {
        "inspect" => inspect(args),
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(())
        }
        _ => {
            print_usage();
            bail!("unknown command: {command}")
        }
    }
}

fn print_usage() {
    println!("inospect\n");
    println!("USAGE:");
    println!("  inospect inspect <image-path> [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  --json                 emit the report as JSON");
    println!(
        "  --offset-sectors <n>   partition start in 512-byte sectors (default {DEFAULT_PARTITION_OFFSET_SECTORS})"
    );
    println!("  --block-size <n>       override the superblock's block size");
    println!("  --group <n>            block group to inspect (default 0)");
    println!("  --limit <n>            decode at most <n> inode slots");
}

fn value_of<T>(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let Some(raw) = args.next() else {
        bail!("{flag} requires a value");
    };
    raw.parse::<T>()
        .map_err(|err| anyhow!("invalid value for {flag}: {err}"))
}

fn inspect(args: impl Iterator<Item = String>) -> Result<()> {
    let mut args = args;
    let mut path: Option<String> = None;
    let mut json = false;
    let mut offset_sectors = DEFAULT_PARTITION_OFFSET_SECTORS;
    let mut block_size: Option<u32> = None;
    let mut group = 0_u32;
    let mut limit: Option<u32> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--json" => json = true,
            "--offset-sectors" => offset_sectors = value_of(&mut args, "--offset-sectors")?,
            "--block-size" => block_size = Some(value_of(&mut args, "--block-size")?),
            "--group" => group = value_of(&mut args, "--group")?,
            "--limit" => limit = Some(value_of(&mut args, "--limit")?),
            other if !other.starts_with('-') && path.is_none() => path = Some(other.to_owned()),
            other => bail!("unexpected argument: {other}"),
        }
    }

    let Some(path) = path else {
        bail!("inspect requires a path argument");
    };

    let block_size_override = block_size
        .map(|value| BlockSize::new(value).map_err(|err| anyhow!("--block-size: {err}")))
        .transpose()?;

    let config = InspectConfig {
        partition_offset_sectors: SectorNumber(offset_sectors),
        block_size_override,
        group_index: GroupNumber(group),
        inode_limit: limit,
    };

    let report = ino_core::inspect_path(Path::new(&path), &config)
        .with_context(|| format!("failed to inspect {path}"))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if json {
        let rendered = serde_json::to_string_pretty(&report).context("serialize report")?;
        writeln!(out, "{rendered}")?;
    } else {
        render_report(&report, &mut out)?;
    }

    Ok(())
}
