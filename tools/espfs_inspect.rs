// SPDX-License-Identifier: MIT
//! espfs-inspect: list, extract and verify entries of an espfs image

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use espfs_pack::ImageReader;

#[derive(Parser)]
#[command(name = "espfs-inspect")]
#[command(about = "Inspect espfs flash images", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the entries of an image
    List {
        image: PathBuf,
        /// Print entries and totals as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write the decoded contents of one entry to stdout
    Cat { image: PathBuf, name: String },
    /// Check every entry against the files of a directory
    Verify { image: PathBuf, directory: PathBuf },
}

#[derive(Serialize)]
struct ListedEntry<'a> {
    offset: usize,
    name: &'a str,
    gzip: bool,
    encoded_size: u32,
    uncompressed_size: u32,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::List { image, json } => list(&image, json),
        Commands::Cat { image, name } => cat(&image, &name),
        Commands::Verify { image, directory } => verify(&image, &directory),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read image {}", path.display()))
}

fn list(path: &Path, json: bool) -> Result<()> {
    let data = load(path)?;
    let reader = ImageReader::new(&data)?;
    let records = reader.entries()?;
    let stats = reader.stats()?;

    let mut out = io::stdout().lock();
    if json {
        let entries: Vec<ListedEntry> = records
            .iter()
            .map(|r| ListedEntry {
                offset: r.offset,
                name: r.name,
                gzip: r.header.is_gzip(),
                encoded_size: r.header.encoded_size,
                uncompressed_size: r.header.uncompressed_size,
            })
            .collect();
        let doc = serde_json::json!({ "entries": entries, "stats": stats });
        serde_json::to_writer_pretty(&mut out, &doc)?;
        writeln!(out)?;
        return Ok(());
    }

    for r in &records {
        writeln!(
            out,
            "{:>8}  {:4}  {:>8} -> {:>8}  {}",
            r.offset,
            if r.header.is_gzip() { "gzip" } else { "raw" },
            r.header.uncompressed_size,
            r.header.encoded_size,
            r.name
        )?;
    }
    writeln!(
        out,
        "{} entries ({} gzip), {} -> {} bytes, image {} bytes",
        stats.entries,
        stats.gzip_entries,
        stats.uncompressed_bytes,
        stats.encoded_bytes,
        stats.image_bytes
    )?;
    Ok(())
}

fn cat(path: &Path, name: &str) -> Result<()> {
    let data = load(path)?;
    let contents = ImageReader::new(&data)?.read(name)?;
    io::stdout().lock().write_all(&contents)?;
    Ok(())
}

fn verify(path: &Path, directory: &Path) -> Result<()> {
    let data = load(path)?;
    let reader = ImageReader::new(&data)?;

    let mut mismatches = 0usize;
    let records = reader.entries()?;
    for record in &records {
        let source = directory.join(record.name);
        let expected = fs::read(&source)
            .with_context(|| format!("Failed to read {}", source.display()))?;
        if record.contents()? != expected {
            warn!("{} differs from {}", record.name, source.display());
            mismatches += 1;
        }
    }

    if mismatches > 0 {
        bail!("{} of {} entries differ", mismatches, records.len());
    }
    info!("{} entries verified", records.len());
    Ok(())
}
