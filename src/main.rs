// SPDX-License-Identifier: MIT
//! mkespfs: pack a directory into an espfs image
//!
//! The image goes to stdout (or `--output`); progress goes to stderr.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use espfs_pack::config::parse_extension_group;
use espfs_pack::selector::read_file_list;
use espfs_pack::{
    pack_to_vec, pack_to_writer, write_c_array, BuildReport, CompressionPolicy, EmbedOptions,
    EntryOrder, PackConfig, PackError, SelectionMode,
};

#[derive(Parser)]
#[command(name = "mkespfs")]
#[command(about = "Pack a directory into a read-only espfs flash image", long_about = None)]
struct Cli {
    /// Directory to pack
    directory: PathBuf,

    /// Write the image to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Binary)]
    format: OutputFormat,

    /// Array name for `--format c-array`
    #[arg(long, default_value = "espfs_image")]
    symbol: String,

    /// Linker section for `--format c-array`
    #[arg(long, default_value = ".irom.text")]
    section: String,

    /// Omit the section attribute for `--format c-array`
    #[arg(long)]
    no_section: bool,

    /// Pack every regular file instead of the extension allow-list
    #[arg(long, conflicts_with_all = ["ext", "files_from"])]
    all: bool,

    /// Extension group, comma separated; repeat for lower-priority groups
    #[arg(long, value_name = "LIST", conflicts_with = "files_from")]
    ext: Vec<String>,

    /// Pack exactly the root-relative names listed in FILE (`-` for stdin)
    #[arg(long, value_name = "FILE")]
    files_from: Option<PathBuf>,

    /// Keep the host directory order instead of sorting by path
    #[arg(long)]
    walk_order: bool,

    /// When to store gzip payloads
    #[arg(long, value_name = "smaller-of|always|never")]
    compression: Option<CompressionPolicy>,

    /// gzip level
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=9))]
    level: Option<u32>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Raw image bytes
    Binary,
    /// C source defining a byte array
    CArray,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            let pack_error = e.downcast_ref::<PackError>();
            if let Some(PackError::InvalidRoot(_)) = pack_error {
                eprintln!("{}", Cli::command().render_usage());
            }
            ExitCode::from(pack_error.map(PackError::exit_code).unwrap_or(1))
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = pack_config(cli)?;
    config.validate()?;

    match &cli.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let result = emit(cli, &config, BufWriter::new(file));
            if result.is_err() {
                // Never leave a partial image behind
                let _ = fs::remove_file(path);
            }
            let report = result?;
            info!("Wrote {} bytes to {}", report.total_bytes, path.display());
        }
        None => {
            // Nothing reaches stdout unless the whole build succeeds
            let (bytes, _) = render(cli, &config)?;
            let mut out = io::stdout().lock();
            out.write_all(&bytes).context("Failed to write image to stdout")?;
            out.flush().context("Failed to flush output")?;
        }
    }
    Ok(())
}

/// Stream the build into a file sink
fn emit<W: Write>(cli: &Cli, config: &PackConfig, mut sink: W) -> Result<BuildReport> {
    let report = match cli.format {
        OutputFormat::Binary => pack_to_writer(&cli.directory, config, &mut sink)?,
        OutputFormat::CArray => {
            let (source, report) = render(cli, config)?;
            sink.write_all(&source)?;
            report
        }
    };
    sink.flush().context("Failed to flush output")?;
    Ok(report)
}

/// Build the complete output in memory
fn render(cli: &Cli, config: &PackConfig) -> Result<(Vec<u8>, BuildReport)> {
    let (image, report) = pack_to_vec(&cli.directory, config)?;
    let bytes = match cli.format {
        OutputFormat::Binary => image,
        OutputFormat::CArray => {
            let options = EmbedOptions {
                symbol: cli.symbol.clone(),
                section: (!cli.no_section).then(|| cli.section.clone()),
            };
            let mut source = Vec::with_capacity(image.len() * 6 + 128);
            write_c_array(&mut source, &image, &options)?;
            source
        }
    };
    Ok((bytes, report))
}

/// Environment defaults, then command-line overrides
fn pack_config(cli: &Cli) -> Result<PackConfig> {
    let mut config = PackConfig::from_env();

    if cli.all {
        config.selection.mode = SelectionMode::All;
    } else if !cli.ext.is_empty() {
        let groups = cli
            .ext
            .iter()
            .map(|list| parse_extension_group(list))
            .filter(|group| !group.is_empty())
            .collect();
        config.selection.mode = SelectionMode::Extensions(groups);
    } else if let Some(list) = &cli.files_from {
        let names = if list.as_os_str() == "-" {
            read_file_list(io::stdin().lock()).context("Failed to read file list from stdin")?
        } else {
            let file = File::open(list)
                .with_context(|| format!("Failed to open file list {}", list.display()))?;
            read_file_list(BufReader::new(file))
                .with_context(|| format!("Failed to read file list {}", list.display()))?
        };
        config.selection.mode = SelectionMode::Listed(names);
    }

    if cli.walk_order {
        config.selection.order = EntryOrder::WalkOrder;
    }
    if let Some(policy) = cli.compression {
        config.compression.policy = policy;
    }
    if let Some(level) = cli.level {
        config.compression.level = level;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_ext_groups_override_allow_list() {
        let cli = Cli::parse_from(["mkespfs", "--ext", "html,htm", "--ext", "svg", "web"]);
        let config = pack_config(&cli).unwrap();

        assert_eq!(
            config.selection.mode,
            SelectionMode::Extensions(vec![
                vec!["html".to_string(), "htm".to_string()],
                vec!["svg".to_string()],
            ])
        );
    }

    #[test]
    fn test_flags_override_compression_and_order() {
        let cli = Cli::parse_from([
            "mkespfs",
            "--all",
            "--walk-order",
            "--compression",
            "never",
            "--level",
            "1",
            "web",
        ]);
        let config = pack_config(&cli).unwrap();

        assert_eq!(config.selection.mode, SelectionMode::All);
        assert_eq!(config.selection.order, EntryOrder::WalkOrder);
        assert_eq!(config.compression.policy, CompressionPolicy::Never);
        assert_eq!(config.compression.level, 1);
    }

    #[test]
    fn test_missing_directory_is_usage_error() {
        assert!(Cli::try_parse_from(["mkespfs"]).is_err());
    }

    #[test]
    fn test_level_out_of_range() {
        assert!(Cli::try_parse_from(["mkespfs", "--level", "11", "web"]).is_err());
    }
}
