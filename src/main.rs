//! fcat - catalog files by content and find duplicates.
//!
//! Usage:
//!   fcat scan                 Incrementally scan the configured root
//!   fcat duplicates           List duplicate groups in the catalog
//!   fcat verify FOLDER        Hash a folder from scratch, write file-hashes.json
//!   fcat upload FILE          Register a file's bytes under a display name
//!   fcat remove HASH          Delete the record with this hash
//!   fcat rename HASH PATH     Change the path of the record with this hash
//!   fcat export               Stream the catalog as NDJSON
//!   fcat --help               Show help

mod logging;
mod settings;

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::thread;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail, eyre};
use tokio::sync::broadcast::error::RecvError;
use tracing::info;

use filecatalog_analyze::{
    DuplicateConfig, DuplicateIndex, FolderVerifier, export_ndjson, register_upload,
};
use filecatalog_scan::{CatalogStore, ContentHash, ScanCoordinator, ScanResult};
use filecatalog_store::{MemoryCatalog, SqliteCatalog};

use crate::settings::Settings;

#[derive(Parser)]
#[command(
    name = "fcat",
    version,
    about = "Catalog files by content hash and find duplicates",
    long_about = "fcat keeps a persistent catalog of file fingerprints.\n\n\
                  Re-scans only hash files whose modification time moved, \
                  so repeated scans of a large tree stay cheap."
)]
struct Cli {
    /// Settings file (defaults to <config dir>/filecatalog/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Catalog database, overriding settings and FILECATALOG_DB
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan the configured root and update the catalog
    Scan {
        /// Root to scan, overriding settings and FILECATALOG_ROOT
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Hash everything into a throwaway in-memory catalog
        #[arg(long)]
        stateless: bool,

        /// Always list directories, even if unchanged since the last scan
        #[arg(long)]
        no_skip_dirs: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show groups of catalog records with identical content
    Duplicates {
        /// Minimum file size to consider (e.g., "1KB", "1MB")
        #[arg(short, long, default_value = "0")]
        min_size: String,

        /// Maximum number of duplicate groups to show
        #[arg(short = 'n', long, default_value = "20")]
        top: usize,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Hash every file under a folder and write the results to JSON
    Verify {
        /// Folder to verify
        folder: PathBuf,

        /// Artifact path (defaults to settings, then ./file-hashes.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Register a file's contents, recording duplicates by name
    Upload {
        /// File whose bytes are uploaded
        file: PathBuf,

        /// Display name (defaults to the file name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Remove the record with the given content hash
    Remove {
        /// 64-character hex content hash
        hash: String,
    },

    /// Change the path of the record with the given content hash
    Rename {
        /// 64-character hex content hash
        hash: String,

        /// New path for the record
        new_path: String,
    },

    /// Export every catalog record as newline-delimited JSON
    Export {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    logging::init(cli.verbose)?;

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(catalog) = cli.catalog {
        settings.catalog_path = catalog;
    }

    match cli.command {
        Command::Scan {
            root,
            stateless,
            no_skip_dirs,
            format,
        } => {
            if let Some(root) = root {
                settings.scan.root = root;
            }
            if no_skip_dirs {
                settings.scan.skip_unchanged_directories = false;
            }
            run_scan(&settings, stateless, format)?;
        }
        Command::Duplicates {
            min_size,
            top,
            format,
        } => {
            run_duplicates(&settings, &min_size, top, format)?;
        }
        Command::Verify {
            folder,
            output,
            format,
        } => {
            let artifact = output.unwrap_or_else(|| settings.artifact_path.clone());
            run_verify(&settings, &folder, &artifact, format)?;
        }
        Command::Upload { file, name } => {
            run_upload(&settings, &file, name)?;
        }
        Command::Remove { hash } => {
            let hash = parse_hash(&hash)?;
            let mut catalog = open_catalog(&settings)?;
            if !catalog.remove_by_hash(&hash)? {
                bail!("No record with hash {hash}");
            }
            println!("Removed {hash}");
        }
        Command::Rename { hash, new_path } => {
            let hash = parse_hash(&hash)?;
            let mut catalog = open_catalog(&settings)?;
            if !catalog.rename_by_hash(&hash, &new_path)? {
                bail!("No record with hash {hash}");
            }
            println!("Renamed {hash} to {new_path}");
        }
        Command::Export { output } => {
            run_export(&settings, output)?;
        }
    }

    Ok(())
}

fn open_catalog(settings: &Settings) -> Result<SqliteCatalog> {
    SqliteCatalog::open(&settings.catalog_path)
        .wrap_err_with(|| format!("Failed to open catalog {}", settings.catalog_path.display()))
}

fn parse_hash(hex: &str) -> Result<ContentHash> {
    ContentHash::from_hex(hex.trim()).wrap_err_with(|| format!("Invalid content hash '{hex}'"))
}

/// Run an incremental (or stateless) scan and print the result.
fn run_scan(settings: &Settings, stateless: bool, format: OutputFormat) -> Result<()> {
    let coordinator = ScanCoordinator::new(settings.scan.clone()).context("Invalid scan settings")?;

    let mut progress_rx = coordinator.subscribe();
    let reporter = thread::spawn(move || {
        loop {
            let progress = match progress_rx.blocking_recv() {
                Ok(progress) => progress,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            };
            match progress.percent() {
                Some(percent) => eprint!(
                    "\r {} / {} files ({percent:.0}%)",
                    progress.files_processed, progress.estimated_total
                ),
                None => eprint!("\r {} files", progress.files_processed),
            }
        }
        eprintln!();
    });

    let result = if stateless {
        info!("Stateless scan: nothing is persisted");
        coordinator.scan(&mut MemoryCatalog::new())
    } else {
        let mut catalog = open_catalog(settings)?;
        coordinator.scan(&mut catalog)
    };

    // Closing the channel ends the reporter.
    drop(coordinator);
    let _ = reporter.join();

    let result = result.context("Scan failed")?;

    match format {
        OutputFormat::Text => print_scan_result(&settings.scan.root, &result),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
    }

    Ok(())
}

fn print_scan_result(root: &Path, result: &ScanResult) {
    println!();
    println!("{}", "─".repeat(60));
    println!(" {}", root.display());
    println!(
        " {} hashed, {} unchanged, {} directories unchanged",
        result.files_scanned, result.files_unchanged, result.directories_unchanged
    );
    println!(" Estimated {} files", result.estimated_total);
    println!(" Scanned in {:.2}s", result.elapsed.as_secs_f64());
    println!("{}", "─".repeat(60));

    if !result.is_complete() {
        println!();
        println!(" {} path(s) bypassed:", result.files_bypassed);
        for path in &result.inaccessible_paths {
            println!("   {path}");
        }
    }
}

/// Report duplicate groups from the catalog.
fn run_duplicates(settings: &Settings, min_size: &str, top_n: usize, format: OutputFormat) -> Result<()> {
    let min_bytes = parse_size(min_size)?;
    let catalog = open_catalog(settings)?;

    let dup_config = DuplicateConfig::builder()
        .min_size(min_bytes)
        .max_groups(top_n)
        .build()?;

    let report = DuplicateIndex::with_config(dup_config).find_duplicates(&catalog)?;

    match format {
        OutputFormat::Text => {
            println!();
            println!("{}", "─".repeat(70));
            println!(" Duplicate File Report");
            println!("{}", "─".repeat(70));
            println!();

            if report.groups.is_empty() {
                println!(" No duplicate files found.");
            } else {
                println!(
                    " Found {} duplicate groups ({} files)",
                    report.group_count, report.files_with_duplicates
                );
                println!(
                    " Total wasted space: {}",
                    format_size(report.total_wasted_space)
                );
                println!();

                for (i, group) in report.groups.iter().enumerate() {
                    println!(
                        " Group {} ({} files, {} each, {} wasted)",
                        i + 1,
                        group.count(),
                        format_size(group.size),
                        format_size(group.wasted_bytes)
                    );
                    println!("   {}", group.hash);
                    for path in &group.paths {
                        println!("   {path}");
                    }
                    println!();
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

/// Verify a folder and write the artifact.
fn run_verify(settings: &Settings, folder: &Path, artifact: &Path, format: OutputFormat) -> Result<()> {
    let verifier = FolderVerifier::with_chunk_size(settings.scan.chunk_size);
    let report = verifier
        .verify_to(folder, artifact)
        .wrap_err_with(|| format!("Failed to verify {}", folder.display()))?;

    match format {
        OutputFormat::Text => {
            for file in &report.files {
                println!("{}  {}", file.hash, file.path);
            }
            eprintln!();
            eprintln!(
                "{} files, {} verified, written to {}",
                report.files.len(),
                format_size(report.total_size()),
                artifact.display()
            );
            for skipped in &report.skipped {
                eprintln!("skipped ({}): {}", skipped.kind, skipped.path);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

/// Register a file's bytes as an upload.
fn run_upload(settings: &Settings, file: &Path, name: Option<String>) -> Result<()> {
    let bytes = fs::read(file).wrap_err_with(|| format!("Failed to read {}", file.display()))?;
    let modified: DateTime<Utc> = fs::metadata(file)
        .and_then(|m| m.modified())
        .map(DateTime::from)
        .unwrap_or_else(|_| Utc::now());
    let name = match name {
        Some(name) => name,
        None => file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| eyre!("Cannot derive a name from {}", file.display()))?,
    };

    let mut catalog = open_catalog(settings)?;
    let outcome = register_upload(&mut catalog, &bytes, &name, modified)?;

    println!("{}", serde_json::to_string(&outcome)?);
    Ok(())
}

/// Stream the catalog as NDJSON.
fn run_export(settings: &Settings, output: Option<PathBuf>) -> Result<()> {
    let catalog = open_catalog(settings)?;

    let written = match &output {
        Some(path) => {
            let file = File::create(path)
                .wrap_err_with(|| format!("Failed to create {}", path.display()))?;
            export_ndjson(&catalog, BufWriter::new(file))?
        }
        None => export_ndjson(&catalog, io::stdout().lock())?,
    };

    if let Some(path) = output {
        eprintln!("Exported {written} records to {}", path.display());
    }
    Ok(())
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Parse a size string (e.g., "1KB", "10MB", "1GB").
fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim().to_uppercase();
    let digits = s.trim_end_matches(|c: char| !c.is_ascii_digit() && c != '.');
    let unit = &s[digits.len()..];

    let multiplier: u64 = match unit {
        "" | "B" => 1,
        "K" | "KB" => 1024,
        "M" | "MB" => 1024 * 1024,
        "G" | "GB" => 1024 * 1024 * 1024,
        other => bail!("Unknown size unit '{other}'"),
    };
    let num: f64 = digits
        .parse()
        .wrap_err_with(|| format!("Invalid size '{s}'"))?;

    Ok((num * multiplier as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("0").unwrap(), 0);
        assert_eq!(parse_size("512").unwrap(), 512);
        assert_eq!(parse_size("1KB").unwrap(), 1024);
        assert_eq!(parse_size("1.5k").unwrap(), 1536);
        assert_eq!(parse_size("2MB").unwrap(), 2 * 1024 * 1024);
        assert!(parse_size("3XB").is_err());
        assert!(parse_size("MB").is_err());
    }

    #[test]
    fn test_parse_hash() {
        let hex = "ab".repeat(32);
        assert_eq!(parse_hash(&hex).unwrap(), ContentHash::new([0xab; 32]));
        assert!(parse_hash("xyz").is_err());
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["fcat", "scan", "--stateless", "--root", "/srv"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Scan { stateless: true, root: Some(_), .. }
        ));

        let cli = Cli::try_parse_from(["fcat", "-v", "rename", "abc", "new.txt"]).unwrap();
        assert_eq!(cli.verbose, 1);
        assert!(matches!(cli.command, Command::Rename { .. }));
    }
}
