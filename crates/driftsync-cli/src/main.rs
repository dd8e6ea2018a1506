//! driftsync - keep two directory trees in sync
//!
//! Upload, download, or bidirectionally synchronize two local directory
//! trees. Every command is a dry run until `--execute` is passed.

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use console::style;
use std::path::Path;
use tracing::info;

use driftsync_sync::{SyncOptions, Synchronizer};
use driftsync_target::FsTarget;
use driftsync_types::SyncReport;

/// driftsync - keep two directory trees in sync
#[derive(Parser)]
#[command(
    name = "driftsync",
    version = env!("CARGO_PKG_VERSION"),
    about = "Synchronize two directory trees",
    long_about = "driftsync uploads, downloads, or bidirectionally synchronizes two\n\
                  directory trees. Commands run in dry-run mode by default and report\n\
                  every action they would take; pass -x/--execute to apply changes."
)]
struct Cli {
    /// Increase output (may be repeated)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Decrease output (may be repeated)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    quiet: u8,

    /// Show per-block transfer progress
    #[arg(long, global = true)]
    progress: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Arguments shared by every synchronization command
#[derive(Args)]
struct SyncArgs {
    /// Local directory
    local: String,

    /// Remote directory
    remote: String,

    /// Apply changes (without this flag the run is a dry run)
    #[arg(short = 'x', long)]
    execute: bool,

    /// Overwrite newer target files; resolve conflicts toward the newer side
    #[arg(long)]
    force: bool,

    /// Remove target entries that do not exist on the source
    #[arg(long)]
    delete: bool,

    /// Remove target entries excluded by the filter (implies --delete)
    #[arg(long)]
    delete_unmatched: bool,

    /// File name patterns to include, comma-separated, e.g. -f "*.txt,*.rst"
    #[arg(short = 'f', long = "files", value_delimiter = ',')]
    include_files: Vec<String>,

    /// Name patterns to exclude from files and directories, comma-separated
    #[arg(short = 'o', long, value_delimiter = ',')]
    omit: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy new and modified files from LOCAL to REMOTE
    Upload(SyncArgs),
    /// Copy new and modified files from REMOTE to LOCAL
    Download(SyncArgs),
    /// Synchronize LOCAL and REMOTE in both directions
    Sync(SyncArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbosity = (3 + i16::from(cli.verbose) - i16::from(cli.quiet)).clamp(0, 5) as u8;
    init_logging(verbosity)?;

    info!("driftsync v{} starting", env!("CARGO_PKG_VERSION"));

    let (args, mode) = match &cli.command {
        Commands::Upload(args) => (args, "upload"),
        Commands::Download(args) => (args, "download"),
        Commands::Sync(args) => (args, "sync"),
    };
    let options = SyncOptions {
        dry_run: !args.execute,
        force: args.force,
        delete: args.delete,
        delete_unmatched: args.delete_unmatched,
        include_files: args.include_files.clone(),
        omit: args.omit.clone(),
        verbosity,
        progress: cli.progress,
        ..SyncOptions::default()
    };

    let local = open_target(&args.local)?;
    let remote = open_target(&args.remote)?;

    if options.dry_run && verbosity >= 2 {
        println!(
            "{} Dry-run mode: no changes are applied, pass -x/--execute to write",
            style("i").yellow().bold()
        );
    }

    let mut synchronizer = match mode {
        "upload" => Synchronizer::upload(local, remote, options),
        "download" => Synchronizer::download(local, remote, options),
        _ => Synchronizer::bidirectional(local, remote, options),
    }?;

    let report = synchronizer.run().await.context("synchronization failed")?;

    if verbosity >= 2 {
        print_summary(&report);
    }
    if verbosity >= 4 {
        println!("{:#?}", report.stats);
    }
    Ok(())
}

/// Open a location argument as a storage target
///
/// Only local directories are supported; URI-style locations are rejected
/// up front with a clear message instead of being treated as odd paths.
fn open_target(location: &str) -> Result<Box<dyn driftsync_target::StorageProvider>> {
    for scheme in ["ftp://", "ftps://", "sftp://"] {
        if location.starts_with(scheme) {
            bail!("remote protocol targets are not supported: '{location}'");
        }
    }
    let target = FsTarget::new(Path::new(location))
        .with_context(|| format!("cannot open target '{location}'"))?;
    Ok(Box::new(target))
}

fn init_logging(verbosity: u8) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = match verbosity {
        0..=1 => "error",
        2 => "warn",
        3 => "info",
        4 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    Ok(())
}

fn print_summary(report: &SyncReport) {
    let stats = &report.stats;
    let prefix = if report.dry_run {
        format!("{} ", style("(DRY-RUN)").yellow())
    } else {
        String::new()
    };
    println!(
        "{}{} Wrote {}/{} files in {} directories, deleted {}, conflicts {}.",
        prefix,
        style("✓").green().bold(),
        stats.files_written,
        stats.local_files,
        stats.dirs_created,
        stats.files_deleted,
        stats.conflict_files
    );
    if stats.bytes_written > 0 {
        println!(
            "  {} bytes in {:.2}s ({:.0} bytes/s)",
            stats.bytes_written,
            stats.duration.as_secs_f64(),
            stats.transfer_rate()
        );
    }
    if stats.errors > 0 {
        println!(
            "  {} {} entries skipped due to errors",
            style("!").red().bold(),
            stats.errors
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_upload() {
        let cli = Cli::parse_from([
            "driftsync",
            "upload",
            "/tmp/a",
            "/tmp/b",
            "-x",
            "--force",
            "-f",
            "*.txt,*.rst",
        ]);
        let Commands::Upload(args) = cli.command else {
            panic!("expected upload");
        };
        assert!(args.execute);
        assert!(args.force);
        assert_eq!(args.include_files, vec!["*.txt", "*.rst"]);
    }

    #[test]
    fn test_verbosity_flags_accumulate() {
        let cli = Cli::parse_from(["driftsync", "-v", "-v", "sync", "/tmp/a", "/tmp/b"]);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_ftp_locations_rejected() {
        assert!(open_target("ftp://example.com/path").is_err());
    }
}
