#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::cast_precision_loss,
    clippy::doc_markdown,
    clippy::items_after_statements,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::too_many_lines,
    clippy::uninlined_format_args
)]

use anyhow::Result;
use capsweep::{
    discover, format_size, parse_size, refresh_links, session_files, CleanupRequest,
    RetentionConfig,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

fn parse_size_arg(s: &str) -> std::result::Result<String, String> {
    parse_size(s).map_err(|e| e.to_string())?;
    Ok(s.to_string())
}

/// `capsweep` - retention engine for capture sessions.
#[derive(Parser, Debug)]
#[command(name = "capsweep")]
#[command(author = "theonlyhennygod")]
#[command(version)]
#[command(about = "Retention engine for HTTP capture sessions.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply the retention policy to a captures directory
    #[command(long_about = "\
Apply the retention policy to a captures directory.

Sessions are selected by age (--keep-days) and/or by a cumulative \
size budget (--keep-size); a session matched by either bound is \
deleted, oldest first. The run summary is printed to stdout as JSON \
and the process exits 0 for every outcome; only a malformed size \
budget fails the run.

Examples:
  capsweep clean ./captures --keep-days 14
  capsweep clean ./captures --keep-size 2G --secure
  capsweep clean ./captures --config retention.toml --dry-run")]
    Clean {
        /// Captures directory to sweep
        directory: PathBuf,

        /// Delete sessions older than this many days
        #[arg(long, value_name = "DAYS")]
        keep_days: Option<u32>,

        /// Keep only the newest sessions that fit this cumulative size budget (e.g. 500M, 2G)
        #[arg(long, value_name = "SIZE", value_parser = parse_size_arg)]
        keep_size: Option<String>,

        /// Overwrite file contents with shred before unlinking
        #[arg(long)]
        secure: bool,

        /// Preview deletions without touching the filesystem
        #[arg(long)]
        dry_run: bool,

        /// TOML file with retention defaults; explicit flags take precedence
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Pretty-print the summary JSON
        #[arg(long)]
        pretty: bool,
    },

    /// List discovered sessions without deleting anything
    #[command(long_about = "\
List discovered sessions without deleting anything.

Shows the catalog the retention engine would operate on: run id, \
resolved timestamp, artifact size, and file count, oldest first.

Examples:
  capsweep list ./captures
  capsweep list ./captures --json")]
    List {
        /// Captures directory to scan
        directory: PathBuf,

        /// Emit JSON records instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Rebuild the latest.* pointer symlinks
    #[command(long_about = "\
Rebuild the latest.* pointer symlinks.

Repoints every latest.<ext> symlink at the newest surviving \
capture_*.<ext> file, removing pointers whose extension has no \
surviving file. A missing directory is reported and the command \
still exits 0, like clean. Useful after deleting session files by \
hand.

Example:
  capsweep relink ./captures")]
    Relink {
        /// Captures directory to repair
        directory: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging goes to stderr - stdout is reserved for machine-readable
    // output. Respects RUST_LOG, defaults to INFO.
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    match cli.command {
        Commands::Clean {
            directory,
            keep_days,
            keep_size,
            secure,
            dry_run,
            config,
            pretty,
        } => {
            let defaults = match config {
                Some(path) => RetentionConfig::load(&path)?,
                None => RetentionConfig::default(),
            };
            let request = CleanupRequest {
                directory,
                keep_days: keep_days.or(defaults.keep_days),
                keep_size: keep_size.or(defaults.keep_size),
                secure: secure || defaults.secure,
                dry_run,
            };
            let summary = capsweep::run_cleanup(&request)?;
            let rendered = if pretty {
                serde_json::to_string_pretty(&summary)?
            } else {
                serde_json::to_string(&summary)?
            };
            println!("{rendered}");
            Ok(())
        }

        Commands::List { directory, json } => run_list(&directory, json),

        Commands::Relink { directory } => {
            run_relink(&directory);
            Ok(())
        }
    }
}

fn run_list(dir: &Path, json: bool) -> Result<()> {
    let sessions = discover(dir);
    if json {
        let records: Vec<serde_json::Value> = sessions
            .iter()
            .map(|session| {
                serde_json::json!({
                    "run_id": session.run_id,
                    "timestamp": session.timestamp,
                    "total_size": session.total_size,
                    "size_human": format_size(session.total_size),
                    "files": session_files(dir, &session.run_id).len(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!("no sessions found");
        return Ok(());
    }
    println!(
        "{:<24} {:<20} {:>9} {:>6}",
        "RUN ID", "TIMESTAMP", "SIZE", "FILES"
    );
    for session in &sessions {
        let timestamp = if session.timestamp.is_empty() {
            "unknown"
        } else {
            session.timestamp.as_str()
        };
        println!(
            "{:<24} {:<20} {:>9} {:>6}",
            session.run_id,
            timestamp,
            format_size(session.total_size),
            session_files(dir, &session.run_id).len()
        );
    }
    Ok(())
}

// Missing directory is a successful no-op, matching `clean`'s
// directory-absent handling.
fn run_relink(dir: &Path) {
    if !dir.is_dir() {
        println!("captures dir not found: {}", dir.display());
        return;
    }
    refresh_links(dir);
    println!("latest pointers refreshed in {}", dir.display());
}
