//! The retention engine.
//!
//! One invocation is a bounded pipeline: discover sessions, resolve the
//! retention policy into a doomed set, delete doomed sessions best-effort,
//! then repair `latest.*` pointers if a deletion invalidated one. Everything
//! the engine needs arrives in the [`CleanupRequest`]; it never reads ambient
//! process state such as the working directory or environment.

pub mod erase;

pub use erase::{eraser_for, EraseOutcome, Eraser, PlainEraser, ShredEraser};

use crate::catalog::{self, CaptureSession};
use crate::links;
use crate::retention::{self, format_size, RetentionPolicy};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Engine input, fully explicit.
#[derive(Debug, Clone)]
pub struct CleanupRequest {
    /// Captures directory to sweep.
    pub directory: PathBuf,
    /// Delete sessions older than this many days.
    pub keep_days: Option<u32>,
    /// Cumulative size budget for surviving sessions, e.g. `"500M"`.
    pub keep_size: Option<String>,
    /// Overwrite files with `shred` before unlinking.
    pub secure: bool,
    /// Compute everything, delete nothing.
    pub dry_run: bool,
}

/// How a run ended. Every variant is a success at the process level; only a
/// malformed size budget makes [`run_cleanup`] return an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CleanupStatus {
    DirectoryAbsent,
    NoSessionsFound,
    NothingToDelete,
    Ok,
}

/// Per-file removal record.
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    /// File name within the captures directory.
    pub path: String,
    pub outcome: EraseOutcome,
}

/// Per-deleted-session record.
#[derive(Debug, Clone, Serialize)]
pub struct SessionDetail {
    pub run_id: String,
    /// Session timestamp, or `"unknown"` when none could be resolved.
    pub timestamp: String,
    /// Catalog artifact bytes at discovery time.
    pub size: u64,
    pub size_human: String,
    /// Files in the deletion set.
    pub files: usize,
    pub outcomes: Vec<FileOutcome>,
}

/// The run report printed to stdout as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupSummary {
    pub status: CleanupStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub dry_run: bool,
    pub secure: bool,
    /// Sessions deleted (or previewed for deletion in a dry run).
    pub deleted: usize,
    /// Sessions surviving the policy.
    pub kept: usize,
    /// Files actually removed; planned files in a dry run.
    pub files_removed: usize,
    /// Bytes of removed files, measured immediately before removal.
    pub bytes_freed: u64,
    pub bytes_freed_human: String,
    /// Whether a deleted session was a `latest.*` pointer target.
    pub needs_latest_update: bool,
    pub details: Vec<SessionDetail>,
}

impl CleanupSummary {
    fn early(
        status: CleanupStatus,
        message: impl Into<String>,
        kept: usize,
        request: &CleanupRequest,
    ) -> Self {
        Self {
            status,
            message: Some(message.into()),
            dry_run: request.dry_run,
            secure: request.secure,
            deleted: 0,
            kept,
            files_removed: 0,
            bytes_freed: 0,
            bytes_freed_human: format_size(0),
            needs_latest_update: false,
            details: Vec::new(),
        }
    }
}

/// Run the full retention pipeline.
///
/// The only error is a malformed size budget, surfaced before the directory
/// is even looked at. Individual file failures never fail the run; they are
/// visible as `failed` outcome tags and lower removal counts.
pub fn run_cleanup(request: &CleanupRequest) -> anyhow::Result<CleanupSummary> {
    let policy = RetentionPolicy::parse(request.keep_days, request.keep_size.as_deref())?;

    if !request.directory.is_dir() {
        return Ok(CleanupSummary::early(
            CleanupStatus::DirectoryAbsent,
            format!("captures dir not found: {}", request.directory.display()),
            0,
            request,
        ));
    }

    let sessions = catalog::discover(&request.directory);
    if sessions.is_empty() {
        return Ok(CleanupSummary::early(
            CleanupStatus::NoSessionsFound,
            "no sessions found",
            0,
            request,
        ));
    }

    // Stays quiet for the early statuses above; an absent or empty directory
    // has nothing this warning could apply to.
    if !policy.is_configured() {
        tracing::warn!("no retention bounds configured; nothing will be deleted");
    }

    let doomed = retention::resolve(&sessions, &policy);
    if doomed.is_empty() {
        return Ok(CleanupSummary::early(
            CleanupStatus::NothingToDelete,
            "nothing to delete",
            sessions.len(),
            request,
        ));
    }

    let eraser = eraser_for(request.secure);
    let secure_available = !request.secure || eraser.is_available();
    if !secure_available {
        tracing::warn!("shred unavailable; secure erase degrades to plain removal");
    }
    let report = execute(
        &request.directory,
        &sessions,
        &doomed,
        eraser.as_ref(),
        request.dry_run,
    );

    if request.secure && secure_available && !request.dry_run {
        let fallbacks = report.plain_fallbacks();
        if fallbacks > 0 {
            tracing::warn!("secure erase degraded: {fallbacks} files fell back to plain removal");
        }
    }
    if report.needs_latest_update && !request.dry_run {
        links::refresh_links(&request.directory);
    }

    tracing::debug!(
        "swept {}: {} deleted, {} kept, {} freed",
        request.directory.display(),
        report.deleted,
        sessions.len() - report.deleted,
        format_size(report.bytes_freed)
    );
    Ok(report.into_summary(request, sessions.len()))
}

#[derive(Default)]
struct ExecutionReport {
    deleted: usize,
    files_removed: usize,
    bytes_freed: u64,
    needs_latest_update: bool,
    details: Vec<SessionDetail>,
}

impl ExecutionReport {
    fn plain_fallbacks(&self) -> usize {
        self.details
            .iter()
            .flat_map(|detail| &detail.outcomes)
            .filter(|file| file.outcome == EraseOutcome::ErasedPlain)
            .count()
    }

    fn into_summary(self, request: &CleanupRequest, total_sessions: usize) -> CleanupSummary {
        CleanupSummary {
            status: CleanupStatus::Ok,
            message: None,
            dry_run: request.dry_run,
            secure: request.secure,
            deleted: self.deleted,
            kept: total_sessions - self.deleted,
            files_removed: self.files_removed,
            bytes_freed: self.bytes_freed,
            bytes_freed_human: format_size(self.bytes_freed),
            needs_latest_update: self.needs_latest_update,
            details: self.details,
        }
    }
}

// Walks doomed sessions in catalog order and folds per-file outcomes into the
// report. Pointer-target checks happen before any of the session's files go
// away. Infallible: every IO problem becomes an outcome tag.
fn execute(
    dir: &Path,
    sessions: &[CaptureSession],
    doomed: &BTreeSet<String>,
    eraser: &dyn Eraser,
    dry_run: bool,
) -> ExecutionReport {
    let mut report = ExecutionReport::default();
    for session in sessions {
        if !doomed.contains(&session.run_id) {
            continue;
        }
        if links::is_pointer_target(dir, &session.run_id) {
            report.needs_latest_update = true;
        }

        let files = catalog::session_files(dir, &session.run_id);
        let mut outcomes = Vec::with_capacity(files.len());
        for path in &files {
            let size = path.symlink_metadata().map_or(0, |meta| meta.len());
            let outcome = if dry_run {
                EraseOutcome::Skipped
            } else {
                eraser.erase(path)
            };
            // A dry run counts planned removals so its report matches what a
            // live run would do on the same input.
            if outcome.removed() || dry_run {
                report.files_removed += 1;
                report.bytes_freed = report.bytes_freed.saturating_add(size);
            }
            outcomes.push(FileOutcome {
                path: file_name_of(path),
                outcome,
            });
        }

        report.details.push(SessionDetail {
            run_id: session.run_id.clone(),
            timestamp: if session.timestamp.is_empty() {
                "unknown".to_string()
            } else {
                session.timestamp.clone()
            },
            size: session.total_size,
            size_human: format_size(session.total_size),
            files: files.len(),
            outcomes,
        });
        report.deleted += 1;
    }
    report
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
}
