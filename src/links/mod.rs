//! `latest.*` pointer maintenance.
//!
//! Each artifact extension gets at most one `latest.<ext>` symlink naming the
//! newest session's file. Updates go through a temp symlink renamed over the
//! pointer, so readers never observe a missing or half-written link. All
//! failures here are swallowed: pointers are a convenience, not a correctness
//! requirement.

use crate::catalog::{self, ARTIFACT_PREFIX};
use std::path::Path;

/// Extensions that get a `latest.<ext>` pointer. `scope_audit.json` is an
/// artifact too but deliberately never linked.
pub const POINTER_EXTENSIONS: &[&str] = &[
    "flow",
    "har",
    "log",
    "manifest.json",
    "index.ndjson",
    "summary.md",
    "ai.json",
    "ai.md",
    "navigation.ndjson",
];

/// True when any `latest.*` symlink currently names a file of `run_id`.
/// Checked before deletion, since deletion invalidates the answer.
pub fn is_pointer_target(dir: &Path, run_id: &str) -> bool {
    let needle = format!("{ARTIFACT_PREFIX}{run_id}.");
    for link in catalog::glob_in(dir, "latest.*") {
        if let Ok(target) = std::fs::read_link(&link) {
            if target.to_string_lossy().contains(&needle) {
                return true;
            }
        }
    }
    false
}

/// Repoint every `latest.<ext>` at the newest surviving artifact of that
/// extension, or drop the pointer when no candidate remains. Candidates sort
/// lexically, which is chronological because filenames embed zero-padded
/// date/time. Idempotent.
pub fn refresh_links(dir: &Path) {
    for ext in POINTER_EXTENSIONS {
        let link = dir.join(format!("latest.{ext}"));
        match newest_artifact(dir, ext) {
            Some(target) => point_link(dir, &link, ext, &target),
            None => remove_stale(&link),
        }
    }
}

// Newest = lexically greatest regular file; dangling names never become
// pointer targets.
fn newest_artifact(dir: &Path, ext: &str) -> Option<String> {
    catalog::glob_in(dir, &format!("{ARTIFACT_PREFIX}*.{ext}"))
        .into_iter()
        .filter(|path| catalog::is_regular_file(path))
        .filter_map(|path| path.file_name()?.to_str().map(str::to_string))
        .next_back()
}

// The target is the bare file name: link and file share a directory, and a
// relative target survives the directory being moved or mounted elsewhere.
fn point_link(dir: &Path, link: &Path, ext: &str, target: &str) {
    let tmp = dir.join(format!("latest.{ext}.tmp"));
    if swap_link(link, &tmp, target).is_err() {
        let _ = std::fs::remove_file(&tmp);
        if let Err(err) = recreate_link(link, target) {
            tracing::debug!("failed to repoint {}: {err}", link.display());
        }
    }
}

fn swap_link(link: &Path, tmp: &Path, target: &str) -> std::io::Result<()> {
    make_symlink(target, tmp)?;
    std::fs::rename(tmp, link)
}

fn recreate_link(link: &Path, target: &str) -> std::io::Result<()> {
    match std::fs::remove_file(link) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }
    make_symlink(target, link)
}

fn remove_stale(link: &Path) {
    let is_symlink = link
        .symlink_metadata()
        .is_ok_and(|meta| meta.file_type().is_symlink());
    if is_symlink {
        if let Err(err) = std::fs::remove_file(link) {
            tracing::debug!("failed to remove stale pointer {}: {err}", link.display());
        }
    }
}

#[cfg(unix)]
fn make_symlink(target: &str, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn make_symlink(target: &str, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}
