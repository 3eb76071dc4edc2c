//! Session discovery.
//!
//! A capture session is the group of `capture_<run_id>.*` files one proxy run
//! leaves behind. Discovery merges two identity sources - manifest files and
//! raw `.flow` captures - so a half-deleted session stays visible as long as
//! either file survives, which is what makes interrupted cleanups resumable.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Every artifact file of a session starts with this prefix.
pub const ARTIFACT_PREFIX: &str = "capture_";

// Missing timestamps sort before any real `YYYY-...` value.
const TIMESTAMP_SENTINEL: &str = "0000";

/// One capture run's on-disk footprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureSession {
    /// Digits-and-underscores identifier, `YYYYMMDD_HHMMSS_<pid-or-suffix>`.
    pub run_id: String,
    /// Unqualified local-time stamp `YYYY-MM-DDTHH:MM:SS`; empty when neither
    /// the run id nor the manifest yields one.
    pub timestamp: String,
    /// Bytes across all regular `capture_<run_id>.*` files.
    pub total_size: u64,
}

fn run_id_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9_]+$").expect("run id pattern compiles"))
}

/// Run ids are interpolated into glob patterns later, so anything outside
/// digits and underscores is rejected outright.
pub fn is_valid_run_id(run_id: &str) -> bool {
    run_id_pattern().is_match(run_id)
}

/// Scan `dir` and return sessions sorted by timestamp ascending, oldest
/// first. Sessions with no resolvable timestamp sort before everything else.
/// Pure read; sizes are recomputed on every call.
pub fn discover(dir: &Path) -> Vec<CaptureSession> {
    let mut sessions = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    // Manifest-derived sessions take priority over orphan flows for the
    // same run id.
    for path in glob_in(dir, "capture_*.manifest.json") {
        let Some(run_id) = run_id_from(&path, ".manifest.json") else {
            continue;
        };
        if !seen.insert(run_id.clone()) {
            continue;
        }
        if let Some(session) = build_session(dir, &run_id, Some(&path)) {
            sessions.push(session);
        }
    }
    for path in glob_in(dir, "capture_*.flow") {
        let Some(run_id) = run_id_from(&path, ".flow") else {
            continue;
        };
        if !seen.insert(run_id.clone()) {
            continue;
        }
        if let Some(session) = build_session(dir, &run_id, None) {
            sessions.push(session);
        }
    }

    sessions.sort_by(|a, b| sort_key(a).cmp(sort_key(b)));
    sessions
}

/// The exact deletion set for a session: all regular `capture_<run_id>.*`
/// files plus the transient `.policy_<run_id>.json` staging file when one
/// exists. Returns nothing for malformed run ids.
pub fn session_files(dir: &Path, run_id: &str) -> Vec<PathBuf> {
    if !is_valid_run_id(run_id) {
        return Vec::new();
    }
    let mut files: Vec<PathBuf> = glob_in(dir, &format!("{ARTIFACT_PREFIX}{run_id}.*"))
        .into_iter()
        .filter(|path| is_regular_file(path))
        .collect();
    let staging = dir.join(format!(".policy_{run_id}.json"));
    if is_regular_file(&staging) {
        files.push(staging);
    }
    files
}

/// Glob for `tail` inside `dir`, escaping the directory component so hostile
/// directory names cannot alter the pattern. Results come back sorted.
pub(crate) fn glob_in(dir: &Path, tail: &str) -> Vec<PathBuf> {
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let pattern = Path::new(&escaped).join(tail);
    let Some(pattern) = pattern.to_str() else {
        return Vec::new();
    };
    match glob::glob(pattern) {
        Ok(paths) => paths.flatten().collect(),
        Err(err) => {
            tracing::debug!("bad glob pattern {pattern:?}: {err}");
            Vec::new()
        }
    }
}

pub(crate) fn is_regular_file(path: &Path) -> bool {
    // symlink_metadata so links never count as artifacts.
    path.symlink_metadata().is_ok_and(|meta| meta.is_file())
}

fn run_id_from(path: &Path, suffix: &str) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let run_id = name.strip_prefix(ARTIFACT_PREFIX)?.strip_suffix(suffix)?;
    Some(run_id.to_string())
}

fn build_session(dir: &Path, run_id: &str, manifest: Option<&Path>) -> Option<CaptureSession> {
    if !is_valid_run_id(run_id) {
        tracing::debug!("ignoring malformed run id {run_id:?}");
        return None;
    }
    let mut timestamp = timestamp_from_run_id(run_id);
    if let Some(stamp) = manifest.and_then(manifest_timestamp) {
        timestamp = stamp;
    }
    let total_size = artifact_size(dir, run_id);
    Some(CaptureSession {
        run_id: run_id.to_string(),
        timestamp,
        total_size,
    })
}

/// `20260101_120000_<suffix>` becomes `2026-01-01T12:00:00`. The first two
/// underscore fields must be exactly 8 and 6 digits; anything else yields an
/// empty stamp (and the session is treated as oldest).
fn timestamp_from_run_id(run_id: &str) -> String {
    let mut parts = run_id.split('_');
    let (Some(date), Some(time)) = (parts.next(), parts.next()) else {
        return String::new();
    };
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if date.len() != 8 || time.len() != 6 || !all_digits(date) || !all_digits(time) {
        return String::new();
    }
    format!(
        "{}-{}-{}T{}:{}:{}",
        &date[0..4],
        &date[4..6],
        &date[6..8],
        &time[0..2],
        &time[2..4],
        &time[4..6]
    )
}

#[derive(Deserialize)]
struct ManifestStamp {
    #[serde(default, rename = "startedAt", alias = "started_at")]
    started_at: String,
}

// The manifest's recorded start time is authoritative when present. Failures
// here are tolerated: a corrupt manifest falls back to the run-id stamp.
fn manifest_timestamp(path: &Path) -> Option<String> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::debug!("manifest read failed for {}: {err}", path.display());
            return None;
        }
    };
    let stamp: ManifestStamp = match serde_json::from_str(&raw) {
        Ok(stamp) => stamp,
        Err(err) => {
            tracing::debug!("manifest parse failed for {}: {err}", path.display());
            return None;
        }
    };
    if stamp.started_at.is_empty() {
        None
    } else {
        Some(stamp.started_at)
    }
}

fn artifact_size(dir: &Path, run_id: &str) -> u64 {
    glob_in(dir, &format!("{ARTIFACT_PREFIX}{run_id}.*"))
        .iter()
        .filter_map(|path| path.symlink_metadata().ok())
        .filter(std::fs::Metadata::is_file)
        .map(|meta| meta.len())
        .sum()
}

fn sort_key(session: &CaptureSession) -> &str {
    if session.timestamp.is_empty() {
        TIMESTAMP_SENTINEL
    } else {
        &session.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seed_session(dir: &Path, run_id: &str, payload: &[u8]) {
        for ext in ["flow", "har", "log"] {
            std::fs::write(dir.join(format!("capture_{run_id}.{ext}")), payload).unwrap();
        }
        std::fs::write(dir.join(format!("capture_{run_id}.manifest.json")), b"{}").unwrap();
    }

    #[test]
    fn derives_timestamp_from_run_id() {
        let tmp = TempDir::new().unwrap();
        seed_session(tmp.path(), "20260101_120000_111", b"x");

        let sessions = discover(tmp.path());
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].run_id, "20260101_120000_111");
        assert_eq!(sessions[0].timestamp, "2026-01-01T12:00:00");
    }

    #[test]
    fn manifest_started_at_overrides_run_id_stamp() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("capture_20260101_120000_1.flow"), b"x").unwrap();
        std::fs::write(
            tmp.path().join("capture_20260101_120000_1.manifest.json"),
            br#"{"startedAt": "2026-02-02T08:30:00"}"#,
        )
        .unwrap();

        let sessions = discover(tmp.path());
        assert_eq!(sessions[0].timestamp, "2026-02-02T08:30:00");
    }

    #[test]
    fn legacy_started_at_key_is_honored() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("capture_20260101_120000_1.manifest.json"),
            br#"{"started_at": "2026-03-03T09:00:00"}"#,
        )
        .unwrap();

        let sessions = discover(tmp.path());
        assert_eq!(sessions[0].timestamp, "2026-03-03T09:00:00");
    }

    #[test]
    fn corrupt_manifest_falls_back_to_run_id_stamp() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("capture_20260101_120000_1.manifest.json"),
            b"not json at all",
        )
        .unwrap();

        let sessions = discover(tmp.path());
        assert_eq!(sessions[0].timestamp, "2026-01-01T12:00:00");
    }

    #[test]
    fn orphan_flow_without_manifest_is_discovered() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("capture_20260104_050000_9.flow"), b"orphan").unwrap();

        let sessions = discover(tmp.path());
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].run_id, "20260104_050000_9");
        assert_eq!(sessions[0].total_size, 6);
    }

    #[test]
    fn manifest_and_flow_for_same_run_merge_once() {
        let tmp = TempDir::new().unwrap();
        seed_session(tmp.path(), "20260101_120000_1", b"abc");

        let sessions = discover(tmp.path());
        assert_eq!(sessions.len(), 1);
    }

    #[test]
    fn malformed_run_ids_are_excluded() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("capture_evil-rid.flow"), b"x").unwrap();
        std::fs::write(tmp.path().join("capture_..%2Fup.flow"), b"x").unwrap();
        std::fs::write(tmp.path().join("capture_20260101_120000_1.flow"), b"x").unwrap();

        let sessions = discover(tmp.path());
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].run_id, "20260101_120000_1");
    }

    #[test]
    fn sessions_sort_oldest_first_with_unknown_stamps_leading() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("capture_20260105_000000_3.flow"), b"x").unwrap();
        std::fs::write(tmp.path().join("capture_20250101_000000_2.flow"), b"x").unwrap();
        // Valid charset but no parseable date parts.
        std::fs::write(tmp.path().join("capture_777.flow"), b"x").unwrap();

        let order: Vec<String> = discover(tmp.path())
            .into_iter()
            .map(|s| s.run_id)
            .collect();
        assert_eq!(
            order,
            vec!["777", "20250101_000000_2", "20260105_000000_3"]
        );
    }

    #[test]
    fn total_size_sums_artifacts() {
        let tmp = TempDir::new().unwrap();
        seed_session(tmp.path(), "20260101_120000_1", b"12345");

        let sessions = discover(tmp.path());
        // Three 5-byte artifacts plus the two-byte manifest.
        assert_eq!(sessions[0].total_size, 17);
    }

    #[cfg(unix)]
    #[test]
    fn total_size_ignores_symlinks() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("capture_20260101_120000_1.flow"), b"12345").unwrap();
        std::os::unix::fs::symlink(
            tmp.path().join("capture_20260101_120000_1.flow"),
            tmp.path().join("capture_20260101_120000_1.alias"),
        )
        .unwrap();

        let sessions = discover(tmp.path());
        assert_eq!(sessions[0].total_size, 5);
    }

    #[test]
    fn session_files_include_policy_staging_file() {
        let tmp = TempDir::new().unwrap();
        seed_session(tmp.path(), "20260101_120000_1", b"x");
        std::fs::write(tmp.path().join(".policy_20260101_120000_1.json"), b"{}").unwrap();

        let files = session_files(tmp.path(), "20260101_120000_1");
        assert_eq!(files.len(), 5);
        assert!(files
            .iter()
            .any(|p| p.file_name().unwrap() == ".policy_20260101_120000_1.json"));
    }

    #[test]
    fn session_files_reject_malformed_run_ids() {
        let tmp = TempDir::new().unwrap();
        seed_session(tmp.path(), "20260101_120000_1", b"x");

        assert!(session_files(tmp.path(), "../20260101_120000_1").is_empty());
        assert!(session_files(tmp.path(), "*").is_empty());
    }

    #[test]
    fn run_id_charset_is_strict() {
        assert!(is_valid_run_id("20260101_120000_42"));
        assert!(is_valid_run_id("123"));
        assert!(!is_valid_run_id(""));
        assert!(!is_valid_run_id("2026-01-01"));
        assert!(!is_valid_run_id("abc"));
        assert!(!is_valid_run_id("1/2"));
    }
}
