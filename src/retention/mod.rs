//! Retention policy resolution.
//!
//! Two independent bounds, unioned: an age cutoff (`keep_days`) and a greedy
//! cumulative size budget (`keep_size`). A session doomed by either is doomed.

pub mod size;

pub use size::{format_size, parse_size, SizeError};

use crate::catalog::CaptureSession;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Parsed retention bounds. Construct through [`RetentionPolicy::parse`] so a
/// malformed size budget fails before any filesystem work starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub keep_days: Option<u32>,
    pub keep_bytes: Option<u64>,
}

impl RetentionPolicy {
    pub fn parse(keep_days: Option<u32>, keep_size: Option<&str>) -> Result<Self, SizeError> {
        let keep_bytes = keep_size.map(parse_size).transpose()?;
        Ok(Self {
            keep_days,
            keep_bytes,
        })
    }

    /// False when neither bound is set; the engine then has nothing to do.
    pub fn is_configured(&self) -> bool {
        self.keep_days.is_some() || self.keep_bytes.is_some()
    }
}

// Lexically below any real timestamp, so a floored cutoff selects nothing
// beyond the always-deleted unstamped sessions.
const CUTOFF_FLOOR: &str = "0000-01-01T00:00:00";

/// The age cutoff, formatted exactly like session timestamps so lexical
/// comparison is valid: local time, `YYYY-MM-DDTHH:MM:SS`, no timezone.
/// A window the calendar cannot represent floors to `0000-01-01T00:00:00`,
/// keeping every stamped session.
pub fn compute_cutoff(keep_days: u32) -> String {
    let window = chrono::Duration::days(i64::from(keep_days));
    match chrono::Local::now().checked_sub_signed(window) {
        Some(cutoff) => cutoff.format("%Y-%m-%dT%H:%M:%S").to_string(),
        None => CUTOFF_FLOOR.to_string(),
    }
}

/// Decide which sessions to delete. `sessions` must be in catalog order
/// (timestamp ascending); the result is the union of both filters.
pub fn resolve(sessions: &[CaptureSession], policy: &RetentionPolicy) -> BTreeSet<String> {
    let mut doomed = BTreeSet::new();
    if let Some(days) = policy.keep_days {
        mark_expired(sessions, &compute_cutoff(days), &mut doomed);
    }
    if let Some(budget) = policy.keep_bytes {
        mark_over_budget(sessions, budget, &mut doomed);
    }
    doomed
}

// Keep strictly newer than the cutoff: a session at the boundary is deleted,
// and a session with no timestamp is always deleted.
fn mark_expired(sessions: &[CaptureSession], cutoff: &str, doomed: &mut BTreeSet<String>) {
    for session in sessions {
        if session.timestamp.is_empty() || session.timestamp.as_str() <= cutoff {
            doomed.insert(session.run_id.clone());
        }
    }
}

// Walk newest to oldest accumulating size. The first session that pushes the
// running total over the budget is doomed along with everything older; once
// the budget is blown it stays blown further back in time.
fn mark_over_budget(sessions: &[CaptureSession], budget: u64, doomed: &mut BTreeSet<String>) {
    let mut cumulative: u64 = 0;
    let mut exceeded = false;
    for session in sessions.iter().rev() {
        if exceeded {
            doomed.insert(session.run_id.clone());
            continue;
        }
        cumulative = cumulative.saturating_add(session.total_size);
        if cumulative > budget {
            doomed.insert(session.run_id.clone());
            exceeded = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(run_id: &str, timestamp: &str, total_size: u64) -> CaptureSession {
        CaptureSession {
            run_id: run_id.to_string(),
            timestamp: timestamp.to_string(),
            total_size,
        }
    }

    #[test]
    fn cutoff_matches_timestamp_shape() {
        let cutoff = compute_cutoff(7);
        assert_eq!(cutoff.len(), 19);
        assert_eq!(&cutoff[10..11], "T");
    }

    #[test]
    fn oversize_keep_window_floors_below_any_stamp() {
        let cutoff = compute_cutoff(u32::MAX);
        assert_eq!(cutoff, "0000-01-01T00:00:00");

        let sessions = vec![
            session("dated", "1970-01-01T00:00:00", 10),
            session("undated", "", 10),
        ];
        let mut doomed = BTreeSet::new();
        mark_expired(&sessions, &cutoff, &mut doomed);

        assert_eq!(doomed, BTreeSet::from(["undated".to_string()]));
    }

    #[test]
    fn session_at_cutoff_boundary_is_deleted() {
        let sessions = vec![
            session("1", "2026-01-01T00:00:00", 10),
            session("2", "2026-01-01T00:00:01", 10),
        ];
        let mut doomed = BTreeSet::new();
        mark_expired(&sessions, "2026-01-01T00:00:00", &mut doomed);

        assert!(doomed.contains("1"));
        assert!(!doomed.contains("2"));
    }

    #[test]
    fn missing_timestamp_is_always_expired() {
        let sessions = vec![session("1", "", 10)];
        let mut doomed = BTreeSet::new();
        mark_expired(&sessions, "0000-01-01T00:00:00", &mut doomed);

        assert!(doomed.contains("1"));
    }

    #[test]
    fn size_budget_keeps_newest_that_fit() {
        // Oldest to newest, 100 bytes each, budget 150: the newest fits, the
        // middle one blows the budget, everything older goes with it.
        let sessions = vec![
            session("old", "2026-01-01T00:00:00", 100),
            session("mid", "2026-01-02T00:00:00", 100),
            session("new", "2026-01-03T00:00:00", 100),
        ];
        let doomed = resolve(
            &sessions,
            &RetentionPolicy {
                keep_days: None,
                keep_bytes: Some(150),
            },
        );

        assert_eq!(
            doomed,
            BTreeSet::from(["old".to_string(), "mid".to_string()])
        );
    }

    #[test]
    fn generous_budget_dooms_nothing() {
        let sessions = vec![
            session("old", "2026-01-01T00:00:00", 100),
            session("new", "2026-01-02T00:00:00", 100),
        ];
        let doomed = resolve(
            &sessions,
            &RetentionPolicy {
                keep_days: None,
                keep_bytes: Some(1024),
            },
        );

        assert!(doomed.is_empty());
    }

    #[test]
    fn no_policy_selects_nothing() {
        let sessions = vec![session("1", "2020-01-01T00:00:00", 100)];
        let doomed = resolve(&sessions, &RetentionPolicy::default());

        assert!(doomed.is_empty());
        assert!(!RetentionPolicy::default().is_configured());
    }

    #[test]
    fn filters_union_their_selections() {
        // Age catches the unstamped session, size catches everything but the
        // newest; only "new" survives the union.
        let sessions = vec![
            session("stale", "", 1),
            session("old", "2999-01-01T00:00:00", 100),
            session("mid", "2999-01-02T00:00:00", 100),
            session("new", "2999-01-03T00:00:00", 100),
        ];
        let mut doomed = BTreeSet::new();
        mark_expired(&sessions, "1970-01-01T00:00:00", &mut doomed);
        mark_over_budget(&sessions, 150, &mut doomed);

        assert_eq!(doomed.len(), 3);
        assert!(!doomed.contains("new"));
    }

    #[test]
    fn malformed_size_budget_fails_parse() {
        assert!(RetentionPolicy::parse(Some(7), Some("abc")).is_err());
        assert_eq!(
            RetentionPolicy::parse(Some(7), Some("1K")),
            Ok(RetentionPolicy {
                keep_days: Some(7),
                keep_bytes: Some(1024),
            })
        );
    }
}
