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

//! Retention engine for HTTP interception capture sessions.
//!
//! A capture run leaves a group of `capture_<run_id>.*` artifacts in a
//! directory, plus `latest.*` symlinks pointing at the newest run. This crate
//! discovers those sessions, applies an age and/or cumulative-size retention
//! policy, deletes expired sessions best-effort (optionally shredding file
//! contents first), and repairs the `latest.*` pointers afterwards.
//!
//! The whole pipeline is synchronous and single-threaded, and assumes it has
//! the captures directory to itself for the duration of one run. Deletion is
//! resumable at file granularity: a run killed halfway leaves a partial
//! session that the next run rediscovers and finishes off.
//!
//! Secure erase is best-effort only: it shells out to `shred` when available
//! and falls back to a plain unlink otherwise, warning once per run. Even a
//! successful overwrite is no guarantee on copy-on-write or wear-leveled
//! storage. The per-file outcome tags in the run summary record which path
//! was taken.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod links;
pub mod retention;

pub use catalog::{discover, session_files, CaptureSession};
pub use config::RetentionConfig;
pub use engine::{run_cleanup, CleanupRequest, CleanupStatus, CleanupSummary};
pub use links::{is_pointer_target, refresh_links};
pub use retention::{compute_cutoff, format_size, parse_size, RetentionPolicy, SizeError};
