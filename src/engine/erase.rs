//! File removal backends.
//!
//! Deletion is best-effort by contract: an eraser never propagates IO errors,
//! it reports a tagged [`EraseOutcome`] instead. The secure backend shells out
//! to `shred` for a multi-pass overwrite before unlink; when the tool is
//! missing or fails it silently degrades to a plain unlink. On copy-on-write
//! or wear-leveled storage even a successful shred is not a forensic
//! guarantee.

use serde::Serialize;
use std::path::Path;
use std::process::Command;

/// Outcome of one file's removal attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EraseOutcome {
    /// Overwritten and unlinked by the shredding tool.
    ErasedSecurely,
    /// Plain unlink, either by choice or as the shred fallback.
    ErasedPlain,
    /// Removal failed; the file may still exist.
    Failed,
    /// Dry run, nothing touched.
    Skipped,
}

impl EraseOutcome {
    /// True when the file is gone.
    pub fn removed(self) -> bool {
        matches!(self, Self::ErasedSecurely | Self::ErasedPlain)
    }
}

/// A removal backend. Implementations swallow their own errors and answer
/// with an outcome tag, which the engine folds into the run report.
pub trait Eraser: Send + Sync {
    /// Remove one file, best-effort.
    fn erase(&self, path: &Path) -> EraseOutcome;

    /// Whether the backend can actually run on this host.
    fn is_available(&self) -> bool {
        true
    }

    /// Short identifier for logs.
    fn name(&self) -> &str;
}

/// Ordinary `remove_file` deletion.
pub struct PlainEraser;

impl Eraser for PlainEraser {
    fn erase(&self, path: &Path) -> EraseOutcome {
        match std::fs::remove_file(path) {
            Ok(()) => EraseOutcome::ErasedPlain,
            Err(err) => {
                tracing::warn!("failed to remove {}: {err}", path.display());
                EraseOutcome::Failed
            }
        }
    }

    fn name(&self) -> &str {
        "plain"
    }
}

/// Overwrite-then-unlink via the external `shred` tool, falling back to a
/// plain unlink when shred is absent or exits non-zero.
pub struct ShredEraser {
    passes: u32,
}

impl ShredEraser {
    pub fn new(passes: u32) -> Self {
        Self { passes }
    }
}

impl Default for ShredEraser {
    fn default() -> Self {
        Self::new(3)
    }
}

impl Eraser for ShredEraser {
    fn erase(&self, path: &Path) -> EraseOutcome {
        let result = Command::new("shred")
            .arg("-n")
            .arg(self.passes.to_string())
            .args(["-z", "-u"])
            .arg(path)
            .output();
        match result {
            Ok(output) if output.status.success() => EraseOutcome::ErasedSecurely,
            Ok(output) => {
                tracing::debug!("shred exited {} for {}", output.status, path.display());
                PlainEraser.erase(path)
            }
            Err(err) => {
                tracing::debug!("shred unavailable: {err}");
                PlainEraser.erase(path)
            }
        }
    }

    fn is_available(&self) -> bool {
        Command::new("shred")
            .arg("--version")
            .output()
            .is_ok_and(|output| output.status.success())
    }

    fn name(&self) -> &str {
        "shred"
    }
}

/// Pick the backend for a run.
pub fn eraser_for(secure: bool) -> Box<dyn Eraser> {
    if secure {
        Box::new(ShredEraser::default())
    } else {
        Box::new(PlainEraser)
    }
}
