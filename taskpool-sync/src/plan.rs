//! Per-file copy decisions.
//!
//! Decision precedence for a source file at relative path `R`:
//! 1. Destination entry (or one of its ancestors) has the other type → `Conflict`
//!    or, in force mode, `Replace`
//! 2. Destination absent → `Copy(Missing)`
//! 3. Sizes differ → `Copy(SizeChanged)` (wins even when the destination is newer)
//! 4. Either modification time unreadable → `Copy(MetadataUnavailable)`
//! 5. Source newer than destination + tolerance → `Copy(SourceNewer)`
//! 6. `Skip`

use std::fs::Metadata;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

/// Size, mtime and type of one filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryInfo {
    pub size: u64,
    pub modified: Option<SystemTime>,
    pub is_dir: bool,
}

impl From<&Metadata> for EntryInfo {
    fn from(meta: &Metadata) -> Self {
        Self {
            size: meta.len(),
            modified: meta.modified().ok(),
            is_dir: meta.is_dir(),
        }
    }
}

/// Why a file needs copying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyReason {
    Missing,
    SizeChanged,
    SourceNewer,
    MetadataUnavailable,
}

/// What the engine does with one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanAction {
    Copy(CopyReason),
    /// Remove the mismatched destination entry at `at`, then copy.
    Replace { at: PathBuf },
    /// Mismatched destination entry at `at`; aborts a non-force sync.
    Conflict { at: PathBuf },
    Skip,
}

impl PlanAction {
    /// Whether executing this action writes the file.
    pub fn copies(&self) -> bool {
        matches!(self, PlanAction::Copy(_) | PlanAction::Replace { .. })
    }
}

/// Derived, per-walk-step view of one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlanEntry {
    pub relative_path: PathBuf,
    pub source: EntryInfo,
    pub destination: Option<EntryInfo>,
    pub action: PlanAction,
}

/// Decide for two entries of the same type.
pub fn compare(source: &EntryInfo, destination: &EntryInfo, tolerance: Duration) -> PlanAction {
    if source.size != destination.size {
        return PlanAction::Copy(CopyReason::SizeChanged);
    }
    let (Some(src_mtime), Some(dst_mtime)) = (source.modified, destination.modified) else {
        return PlanAction::Copy(CopyReason::MetadataUnavailable);
    };
    if src_mtime > dst_mtime + tolerance {
        return PlanAction::Copy(CopyReason::SourceNewer);
    }
    PlanAction::Skip
}

/// The action for a file/directory mismatch at `at`.
pub fn mismatch(at: PathBuf, force: bool) -> PlanAction {
    if force {
        PlanAction::Replace { at }
    } else {
        PlanAction::Conflict { at }
    }
}
