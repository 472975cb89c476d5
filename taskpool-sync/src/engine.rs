//! Walk a source tree and replicate it into a destination.
//!
//! ## `sync` per-file protocol
//!
//! 1. Walk every non-directory entry under `source` (sorted, links not followed).
//! 2. Stat `destination/R` and classify it ([`crate::plan`]).
//! 3. Conflict without force → abort; earlier copies stay in place.
//! 4. Replace → remove the mismatched destination entry.
//! 5. Copy → create parent dirs, stream bytes, emit one `Copied` event.
//!
//! Directories are never entries of their own; they appear only as parents of
//! copied files. Nothing in the destination is ever deleted except to resolve
//! a conflict in force mode.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::Duration;

use walkdir::WalkDir;

use taskpool_core::{CancelFlag, StatusBus, StatusEvent};

use crate::error::{io_err, SyncError};
use crate::plan::{compare, mismatch, CopyReason, EntryInfo, PlanAction, SyncPlanEntry};

/// Timestamps closer than this are treated as equal.
pub const DEFAULT_MTIME_TOLERANCE: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Options / report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Resolve file/directory conflicts by deleting the destination entry.
    pub force: bool,
    pub tolerance: Duration,
    pub cancel: CancelFlag,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            force: false,
            tolerance: DEFAULT_MTIME_TOLERANCE,
            cancel: CancelFlag::new(),
        }
    }
}

impl SyncOptions {
    pub fn force(force: bool) -> Self {
        Self {
            force,
            ..Self::default()
        }
    }
}

/// Outcome of a completed sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Relative paths of files written, in walk order.
    pub copied: Vec<PathBuf>,
    /// Relative paths of destination entries removed to resolve conflicts.
    pub replaced: Vec<PathBuf>,
    pub skipped: usize,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.copied.is_empty() && self.replaced.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Public entrypoints
// ---------------------------------------------------------------------------

/// Replicate `source` into `destination`.
///
/// A missing `source` is a no-op. The first conflict (without force) or I/O
/// failure aborts the sync with no rollback.
pub fn sync(
    source: &Path,
    destination: &Path,
    options: &SyncOptions,
    bus: &StatusBus,
) -> Result<SyncReport, SyncError> {
    let mut report = SyncReport::default();

    walk_files(source, |file| {
        if options.cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let entry = evaluate(&file, destination, options)?;
        let target = destination.join(&entry.relative_path);
        match entry.action {
            PlanAction::Skip => {
                tracing::debug!("up to date: {}", entry.relative_path.display());
                report.skipped += 1;
                return Ok(());
            }
            PlanAction::Conflict { at } => {
                tracing::warn!("conflict at {}", display_relative(&at));
                return Err(SyncError::Conflict {
                    destination: under(destination, &at),
                    relative: at,
                });
            }
            PlanAction::Replace { at } => {
                remove_entry(&under(destination, &at))?;
                let shown = if at.as_os_str().is_empty() {
                    PathBuf::from(".")
                } else {
                    at
                };
                bus.emit(StatusEvent::Replaced {
                    relative: shown.clone(),
                });
                report.replaced.push(shown);
            }
            PlanAction::Copy(reason) => {
                tracing::debug!("copy {} ({reason:?})", entry.relative_path.display());
            }
        }

        copy_file(&file.path, &target)?;
        bus.emit(StatusEvent::Copied {
            relative: entry.relative_path.clone(),
        });
        report.copied.push(entry.relative_path);
        Ok(())
    })?;

    tracing::info!(
        copied = report.copied.len(),
        replaced = report.replaced.len(),
        skipped = report.skipped,
        "synced {} -> {}",
        source.display(),
        destination.display(),
    );
    Ok(report)
}

/// Classify every source file without writing anything.
///
/// Conflicts are reported as entries rather than errors.
pub fn plan(
    source: &Path,
    destination: &Path,
    options: &SyncOptions,
) -> Result<Vec<SyncPlanEntry>, SyncError> {
    let mut entries = Vec::new();
    walk_files(source, |file| {
        entries.push(evaluate(&file, destination, options)?);
        Ok(())
    })?;
    Ok(entries)
}

// ---------------------------------------------------------------------------
// Walk
// ---------------------------------------------------------------------------

struct SourceFile {
    path: PathBuf,
    relative: PathBuf,
    info: EntryInfo,
}

fn walk_files(
    source: &Path,
    mut visit: impl FnMut(SourceFile) -> Result<(), SyncError>,
) -> Result<(), SyncError> {
    match fs::symlink_metadata(source) {
        Ok(_) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tracing::debug!("source {} does not exist, nothing to sync", source.display());
            return Ok(());
        }
        Err(err) => return Err(io_err(source, err)),
    }

    for entry in WalkDir::new(source).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| SyncError::Walk {
            root: source.to_path_buf(),
            source: e,
        })?;
        if entry.file_type().is_dir() {
            continue;
        }

        let metadata = if entry.path_is_symlink() {
            match fs::metadata(entry.path()) {
                Ok(meta) if meta.is_file() => meta,
                Ok(_) => {
                    tracing::warn!("skipping symlink to directory: {}", entry.path().display());
                    continue;
                }
                Err(err) => {
                    tracing::warn!("skipping dangling symlink {}: {err}", entry.path().display());
                    continue;
                }
            }
        } else {
            entry.metadata().map_err(|e| SyncError::Walk {
                root: source.to_path_buf(),
                source: e,
            })?
        };

        let relative = match entry.path().strip_prefix(source) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel.to_path_buf(),
            // The source root is itself a file.
            _ => PathBuf::from(entry.file_name()),
        };

        visit(SourceFile {
            path: entry.path().to_path_buf(),
            relative,
            info: EntryInfo::from(&metadata),
        })?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

fn evaluate(
    file: &SourceFile,
    destination: &Path,
    options: &SyncOptions,
) -> Result<SyncPlanEntry, SyncError> {
    let target = destination.join(&file.relative);
    let (dest_info, action) = match fs::metadata(&target) {
        Ok(meta) => {
            let dest_info = EntryInfo::from(&meta);
            let action = if dest_info.is_dir != file.info.is_dir {
                mismatch(file.relative.clone(), options.force)
            } else {
                compare(&file.info, &dest_info, options.tolerance)
            };
            (Some(dest_info), action)
        }
        Err(err) => match blocking_ancestor(destination, &file.relative)? {
            Some(at) => (None, mismatch(at, options.force)),
            None if err.kind() == ErrorKind::NotFound => {
                (None, PlanAction::Copy(CopyReason::Missing))
            }
            None => return Err(io_err(&target, err)),
        },
    };

    Ok(SyncPlanEntry {
        relative_path: file.relative.clone(),
        source: file.info,
        destination: dest_info,
        action,
    })
}

/// First ancestor of `relative` (shallowest first, starting with the
/// destination root itself as the empty path) that exists as something other
/// than a directory.
fn blocking_ancestor(destination: &Path, relative: &Path) -> Result<Option<PathBuf>, SyncError> {
    match fs::metadata(destination) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Ok(Some(PathBuf::new())),
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_err(destination, err)),
    }

    let mut prefix = PathBuf::new();
    let mut components = relative.components().peekable();
    while let Some(component) = components.next() {
        if components.peek().is_none() {
            break;
        }
        prefix.push(component);
        let candidate = destination.join(&prefix);
        match fs::metadata(&candidate) {
            Ok(meta) if meta.is_dir() => continue,
            Ok(_) => return Ok(Some(prefix)),
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(io_err(&candidate, err)),
        }
    }
    Ok(None)
}

/// `destination/at`, where an empty `at` is the destination root.
fn under(destination: &Path, at: &Path) -> PathBuf {
    if at.as_os_str().is_empty() {
        destination.to_path_buf()
    } else {
        destination.join(at)
    }
}

pub(crate) fn display_relative(relative: &Path) -> std::path::Display<'_> {
    if relative.as_os_str().is_empty() {
        Path::new(".").display()
    } else {
        relative.display()
    }
}

// ---------------------------------------------------------------------------
// Filesystem mutations
// ---------------------------------------------------------------------------

fn remove_entry(path: &Path) -> Result<(), SyncError> {
    let meta = fs::symlink_metadata(path).map_err(|e| io_err(path, e))?;
    let result = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| io_err(path, e))
}

/// Stream `src` over `dst`, creating parent directories. A symlink at `dst`
/// is unlinked first so the write stays inside the destination tree. Partial
/// writes are left in place on failure.
fn copy_file(src: &Path, dst: &Path) -> Result<u64, SyncError> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    if let Ok(meta) = fs::symlink_metadata(dst) {
        if meta.file_type().is_symlink() {
            tracing::debug!("unlinking destination symlink {}", dst.display());
            fs::remove_file(dst).map_err(|e| io_err(dst, e))?;
        }
    }
    let mut reader = fs::File::open(src).map_err(|e| io_err(src, e))?;
    let mut writer = fs::File::create(dst).map_err(|e| io_err(dst, e))?;
    io::copy(&mut reader, &mut writer).map_err(|e| io_err(dst, e))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
