//! # taskpool-sync
//!
//! Incremental directory replication.
//!
//! Call [`sync`] to copy every new, resized or freshly modified file from a
//! source tree into a destination tree, or [`plan`] to see what it would do
//! without touching the destination.

pub mod engine;
pub mod error;
pub mod plan;

pub use engine::{plan, sync, SyncOptions, SyncReport, DEFAULT_MTIME_TOLERANCE};
pub use error::SyncError;
pub use plan::{CopyReason, EntryInfo, PlanAction, SyncPlanEntry};
