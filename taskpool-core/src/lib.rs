//! Taskpool core library: task model, group ordering, status events, config.
//!
//! - [`types`]: [`Task`] union, [`GroupId`], [`GroupOrder`]
//! - [`status`]: [`StatusEvent`] and the [`StatusBus`] sink
//! - [`cancel`]: [`CancelFlag`] checked between units of work
//! - [`config`]: persisted task pool document (load / save / edit)
//! - [`error`]: [`ConfigError`]

pub mod cancel;
pub mod config;
pub mod error;
pub mod status;
pub mod types;

pub use cancel::CancelFlag;
pub use config::TaskPoolConfig;
pub use error::ConfigError;
pub use status::{StatusBus, StatusEvent, StatusReceiver};
pub use types::{CommandTask, GroupId, GroupOrder, SyncTask, Task};
