//! Ordered task execution: command runner, group orchestrator, run state.

pub mod command;
mod error;
pub mod logging;
pub mod orchestrator;

pub use command::{
    CommandExecutor, CommandInvocation, CommandOutcome, CommandOutput, CommandRunner,
    ProcessExecutor,
};
pub use error::{CommandError, RunError};
pub use logging::{init_tracing, LogFormat};
pub use orchestrator::{
    plan, Orchestrator, RunHandle, RunOutcome, RunRequest, RunState, RunSummary, TaskPlan,
};
