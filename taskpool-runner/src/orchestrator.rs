//! Group-ordered task execution.
//!
//! For each token of the group order, every task whose group id renders to
//! that token runs, in insertion order, strictly one at a time. A sync error
//! ends the whole run; a command failure is reported and the run continues.
//!
//! ```text
//! Idle ──start──▶ Running ──▶ Completed
//!                    │
//!                    └──────▶ Failed { message }
//! ```
//!
//! A finished orchestrator may be started again; a running one rejects a
//! second start with [`RunError::AlreadyRunning`].

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{oneshot, watch};

use taskpool_core::{
    CancelFlag, GroupOrder, StatusBus, StatusEvent, SyncTask, Task, TaskPoolConfig,
};
use taskpool_sync::{PlanAction, SyncError, SyncOptions, SyncPlanEntry};

use crate::command::{CommandExecutor, CommandOutcome, CommandRunner, ProcessExecutor};
use crate::error::RunError;

const CANCELLED: &str = "run cancelled";

// ---------------------------------------------------------------------------
// Request / state / outcome
// ---------------------------------------------------------------------------

/// Immutable snapshot handed to one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub tasks: Vec<Task>,
    pub order: GroupOrder,
    pub force: bool,
}

impl RunRequest {
    pub fn new(tasks: Vec<Task>, order: impl Into<GroupOrder>, force: bool) -> Self {
        Self {
            tasks,
            order: order.into(),
            force,
        }
    }

    pub fn from_config(config: &TaskPoolConfig) -> Self {
        Self {
            tasks: config.tasks.clone(),
            order: config.group_order(),
            force: config.force_copy,
        }
    }

    /// `(group token, task)` pairs in execution order.
    pub fn schedule(&self) -> impl Iterator<Item = (&str, &Task)> {
        self.order
            .iter()
            .flat_map(move |token| self.tasks.iter().filter(move |t| t.in_group(token)).map(move |t| (token, t)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Failed { message: String },
}

impl RunState {
    pub fn is_running(&self) -> bool {
        matches!(self, RunState::Running)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub groups_run: usize,
    pub tasks_run: usize,
    pub files_copied: usize,
    pub entries_replaced: usize,
    pub commands_failed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    fn starting_now() -> Self {
        let now = Utc::now();
        Self {
            groups_run: 0,
            tasks_run: 0,
            files_copied: 0,
            entries_replaced: 0,
            commands_failed: 0,
            started_at: now,
            finished_at: now,
        }
    }
}

/// Terminal result of one run; `state` is `Completed` or `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub state: RunState,
    pub summary: RunSummary,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.state == RunState::Completed
    }

    pub fn failure_message(&self) -> Option<&str> {
        match &self.state {
            RunState::Failed { message } => Some(message),
            _ => None,
        }
    }
}

/// Handle on a run executing on its own thread.
#[derive(Debug)]
pub struct RunHandle {
    outcome: oneshot::Receiver<RunOutcome>,
    cancel: CancelFlag,
}

impl RunHandle {
    /// Ask the run to stop before its next task or file.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn wait(self) -> Result<RunOutcome, RunError> {
        self.outcome
            .await
            .map_err(|_| RunError::ChannelClosed("run outcome"))
    }

    /// Blocking wait for callers outside an async runtime.
    pub fn blocking_wait(self) -> Result<RunOutcome, RunError> {
        self.outcome
            .blocking_recv()
            .map_err(|_| RunError::ChannelClosed("run outcome"))
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Executes [`RunRequest`]s and publishes progress to its [`StatusBus`].
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    bus: StatusBus,
    runner: CommandRunner,
    state: watch::Sender<RunState>,
}

impl Orchestrator {
    pub fn new(bus: StatusBus) -> Self {
        Self::with_executor(bus, Arc::new(ProcessExecutor))
    }

    pub fn with_executor(bus: StatusBus, executor: Arc<dyn CommandExecutor>) -> Self {
        let (state, _) = watch::channel(RunState::Idle);
        Self {
            inner: Arc::new(Inner {
                bus,
                runner: CommandRunner::new(executor),
                state,
            }),
        }
    }

    pub fn state(&self) -> RunState {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every state transition.
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.inner.state.subscribe()
    }

    /// Run on the calling thread.
    pub fn run_blocking(&self, request: RunRequest) -> Result<RunOutcome, RunError> {
        self.begin()?;
        Ok(self.execute(&request, &CancelFlag::new()))
    }

    /// Run on a dedicated background thread.
    pub fn spawn(&self, request: RunRequest) -> Result<RunHandle, RunError> {
        self.begin()?;

        let cancel = CancelFlag::new();
        let (tx, rx) = oneshot::channel();
        let this = self.clone();
        let flag = cancel.clone();
        let spawned = thread::Builder::new()
            .name("taskpool-run".to_string())
            .spawn(move || {
                let outcome = this.execute(&request, &flag);
                let _ = tx.send(outcome);
            });

        if let Err(err) = spawned {
            self.inner.state.send_replace(RunState::Failed {
                message: format!("failed to start run thread: {err}"),
            });
            return Err(RunError::Thread(err));
        }
        Ok(RunHandle {
            outcome: rx,
            cancel,
        })
    }

    /// Atomically move to `Running` unless a run is in flight.
    fn begin(&self) -> Result<(), RunError> {
        let started = self.inner.state.send_if_modified(|state| {
            if state.is_running() {
                false
            } else {
                *state = RunState::Running;
                true
            }
        });
        if started {
            Ok(())
        } else {
            Err(RunError::AlreadyRunning)
        }
    }

    fn execute(&self, request: &RunRequest, cancel: &CancelFlag) -> RunOutcome {
        let guard = AbortGuard(&self.inner.state);
        let bus = &self.inner.bus;
        let mut summary = RunSummary::starting_now();

        tracing::info!(
            tasks = request.tasks.len(),
            order = %request.order,
            force = request.force,
            "run started"
        );

        let result = self.run_groups(request, cancel, &mut summary);
        if let Ok(synced) = &result {
            if request.force {
                self.verify(synced);
            }
        }
        summary.finished_at = Utc::now();

        let state = match result {
            Ok(_) => {
                bus.emit(StatusEvent::Completed);
                RunState::Completed
            }
            Err(message) => {
                bus.emit(StatusEvent::Failed {
                    message: message.clone(),
                });
                RunState::Failed { message }
            }
        };
        self.inner.state.send_replace(state.clone());
        drop(guard);

        RunOutcome { state, summary }
    }

    /// Returns the sync tasks that ran, or the fatal error message.
    fn run_groups<'a>(
        &self,
        request: &'a RunRequest,
        cancel: &CancelFlag,
        summary: &mut RunSummary,
    ) -> Result<Vec<&'a SyncTask>, String> {
        let bus = &self.inner.bus;
        let mut synced = Vec::new();

        for token in request.order.iter() {
            if cancel.is_cancelled() {
                return Err(CANCELLED.to_string());
            }
            bus.emit(StatusEvent::GroupStarted {
                group: token.to_string(),
            });
            summary.groups_run += 1;

            for task in request.tasks.iter().filter(|t| t.in_group(token)) {
                if cancel.is_cancelled() {
                    return Err(CANCELLED.to_string());
                }
                match task {
                    Task::Sync(sync_task) => {
                        if sync_task.is_inert() {
                            tracing::debug!("skipping sync task with empty path in group {token}");
                            continue;
                        }
                        let options = SyncOptions {
                            force: request.force,
                            cancel: cancel.clone(),
                            ..SyncOptions::default()
                        };
                        let report = taskpool_sync::sync(
                            &sync_task.source,
                            &sync_task.destination,
                            &options,
                            bus,
                        )
                        .map_err(|err| match err {
                            SyncError::Cancelled => CANCELLED.to_string(),
                            other => other.to_string(),
                        })?;
                        summary.tasks_run += 1;
                        summary.files_copied += report.copied.len();
                        summary.entries_replaced += report.replaced.len();
                        synced.push(sync_task);
                    }
                    Task::Command(command_task) => {
                        let name = command_task.display_name().to_string();
                        match self.inner.runner.run_task(command_task, bus) {
                            Ok(CommandOutcome::Skipped) => {
                                tracing::debug!("skipping empty command in group {token}");
                            }
                            Ok(CommandOutcome::Succeeded { .. }) => {
                                summary.tasks_run += 1;
                                bus.emit(StatusEvent::CommandSucceeded { name });
                            }
                            Err(err) => {
                                summary.tasks_run += 1;
                                summary.commands_failed += 1;
                                bus.emit(StatusEvent::CommandFailed {
                                    name,
                                    message: err.to_string(),
                                });
                            }
                        }
                    }
                }
            }
        }
        Ok(synced)
    }

    /// Re-plan every sync pair that ran and report anything still out of date.
    /// Findings are informational and never fail the run.
    fn verify(&self, synced: &[&SyncTask]) {
        let bus = &self.inner.bus;
        bus.emit(StatusEvent::Verifying);

        let mut seen = HashSet::<(PathBuf, PathBuf)>::new();
        for task in synced {
            if !seen.insert((task.source.clone(), task.destination.clone())) {
                continue;
            }
            let options = SyncOptions::force(true);
            match taskpool_sync::plan(&task.source, &task.destination, &options) {
                Ok(entries) => {
                    let pending = entries.iter().filter(|e| e.action.copies()).count();
                    if pending > 0 {
                        bus.emit(StatusEvent::VerifyPending {
                            destination: task.destination.clone(),
                            pending,
                        });
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        "verification of {} skipped: {err}",
                        task.destination.display()
                    );
                }
            }
        }
    }
}

/// Leaves the state `Failed` if a run unwinds before recording its outcome.
struct AbortGuard<'a>(&'a watch::Sender<RunState>);

impl Drop for AbortGuard<'_> {
    fn drop(&mut self) {
        self.0.send_if_modified(|state| {
            if state.is_running() {
                *state = RunState::Failed {
                    message: "run aborted".to_string(),
                };
                true
            } else {
                false
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Dry-run planning
// ---------------------------------------------------------------------------

/// One scheduled task and, for syncs, what it would copy right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPlan {
    pub group: String,
    pub task: Task,
    /// Inert tasks are listed but would be skipped.
    pub inert: bool,
    pub files: Vec<SyncPlanEntry>,
}

impl TaskPlan {
    pub fn pending_copies(&self) -> usize {
        self.files.iter().filter(|e| e.action.copies()).count()
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &SyncPlanEntry> {
        self.files
            .iter()
            .filter(|e| matches!(e.action, PlanAction::Conflict { .. }))
    }
}

/// Preview a run without writing or executing anything.
///
/// Each sync task is planned against the destination as it is now; effects of
/// earlier tasks in the same run are not simulated.
pub fn plan(request: &RunRequest) -> Result<Vec<TaskPlan>, RunError> {
    let options = SyncOptions::force(request.force);
    let mut plans = Vec::new();
    for (token, task) in request.schedule() {
        let inert = task.is_inert();
        let files = match task {
            Task::Sync(sync_task) if !inert => {
                taskpool_sync::plan(&sync_task.source, &sync_task.destination, &options)?
            }
            _ => Vec::new(),
        };
        plans.push(TaskPlan {
            group: token.to_string(),
            task: task.clone(),
            inert,
            files,
        });
    }
    Ok(plans)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
