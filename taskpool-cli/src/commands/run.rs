//! `taskpool run`: execute the task pool and stream progress.

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::Args;
use colored::{ColoredString, Colorize};

use taskpool_core::{StatusBus, StatusEvent};
use taskpool_runner::{Orchestrator, RunOutcome, RunRequest};

use super::{effective_order, ConfigLocation};

/// Arguments for `taskpool run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Group order for this run only, e.g. "2,1".
    #[arg(long, value_name = "SEQUENCE")]
    pub order: Option<String>,

    /// Replace destination entries whose type conflicts with the source.
    #[arg(long, conflicts_with = "no_force")]
    pub force: bool,

    /// Abort on type conflicts even if the config enables force copy.
    #[arg(long)]
    pub no_force: bool,

    /// Print one JSON object per event, then the outcome.
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    pub fn run(self, location: &ConfigLocation) -> Result<()> {
        let config = location.load()?;
        let force = match (self.force, self.no_force) {
            (true, _) => true,
            (_, true) => false,
            _ => config.force_copy,
        };
        let order = effective_order(&config, self.order.as_deref());
        let request = RunRequest::new(config.tasks, order, force);

        let (bus, mut events) = StatusBus::channel();
        let orchestrator = Orchestrator::new(bus);
        let handle = orchestrator.spawn(request).context("failed to start run")?;
        // The run thread holds the only other sender, so the stream ends with it.
        drop(orchestrator);

        while let Some(event) = events.blocking_recv() {
            if self.json {
                println!(
                    "{}",
                    serde_json::to_string(&event).context("failed to serialize event")?
                );
            } else {
                println!("{}", paint(&event));
            }
            if event.is_terminal() {
                break;
            }
        }

        let outcome = handle.blocking_wait()?;
        if self.json {
            println!(
                "{}",
                serde_json::to_string(&outcome).context("failed to serialize outcome")?
            );
        } else {
            print_summary(&outcome);
        }

        if let Some(message) = outcome.failure_message() {
            bail!("run failed: {message}");
        }
        Ok(())
    }
}

fn paint(event: &StatusEvent) -> ColoredString {
    let line = event.to_string();
    match event {
        StatusEvent::GroupStarted { .. } => line.bold(),
        StatusEvent::Copied { .. } | StatusEvent::CommandSucceeded { .. } => line.green(),
        StatusEvent::Replaced { .. } | StatusEvent::VerifyPending { .. } => line.yellow(),
        StatusEvent::CommandStarted { .. } | StatusEvent::Verifying => line.cyan(),
        StatusEvent::CommandFailed { .. } | StatusEvent::Failed { .. } => line.red().bold(),
        StatusEvent::Completed => line.green().bold(),
    }
}

fn print_summary(outcome: &RunOutcome) {
    let s = &outcome.summary;
    let elapsed = s.finished_at - s.started_at;
    println!(
        "{} groups | {} tasks | {} copied | {} replaced | {} command failures | {:.1}s (finished {})",
        s.groups_run,
        s.tasks_run,
        s.files_copied,
        s.entries_replaced,
        s.commands_failed,
        elapsed.num_milliseconds() as f64 / 1000.0,
        s.finished_at.with_timezone(&Local).format("%H:%M:%S"),
    );
}
