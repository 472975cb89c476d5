//! `taskpool plan`: dry run showing what would be copied and executed.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use taskpool_core::Task;
use taskpool_runner::{RunRequest, TaskPlan};
use taskpool_sync::{CopyReason, PlanAction};

use super::{effective_order, ConfigLocation};

/// Arguments for `taskpool plan`.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Group order to preview instead of the stored one.
    #[arg(long, value_name = "SEQUENCE")]
    pub order: Option<String>,

    /// Plan as if force copy were enabled.
    #[arg(long)]
    pub force: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl PlanArgs {
    pub fn run(self, location: &ConfigLocation) -> Result<()> {
        let config = location.load()?;
        let force = self.force || config.force_copy;
        let order = effective_order(&config, self.order.as_deref());
        let request = RunRequest::new(config.tasks, order, force);

        let plans = taskpool_runner::plan(&request).context("planning failed")?;
        if self.json {
            let payload: Vec<PlanJson> = plans.iter().map(PlanJson::from).collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize plan JSON")?
            );
            return Ok(());
        }

        print_plan(&request, &plans);
        Ok(())
    }
}

#[derive(Serialize)]
struct PlanJson {
    group: String,
    task: Task,
    inert: bool,
    files: Vec<FileJson>,
}

#[derive(Serialize)]
struct FileJson {
    path: PathBuf,
    action: &'static str,
}

impl From<&TaskPlan> for PlanJson {
    fn from(plan: &TaskPlan) -> Self {
        Self {
            group: plan.group.clone(),
            task: plan.task.clone(),
            inert: plan.inert,
            files: plan
                .files
                .iter()
                .filter(|e| e.action != PlanAction::Skip)
                .map(|e| FileJson {
                    path: e.relative_path.clone(),
                    action: action_label(&e.action),
                })
                .collect(),
        }
    }
}

fn action_label(action: &PlanAction) -> &'static str {
    match action {
        PlanAction::Copy(CopyReason::Missing) => "new",
        PlanAction::Copy(CopyReason::SizeChanged) => "size changed",
        PlanAction::Copy(CopyReason::SourceNewer) => "source newer",
        PlanAction::Copy(CopyReason::MetadataUnavailable) => "no timestamp",
        PlanAction::Replace { .. } => "replace",
        PlanAction::Conflict { .. } => "conflict",
        PlanAction::Skip => "unchanged",
    }
}

fn print_plan(request: &RunRequest, plans: &[TaskPlan]) {
    println!(
        "[plan] order: {} | force copy: {}",
        request.order,
        if request.force { "on" } else { "off" }
    );
    if plans.is_empty() {
        println!("[plan] nothing scheduled");
        return;
    }

    let mut current_group: Option<&str> = None;
    for plan in plans {
        if current_group != Some(plan.group.as_str()) {
            println!("{}", format!("group {}", plan.group).bold());
            current_group = Some(plan.group.as_str());
        }
        if plan.inert {
            println!("  ·  {} (empty, skipped)", plan.task);
            continue;
        }
        match &plan.task {
            Task::Command(_) => println!("  $  {}", plan.task),
            Task::Sync(_) => {
                let pending = plan.pending_copies();
                let skipped = plan.files.len() - pending - plan.conflicts().count();
                println!("  ⇉  {} ({pending} to copy, {skipped} unchanged)", plan.task);
                for entry in &plan.files {
                    let line = format!(
                        "       {:<12} {}",
                        action_label(&entry.action),
                        entry.relative_path.display()
                    );
                    match &entry.action {
                        PlanAction::Skip => {}
                        PlanAction::Conflict { .. } => println!("{}", line.red()),
                        PlanAction::Replace { .. } => println!("{}", line.yellow()),
                        PlanAction::Copy(_) => println!("{line}"),
                    }
                }
                if plan.conflicts().next().is_some() {
                    println!(
                        "{}",
                        "       a run would stop here; use --force to replace conflicting entries"
                            .red()
                    );
                }
            }
        }
    }
}
