//! `taskpool task list|add-sync|add-cmd|remove`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use taskpool_core::{CommandTask, SyncTask, Task};

use super::ConfigLocation;

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Show every task with its index.
    List {
        /// Emit machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Add a directory sync task.
    AddSync(AddSyncArgs),

    /// Add a command task.
    AddCmd(AddCmdArgs),

    /// Remove the task at <index> (see `taskpool task list`).
    Remove {
        index: usize,
    },
}

#[derive(Args, Debug)]
pub struct AddSyncArgs {
    /// Group id the task belongs to.
    #[arg(long, short = 'g')]
    pub group: i64,

    /// Source directory.
    pub source: PathBuf,

    /// Destination directory.
    pub destination: PathBuf,
}

#[derive(Args, Debug)]
pub struct AddCmdArgs {
    /// Group id the task belongs to.
    #[arg(long, short = 'g')]
    pub group: i64,

    /// Working directory; defaults to wherever `taskpool run` is started.
    #[arg(long, short = 'd')]
    pub dir: Option<PathBuf>,

    /// Label shown in progress output instead of the command line.
    #[arg(long, short = 'l')]
    pub label: Option<String>,

    /// Program and arguments, split on whitespace when run. No shell.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

pub fn run(location: &ConfigLocation, cmd: TaskCommand) -> Result<()> {
    match cmd {
        TaskCommand::List { json } => list(location, json),
        TaskCommand::AddSync(args) => add_sync(location, args),
        TaskCommand::AddCmd(args) => add_cmd(location, args),
        TaskCommand::Remove { index } => remove(location, index),
    }
}

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "group")]
    group: String,
    #[tabled(rename = "type")]
    kind: &'static str,
    #[tabled(rename = "task")]
    detail: String,
}

#[derive(Serialize)]
struct TaskJson<'a> {
    index: usize,
    #[serde(flatten)]
    task: &'a Task,
}

fn list(location: &ConfigLocation, json: bool) -> Result<()> {
    let config = location.load()?;

    if json {
        let payload: Vec<TaskJson<'_>> = config
            .tasks
            .iter()
            .enumerate()
            .map(|(index, task)| TaskJson { index, task })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&payload).context("failed to serialize task JSON")?
        );
        return Ok(());
    }

    println!("Group order: {}", config.group_order());
    println!("Force copy:  {}", if config.force_copy { "on" } else { "off" });
    if config.tasks.is_empty() {
        println!("No tasks defined.");
        println!("Run: taskpool task add-sync --group 1 <src> <dst>");
        return Ok(());
    }

    let rows: Vec<TaskRow> = config
        .tasks
        .iter()
        .enumerate()
        .map(|(index, task)| TaskRow {
            index,
            group: task.group_id().to_string(),
            kind: task.kind(),
            detail: describe(task),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

fn describe(task: &Task) -> String {
    match task {
        Task::Sync(sync) => format!(
            "{} → {}",
            sync.source.display(),
            sync.destination.display()
        ),
        Task::Command(cmd) => {
            let mut text = cmd.command_line.clone();
            if !cmd.working_dir.as_os_str().is_empty() {
                text.push_str(&format!("  (in {})", cmd.working_dir.display()));
            }
            if !cmd.label.is_empty() {
                text = format!("{}: {text}", cmd.label);
            }
            text
        }
    }
}

fn add_sync(location: &ConfigLocation, args: AddSyncArgs) -> Result<()> {
    let mut config = location.load()?;
    let task = Task::from(SyncTask::new(args.group, args.source, args.destination));
    let message = format!(
        "✓ Added sync task #{} to group {}: {}",
        config.tasks.len(),
        task.group_id(),
        describe(&task)
    );
    config.push_task(task);
    location.save(&config)?;
    println!("{message}");
    Ok(())
}

fn add_cmd(location: &ConfigLocation, args: AddCmdArgs) -> Result<()> {
    let mut config = location.load()?;
    let mut task = CommandTask::new(
        args.group,
        args.dir.unwrap_or_default(),
        args.command.join(" "),
    );
    if let Some(label) = args.label {
        task = task.with_label(label);
    }
    let message = format!(
        "✓ Added command task #{} to group {}: {}",
        config.tasks.len(),
        task.group_id,
        task.display_name()
    );
    config.push_task(task);
    location.save(&config)?;
    println!("{message}");
    Ok(())
}

fn remove(location: &ConfigLocation, index: usize) -> Result<()> {
    let mut config = location.load()?;
    let removed = config.remove_task(index)?;
    location.save(&config)?;
    println!("✓ Removed task #{index} ({removed})");
    Ok(())
}
