//! Taskpool: run grouped directory syncs and commands in a chosen order.
//!
//! # Usage
//!
//! ```text
//! taskpool init [--force]
//! taskpool task list [--json]
//! taskpool task add-sync --group <n> <src> <dst>
//! taskpool task add-cmd --group <n> [--dir <path>] [--label <text>] -- <command...>
//! taskpool task remove <index>
//! taskpool order <sequence>
//! taskpool run [--order <seq>] [--force | --no-force] [--json]
//! taskpool plan [--order <seq>] [--force] [--json]
//! ```
//!
//! Every command accepts `--config <path>`; the default is
//! `~/.taskpool/config.json`.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    init::InitArgs, order::OrderArgs, plan::PlanArgs, run::RunArgs, task::TaskCommand,
};
use taskpool_runner::{init_tracing, LogFormat};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "taskpool",
    version,
    about = "Run grouped directory syncs and commands in a chosen order",
    long_about = None,
)]
struct Cli {
    /// Config file to use instead of ~/.taskpool/config.json.
    /// A .yaml/.yml extension selects YAML.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Diagnostic log format on stderr: text | json. Level comes from RUST_LOG.
    #[arg(long, global = true, value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an empty config file.
    Init(InitArgs),

    /// List, add and remove tasks.
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },

    /// Set the group order, e.g. "2,1,3".
    Order(OrderArgs),

    /// Execute every group in order, streaming progress.
    Run(RunArgs),

    /// Show what a run would copy and execute, without touching anything.
    Plan(PlanArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing("warn", cli.log_format);

    let config = commands::ConfigLocation::resolve(cli.config)?;
    match cli.command {
        Commands::Init(args) => args.run(&config),
        Commands::Task { command } => commands::task::run(&config, command),
        Commands::Order(args) => args.run(&config),
        Commands::Run(args) => args.run(&config),
        Commands::Plan(args) => args.run(&config),
    }
}
