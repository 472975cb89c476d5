use thiserror::Error;

/// A command task that could not start or did not exit cleanly.
///
/// Never fatal to an orchestration run; the orchestrator reports it and
/// moves on to the next task.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {}", exit_label(.code))]
    NonZeroExit {
        program: String,
        code: Option<i32>,
        output: String,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

/// Errors from the orchestrator API itself, as opposed to run failures,
/// which are reported through [`crate::RunOutcome`].
#[derive(Debug, Error)]
pub enum RunError {
    #[error("a run is already in progress")]
    AlreadyRunning,

    #[error("failed to start run thread: {0}")]
    Thread(#[source] std::io::Error),

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("sync error: {0}")]
    Sync(#[from] taskpool_sync::SyncError),
}
