//! Human-readable status events and the channel that carries them.
//!
//! The bus is observability-only: nothing reads it for control flow, a slow or
//! absent consumer never blocks the producer, and dropped events are harmless.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use tokio::sync::mpsc;

/// One progress or result line emitted during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusEvent {
    GroupStarted { group: String },
    Copied { relative: PathBuf },
    /// A destination entry of the wrong type was removed in force mode.
    Replaced { relative: PathBuf },
    CommandStarted { name: String },
    CommandSucceeded { name: String },
    CommandFailed { name: String, message: String },
    Verifying,
    VerifyPending { destination: PathBuf, pending: usize },
    Completed,
    Failed { message: String },
}

impl StatusEvent {
    /// `Completed` and `Failed` end a run; nothing follows them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StatusEvent::Completed | StatusEvent::Failed { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            StatusEvent::CommandFailed { .. }
                | StatusEvent::Failed { .. }
                | StatusEvent::VerifyPending { .. }
        )
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusEvent::GroupStarted { group } => write!(f, "starting group: {group}"),
            StatusEvent::Copied { relative } => write!(f, "copied: {}", relative.display()),
            StatusEvent::Replaced { relative } => {
                write!(f, "replaced conflicting entry: {}", relative.display())
            }
            StatusEvent::CommandStarted { name } => write!(f, "running: {name}"),
            StatusEvent::CommandSucceeded { name } => write!(f, "command succeeded: {name}"),
            StatusEvent::CommandFailed { name, message } => {
                write!(f, "command failed: {name}: {message}")
            }
            StatusEvent::Verifying => f.write_str("verifying"),
            StatusEvent::VerifyPending {
                destination,
                pending,
            } => write!(
                f,
                "verify: {pending} file(s) still differ under {}",
                destination.display()
            ),
            StatusEvent::Completed => f.write_str("run complete"),
            StatusEvent::Failed { message } => write!(f, "error: {message}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Bus
// ---------------------------------------------------------------------------

/// Producer side of the status channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct StatusBus {
    tx: mpsc::UnboundedSender<StatusEvent>,
}

impl StatusBus {
    /// Create an isolated bus and its single consumer.
    pub fn channel() -> (Self, StatusReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, StatusReceiver { rx })
    }

    /// A bus whose events only reach the tracing log.
    pub fn detached() -> Self {
        Self::channel().0
    }

    /// Publish an event. Never blocks; a closed receiver drops the event.
    pub fn emit(&self, event: StatusEvent) {
        if event.is_error() {
            tracing::warn!("{event}");
        } else {
            tracing::info!("{event}");
        }
        let _ = self.tx.send(event);
    }
}

/// Consumer side of the status channel.
#[derive(Debug)]
pub struct StatusReceiver {
    rx: mpsc::UnboundedReceiver<StatusEvent>,
}

impl StatusReceiver {
    pub async fn recv(&mut self) -> Option<StatusEvent> {
        self.rx.recv().await
    }

    /// Blocking receive for callers outside an async runtime.
    ///
    /// Panics if called from within an async execution context.
    pub fn blocking_recv(&mut self) -> Option<StatusEvent> {
        self.rx.blocking_recv()
    }

    pub fn try_recv(&mut self) -> Option<StatusEvent> {
        self.rx.try_recv().ok()
    }

    /// Everything queued right now, oldest first.
    pub fn drain(&mut self) -> Vec<StatusEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}
