use std::io;

use thiserror::Error;

use crate::message::GsCommand;

/// Errors reported to the producer.
#[derive(Debug, Error)]
pub enum GsError {
    /// The command queue had no free slot. The command is handed back untouched.
    #[error("command queue full, rejected {}", .0.name())]
    QueueFull(Box<GsCommand>),

    /// The GS thread reported a fatal fault and no longer executes commands.
    #[error("GS thread faulted: {0}")]
    Faulted(String),

    /// The GS thread has exited.
    #[error("GS thread stopped")]
    Stopped,

    #[error("failed to spawn GS thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("GS thread panicked")]
    Panicked,
}

impl GsError {
    /// Takes back the command a full queue rejected.
    #[must_use]
    pub fn into_command(self) -> Option<GsCommand> {
        match self {
            Self::QueueFull(cmd) => Some(*cmd),
            _ => None,
        }
    }
}
