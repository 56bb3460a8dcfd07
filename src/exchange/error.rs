//! Error types for the exchange module.

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::machine::{ExchangeEvent, ExchangeState};
use crate::protocol::ProtocolError;

/// Errors produced while driving an exchange run.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// An event was fired with no transition wired for the current state.
    ///
    /// This is a sequencing defect, not a protocol failure.
    #[error("no such transition: {event} in state {state}")]
    NoTransition {
        /// State the machine was in (unchanged).
        state: ExchangeState,
        /// Event that was fired.
        event: ExchangeEvent,
    },

    /// A protocol step failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// An upload file could not be opened or measured.
    #[error("IO error reading upload file {path}: {source}")]
    Io {
        /// The file that failed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl ExchangeError {
    /// Creates a no-transition error.
    pub fn no_transition(state: ExchangeState, event: ExchangeEvent) -> Self {
        Self::NoTransition { state, event }
    }

    /// Creates an upload file IO error.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Returns the protocol error behind this error, if any.
    #[must_use]
    pub fn as_protocol(&self) -> Option<&ProtocolError> {
        match self {
            Self::Protocol(error) => Some(error),
            _ => None,
        }
    }
}
