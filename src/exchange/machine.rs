//! Exchange state machine.
//!
//! A [`TransitionTable`] maps `(state, event)` to a target state and an
//! [`ExchangeAction`]. [`ExchangeMachine::fire`] runs the paired action and
//! moves to the target state whether the action succeeded or not; routing
//! on the action's result is left to the caller.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use tracing::{debug, trace};

use super::error::ExchangeError;
use crate::protocol::{ImportStatus, TransferParameters};

/// Position of an exchange run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeState {
    /// Nothing sent yet.
    New,
    /// checkauth attempted.
    Authenticated,
    /// init attempted.
    Initialized,
    /// At least one file upload attempted.
    Uploading,
    /// Import triggered or being polled.
    Importing,
    /// Terminal.
    Done,
}

impl ExchangeState {
    /// Every state, in protocol order.
    pub const ALL: [Self; 6] = [
        Self::New,
        Self::Authenticated,
        Self::Initialized,
        Self::Uploading,
        Self::Importing,
        Self::Done,
    ];

    /// Returns true for the sole terminal state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done)
    }

    /// Lowercase name used in logs and errors.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Authenticated => "authenticated",
            Self::Initialized => "initialized",
            Self::Uploading => "uploading",
            Self::Importing => "importing",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for ExchangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeEvent {
    /// Authenticate.
    CheckAuth,
    /// Negotiate transfer parameters.
    Init,
    /// Upload the next file.
    File,
    /// Trigger or poll an import.
    Import,
    /// A step failed; stop.
    Fail,
    /// Graceful completion (distinct from the `Done` state).
    Done,
}

impl ExchangeEvent {
    /// Lowercase name used in logs and errors.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CheckAuth => "checkauth",
            Self::Init => "init",
            Self::File => "file",
            Self::Import => "import",
            Self::Fail => "fail",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for ExchangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Work attached to a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeAction {
    /// `mode=checkauth`.
    Authenticate,
    /// `mode=init`.
    Negotiate,
    /// `mode=file` for the next queued file.
    Upload,
    /// `mode=import` for the next uploaded file.
    Import,
    /// No protocol call (used by `Fail` and `Done`).
    Stop,
}

/// Successful result of an [`ExchangeAction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Session established.
    Authenticated,
    /// Transfer parameters announced by the site.
    Negotiated(TransferParameters),
    /// One file uploaded.
    Uploaded {
        /// Name the file was sent under.
        file: String,
        /// Files still waiting to be uploaded.
        remaining: usize,
    },
    /// The upload queue was empty; no request was made.
    NothingToUpload,
    /// One import poll answered.
    Imported {
        /// File whose import was polled.
        file: String,
        /// What the site reported.
        status: ImportStatus,
        /// Files whose import has not finished yet, `file` included while in progress.
        remaining: usize,
    },
    /// No uploaded file awaits import; no request was made.
    NothingToImport,
    /// A [`ExchangeAction::Stop`] ran.
    Stopped,
}

/// Executes the actions the machine fires.
#[async_trait]
pub trait ActionRunner: Send {
    /// Runs `action` and reports its outcome.
    async fn run(&mut self, action: ExchangeAction) -> Result<ActionOutcome, ExchangeError>;
}

/// Target state and action of one table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State the machine moves to.
    pub target: ExchangeState,
    /// Action run on the way.
    pub action: ExchangeAction,
}

/// Read-only `(state, event)` lookup. Built once, never mutated.
#[derive(Debug, Clone)]
pub struct TransitionTable {
    entries: HashMap<(ExchangeState, ExchangeEvent), Transition>,
}

impl TransitionTable {
    /// Builds a table from explicit entries. Later duplicates win.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (ExchangeState, ExchangeEvent, ExchangeState, ExchangeAction)>,
    {
        let entries = entries
            .into_iter()
            .map(|(from, event, target, action)| ((from, event), Transition { target, action }))
            .collect();
        Self { entries }
    }

    /// The exchange protocol table.
    #[must_use]
    pub fn exchange() -> Self {
        use ExchangeAction as A;
        use ExchangeEvent as E;
        use ExchangeState as S;

        let mut entries = vec![
            (S::New, E::CheckAuth, S::Authenticated, A::Authenticate),
            (S::Authenticated, E::Init, S::Initialized, A::Negotiate),
            (S::Initialized, E::File, S::Uploading, A::Upload),
            (S::Uploading, E::File, S::Uploading, A::Upload),
            (S::Initialized, E::Import, S::Importing, A::Import),
            (S::Uploading, E::Import, S::Importing, A::Import),
            (S::Importing, E::Import, S::Importing, A::Import),
        ];
        for state in ExchangeState::ALL.into_iter().filter(|s| !s.is_terminal()) {
            entries.push((state, E::Fail, S::Done, A::Stop));
            entries.push((state, E::Done, S::Done, A::Stop));
        }
        Self::from_entries(entries)
    }

    /// Looks up the transition for `event` in `state`.
    #[must_use]
    pub fn get(&self, state: ExchangeState, event: ExchangeEvent) -> Option<Transition> {
        self.entries.get(&(state, event)).copied()
    }

    /// Number of wired transitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is wired.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for TransitionTable {
    fn default() -> Self {
        Self::exchange()
    }
}

/// Current state plus the table it moves through.
#[derive(Debug, Clone)]
pub struct ExchangeMachine {
    table: TransitionTable,
    state: ExchangeState,
}

impl ExchangeMachine {
    /// Creates a machine in [`ExchangeState::New`] over the exchange table.
    #[must_use]
    pub fn new() -> Self {
        Self::with_table(TransitionTable::exchange())
    }

    /// Creates a machine in [`ExchangeState::New`] over `table`.
    #[must_use]
    pub fn with_table(table: TransitionTable) -> Self {
        Self {
            table,
            state: ExchangeState::New,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Returns true once the terminal state is reached.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state.is_terminal()
    }

    /// Fires `event`: runs the paired action through `runner`, moves to the
    /// target state regardless of the action's result, and returns that result.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::NoTransition`] without running anything or
    /// changing state if `event` is not wired for the current state, or the
    /// action's own error otherwise.
    pub async fn fire<R>(
        &mut self,
        event: ExchangeEvent,
        runner: &mut R,
    ) -> Result<ActionOutcome, ExchangeError>
    where
        R: ActionRunner + ?Sized,
    {
        let from = self.state;
        let Some(transition) = self.table.get(from, event) else {
            debug!(state = %from, event = %event, "no such transition");
            return Err(ExchangeError::no_transition(from, event));
        };

        trace!(state = %from, event = %event, action = ?transition.action, "running action");
        let result = runner.run(transition.action).await;
        self.state = transition.target;
        debug!(from = %from, to = %self.state, event = %event, ok = result.is_ok(), "transition");
        result
    }
}

impl Default for ExchangeMachine {
    fn default() -> Self {
        Self::new()
    }
}
