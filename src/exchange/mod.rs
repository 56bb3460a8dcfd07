//! Exchange sequencing: the state machine and the run loop over it.
//!
//! ```text
//! New           + checkauth -> Authenticated  (authenticate)
//! Authenticated + init      -> Initialized    (negotiate)
//! Initialized   + file      -> Uploading      (upload)
//! Uploading     + file      -> Uploading      (upload)
//! Initialized   + import    -> Importing      (import)
//! Uploading     + import    -> Importing      (import)
//! Importing     + import    -> Importing      (import)
//! any live state + fail | done -> Done
//! ```

mod error;
pub mod machine;
mod orchestrator;

pub use error::ExchangeError;
pub use machine::{
    ActionOutcome, ActionRunner, ExchangeAction, ExchangeEvent, ExchangeMachine, ExchangeState,
    Transition, TransitionTable,
};
pub use orchestrator::{
    DEFAULT_IMPORT_POLL_INTERVAL, ExchangeFile, ExchangeOptions, ExchangeOutcome, Orchestrator,
};
