//! CommerceML Exchange Library
//!
//! Client for the session-oriented site exchange protocol used by 1C-style
//! accounting systems to push catalogs to a web shop: authenticate,
//! negotiate transfer parameters, stream files, trigger the server-side
//! import, and optionally deactivate stale records and signal completion.
//!
//! # Architecture
//!
//! - [`protocol`] - one HTTP request per protocol step, session handling,
//!   response grammar, bounded upload bodies
//! - [`exchange`] - transition table, state machine and the cancellable run loop
//! - [`endpoint`] - endpoint URL parsing with embedded credentials

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod endpoint;
pub mod exchange;
pub mod protocol;
#[cfg(test)]
pub mod test_support;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use endpoint::{Credentials, Endpoint};
pub use exchange::{
    ExchangeError, ExchangeEvent, ExchangeFile, ExchangeMachine, ExchangeOptions,
    ExchangeOutcome, ExchangeState, Orchestrator,
};
pub use protocol::{
    ExchangeClient, ExchangeType, ImportStatus, ProtocolError, Session, TransferParameters,
};
