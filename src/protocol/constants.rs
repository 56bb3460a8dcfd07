//! Constants for the protocol module (timeouts, upload pipe sizing).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP request timeout (5 minutes, uploads can be large).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Bytes read from the upload source per pipe message.
pub const PIPE_CHUNK_SIZE: usize = 16 * 1024;

/// Pipe messages buffered between the copy task and the request body.
pub const PIPE_DEPTH: usize = 4;

/// Response marker for a successful step.
pub const SUCCESS_MARKER: &str = "success";

/// Response marker for an import that is still running.
pub const PROGRESS_MARKER: &str = "progress";
