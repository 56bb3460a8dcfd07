//! Error types for the protocol module.
//!
//! Every variant names the protocol step it came from so a failing run can
//! be diagnosed from the error alone.

use thiserror::Error;

use super::types::Mode;

/// Errors returned by [`ExchangeClient`](super::ExchangeClient) operations.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Network-level failure (DNS, connection refused, TLS, broken body stream).
    #[error("{step}: transport error: {source}")]
    Transport {
        /// Step that was being performed.
        step: Mode,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// Request did not complete within the configured timeout.
    #[error("{step}: request timed out")]
    Timeout {
        /// Step that timed out.
        step: Mode,
    },

    /// Site answered with a status other than 200.
    #[error("{step}: server error (HTTP {status})")]
    ServerStatus {
        /// Step that was rejected.
        step: Mode,
        /// The HTTP status code.
        status: u16,
    },

    /// Site answered 200 but the body does not follow the step's grammar.
    #[error("{step}: unexpected response: {body}")]
    MalformedResponse {
        /// Step whose response was rejected.
        step: Mode,
        /// Response body, transcoded to UTF-8 where possible.
        body: String,
    },

    /// Step requires session state that has not been established.
    #[error("{step}: can't execute without {field}")]
    MissingSession {
        /// Step that was refused.
        step: Mode,
        /// Name of the missing session field (`sessid` or `timestamp`).
        field: &'static str,
    },

    /// Upload source failed or ended before the announced byte count.
    #[error("{step}: upload source error: {source}")]
    Source {
        /// Step that was reading the source.
        step: Mode,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// HTTP client could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    ClientBuild {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },

    /// Endpoint URL is unusable.
    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint {
        /// The endpoint as given (credentials removed).
        endpoint: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl ProtocolError {
    /// Creates a transport error, promoting timeouts to [`ProtocolError::Timeout`].
    pub fn transport(step: Mode, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { step }
        } else {
            Self::Transport { step, source }
        }
    }

    /// Creates a non-200 status error.
    pub fn server_status(step: Mode, status: u16) -> Self {
        Self::ServerStatus { step, status }
    }

    /// Creates a malformed-response error carrying the offending body.
    pub fn malformed(step: Mode, body: impl Into<String>) -> Self {
        Self::MalformedResponse {
            step,
            body: body.into(),
        }
    }

    /// Creates a missing-session precondition error.
    pub fn missing_session(step: Mode, field: &'static str) -> Self {
        Self::MissingSession { step, field }
    }

    /// Creates an upload source error.
    pub fn source_failed(step: Mode, source: std::io::Error) -> Self {
        Self::Source { step, source }
    }

    /// Creates an invalid endpoint error.
    pub fn invalid_endpoint(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Returns the step this error belongs to, if any.
    #[must_use]
    pub fn step(&self) -> Option<Mode> {
        match self {
            Self::Transport { step, .. }
            | Self::Timeout { step }
            | Self::ServerStatus { step, .. }
            | Self::MalformedResponse { step, .. }
            | Self::MissingSession { step, .. }
            | Self::Source { step, .. } => Some(*step),
            Self::ClientBuild { .. } | Self::InvalidEndpoint { .. } => None,
        }
    }

    /// Returns true if the error was raised before any request was sent.
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::MissingSession { .. })
    }
}

// No From<reqwest::Error> / From<std::io::Error>: every variant needs the step.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_status_display_names_step() {
        let error = ProtocolError::server_status(Mode::CheckAuth, 500);
        let msg = error.to_string();
        assert!(msg.starts_with("checkauth:"), "Expected step prefix in: {msg}");
        assert!(msg.contains("server error"), "Expected 'server error' in: {msg}");
        assert!(msg.contains("500"), "Expected status in: {msg}");
    }

    #[test]
    fn test_malformed_display_includes_body() {
        let error = ProtocolError::malformed(Mode::Init, "zip=yes\nfile_limit=zero");
        let msg = error.to_string();
        assert!(msg.contains("unexpected response"), "got: {msg}");
        assert!(msg.contains("file_limit=zero"), "Expected body in: {msg}");
    }

    #[test]
    fn test_missing_session_is_precondition() {
        let error = ProtocolError::missing_session(Mode::Deactivate, "timestamp");
        assert!(error.is_precondition());
        assert_eq!(error.step(), Some(Mode::Deactivate));
        assert_eq!(
            error.to_string(),
            "deactivate: can't execute without timestamp"
        );
    }

    #[test]
    fn test_source_error_keeps_io_kind() {
        let io_error = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short read");
        let error = ProtocolError::source_failed(Mode::File, io_error);
        match &error {
            ProtocolError::Source { source, .. } => {
                assert_eq!(source.kind(), std::io::ErrorKind::UnexpectedEof);
            }
            other => panic!("Expected Source, got: {other:?}"),
        }
        assert!(!error.is_precondition());
    }

    #[test]
    fn test_invalid_endpoint_has_no_step() {
        let error = ProtocolError::invalid_endpoint("not a url", "relative URL without a base");
        assert_eq!(error.step(), None);
        assert!(error.to_string().contains("not a url"));
    }
}
