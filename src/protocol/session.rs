//! Session state established by `mode=checkauth`.
//!
//! A [`Session`] is replaced wholesale on every successful authentication;
//! nothing is merged with what a previous session left behind.

use std::fmt;

/// The single cookie the site hands out on checkauth.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCookie {
    name: String,
    value: String,
}

impl SessionCookie {
    /// Creates a cookie from its name and value.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Cookie name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cookie value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Renders the cookie as a `Cookie` request header value.
    #[must_use]
    pub fn header_value(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

// Cookie values are session credentials.
impl fmt::Debug for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCookie")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// Cookie, session id and timestamp carried by every step after checkauth.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    cookies: Vec<SessionCookie>,
    session_id: String,
    timestamp: String,
}

impl Session {
    /// Builds the session produced by a successful checkauth response.
    ///
    /// An absent session id or timestamp is stored as empty.
    #[must_use]
    pub fn established(
        cookie: SessionCookie,
        session_id: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            cookies: vec![cookie],
            session_id: session_id.into(),
            timestamp: timestamp.into(),
        }
    }

    /// Cookies to send with each request (exactly one after checkauth).
    #[must_use]
    pub fn cookies(&self) -> &[SessionCookie] {
        &self.cookies
    }

    /// Opaque session id, empty when the site did not send one.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Opaque timestamp token, empty when the site did not send one.
    #[must_use]
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Returns true once checkauth has installed a cookie.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        !self.cookies.is_empty()
    }

    /// Returns the `Cookie` header value for the current cookies, if any.
    #[must_use]
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(SessionCookie::header_value)
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Replaces this session with `next`, discarding every previous field.
    pub fn replace(&mut self, next: Session) {
        *self = next;
    }
}
