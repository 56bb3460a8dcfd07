//! Value types shared by the protocol steps.

use std::fmt;

/// Exchange flavour, sent verbatim as the `type` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExchangeType {
    /// Catalog upload to the site (groups, products, offers).
    #[default]
    Catalog,
    /// Order information exchange.
    Sales,
}

impl ExchangeType {
    /// Returns the wire tag for this exchange type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Catalog => "catalog",
            Self::Sales => "sales",
        }
    }
}

impl fmt::Display for ExchangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Protocol step, sent as the `mode` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Session start (`mode=checkauth`).
    CheckAuth,
    /// Transfer parameter negotiation (`mode=init`).
    Init,
    /// Chunk upload (`mode=file`).
    File,
    /// Server-side import of an uploaded file (`mode=import`).
    Import,
    /// Deactivation of records missing from a full upload (`mode=deactivate`).
    Deactivate,
    /// Exchange completion signal (`mode=complete`).
    Complete,
}

impl Mode {
    /// Returns the wire value for this mode.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CheckAuth => "checkauth",
            Self::Init => "init",
            Self::File => "file",
            Self::Import => "import",
            Self::Deactivate => "deactivate",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters announced by the site in response to `mode=init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferParameters {
    /// Site accepts zip-compressed uploads.
    pub use_compression: bool,
    /// Maximum bytes per file-mode request (0 means no limit announced).
    pub chunk_byte_limit: u64,
}

impl TransferParameters {
    /// Returns true if `len` bytes fit in a single file-mode request.
    #[must_use]
    pub fn fits_in_one_chunk(&self, len: u64) -> bool {
        self.chunk_byte_limit == 0 || len <= self.chunk_byte_limit
    }
}

/// State of a server-side import as reported by `mode=import`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStatus {
    /// Import still running; poll again.
    InProgress,
    /// Import finished.
    Finished,
}

impl ImportStatus {
    /// Returns true while the site is still importing.
    #[must_use]
    pub fn in_progress(self) -> bool {
        matches!(self, Self::InProgress)
    }
}
