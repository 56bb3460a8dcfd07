//! Client side of the CommerceML site exchange protocol.
//!
//! The site exposes a single endpoint driven by query-string modes
//! (`checkauth`, `init`, `file`, `import`, `deactivate`, `complete`). Every
//! mode answers with newline-separated text fields, and only HTTP 200 counts
//! as protocol-level success.
//!
//! # Example
//!
//! ```no_run
//! use cml_exchange::protocol::{ExchangeClient, ExchangeType};
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let endpoint = Url::parse("https://shop.example/bitrix/admin/1c_exchange.php")?;
//! let mut client = ExchangeClient::new(endpoint, ExchangeType::Catalog)?;
//! client.authenticate("admin", "secret").await?;
//! client.negotiate().await?;
//!
//! let file = tokio::fs::File::open("import.xml").await?;
//! let len = file.metadata().await?.len();
//! client.upload(file, len, "import.xml").await?;
//! while client.trigger_import("import.xml").await?.in_progress() {}
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod error;
pub mod piece;
pub mod response;
mod session;
mod types;

pub use client::ExchangeClient;
pub use constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
pub use error::ProtocolError;
pub use piece::{Piece, PieceError, piece};
pub use session::{Session, SessionCookie};
pub use types::{ExchangeType, ImportStatus, Mode, TransferParameters};
