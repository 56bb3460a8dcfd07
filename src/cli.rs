//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use cml_exchange::protocol::{CONNECT_TIMEOUT_SECS, ExchangeType, READ_TIMEOUT_SECS};

/// Upload CommerceML files to a site's exchange endpoint.
///
/// Runs checkauth, init, one file-mode upload per FILE and an import for
/// each of them, then optionally deactivate and complete.
#[derive(Parser, Debug)]
#[command(name = "cml")]
#[command(author, version, about)]
pub struct Args {
    /// Exchange endpoint, optionally with user:password@ credentials
    #[arg(short = 'u', long, env = "CML_URL", hide_env_values = true)]
    pub url: String,

    /// Exchange type sent with every request
    #[arg(short = 't', long = "type", value_enum, default_value_t = TypeArg::Catalog)]
    pub exchange_type: TypeArg,

    /// Send mode=deactivate after a successful import
    #[arg(long)]
    pub deactivate: bool,

    /// Send mode=complete after a successful import
    #[arg(long)]
    pub complete: bool,

    /// Delay before re-polling an import that reports progress, in milliseconds (max 60000)
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub poll_interval_ms: u64,

    /// HTTP connect timeout in seconds
    #[arg(long, default_value_t = CONNECT_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    pub connect_timeout: u64,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = READ_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    pub read_timeout: u64,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Files to upload, each sent under its file name
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,
}

/// `--type` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TypeArg {
    /// Catalog upload
    Catalog,
    /// Order exchange
    Sales,
}

impl From<TypeArg> for ExchangeType {
    fn from(value: TypeArg) -> Self {
        match value {
            TypeArg::Catalog => Self::Catalog,
            TypeArg::Sales => Self::Sales,
        }
    }
}
