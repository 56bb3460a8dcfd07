//! CLI entry point for the exchange tool.

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cml_exchange::endpoint::Endpoint;
use cml_exchange::exchange::{ExchangeFile, ExchangeOptions, ExchangeOutcome, Orchestrator};
use cml_exchange::protocol::ExchangeClient;
use tracing::{debug, error, info, warn};

mod cli;

use cli::Args;

/// Exit status for a run stopped by a signal (128 + SIGINT).
const EXIT_CANCELLED: u8 = 130;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let endpoint = Endpoint::parse(&args.url).context("invalid --url / CML_URL")?;
    debug!(
        endpoint = %endpoint,
        exchange_type = ?args.exchange_type,
        files = args.files.len(),
        "CLI arguments parsed"
    );
    if endpoint.credentials().username.is_empty() {
        warn!("endpoint carries no credentials; checkauth will send an empty username");
    }

    let (url, credentials) = endpoint.into_parts();
    let client = ExchangeClient::with_timeouts(
        url,
        args.exchange_type.into(),
        args.connect_timeout,
        args.read_timeout,
    )?;

    let files: Vec<ExchangeFile> = args.files.iter().map(ExchangeFile::from_path).collect();
    let options = ExchangeOptions {
        deactivate: args.deactivate,
        complete: args.complete,
        import_poll_interval: Duration::from_millis(args.poll_interval_ms),
    };

    let cancelled = Arc::new(AtomicBool::new(false));
    let cancelled_signal = Arc::clone(&cancelled);
    tokio::spawn(async move {
        if let Some(signal) = shutdown_signal().await {
            warn!(signal, "stop requested; stopping after the current step");
            cancelled_signal.store(true, Ordering::SeqCst);
        }
    });

    info!(files = files.len(), "exchange starting");
    let mut orchestrator = Orchestrator::new(client, credentials, files, options);
    let outcome = orchestrator.run(&cancelled).await;

    Ok(match outcome {
        ExchangeOutcome::Completed => {
            info!("all done");
            ExitCode::SUCCESS
        }
        ExchangeOutcome::Failed(failure) => {
            error!(error = %failure, "exchange failed");
            ExitCode::FAILURE
        }
        ExchangeOutcome::Cancelled { state } => {
            warn!(state = %state, "exchange interrupted");
            ExitCode::from(EXIT_CANCELLED)
        }
    })
}

/// Waits for SIGINT (Ctrl-C) or, on Unix, SIGTERM. Returns the signal name,
/// or `None` if no handler could be installed.
async fn shutdown_signal() -> Option<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(terminate) => terminate,
            Err(error) => {
                warn!(error = %error, "cannot listen for SIGTERM");
                return tokio::signal::ctrl_c().await.ok().map(|()| "SIGINT");
            }
        };
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.ok().map(|()| "SIGINT"),
            _ = terminate.recv() => Some("SIGTERM"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok().map(|()| "SIGINT")
    }
}
