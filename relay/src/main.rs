use anyhow::Context;
use clap::Parser;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use slog::info;
use std::time::Duration;
use zsm_common::logging;
use zsm_relay::{Acceptor, DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_PORT, DEFAULT_WORKERS};

/// `zmr` — the zsm relay server (§6 "Server CLI").
#[derive(Parser)]
#[command(name = "zmr")]
struct Cli {
    /// Verbose packet tracing to stderr.
    #[arg(short = 'd', long = "debug")]
    debug: bool,

    /// Override the default listen port.
    #[arg(short = 'p', long = "port", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Override the default per-connection idle timeout, in seconds.
    #[arg(long = "idle-timeout", default_value_t = DEFAULT_IDLE_TIMEOUT_SECS)]
    idle_timeout: u64,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let logger = logging::terminal_logger(cli.debug);

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("failed to install signal handler")?;
    let shutdown_logger = logger.clone();
    std::thread::spawn(move || {
        if signals.forever().next().is_some() {
            info!(shutdown_logger, "shutdown signal received, exiting");
            // §5: immediate process exit after best-effort socket shutdown;
            // in-flight packets on the wire may be lost. The OS reclaims
            // every open fd on exit, which is the "best-effort shutdown"
            // this design relies on rather than an orderly per-worker drain.
            std::process::exit(0);
        }
    });

    let acceptor = Acceptor::bind(cli.port, DEFAULT_WORKERS, Duration::from_secs(cli.idle_timeout), logger)
        .with_context(|| format!("failed to bind relay listener on port {}", cli.port))?;

    acceptor.run().context("relay accept loop failed")?;
    Ok(())
}
