/***********************************************************
 *
 *      SockProbe - multi-protocol network probe.
 *          Listens on UDP, TCP and WebSocket at once,
 *          logs every connection and payload, and lets the
 *          operator answer any peer it has seen.
 *
 ***********************************************************/

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use sockprobe::{Cli, EventLog, Probe, Shell};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("sockprobe: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Diagnostics on stderr; stdout carries event lines and shell output
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let probe = match Probe::start(&config, EventLog::new(config.timestamps)) {
        Ok(probe) => probe,
        Err(e) => {
            error!(error = %e, "startup failed");
            eprintln!("sockprobe: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Ctrl-C ends the process; listener threads are not joined
    if let Err(e) = ctrlc::set_handler(|| std::process::exit(0)) {
        error!(error = %e, "cannot install interrupt handler");
    }

    let shell = Shell::new(probe.facade());
    if let Err(e) = shell.run(io::stdin().lock(), io::stdout()) {
        error!(error = %e, "shell input failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
