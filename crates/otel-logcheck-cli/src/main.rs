//! otel-logcheck binary entrypoint.
//!
//! This is the main entry point for the `otel-logcheck` command-line tool.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use otel_logcheck_cli::{run, Cli};

fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();

    init_tracing(cli.json_logs);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut stdout = io::stdout().lock();
    match runtime.block_on(run(&cli, &mut stdout)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
