use std::process::ExitCode;

use buildtrace_citnames::cli::Cli;
use clap::Parser;
use tracing_subscriber::prelude::*;

fn main() -> ExitCode {
    let args = Cli::parse();
    init_logging(args.verbose);

    match buildtrace_citnames::run(args) {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("citnames: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();
}
