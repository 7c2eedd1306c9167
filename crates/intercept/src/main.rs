use std::process::ExitCode;

use buildtrace_intercept::cli::Cli;
use clap::Parser;
use tracing_subscriber::prelude::*;

fn main() -> ExitCode {
    let args = Cli::parse();
    init_logging(args.verbose);

    match run(args) {
        // the build's exit code passes through; the u8 cast matches the
        // shell's own truncation
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("intercept: {err:#}");
            ExitCode::from(2)
        }
    }
}

#[tokio::main]
async fn run(args: Cli) -> anyhow::Result<i32> {
    buildtrace_intercept::run(args).await
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
