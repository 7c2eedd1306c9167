//! Build interception: session, collector, supervision
//!
//! The intercept stage supervises an opaque build command and records
//! every execution its process tree performs into an event log. The
//! [`session`] module primes the environment so descendants report
//! back, the [`collector`] owns the endpoint and the log, and
//! [`supervise`] runs the build itself.

pub mod cli;
pub mod collector;
pub mod session;
pub mod supervise;

use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info};

use crate::cli::Cli;
use crate::collector::Collector;
use crate::session::Session;

/// How long the collector waits for in-flight reports after the build
/// has exited.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Run one intercept session to completion; returns the exit code to
/// propagate (the build's own).
pub async fn run(args: Cli) -> Result<i32> {
    let session = Session::from_args(&args)?;
    let collector = Collector::bind(session.locator(), &args.output)?;
    let environment = session.child_environment();

    let exit_code = supervise::run_build(&args.command, environment, collector.reporter()).await?;
    debug!(exit_code, "build finished, draining reports");

    let records = collector.shutdown(DRAIN_TIMEOUT).await?;
    info!(records, output = %args.output.display(), "event log written");

    Ok(exit_code)
}
