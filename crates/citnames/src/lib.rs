//! citnames: event log in, compilation database out
//!
//! A single-threaded pipeline: stream event records, classify each
//! execution, keep the compilations, merge with a prior database when
//! appending, filter, write. Recognition failures are silent skips by
//! design; only unreadable inputs or unwritable outputs abort.

pub mod cli;
pub mod config;
pub mod output;
pub mod semantic;

use anyhow::{Context, Result};
use buildtrace_eventlog::{EventLogReader, LogError};
use tracing::{debug, warn};

use crate::cli::Cli;
use crate::config::Configuration;
use crate::output::{merge, CompilationDatabase, Entry};
use crate::semantic::{Build, Semantic};

pub fn run(args: Cli) -> Result<i32> {
    let mut config = match &args.config {
        Some(path) => Configuration::load(path)?,
        None => Configuration::default(),
    };
    if args.run_checks {
        config.enable_checks()?;
    }
    config.seed_from_environment();

    let reader = EventLogReader::open(&args.input)
        .with_context(|| format!("Failed to open event log {}", args.input.display()))?;

    let build = Build::new(&config);
    let mut entries: Vec<Entry> = Vec::new();
    for record in reader {
        match record {
            Ok(record) => {
                let Some(execution) = record.execution() else {
                    continue;
                };
                if let Semantic::Compile(call) = build.recognize(execution) {
                    entries.extend(call.into_entries());
                }
            }
            Err(LogError::Truncated) => {
                warn!("event log ends mid-record; the intact prefix is processed");
                break;
            }
            Err(err) => {
                return Err(err).context("Unreadable event log");
            }
        }
    }
    debug!(entries = entries.len(), "compilation entries recognized");

    let database = CompilationDatabase::new(&config.output_format, &config.content_filter);
    let prior = if args.append && args.output.exists() {
        let prior = database.from_file(&args.output)?;
        debug!(entries = prior.len(), "prior database loaded");
        prior
    } else {
        Vec::new()
    };

    let merged = merge(prior, entries);
    let written = database.to_file(&args.output, &merged)?;
    debug!(written, output = %args.output.display(), "database written");

    Ok(0)
}
