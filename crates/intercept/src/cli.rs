//! CLI argument parsing for the intercept command

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "intercept")]
#[command(version)]
#[command(about = "Record every command executed by a build", long_about = None)]
pub struct Cli {
    /// Path of the event log to write
    #[arg(short, long, value_name = "PATH")]
    pub output: PathBuf,

    /// Intercept with the preload library even where the wrapper would be chosen
    #[arg(long = "force-preload", conflicts_with = "force_wrapper")]
    pub force_preload: bool,

    /// Intercept with compiler wrappers on PATH instead of the preload library
    #[arg(long = "force-wrapper")]
    pub force_wrapper: bool,

    /// Preload library (defaults to the one installed next to this binary)
    #[arg(long, value_name = "PATH")]
    pub library: Option<PathBuf>,

    /// Wrapper executable (defaults to the one installed next to this binary)
    #[arg(long, value_name = "PATH")]
    pub wrapper: Option<PathBuf>,

    /// Enable verbose diagnostics, here and in intercepted processes
    #[arg(long)]
    pub verbose: bool,

    /// The build command to supervise
    #[arg(last = true, required = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_command_follows_the_separator() {
        let cli = Cli::parse_from(["intercept", "--output", "events.db", "--", "make", "-j4"]);
        assert_eq!(cli.output, PathBuf::from("events.db"));
        assert_eq!(cli.command, vec!["make", "-j4"]);
        assert!(!cli.force_preload);
    }

    #[test]
    fn force_flags_are_mutually_exclusive() {
        let result = Cli::try_parse_from([
            "intercept",
            "--output",
            "events.db",
            "--force-preload",
            "--force-wrapper",
            "--",
            "make",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn command_is_required() {
        let result = Cli::try_parse_from(["intercept", "--output", "events.db"]);
        assert!(result.is_err());
    }
}
