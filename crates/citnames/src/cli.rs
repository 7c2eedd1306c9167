//! CLI argument parsing for the citnames command

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "citnames")]
#[command(version)]
#[command(about = "Deduce compilation commands from an execution event log", long_about = None)]
pub struct Cli {
    /// Path of the event log to read
    #[arg(short, long, value_name = "PATH")]
    pub input: PathBuf,

    /// Path of the compilation database to write
    #[arg(short, long, value_name = "PATH", default_value = "compile_commands.json")]
    pub output: PathBuf,

    /// Configuration file
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Merge with the existing output instead of overwriting it
    #[arg(long)]
    pub append: bool,

    /// Only keep entries whose source file exists on this host
    #[arg(long = "run-checks")]
    pub run_checks: bool,

    /// Enable verbose diagnostics
    #[arg(long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_has_the_conventional_default() {
        let cli = Cli::parse_from(["citnames", "--input", "events.db"]);
        assert_eq!(cli.output, PathBuf::from("compile_commands.json"));
        assert!(!cli.append);
        assert!(!cli.run_checks);
    }

    #[test]
    fn input_is_required() {
        assert!(Cli::try_parse_from(["citnames"]).is_err());
    }
}
