//! Semantic classification of execution events
//!
//! [`Build::recognize`] turns one captured execution into a
//! [`Semantic`] verdict. Nothing in here ever fails outward: an argv
//! this grammar cannot make sense of is `NotRecognized`, so one exotic
//! tool cannot poison the database of a thousand ordinary translation
//! units.

mod flags;
mod sources;
mod tools;

pub use flags::SourceFile;
pub use sources::Language;

use std::path::PathBuf;

use buildtrace_common::Execution;
use tracing::{debug, warn};

use crate::config::Configuration;
use crate::output::Entry;
use tools::ToolKind;

/// What one execution event means for the compilation database.
#[derive(Debug)]
pub enum Semantic {
    /// Not a compiler invocation
    NotRecognized,
    /// A compiler interrogating itself (`--version`, `-print-...`)
    QueryCompiler,
    /// Preprocessing or dependency generation; produces no entry
    Preprocess,
    /// A compilation, decomposed and ready to render
    Compile(CompilerCall),
}

/// A recognized compiler invocation.
#[derive(Debug)]
pub struct CompilerCall {
    pub compiler: PathBuf,
    pub working_dir: PathBuf,
    pub sources: Vec<SourceFile>,
    /// Flag groups in original order, already stripped
    pub flags: Vec<Vec<String>>,
    pub flags_to_prepend: Vec<String>,
    pub output: Option<PathBuf>,
}

/// The recognizer: configured once, applied to every event of a run.
pub struct Build {
    config: Configuration,
}

impl Build {
    pub fn new(config: &Configuration) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn recognize(&self, execution: &Execution) -> Semantic {
        let (flags_to_prepend, flags_to_strip) =
            match tools::identify(&execution.executable, &self.config) {
                ToolKind::Excluded => return Semantic::NotRecognized,
                ToolKind::Unknown => return Semantic::NotRecognized,
                ToolKind::Configured(spec) => {
                    (spec.flags_to_prepend.clone(), spec.flags_to_strip.clone())
                }
                ToolKind::KnownCompiler => (Vec::new(), Vec::new()),
            };

        let arguments = match execution.arguments.len() {
            0 | 1 => Vec::new(),
            _ => flags::expand_response_files(&execution.arguments[1..], &execution.working_dir),
        };
        let parsed = flags::parse(&arguments);

        if parsed.query {
            return Semantic::QueryCompiler;
        }
        if parsed.preprocess || parsed.dependency_only {
            return Semantic::Preprocess;
        }
        if parsed.sources.is_empty() {
            return Semantic::NotRecognized;
        }
        // no compile phase selected and objects are being consumed:
        // this call describes a link, the sources were compiled elsewhere
        if !parsed.compile_only && !parsed.assemble && parsed.object_inputs {
            debug!(
                executable = %execution.executable.display(),
                "link step with sources, no entries emitted"
            );
            return Semantic::NotRecognized;
        }

        let flags = parsed
            .flags
            .into_iter()
            .filter(|group| !flags_to_strip.iter().any(|strip| strip == &group[0]))
            .collect();

        Semantic::Compile(CompilerCall {
            compiler: execution.executable.clone(),
            working_dir: execution.working_dir.clone(),
            sources: parsed.sources,
            flags,
            flags_to_prepend,
            output: parsed.output,
        })
    }
}

impl CompilerCall {
    /// Render one database entry per translation unit.
    pub fn into_entries(self) -> Vec<Entry> {
        let output = match (&self.output, self.sources.len()) {
            (Some(_), n) if n > 1 => {
                // a shared -o cannot apply to per-file commands
                warn!(
                    sources = n,
                    compiler = %self.compiler.display(),
                    "multiple sources share one -o; dropping it from the entries"
                );
                None
            }
            (output, _) => output.clone(),
        };

        let compiler = self.compiler.to_string_lossy().to_string();
        self.sources
            .into_iter()
            .map(|source| {
                let mut arguments = vec![compiler.clone(), "-c".to_string()];
                arguments.extend(self.flags_to_prepend.iter().cloned());
                arguments.extend(self.flags.iter().flatten().cloned());
                arguments.push("-x".to_string());
                arguments.push(source.language.as_flag().to_string());
                arguments.push(source.path.to_string_lossy().to_string());
                if let Some(output) = &output {
                    arguments.push("-o".to_string());
                    arguments.push(output.to_string_lossy().to_string());
                }

                Entry {
                    directory: self.working_dir.clone(),
                    file: source.path,
                    arguments,
                    output: output.clone(),
                }
            })
            .collect()
    }
}
