//! Compilation database serialization
//!
//! The canonical output is a JSON array of entry objects with a fixed
//! key order (`directory`, `arguments`|`command`, `file`, `output`),
//! UTF-8, trailing newline. Writing is atomic (temp file + rename) and
//! deterministic (entries sorted by file, then directory), so repeated
//! runs over the same log are byte-identical.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ContentFilter, OutputFormat};

/// One compilation database entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub directory: PathBuf,
    pub file: PathBuf,
    pub arguments: Vec<String>,
    pub output: Option<PathBuf>,
}

impl Entry {
    /// The source path this entry describes, made absolute.
    pub fn resolved_file(&self) -> PathBuf {
        if self.file.is_absolute() {
            self.file.clone()
        } else {
            self.directory.join(&self.file)
        }
    }
}

/// Union of prior and new entries on the natural key
/// `(directory, file, arguments)`; new entries win on collision. The
/// result is sorted for deterministic output.
pub fn merge(prior: Vec<Entry>, new: Vec<Entry>) -> Vec<Entry> {
    let mut union: HashMap<(PathBuf, PathBuf, Vec<String>), Entry> = HashMap::new();
    for entry in prior.into_iter().chain(new) {
        let key = (
            entry.directory.clone(),
            entry.file.clone(),
            entry.arguments.clone(),
        );
        union.insert(key, entry);
    }

    let mut entries: Vec<Entry> = union.into_values().collect();
    entries.sort_by(|a, b| {
        (&a.file, &a.directory, &a.arguments).cmp(&(&b.file, &b.directory, &b.arguments))
    });
    entries
}

/// Reader/writer for the on-disk database, carrying the configured
/// format and content filter.
pub struct CompilationDatabase {
    format: OutputFormat,
    content: ContentFilter,
}

/// Serialization shape; the variant fixes the key order within each
/// object.
#[derive(Serialize)]
#[serde(untagged)]
enum Rendered {
    Arguments {
        directory: String,
        arguments: Vec<String>,
        file: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<String>,
    },
    Command {
        directory: String,
        command: String,
        file: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<String>,
    },
}

/// Accepted on read: either an `arguments` array or a `command` string.
#[derive(Deserialize)]
struct Parsed {
    directory: PathBuf,
    file: PathBuf,
    #[serde(default)]
    arguments: Option<Vec<String>>,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    output: Option<PathBuf>,
}

impl CompilationDatabase {
    pub fn new(format: &OutputFormat, content: &ContentFilter) -> Self {
        Self {
            format: format.clone(),
            content: content.clone(),
        }
    }

    /// Load an existing database, whichever command shape it uses.
    pub fn from_file(&self, path: &Path) -> Result<Vec<Entry>> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read database {}", path.display()))?;
        let parsed: Vec<Parsed> = serde_json::from_str(&text)
            .with_context(|| format!("Malformed database {}", path.display()))?;

        let mut entries = Vec::with_capacity(parsed.len());
        for item in parsed {
            let arguments = match (item.arguments, item.command) {
                (Some(arguments), _) => arguments,
                (None, Some(command)) => shlex::split(&command).with_context(|| {
                    format!("Unparsable command in {}: {command}", path.display())
                })?,
                (None, None) => {
                    bail!(
                        "Entry without arguments or command in {}",
                        path.display()
                    )
                }
            };
            entries.push(Entry {
                directory: item.directory,
                file: item.file,
                arguments,
                output: item.output,
            });
        }
        Ok(entries)
    }

    /// Filter, render, and atomically replace `path`. Returns the
    /// number of entries written.
    pub fn to_file(&self, path: &Path, entries: &[Entry]) -> Result<usize> {
        let kept: Vec<&Entry> = entries
            .iter()
            .filter(|entry| self.passes_filter(entry))
            .collect();

        let rendered: Vec<Rendered> = kept.iter().map(|entry| self.render(entry)).collect();

        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = tempfile::NamedTempFile::new_in(parent)
            .with_context(|| format!("Failed to stage output next to {}", path.display()))?;
        serde_json::to_writer_pretty(&mut temp, &rendered)?;
        temp.write_all(b"\n")?;
        temp.persist(path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;

        debug!(entries = rendered.len(), path = %path.display(), "database written");
        Ok(rendered.len())
    }

    fn render(&self, entry: &Entry) -> Rendered {
        let directory = entry.directory.to_string_lossy().to_string();
        let file = entry.file.to_string_lossy().to_string();
        let output = if self.format.drop_output_field {
            None
        } else {
            entry
                .output
                .as_ref()
                .map(|o| o.to_string_lossy().to_string())
        };

        if self.format.command_as_array {
            Rendered::Arguments {
                directory,
                arguments: entry.arguments.clone(),
                file,
                output,
            }
        } else {
            let command = shlex::try_join(entry.arguments.iter().map(String::as_str))
                .unwrap_or_else(|_| entry.arguments.join(" "));
            Rendered::Command {
                directory,
                command,
                file,
                output,
            }
        }
    }

    fn passes_filter(&self, entry: &Entry) -> bool {
        let resolved = entry.resolved_file();

        if self.content.include_only_existing_sources && !resolved.exists() {
            debug!(file = %resolved.display(), "dropped: source does not exist");
            return false;
        }
        if self
            .content
            .exclude_paths
            .iter()
            .any(|prefix| resolved.starts_with(prefix))
        {
            debug!(file = %resolved.display(), "dropped: excluded path");
            return false;
        }
        if !self.content.include_paths.is_empty()
            && !self
                .content
                .include_paths
                .iter()
                .any(|prefix| resolved.starts_with(prefix))
        {
            debug!(file = %resolved.display(), "dropped: outside included paths");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(directory: &str, file: &str, arguments: &[&str]) -> Entry {
        Entry {
            directory: PathBuf::from(directory),
            file: PathBuf::from(file),
            arguments: arguments.iter().map(|s| s.to_string()).collect(),
            output: None,
        }
    }

    fn database() -> CompilationDatabase {
        CompilationDatabase::new(&OutputFormat::default(), &ContentFilter::default())
    }

    #[test]
    fn merge_deduplicates_on_the_natural_key() {
        let first = entry("/proj", "a.c", &["cc", "-c", "a.c"]);
        let duplicate = first.clone();
        let different_args = entry("/proj", "a.c", &["cc", "-c", "-O2", "a.c"]);

        let merged = merge(vec![first.clone()], vec![duplicate, different_args.clone()]);
        assert_eq!(merged.len(), 2);
        assert!(merged.contains(&first));
        assert!(merged.contains(&different_args));
    }

    #[test]
    fn merge_of_nothing_is_identity() {
        let entries = vec![
            entry("/proj", "a.c", &["cc", "-c", "a.c"]),
            entry("/proj", "b.c", &["cc", "-c", "b.c"]),
        ];
        let merged = merge(entries.clone(), Vec::new());
        assert_eq!(merged, entries);
    }

    #[test]
    fn entries_sort_by_file_then_directory() {
        let merged = merge(
            Vec::new(),
            vec![
                entry("/b", "z.c", &["cc", "-c", "z.c"]),
                entry("/a", "z.c", &["cc", "-c", "z.c"]),
                entry("/b", "a.c", &["cc", "-c", "a.c"]),
            ],
        );
        assert_eq!(merged[0].file, PathBuf::from("a.c"));
        assert_eq!(merged[1].directory, PathBuf::from("/a"));
        assert_eq!(merged[2].directory, PathBuf::from("/b"));
    }

    #[test]
    fn written_database_reads_back_identically() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("compile_commands.json");
        let entries = vec![
            entry("/proj", "a.c", &["cc", "-c", "a.c"]),
            entry("/proj", "b.c", &["cc", "-c", "b.c"]),
        ];

        let db = database();
        db.to_file(&path, &entries).unwrap();
        let read_back = db.from_file(&path).unwrap();
        assert_eq!(read_back, entries);

        // and the bytes are stable across a rewrite of what was read
        let first = std::fs::read(&path).unwrap();
        db.to_file(&path, &read_back).unwrap();
        let second = std::fs::read(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn key_order_is_fixed_in_the_rendered_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("compile_commands.json");
        let mut with_output = entry("/proj", "a.c", &["cc", "-c", "a.c"]);
        with_output.output = Some(PathBuf::from("a.o"));

        database().to_file(&path, &[with_output]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();

        let directory = text.find("\"directory\"").unwrap();
        let arguments = text.find("\"arguments\"").unwrap();
        let file = text.find("\"file\"").unwrap();
        let output = text.find("\"output\"").unwrap();
        assert!(directory < arguments && arguments < file && file < output);
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn command_format_renders_a_quoted_string() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("compile_commands.json");
        let format = OutputFormat {
            command_as_array: false,
            drop_output_field: false,
        };
        let db = CompilationDatabase::new(&format, &ContentFilter::default());

        db.to_file(
            &path,
            &[entry("/proj", "a.c", &["cc", "-c", "-DNAME=a b", "a.c"])],
        )
        .unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"command\""));
        assert!(!text.contains("\"arguments\""));
        // the embedded space survives shell quoting
        let parsed = db.from_file(&path).unwrap();
        assert_eq!(parsed[0].arguments[2], "-DNAME=a b");
    }

    #[test]
    fn drop_output_field_suppresses_output() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("compile_commands.json");
        let format = OutputFormat {
            command_as_array: true,
            drop_output_field: true,
        };
        let mut e = entry("/proj", "a.c", &["cc", "-c", "a.c"]);
        e.output = Some(PathBuf::from("a.o"));

        CompilationDatabase::new(&format, &ContentFilter::default())
            .to_file(&path, &[e])
            .unwrap();
        assert!(!std::fs::read_to_string(&path).unwrap().contains("output"));
    }

    #[test]
    fn existing_source_filter_drops_phantom_files() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("compile_commands.json");
        let real = temp.path().join("real.c");
        std::fs::write(&real, "int main() { return 0; }\n").unwrap();

        let content = ContentFilter {
            include_only_existing_sources: true,
            ..Default::default()
        };
        let db = CompilationDatabase::new(&OutputFormat::default(), &content);
        let entries = vec![
            entry(
                temp.path().to_str().unwrap(),
                "real.c",
                &["cc", "-c", "real.c"],
            ),
            entry(
                temp.path().to_str().unwrap(),
                "phantom.c",
                &["cc", "-c", "phantom.c"],
            ),
        ];

        assert_eq!(db.to_file(&path, &entries).unwrap(), 1);
        let kept = db.from_file(&path).unwrap();
        assert_eq!(kept[0].file, PathBuf::from("real.c"));
    }

    #[test]
    fn include_and_exclude_prefixes_filter_entries() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("compile_commands.json");
        let content = ContentFilter {
            include_only_existing_sources: false,
            include_paths: vec![PathBuf::from("/proj/src")],
            exclude_paths: vec![PathBuf::from("/proj/src/vendor")],
        };
        let db = CompilationDatabase::new(&OutputFormat::default(), &content);
        let entries = vec![
            entry("/proj", "src/a.c", &["cc", "-c", "src/a.c"]),
            entry("/proj", "src/vendor/b.c", &["cc", "-c", "src/vendor/b.c"]),
            entry("/proj", "tests/c.c", &["cc", "-c", "tests/c.c"]),
        ];

        assert_eq!(db.to_file(&path, &entries).unwrap(), 1);
        let kept = db.from_file(&path).unwrap();
        assert_eq!(kept[0].file, PathBuf::from("src/a.c"));
    }

    #[test]
    fn empty_database_is_an_empty_array() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("compile_commands.json");
        database().to_file(&path, &[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]\n");
    }
}
