//! Configuration loading
//!
//! The configuration is a JSON document mirroring [`Configuration`].
//! Unknown keys are reported as warnings and otherwise ignored, so a
//! config written for a newer version still loads.

use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub compilers_to_recognize: Vec<CompilerSpec>,
    pub compilers_to_exclude: Vec<PathBuf>,
    pub content_filter: ContentFilter,
    pub output_format: OutputFormat,
}

/// A compiler the operator wants recognized, with per-compiler flag
/// surgery applied to every reconstructed command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerSpec {
    pub executable_path: PathBuf,
    pub flags_to_prepend: Vec<String>,
    pub flags_to_strip: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentFilter {
    pub include_only_existing_sources: bool,
    pub include_paths: Vec<PathBuf>,
    pub exclude_paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputFormat {
    pub command_as_array: bool,
    pub drop_output_field: bool,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self {
            command_as_array: true,
            drop_output_field: false,
        }
    }
}

impl Configuration {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let value: serde_json::Value = serde_json::from_str(&text)
            .with_context(|| format!("Malformed config {}", path.display()))?;

        warn_unknown_keys(&value, path);

        let config: Configuration = serde_json::from_value(value)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// `--run-checks`: only existing sources pass the filter, and the
    /// configured path lists are pinned to the invocation directory.
    pub fn enable_checks(&mut self) -> Result<()> {
        let cwd = env::current_dir().context("Failed to get the working directory")?;
        self.content_filter.include_only_existing_sources = true;
        for path in self
            .content_filter
            .include_paths
            .iter_mut()
            .chain(self.content_filter.exclude_paths.iter_mut())
        {
            if path.is_relative() {
                *path = cwd.join(path.as_path());
            }
        }
        Ok(())
    }

    /// Compilers named by the conventional environment variables are
    /// recognized even without a config file.
    pub fn seed_from_environment(&mut self) {
        for key in ["CC", "CXX", "FC"] {
            let Some(value) = env::var_os(key) else {
                continue;
            };
            let executable = PathBuf::from(value);
            if executable.as_os_str().is_empty() {
                continue;
            }
            let known = self
                .compilers_to_recognize
                .iter()
                .any(|spec| spec.executable_path == executable);
            if !known {
                debug!(compiler = %executable.display(), from = key, "recognizing compiler");
                self.compilers_to_recognize.push(CompilerSpec {
                    executable_path: executable,
                    ..Default::default()
                });
            }
        }
    }
}

fn warn_unknown_keys(value: &serde_json::Value, path: &Path) {
    let known: [(&str, &[&str]); 4] = [
        (
            "",
            &[
                "compilers_to_recognize",
                "compilers_to_exclude",
                "content_filter",
                "output_format",
            ],
        ),
        (
            "content_filter",
            &[
                "include_only_existing_sources",
                "include_paths",
                "exclude_paths",
            ],
        ),
        ("output_format", &["command_as_array", "drop_output_field"]),
        (
            "compilers_to_recognize[]",
            &["executable_path", "flags_to_prepend", "flags_to_strip"],
        ),
    ];
    let known: std::collections::HashMap<&str, HashSet<&str>> = known
        .into_iter()
        .map(|(scope, keys)| (scope, keys.iter().copied().collect()))
        .collect();

    let mut check = |scope: &str, object: &serde_json::Value| {
        let (Some(object), Some(keys)) = (object.as_object(), known.get(scope)) else {
            return;
        };
        for key in object.keys() {
            if !keys.contains(key.as_str()) {
                let scope = if scope.is_empty() { "top level" } else { scope };
                warn!(config = %path.display(), key, scope, "unknown configuration key ignored");
            }
        }
    };

    check("", value);
    check("content_filter", &value["content_filter"]);
    check("output_format", &value["output_format"]);
    if let Some(list) = value["compilers_to_recognize"].as_array() {
        for item in list {
            check("compilers_to_recognize[]", item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_permissive() {
        let config = Configuration::default();
        assert!(config.output_format.command_as_array);
        assert!(!config.output_format.drop_output_field);
        assert!(!config.content_filter.include_only_existing_sources);
        assert!(config.compilers_to_recognize.is_empty());
    }

    #[test]
    fn load_accepts_partial_documents() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "compilers_to_exclude": ["/usr/bin/true"],
                "output_format": {"command_as_array": false}
            }"#,
        )
        .unwrap();

        let config = Configuration::load(&path).unwrap();
        assert_eq!(
            config.compilers_to_exclude,
            vec![PathBuf::from("/usr/bin/true")]
        );
        assert!(!config.output_format.command_as_array);
        // untouched section keeps its default
        assert!(!config.content_filter.include_only_existing_sources);
    }

    #[test]
    fn unknown_keys_do_not_fail_the_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(
            &path,
            r#"{"some_future_section": {"a": 1}, "output_format": {"compress": true}}"#,
        )
        .unwrap();
        assert!(Configuration::load(&path).is_ok());
    }

    #[test]
    fn malformed_config_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert!(Configuration::load(&path).is_err());
    }

    #[test]
    fn enable_checks_absolutizes_filter_paths() {
        let mut config = Configuration {
            content_filter: ContentFilter {
                include_only_existing_sources: false,
                include_paths: vec![PathBuf::from("src")],
                exclude_paths: vec![PathBuf::from("/abs/vendor")],
            },
            ..Default::default()
        };
        config.enable_checks().unwrap();

        assert!(config.content_filter.include_only_existing_sources);
        assert!(config.content_filter.include_paths[0].is_absolute());
        assert_eq!(
            config.content_filter.exclude_paths[0],
            PathBuf::from("/abs/vendor")
        );
    }
}
