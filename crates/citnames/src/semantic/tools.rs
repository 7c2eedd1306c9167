//! Compiler identification
//!
//! Decides whether an executable is a compiler at all, before any
//! argument is looked at. Configured entries match by full path or by
//! basename; the built-in heuristic covers the common C/C++/Fortran
//! family including cross prefixes (`x86_64-linux-gnu-gcc`) and version
//! suffixes (`clang-17`, `gcc-12.2`).

use std::path::Path;

use crate::config::{CompilerSpec, Configuration};

/// Outcome of tool identification.
#[derive(Debug)]
pub enum ToolKind<'a> {
    /// Explicitly excluded; never a compiler
    Excluded,
    /// Matched a configured entry; its flag surgery applies
    Configured(&'a CompilerSpec),
    /// Matched the built-in compiler name heuristic
    KnownCompiler,
    /// Not a compiler
    Unknown,
}

pub fn identify<'a>(executable: &Path, config: &'a Configuration) -> ToolKind<'a> {
    let basename = executable
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();

    let excluded = config.compilers_to_exclude.iter().any(|candidate| {
        candidate == executable || candidate.file_name() == executable.file_name()
    });
    if excluded {
        return ToolKind::Excluded;
    }

    let configured = config.compilers_to_recognize.iter().find(|spec| {
        spec.executable_path == executable
            || spec
                .executable_path
                .file_name()
                .map(|n| n.to_string_lossy() == basename)
                .unwrap_or(false)
    });
    if let Some(spec) = configured {
        return ToolKind::Configured(spec);
    }

    if is_builtin_compiler(&basename) {
        ToolKind::KnownCompiler
    } else {
        ToolKind::Unknown
    }
}

/// Core names the heuristic accepts, after peeling the cross prefix and
/// version suffix.
const COMPILER_NAMES: &[&str] = &[
    "cc", "c++", "cxx", "gcc", "g++", "clang", "clang++", "gfortran", "f77", "f95", "icc", "icpc",
];

fn is_builtin_compiler(basename: &str) -> bool {
    let name = strip_version_suffix(basename);
    if COMPILER_NAMES.contains(&name) {
        return true;
    }
    // cross toolchains prefix the triplet: <arch>-<vendor>-<os>-gcc
    match name.rsplit_once('-') {
        Some((_, core)) => COMPILER_NAMES.contains(&core),
        None => false,
    }
}

/// Peel a trailing `-<digits[.digits...]>` version, as in `gcc-12` or
/// `clang++-17.0`.
fn strip_version_suffix(name: &str) -> &str {
    match name.rsplit_once('-') {
        Some((stem, version))
            if !version.is_empty()
                && version.chars().all(|c| c.is_ascii_digit() || c == '.') =>
        {
            stem
        }
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn plain_compiler_names_are_recognized() {
        for name in ["cc", "c++", "gcc", "g++", "clang", "clang++", "gfortran", "f77"] {
            assert!(is_builtin_compiler(name), "{name}");
        }
    }

    #[test]
    fn versioned_and_cross_names_are_recognized() {
        for name in [
            "gcc-12",
            "clang-17",
            "clang++-17.0",
            "x86_64-linux-gnu-gcc",
            "arm-none-eabi-g++",
            "x86_64-linux-gnu-gcc-12",
        ] {
            assert!(is_builtin_compiler(name), "{name}");
        }
    }

    #[test]
    fn ordinary_tools_are_not_compilers() {
        for name in ["ld", "ar", "make", "sh", "cat", "ccache", "as", "python3"] {
            assert!(!is_builtin_compiler(name), "{name}");
        }
    }

    #[test]
    fn exclusion_beats_recognition() {
        let config = Configuration {
            compilers_to_exclude: vec![PathBuf::from("/usr/bin/gcc")],
            ..Default::default()
        };
        assert!(matches!(
            identify(Path::new("/usr/bin/gcc"), &config),
            ToolKind::Excluded
        ));
    }

    #[test]
    fn configured_compilers_match_by_basename_too() {
        let config = Configuration {
            compilers_to_recognize: vec![CompilerSpec {
                executable_path: PathBuf::from("mycc"),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(matches!(
            identify(Path::new("/opt/toolchain/bin/mycc"), &config),
            ToolKind::Configured(_)
        ));
        assert!(matches!(
            identify(Path::new("/usr/bin/ld"), &config),
            ToolKind::Unknown
        ));
    }
}
