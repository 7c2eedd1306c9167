//! Source language tables
//!
//! Suffix matching is case-sensitive on purpose: `.C` is C++ by ancient
//! convention, `.c` is C.

use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Language {
    C,
    Cxx,
    CPreprocessed,
    CxxPreprocessed,
    ObjectiveC,
    ObjectiveCxx,
    Fortran,
    Assembler,
    /// Carried through from an explicit `-x` value this table does not know.
    Other(String),
}

impl Language {
    /// The value handed back to the compiler as `-x <value>`.
    pub fn as_flag(&self) -> &str {
        match self {
            Language::C => "c",
            Language::Cxx => "c++",
            Language::CPreprocessed => "cpp-output",
            Language::CxxPreprocessed => "c++-cpp-output",
            Language::ObjectiveC => "objective-c",
            Language::ObjectiveCxx => "objective-c++",
            Language::Fortran => "f95",
            Language::Assembler => "assembler",
            Language::Other(value) => value,
        }
    }

    /// Interpret an explicit `-x` operand.
    pub fn from_flag(value: &str) -> Language {
        match value {
            "c" | "c-header" => Language::C,
            "c++" | "c++-header" => Language::Cxx,
            "cpp-output" => Language::CPreprocessed,
            "c++-cpp-output" => Language::CxxPreprocessed,
            "objective-c" | "objective-c-header" => Language::ObjectiveC,
            "objective-c++" | "objective-c++-header" => Language::ObjectiveCxx,
            "f77" | "f95" | "f77-cpp-input" | "f95-cpp-input" => Language::Fortran,
            "assembler" | "assembler-with-cpp" => Language::Assembler,
            other => Language::Other(other.to_string()),
        }
    }
}

const C_SUFFIXES: &[&str] = &["c"];
const CXX_SUFFIXES: &[&str] = &["cc", "cp", "cxx", "cpp", "CPP", "c++", "C"];
const C_PREPROCESSED_SUFFIXES: &[&str] = &["i"];
const CXX_PREPROCESSED_SUFFIXES: &[&str] = &["ii"];
const OBJC_SUFFIXES: &[&str] = &["m", "mi"];
const OBJCXX_SUFFIXES: &[&str] = &["mm", "M", "mii"];
const FORTRAN_SUFFIXES: &[&str] = &[
    "f", "for", "ftn", "F", "FOR", "FTN", "f90", "f95", "f03", "f08", "F90", "F95", "F03", "F08",
    "fpp", "FPP",
];
const ASSEMBLER_SUFFIXES: &[&str] = &["s", "S", "sx"];

/// Language of a path judged by its suffix, `None` for anything that is
/// not a recognized source file (objects, archives, linker scripts).
pub fn language_of(path: &Path) -> Option<Language> {
    let suffix = path.extension()?.to_str()?;
    let tables: [(&[&str], Language); 8] = [
        (C_SUFFIXES, Language::C),
        (CXX_SUFFIXES, Language::Cxx),
        (C_PREPROCESSED_SUFFIXES, Language::CPreprocessed),
        (CXX_PREPROCESSED_SUFFIXES, Language::CxxPreprocessed),
        (OBJC_SUFFIXES, Language::ObjectiveC),
        (OBJCXX_SUFFIXES, Language::ObjectiveCxx),
        (FORTRAN_SUFFIXES, Language::Fortran),
        (ASSEMBLER_SUFFIXES, Language::Assembler),
    ];
    tables
        .into_iter()
        .find(|(suffixes, _)| suffixes.contains(&suffix))
        .map(|(_, language)| language)
}

/// True when the path looks like a translation unit input.
pub fn is_source(path: &Path) -> bool {
    language_of(path).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn suffix_language_mapping() {
        assert_eq!(language_of(Path::new("main.c")), Some(Language::C));
        assert_eq!(language_of(Path::new("a.cc")), Some(Language::Cxx));
        assert_eq!(language_of(Path::new("a.cpp")), Some(Language::Cxx));
        assert_eq!(language_of(Path::new("view.m")), Some(Language::ObjectiveC));
        assert_eq!(
            language_of(Path::new("view.mm")),
            Some(Language::ObjectiveCxx)
        );
        assert_eq!(
            language_of(Path::new("solver.f90")),
            Some(Language::Fortran)
        );
        assert_eq!(language_of(Path::new("boot.S")), Some(Language::Assembler));
    }

    #[test]
    fn capital_c_is_cxx_lower_is_c() {
        assert_eq!(language_of(Path::new("legacy.C")), Some(Language::Cxx));
        assert_eq!(language_of(Path::new("legacy.c")), Some(Language::C));
    }

    #[test]
    fn non_sources_have_no_language() {
        for name in ["a.o", "lib.a", "lib.so", "script.ld", "README", "a.d"] {
            assert_eq!(language_of(&PathBuf::from(name)), None, "{name}");
        }
    }

    #[test]
    fn explicit_x_values_round_trip() {
        assert_eq!(Language::from_flag("c++").as_flag(), "c++");
        assert_eq!(Language::from_flag("objective-c").as_flag(), "objective-c");
        assert_eq!(Language::from_flag("rust").as_flag(), "rust");
    }
}
