//! The compiler argument grammar
//!
//! A single table drives tokenization: every known flag shape carries
//! its arity (does it glue its value, take the next token, or both) and
//! its meaning for classification. Tokens that match nothing and do not
//! look like flags are operands, split into translation-unit sources
//! and object/library inputs by suffix.

use std::path::{Path, PathBuf};

use tracing::warn;

use super::sources::{self, Language};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arity {
    /// Stands alone: `-c`
    None,
    /// Consumes the next token: `-include FILE`
    Separate,
    /// Value glued on: `-Wl,-rpath`; exact match is the bare flag
    Attached,
    /// Either shape: `-I DIR` and `-IDIR`
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meaning {
    /// Kept in the reconstructed command without further interpretation
    PassThrough,
    /// Kept, but remembers that a link step is being described
    Linker,
    /// `-o`
    Output,
    /// `-x`
    Language,
    /// `-c`
    PhaseCompile,
    /// `-S`
    PhaseAssemble,
    /// `-E`
    PhasePreprocess,
    /// `-M`/`-MM`: preprocessor runs for dependencies only
    DependencyOnly,
    /// The call interrogates the compiler, it compiles nothing
    Query,
}

struct FlagDef {
    name: &'static str,
    arity: Arity,
    meaning: Meaning,
}

macro_rules! flag {
    ($name:literal, $arity:ident, $meaning:ident) => {
        FlagDef {
            name: $name,
            arity: Arity::$arity,
            meaning: Meaning::$meaning,
        }
    };
}

/// The flag shape table. Lookup prefers the longest matching name, so
/// `-Wl,` wins over the generic `-W` prefix.
static FLAG_TABLE: &[FlagDef] = &[
    // phase selection
    flag!("-c", None, PhaseCompile),
    flag!("-S", None, PhaseAssemble),
    flag!("-E", None, PhasePreprocess),
    // output and language
    flag!("-o", Both, Output),
    flag!("-x", Both, Language),
    // queries: the compiler answers, nothing is compiled
    flag!("--version", None, Query),
    flag!("-version", None, Query),
    flag!("--help", Attached, Query),
    flag!("-help", None, Query),
    flag!("-###", None, Query),
    flag!("-dump", Attached, Query),
    flag!("-print-", Attached, Query),
    flag!("--print-", Attached, Query),
    // dependency generation
    flag!("-M", None, DependencyOnly),
    flag!("-MM", None, DependencyOnly),
    flag!("-MD", None, PassThrough),
    flag!("-MMD", None, PassThrough),
    flag!("-MP", None, PassThrough),
    flag!("-MG", None, PassThrough),
    flag!("-MF", Both, PassThrough),
    flag!("-MT", Both, PassThrough),
    flag!("-MQ", Both, PassThrough),
    // preprocessor
    flag!("-D", Both, PassThrough),
    flag!("-U", Both, PassThrough),
    flag!("-I", Both, PassThrough),
    flag!("-iquote", Both, PassThrough),
    flag!("-isystem", Both, PassThrough),
    flag!("-idirafter", Both, PassThrough),
    flag!("-iprefix", Both, PassThrough),
    flag!("-isysroot", Both, PassThrough),
    flag!("-imacros", Separate, PassThrough),
    flag!("-include", Separate, PassThrough),
    flag!("-B", Both, PassThrough),
    flag!("-F", Both, PassThrough),
    // target selection
    flag!("-target", Separate, PassThrough),
    flag!("--target=", Attached, PassThrough),
    flag!("-arch", Separate, PassThrough),
    // tool-specific pass-through operands
    flag!("-Xclang", Separate, PassThrough),
    flag!("-Xpreprocessor", Separate, PassThrough),
    flag!("-Xassembler", Separate, PassThrough),
    flag!("--param", Separate, PassThrough),
    // linker
    flag!("-Xlinker", Separate, Linker),
    flag!("-Wl,", Attached, Linker),
    flag!("-l", Both, Linker),
    flag!("-L", Both, Linker),
    flag!("-z", Separate, Linker),
    flag!("-u", Separate, Linker),
    flag!("-T", Separate, Linker),
    flag!("-framework", Separate, Linker),
    flag!("-shared", None, Linker),
    flag!("-static", None, Linker),
    flag!("-static-libgcc", None, Linker),
    flag!("-static-libstdc++", None, Linker),
    flag!("-rdynamic", None, Linker),
    flag!("-pie", None, Linker),
    flag!("-no-pie", None, Linker),
    flag!("-nostdlib", None, Linker),
    flag!("-nodefaultlibs", None, Linker),
    flag!("-nostartfiles", None, Linker),
    flag!("-dynamiclib", None, Linker),
    flag!("-bundle", None, Linker),
    flag!("-r", None, Linker),
    // broad attached families, matched last by length
    flag!("-W", Attached, PassThrough),
    flag!("-f", Attached, PassThrough),
    flag!("-m", Attached, PassThrough),
    flag!("-O", Attached, PassThrough),
    flag!("-g", Attached, PassThrough),
    flag!("-std=", Attached, PassThrough),
    flag!("--std=", Attached, PassThrough),
    // common standalone switches
    flag!("-pthread", None, PassThrough),
    flag!("-pipe", None, PassThrough),
    flag!("-ansi", None, PassThrough),
    flag!("-pedantic", None, PassThrough),
    flag!("-w", None, PassThrough),
    flag!("-P", None, PassThrough),
    flag!("-C", None, PassThrough),
    flag!("-H", None, PassThrough),
    flag!("-v", None, PassThrough),
];

enum MatchKind {
    Exact,
    AttachedValue,
}

/// How a matched flag carries its value, if any.
enum Operand {
    None,
    Attached(String),
    Separate(Option<String>),
}

impl Operand {
    fn value(&self) -> Option<&str> {
        match self {
            Operand::None => None,
            Operand::Attached(value) => Some(value),
            Operand::Separate(value) => value.as_deref(),
        }
    }
}

fn lookup(token: &str) -> Option<(&'static FlagDef, MatchKind)> {
    let mut best: Option<(&FlagDef, MatchKind)> = None;
    for def in FLAG_TABLE {
        let kind = if token == def.name {
            MatchKind::Exact
        } else if matches!(def.arity, Arity::Attached | Arity::Both)
            && token.starts_with(def.name)
        {
            MatchKind::AttachedValue
        } else {
            continue;
        };
        let better = match &best {
            Some((current, _)) => def.name.len() > current.name.len(),
            None => true,
        };
        if better {
            best = Some((def, kind));
        }
    }
    best
}

/// One translation-unit input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub language: Language,
}

/// Everything the grammar extracted from one argument vector.
#[derive(Debug, Default)]
pub struct ParsedArguments {
    /// Flag groups in original order; a separate-valued flag keeps its
    /// operand in the same group
    pub flags: Vec<Vec<String>>,
    pub sources: Vec<SourceFile>,
    pub output: Option<PathBuf>,
    pub compile_only: bool,
    pub assemble: bool,
    pub preprocess: bool,
    pub dependency_only: bool,
    pub query: bool,
    pub linker_flags: bool,
    pub object_inputs: bool,
}

/// Run the grammar over `argv[1..]` (response files already expanded).
pub fn parse(arguments: &[String]) -> ParsedArguments {
    let mut parsed = ParsedArguments::default();
    // explicit `-x` overrides suffix inference until the next `-x`
    let mut explicit_language: Option<Language> = None;

    let mut cursor = arguments.iter();
    while let Some(token) = cursor.next() {
        if !token.starts_with('-') || token == "-" {
            classify_operand(token, &explicit_language, &mut parsed);
            continue;
        }

        let Some((def, kind)) = lookup(token) else {
            // unknown flag: keep it, assume it has no operand
            parsed.flags.push(vec![token.clone()]);
            continue;
        };

        let operand = match (def.arity, kind) {
            (Arity::None, _) | (Arity::Attached, MatchKind::Exact) => Operand::None,
            (_, MatchKind::AttachedValue) => {
                Operand::Attached(token[def.name.len()..].to_string())
            }
            (_, MatchKind::Exact) => Operand::Separate(cursor.next().cloned()),
        };

        match def.meaning {
            Meaning::Output => {
                parsed.output = operand.value().map(PathBuf::from);
            }
            Meaning::Language => {
                explicit_language = match operand.value() {
                    Some("none") | None => None,
                    Some(lang) => Some(Language::from_flag(lang)),
                };
            }
            Meaning::PhaseCompile => parsed.compile_only = true,
            Meaning::PhaseAssemble => parsed.assemble = true,
            Meaning::PhasePreprocess => parsed.preprocess = true,
            Meaning::DependencyOnly => parsed.dependency_only = true,
            Meaning::Query => parsed.query = true,
            Meaning::PassThrough | Meaning::Linker => {
                if def.meaning == Meaning::Linker {
                    parsed.linker_flags = true;
                }
                let mut group = vec![token.clone()];
                if let Operand::Separate(Some(value)) = operand {
                    group.push(value);
                }
                parsed.flags.push(group);
            }
        }
    }

    parsed
}

fn classify_operand(
    token: &str,
    explicit_language: &Option<Language>,
    parsed: &mut ParsedArguments,
) {
    let path = PathBuf::from(token);
    match explicit_language {
        Some(language) => parsed.sources.push(SourceFile {
            path,
            language: language.clone(),
        }),
        None => match sources::language_of(&path) {
            Some(language) => parsed.sources.push(SourceFile { path, language }),
            None => parsed.object_inputs = true,
        },
    }
}

/// Splice `@file` response files in place, with shell-compatible
/// tokenization, before the grammar runs.
pub fn expand_response_files(arguments: &[String], working_dir: &Path) -> Vec<String> {
    expand_inner(arguments, working_dir, 0)
}

const MAX_RESPONSE_DEPTH: usize = 10;

fn expand_inner(arguments: &[String], working_dir: &Path, depth: usize) -> Vec<String> {
    let mut result = Vec::with_capacity(arguments.len());
    for token in arguments {
        let Some(file) = token.strip_prefix('@') else {
            result.push(token.clone());
            continue;
        };
        if depth >= MAX_RESPONSE_DEPTH {
            warn!(token = %token, "response file nesting too deep, token kept verbatim");
            result.push(token.clone());
            continue;
        }
        let path = working_dir.join(file);
        match std::fs::read_to_string(&path) {
            Ok(content) => match shlex::split(&content) {
                Some(tokens) => {
                    result.extend(expand_inner(&tokens, working_dir, depth + 1));
                }
                None => {
                    warn!(file = %path.display(), "unparsable response file, token kept verbatim");
                    result.push(token.clone());
                }
            },
            Err(err) => {
                warn!(file = %path.display(), "unreadable response file ({err}), token kept verbatim");
                result.push(token.clone());
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn attached_and_separate_values_both_parse() {
        let parsed = parse(&args(&["-Iinclude", "-I", "other", "-DFOO=1", "main.c"]));
        assert_eq!(
            parsed.flags,
            vec![
                vec!["-Iinclude".to_string()],
                vec!["-I".to_string(), "other".to_string()],
                vec!["-DFOO=1".to_string()],
            ]
        );
        assert_eq!(parsed.sources.len(), 1);
    }

    #[test]
    fn output_is_extracted_not_kept_as_a_flag() {
        let parsed = parse(&args(&["-c", "-o", "out.o", "a.c"]));
        assert!(parsed.compile_only);
        assert_eq!(parsed.output, Some(PathBuf::from("out.o")));
        assert!(parsed.flags.is_empty());
    }

    #[test]
    fn separate_valued_flags_keep_their_operand_grouped() {
        let parsed = parse(&args(&["-include", "config.h", "-isystem", "/opt/inc", "a.c"]));
        assert_eq!(
            parsed.flags,
            vec![
                vec!["-include".to_string(), "config.h".to_string()],
                vec!["-isystem".to_string(), "/opt/inc".to_string()],
            ]
        );
    }

    #[test]
    fn explicit_language_overrides_suffixes_until_reset() {
        let parsed = parse(&args(&["-x", "c++", "weird.inc", "-x", "none", "plain.c"]));
        assert_eq!(parsed.sources.len(), 2);
        assert_eq!(parsed.sources[0].language, Language::Cxx);
        assert_eq!(parsed.sources[0].path, PathBuf::from("weird.inc"));
        assert_eq!(parsed.sources[1].language, Language::C);
    }

    #[test]
    fn query_flags_mark_the_call() {
        assert!(parse(&args(&["--version"])).query);
        assert!(parse(&args(&["-dumpmachine"])).query);
        assert!(parse(&args(&["-print-prog-name=ld"])).query);
        assert!(!parse(&args(&["-c", "a.c"])).query);
    }

    #[test]
    fn dependency_only_flags_differ_from_side_effect_ones() {
        assert!(parse(&args(&["-M", "a.c"])).dependency_only);
        assert!(parse(&args(&["-MM", "a.c"])).dependency_only);

        let side_effect = parse(&args(&["-MD", "-MF", "a.d", "-c", "a.c"]));
        assert!(!side_effect.dependency_only);
        assert_eq!(
            side_effect.flags,
            vec![
                vec!["-MD".to_string()],
                vec!["-MF".to_string(), "a.d".to_string()],
            ]
        );
    }

    #[test]
    fn linker_flags_are_kept_and_remembered() {
        let parsed = parse(&args(&["-Wl,-rpath,/lib", "-lm", "-L/lib", "a.c"]));
        assert!(parsed.linker_flags);
        assert_eq!(parsed.flags.len(), 3);
    }

    #[test]
    fn wl_wins_over_the_generic_w_prefix() {
        let warning = parse(&args(&["-Wall"]));
        assert!(!warning.linker_flags);

        let linker = parse(&args(&["-Wl,--as-needed"]));
        assert!(linker.linker_flags);
    }

    #[test]
    fn operands_split_into_sources_and_objects() {
        let parsed = parse(&args(&["main.c", "util.o", "libfoo.a"]));
        assert_eq!(parsed.sources.len(), 1);
        assert!(parsed.object_inputs);
    }

    #[test]
    fn unknown_flags_pass_through_alone() {
        let parsed = parse(&args(&["--some-new-flag", "-c", "a.c"]));
        assert_eq!(parsed.flags, vec![vec!["--some-new-flag".to_string()]]);
    }

    #[test]
    fn response_files_splice_in_place() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("resp.txt"), "-Wall -DX=1\n").unwrap();

        let expanded =
            expand_response_files(&args(&["@resp.txt", "foo.c"]), temp.path());
        assert_eq!(expanded, args(&["-Wall", "-DX=1", "foo.c"]));
    }

    #[test]
    fn response_files_nest() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("outer.txt"), "@inner.txt -O2").unwrap();
        std::fs::write(temp.path().join("inner.txt"), "-DX=1").unwrap();

        let expanded = expand_response_files(&args(&["@outer.txt"]), temp.path());
        assert_eq!(expanded, args(&["-DX=1", "-O2"]));
    }

    #[test]
    fn missing_response_file_keeps_the_token() {
        let temp = tempfile::TempDir::new().unwrap();
        let expanded = expand_response_files(&args(&["@gone.txt", "a.c"]), temp.path());
        assert_eq!(expanded, args(&["@gone.txt", "a.c"]));
    }
}
