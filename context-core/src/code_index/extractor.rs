//! Symbol extraction from source text.
//!
//! Source parsing is treated as an external collaborator the engine
//! consumes through a pluggable trait rather than something this crate
//! owns outright. This module ships a regex-based default extractor
//! covering the common declaration kinds; a tree-sitter-backed extractor
//! is the natural production upgrade and is deliberately not built here
//! (see DESIGN.md).

use std::sync::LazyLock;

use regex::Regex;

use crate::model::SymbolKind;

/// One extracted declaration, line-numbered within the chunk/file it came
/// from (1-based, inclusive).
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedSymbol {
    pub name: String,
    pub kind: SymbolKind,
    pub signature: String,
    pub start_line: u32,
    pub end_line: u32,
    pub doc_comment: Option<String>,
}

/// Anything that can pull declarations out of a file's source text for a
/// given language.
pub trait SymbolExtractor: Send + Sync {
    fn extract(&self, content: &str, language: &str) -> Vec<ExtractedSymbol>;
}

/// Tier-1 languages get the full symbol-kind vocabulary; tier-2 get
/// functions/classes only; anything else gets none (chunks only), per
/// spec §4.8.
pub fn language_tier(language: &str) -> u8 {
    match language {
        "typescript" | "javascript" | "python" | "rust" | "go" => 1,
        "java" | "csharp" | "ruby" | "c" | "cpp" => 2,
        _ => 0,
    }
}

/// Map a file extension to the language name used throughout the index.
pub fn language_from_extension(ext: &str) -> Option<&'static str> {
    Some(match ext {
        "ts" | "tsx" => "typescript",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "py" => "python",
        "rs" => "rust",
        "go" => "go",
        "java" => "java",
        "cs" => "csharp",
        "rb" => "ruby",
        "c" | "h" => "c",
        "cc" | "cpp" | "cxx" | "hpp" | "hh" => "cpp",
        _ => return None,
    })
}

struct Pattern {
    regex: &'static LazyLock<Regex>,
    kind: SymbolKind,
}

macro_rules! lazy_regex {
    ($name:ident, $re:expr) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($re).expect("static regex is valid"));
    };
}

lazy_regex!(RE_TS_FUNCTION, r"(?m)^\s*(?:export\s+)?(?:async\s+)?function\s+(\w+)\s*\(([^)]*)\)");
lazy_regex!(RE_TS_CLASS, r"(?m)^\s*(?:export\s+)?(?:abstract\s+)?class\s+(\w+)");
lazy_regex!(RE_TS_INTERFACE, r"(?m)^\s*(?:export\s+)?interface\s+(\w+)");
lazy_regex!(RE_TS_TYPE, r"(?m)^\s*(?:export\s+)?type\s+(\w+)\s*=");
lazy_regex!(RE_TS_ENUM, r"(?m)^\s*(?:export\s+)?enum\s+(\w+)");
lazy_regex!(RE_TS_CONST, r"(?m)^\s*export\s+const\s+(\w+)\s*=");
lazy_regex!(RE_TS_METHOD, r"(?m)^\s{2,}(?:public\s+|private\s+|protected\s+|static\s+|async\s+)*(\w+)\s*\(([^)]*)\)\s*(?::\s*[\w<>\[\], ]+)?\s*\{");

lazy_regex!(RE_PY_FUNCTION, r"(?m)^\s*def\s+(\w+)\s*\(([^)]*)\)");
lazy_regex!(RE_PY_CLASS, r"(?m)^\s*class\s+(\w+)");

lazy_regex!(RE_RUST_FUNCTION, r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?fn\s+(\w+)\s*(?:<[^>]*>)?\s*\(([^)]*)\)");
lazy_regex!(RE_RUST_STRUCT, r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?struct\s+(\w+)");
lazy_regex!(RE_RUST_ENUM, r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?enum\s+(\w+)");
lazy_regex!(RE_RUST_TRAIT, r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?trait\s+(\w+)");
lazy_regex!(RE_RUST_CONST, r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?const\s+(\w+)\s*:");

lazy_regex!(RE_GO_FUNCTION, r"(?m)^func\s+(?:\([^)]*\)\s*)?(\w+)\s*\(([^)]*)\)");
lazy_regex!(RE_GO_TYPE, r"(?m)^type\s+(\w+)\s+(?:struct|interface)");

lazy_regex!(RE_GENERIC_FUNCTION, r"(?m)^\s*(?:public|private|protected|static)?\s*[\w<>\[\], ]*\b(\w+)\s*\(([^)]*)\)\s*\{");
lazy_regex!(RE_GENERIC_CLASS, r"(?m)^\s*(?:public|private|protected)?\s*class\s+(\w+)");

/// Default regex-based extractor. Good enough for keyword/symbol search
/// over the chunk/symbol contract; not a substitute for a real parser.
pub struct RegexSymbolExtractor;

impl RegexSymbolExtractor {
    fn doc_comment_above(content: &str, line_starts: &[usize], line_idx: usize) -> Option<String> {
        if line_idx == 0 {
            return None;
        }
        let mut doc_lines = Vec::new();
        let mut idx = line_idx;
        while idx > 0 {
            idx -= 1;
            let line = line_at(content, line_starts, idx).trim();
            if line.starts_with("///") || line.starts_with("//!") {
                doc_lines.push(line.trim_start_matches("///").trim_start_matches("//!").trim().to_string());
            } else if line.starts_with('#') && line.ends_with(']') {
                // rust attribute, skip but keep scanning
                continue;
            } else if line.starts_with("*") || line.starts_with("/**") || line.starts_with("\"\"\"") {
                doc_lines.push(line.trim_start_matches('*').trim().to_string());
            } else if line.is_empty() {
                break;
            } else {
                break;
            }
        }
        if doc_lines.is_empty() {
            None
        } else {
            doc_lines.reverse();
            Some(doc_lines.join("\n"))
        }
    }

    fn patterns_for(language: &str) -> Vec<Pattern> {
        match language {
            "typescript" | "javascript" => vec![
                Pattern { regex: &RE_TS_FUNCTION, kind: SymbolKind::Function },
                Pattern { regex: &RE_TS_CLASS, kind: SymbolKind::Class },
                Pattern { regex: &RE_TS_INTERFACE, kind: SymbolKind::Interface },
                Pattern { regex: &RE_TS_TYPE, kind: SymbolKind::Type },
                Pattern { regex: &RE_TS_ENUM, kind: SymbolKind::Enum },
                Pattern { regex: &RE_TS_CONST, kind: SymbolKind::Const },
                Pattern { regex: &RE_TS_METHOD, kind: SymbolKind::Method },
            ],
            "python" => vec![
                Pattern { regex: &RE_PY_FUNCTION, kind: SymbolKind::Function },
                Pattern { regex: &RE_PY_CLASS, kind: SymbolKind::Class },
            ],
            "rust" => vec![
                Pattern { regex: &RE_RUST_FUNCTION, kind: SymbolKind::Function },
                Pattern { regex: &RE_RUST_STRUCT, kind: SymbolKind::Class },
                Pattern { regex: &RE_RUST_ENUM, kind: SymbolKind::Enum },
                Pattern { regex: &RE_RUST_TRAIT, kind: SymbolKind::Interface },
                Pattern { regex: &RE_RUST_CONST, kind: SymbolKind::Const },
            ],
            "go" => vec![
                Pattern { regex: &RE_GO_FUNCTION, kind: SymbolKind::Function },
                Pattern { regex: &RE_GO_TYPE, kind: SymbolKind::Type },
            ],
            "java" | "csharp" | "ruby" | "c" | "cpp" => vec![
                Pattern { regex: &RE_GENERIC_FUNCTION, kind: SymbolKind::Function },
                Pattern { regex: &RE_GENERIC_CLASS, kind: SymbolKind::Class },
            ],
            _ => vec![],
        }
    }
}

impl SymbolExtractor for RegexSymbolExtractor {
    fn extract(&self, content: &str, language: &str) -> Vec<ExtractedSymbol> {
        let tier = language_tier(language);
        if tier == 0 {
            return Vec::new();
        }
        let line_starts = line_start_offsets(content);
        let mut out = Vec::new();
        for pattern in Self::patterns_for(language) {
            for caps in pattern.regex.captures_iter(content) {
                let whole = caps.get(0).expect("capture group 0 always matches");
                let name = caps
                    .get(1)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                if name.is_empty() {
                    continue;
                }
                let start_line = line_of_offset(&line_starts, whole.start());
                let doc_comment = Self::doc_comment_above(content, &line_starts, start_line);
                out.push(ExtractedSymbol {
                    name,
                    kind: pattern.kind,
                    signature: whole.as_str().trim().to_string(),
                    start_line: start_line as u32 + 1,
                    end_line: start_line as u32 + 1,
                    doc_comment,
                });
            }
        }
        out
    }
}

fn line_start_offsets(content: &str) -> Vec<usize> {
    let mut offsets = vec![0];
    for (idx, byte) in content.bytes().enumerate() {
        if byte == b'\n' {
            offsets.push(idx + 1);
        }
    }
    offsets
}

fn line_of_offset(line_starts: &[usize], offset: usize) -> usize {
    match line_starts.binary_search(&offset) {
        Ok(idx) => idx,
        Err(idx) => idx.saturating_sub(1),
    }
}

fn line_at<'a>(content: &'a str, line_starts: &[usize], idx: usize) -> &'a str {
    let start = line_starts[idx];
    let end = line_starts.get(idx + 1).copied().unwrap_or(content.len());
    content[start..end].trim_end_matches('\n')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_rust_function_and_struct() {
        let src = "pub struct Foo {}\n\npub fn bar(x: i32) -> i32 { x }\n";
        let symbols = RegexSymbolExtractor.extract(src, "rust");
        assert!(symbols.iter().any(|s| s.name == "Foo" && s.kind == SymbolKind::Class));
        assert!(symbols.iter().any(|s| s.name == "bar" && s.kind == SymbolKind::Function));
    }

    #[test]
    fn doc_comment_attached_to_rust_function() {
        let src = "/// Adds two numbers\npub fn add(a: i32, b: i32) -> i32 { a + b }\n";
        let symbols = RegexSymbolExtractor.extract(src, "rust");
        let add = symbols.iter().find(|s| s.name == "add").unwrap();
        assert_eq!(add.doc_comment.as_deref(), Some("Adds two numbers"));
    }

    #[test]
    fn other_languages_yield_no_symbols() {
        assert!(RegexSymbolExtractor.extract("(defn foo [] 1)", "clojure").is_empty());
    }

    #[test]
    fn extracts_python_function_and_class() {
        let src = "class Widget:\n    def render(self):\n        pass\n";
        let symbols = RegexSymbolExtractor.extract(src, "python");
        assert!(symbols.iter().any(|s| s.name == "Widget" && s.kind == SymbolKind::Class));
        assert!(symbols.iter().any(|s| s.name == "render" && s.kind == SymbolKind::Function));
    }
}
