//! C2 registry: a static `LanguageAdapter` enum dispatching to the
//! per-language harness crates. Each variant owns one harness's mutable
//! `Parser`; parsing runs on a rayon worker so a per-file timeout can be
//! enforced via `recv_timeout`, since tree-sitter has no built-in
//! cancellation.

use anyhow::{anyhow, Result};
use protocol::{Language, ParseResult};
use std::sync::mpsc;
use std::time::Duration;

pub enum LanguageAdapter {
    Cpp(cpp_harness::CppHarness),
    C(cpp_harness::CppHarness),
    TypeScript(ts_harness::TypeScriptHarness),
    JavaScript(ts_harness::TypeScriptHarness),
    Python(py_harness::PythonHarness),
    Go(go_harness::GoHarness),
    Rust(rust_harness::RustHarness),
    Java(java_harness::JavaHarness),
    CSharp(csharp_harness::CSharpHarness),
}

impl LanguageAdapter {
    pub fn for_language(language: Language) -> Result<Self> {
        Ok(match language {
            Language::Cpp => LanguageAdapter::Cpp(cpp_harness::CppHarness::new_cpp()?),
            Language::C => LanguageAdapter::C(cpp_harness::CppHarness::new_c()?),
            Language::TypeScript => LanguageAdapter::TypeScript(ts_harness::TypeScriptHarness::new()?),
            Language::JavaScript => LanguageAdapter::JavaScript(ts_harness::TypeScriptHarness::new()?),
            Language::Python => LanguageAdapter::Python(py_harness::PythonHarness::new()?),
            Language::Go => LanguageAdapter::Go(go_harness::GoHarness::new()?),
            Language::Rust => LanguageAdapter::Rust(rust_harness::RustHarness::new()?),
            Language::Java => LanguageAdapter::Java(java_harness::JavaHarness::new()?),
            Language::CSharp => LanguageAdapter::CSharp(csharp_harness::CSharpHarness::new()?),
            Language::Unknown => return Err(anyhow!("no adapter registered for Language::Unknown")),
        })
    }

    pub fn parse(&mut self, project_id: i64, language_id: i64, file_path: &str, content: &str) -> Result<ParseResult> {
        match self {
            LanguageAdapter::Cpp(h) | LanguageAdapter::C(h) => h.parse(project_id, language_id, file_path, content),
            LanguageAdapter::TypeScript(h) | LanguageAdapter::JavaScript(h) => h.parse(project_id, language_id, file_path, content),
            LanguageAdapter::Python(h) => h.parse(project_id, language_id, file_path, content),
            LanguageAdapter::Go(h) => h.parse(project_id, language_id, file_path, content),
            LanguageAdapter::Rust(h) => h.parse(project_id, language_id, file_path, content),
            LanguageAdapter::Java(h) => h.parse(project_id, language_id, file_path, content),
            LanguageAdapter::CSharp(h) => h.parse(project_id, language_id, file_path, content),
        }
    }
}

/// Runs `parse` with a deadline. tree-sitter's `Parser` has no cooperative
/// cancellation, so a hung parse leaves its worker thread running past the
/// deadline; the orchestrator treats the timeout as a `ParseTimeout` for
/// this file and moves on without waiting for that thread to finish.
pub fn parse_with_timeout(
    mut adapter: LanguageAdapter,
    project_id: i64,
    language_id: i64,
    file_path: String,
    content: String,
    timeout: Duration,
) -> Result<ParseResult, ParseOutcome> {
    let (tx, rx) = mpsc::channel();
    let path_for_thread = file_path.clone();
    std::thread::Builder::new()
        .name(format!("parse:{path_for_thread}"))
        .spawn(move || {
            let result = adapter.parse(project_id, language_id, &path_for_thread, &content);
            let _ = tx.send(result);
        })
        .expect("failed to spawn parser thread");

    match rx.recv_timeout(timeout) {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(e)) => Err(ParseOutcome::Error(e.to_string())),
        Err(mpsc::RecvTimeoutError::Timeout) => Err(ParseOutcome::Timeout),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(ParseOutcome::Error("parser thread panicked".to_string())),
    }
}

pub enum ParseOutcome {
    Timeout,
    Error(String),
}

/// Per-language regex table for the small set of declaration forms a
/// pattern fallback recovers when tree-sitter hands back an error tree.
/// Used only as a last resort; symbols it produces are marked
/// `parse_method = pattern-fallback` with `confidence` lowered to 0.4.
pub mod fallback {
    use once_cell::sync::Lazy;
    use protocol::{Language, SymbolKind, UniversalSymbol};
    use regex::Regex;

    const FALLBACK_CONFIDENCE: f32 = 0.4;

    static CLASS_LIKE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bclass\s+(\w+)").unwrap());
    static FUNCTION_TS_JS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bfunction\s+(\w+)").unwrap());
    static FUNCTION_PY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bdef\s+(\w+)").unwrap());
    static FUNCTION_GO: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bfunc\s+(?:\([^)]*\)\s*)?(\w+)").unwrap());
    static FUNCTION_RUST: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bfn\s+(\w+)").unwrap());
    static STRUCT_LIKE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bstruct\s+(\w+)").unwrap());

    /// Scans raw source text line by line for the declaration forms this
    /// language recognizes, independent of whether the text actually parses.
    pub fn recover_symbols(language: Language, project_id: i64, language_id: i64, file_path: &str, content: &str) -> Vec<UniversalSymbol> {
        let patterns: &[(&Lazy<Regex>, SymbolKind)] = match language {
            Language::TypeScript | Language::JavaScript => &[(&CLASS_LIKE, SymbolKind::Class), (&FUNCTION_TS_JS, SymbolKind::Function)],
            Language::Python => &[(&CLASS_LIKE, SymbolKind::Class), (&FUNCTION_PY, SymbolKind::Function)],
            Language::Go => &[(&STRUCT_LIKE, SymbolKind::Struct), (&FUNCTION_GO, SymbolKind::Function)],
            Language::Rust => &[(&STRUCT_LIKE, SymbolKind::Struct), (&FUNCTION_RUST, SymbolKind::Function)],
            Language::Cpp | Language::C => &[(&CLASS_LIKE, SymbolKind::Class), (&STRUCT_LIKE, SymbolKind::Struct)],
            Language::Java | Language::CSharp => &[(&CLASS_LIKE, SymbolKind::Class)],
            Language::Unknown => &[],
        };

        let mut symbols = Vec::new();
        for (line_number, line) in content.lines().enumerate() {
            for (pattern, kind) in patterns {
                if let Some(captures) = pattern.captures(line) {
                    let name = captures[1].to_string();
                    let mut symbol = UniversalSymbol::new(
                        project_id,
                        language_id,
                        &name,
                        &name,
                        *kind,
                        file_path,
                        line_number as u32 + 1,
                        0,
                    );
                    symbol.confidence = FALLBACK_CONFIDENCE;
                    symbols.push(symbol);
                }
            }
        }
        symbols
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn recovers_function_declarations_from_unparseable_python() {
            let symbols = recover_symbols(Language::Python, 1, 1, "broken.py", "def foo(:\n    pass\n");
            assert!(symbols.iter().any(|s| s.name == "foo" && s.confidence == FALLBACK_CONFIDENCE));
        }
    }
}
