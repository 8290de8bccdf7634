use serde::{Deserialize, Serialize};

/// A source language the pipeline understands. Distinct from `LanguageInfo`,
/// which is the interned (name, extensions) database row for one of these.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Language {
    Cpp,
    C,
    TypeScript,
    JavaScript,
    Python,
    Go,
    Rust,
    Java,
    CSharp,
    Unknown,
}

impl Language {
    /// Canonical lowercase name, used as the `languages.name` row and as the
    /// tag under `language_features`/metadata where a string is needed.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Cpp => "cpp",
            Language::C => "c",
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Java => "java",
            Language::CSharp => "csharp",
            Language::Unknown => "unknown",
        }
    }

    /// Default source-file extensions recognized for this language, used by
    /// file discovery (C1) to seed the process-wide language set.
    pub fn default_extensions(&self) -> &'static [&'static str] {
        match self {
            Language::Cpp => &["cpp", "cc", "cxx", "hpp", "hh", "hxx", "ixx", "h++"],
            Language::C => &["c", "h"],
            Language::TypeScript => &["ts", "tsx"],
            Language::JavaScript => &["js", "jsx", "mjs", "cjs"],
            Language::Python => &["py", "pyi"],
            Language::Go => &["go"],
            Language::Rust => &["rs"],
            Language::Java => &["java"],
            Language::CSharp => &["cs"],
            Language::Unknown => &[],
        }
    }
}

/// `UniversalSymbol.kind`, per the data model's enumeration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Module,
    Namespace,
    Class,
    Struct,
    Interface,
    Enum,
    Function,
    Method,
    Constructor,
    Destructor,
    Field,
    Variable,
    Parameter,
    TypeAlias,
    Concept,
    Macro,
    Property,
    Lambda,
    Import,
    Export,
    /// Synthetic kind for an `ExternalService` materialized by the resolver.
    Service,
    Other,
}

impl SymbolKind {
    /// Container kinds that a `field|method|property` symbol's
    /// `parent_symbol_id` is allowed to reference (data model invariant).
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            SymbolKind::Module
                | SymbolKind::Namespace
                | SymbolKind::Class
                | SymbolKind::Struct
                | SymbolKind::Interface
                | SymbolKind::Enum
        )
    }
}

/// `UniversalRelationship.type`, per the data model's enumeration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Calls,
    Invokes,
    Imports,
    Exports,
    Inherits,
    Implements,
    Uses,
    Contains,
    Overrides,
    Spawns,
    Communicates,
    BindsTo,
    Reads,
    Writes,
    References,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
    Protected,
    Internal,
    Default,
}

impl Default for Visibility {
    fn default() -> Self {
        Visibility::Default
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParseMethod {
    TreeSitter,
    PatternFallback,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub line: u32,
    pub message: String,
}

/// A declaration extracted from source, pre- or post-resolution. Harnesses
/// construct these with `id = None` and `parent_symbol_id = None`; the
/// resolver (C4 pass 1) assigns both after interning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniversalSymbol {
    pub id: Option<i64>,
    pub project_id: i64,
    pub language_id: i64,
    pub name: String,
    pub qualified_name: String,
    pub kind: SymbolKind,
    pub file_path: String,
    pub line: u32,
    pub column: u32,
    pub end_line: Option<u32>,
    pub end_column: Option<u32>,
    pub signature: Option<String>,
    pub return_type: Option<String>,
    pub visibility: Visibility,
    pub namespace: Option<String>,
    /// Qualified name of the lexically enclosing container, as computed by
    /// the parser's scope stack. Consumed by C4 pass 1 and then irrelevant.
    pub parent_scope: Option<String>,
    pub parent_symbol_id: Option<i64>,
    pub is_exported: bool,
    pub is_async: bool,
    pub is_abstract: bool,
    pub is_definition: bool,
    pub semantic_tags: Vec<String>,
    pub confidence: f32,
    pub language_features: serde_json::Value,
    pub duplicate_of: Option<i64>,
}

impl UniversalSymbol {
    /// A symbol with every optional/derived field at its neutral default;
    /// callers fill in the fields that matter for the node kind at hand.
    pub fn new(
        project_id: i64,
        language_id: i64,
        name: impl Into<String>,
        qualified_name: impl Into<String>,
        kind: SymbolKind,
        file_path: impl Into<String>,
        line: u32,
        column: u32,
    ) -> Self {
        Self {
            id: None,
            project_id,
            language_id,
            name: name.into(),
            qualified_name: qualified_name.into(),
            kind,
            file_path: file_path.into(),
            line,
            column,
            end_line: None,
            end_column: None,
            signature: None,
            return_type: None,
            visibility: Visibility::default(),
            namespace: None,
            parent_scope: None,
            parent_symbol_id: None,
            is_exported: false,
            is_async: false,
            is_abstract: false,
            is_definition: true,
            semantic_tags: Vec::new(),
            confidence: 1.0,
            language_features: serde_json::Value::Null,
            duplicate_of: None,
        }
    }
}

/// An edge between two symbols, or between a symbol and a name that may
/// never resolve in-tree (cross-language or forward reference).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniversalRelationship {
    pub id: Option<i64>,
    pub project_id: i64,
    pub from_symbol_id: Option<i64>,
    pub to_symbol_id: Option<i64>,
    pub from_name: String,
    pub to_name: String,
    pub relationship_type: EdgeType,
    pub confidence: f32,
    pub context_line: Option<u32>,
    pub context_snippet: Option<String>,
    pub metadata: serde_json::Value,
    pub cross_language: bool,
}

impl UniversalRelationship {
    pub fn new(
        project_id: i64,
        from_name: impl Into<String>,
        to_name: impl Into<String>,
        relationship_type: EdgeType,
    ) -> Self {
        Self {
            id: None,
            project_id,
            from_symbol_id: None,
            to_symbol_id: None,
            from_name: from_name.into(),
            to_name: to_name.into(),
            relationship_type,
            confidence: 1.0,
            context_line: None,
            context_snippet: None,
            metadata: serde_json::Value::Null,
            cross_language: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Failed,
    Skipped,
}

/// Per (project, relative path) bookkeeping row driving incremental reindex.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: Option<i64>,
    pub project_id: i64,
    pub language_id: i64,
    pub relative_path: String,
    pub content_hash: String,
    pub size: u64,
    pub last_indexed_at: i64,
    pub parser_used: String,
    pub status: FileStatus,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Option<i64>,
    pub name: String,
    pub root: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// An interned (name, extensions) row. Built once at process startup from
/// `Language::default_extensions` and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageInfo {
    pub id: Option<i64>,
    pub name: String,
    pub extensions: Vec<String>,
}

/// Output of one language adapter's `parse()` call (C2 contract).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ParseResult {
    pub symbols: Vec<UniversalSymbol>,
    pub relationships: Vec<UniversalRelationship>,
    pub diagnostics: Vec<Diagnostic>,
    pub parse_method: Option<ParseMethod>,
}

impl ParseResult {
    pub fn tree_sitter() -> Self {
        Self {
            parse_method: Some(ParseMethod::TreeSitter),
            ..Default::default()
        }
    }
}
