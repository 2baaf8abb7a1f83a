use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
  Rust,
  Python,
  JavaScript,
  TypeScript,
  Go,
  Java,
  C,
  Cpp,
  CSharp,
  Ruby,
  Php,
  Kotlin,
  Swift,
  Shell,
  Sql,
  Json,
  Yaml,
  Toml,
  Markdown,
  Html,
  Css,
}

impl Language {
  pub fn from_extension(ext: &str) -> Option<Self> {
    match ext.to_lowercase().as_str() {
      "rs" => Some(Language::Rust),
      "py" | "pyi" | "pyw" => Some(Language::Python),
      "js" | "mjs" | "cjs" | "jsx" => Some(Language::JavaScript),
      "ts" | "mts" | "tsx" => Some(Language::TypeScript),
      "go" => Some(Language::Go),
      "java" => Some(Language::Java),
      "c" => Some(Language::C),
      "cpp" | "cc" | "cxx" | "hpp" | "hxx" | "h" => Some(Language::Cpp),
      "cs" => Some(Language::CSharp),
      "rb" | "rake" => Some(Language::Ruby),
      "php" => Some(Language::Php),
      "kt" | "kts" => Some(Language::Kotlin),
      "swift" => Some(Language::Swift),
      "sh" | "bash" | "zsh" => Some(Language::Shell),
      "sql" => Some(Language::Sql),
      "json" | "jsonc" => Some(Language::Json),
      "yaml" | "yml" => Some(Language::Yaml),
      "toml" => Some(Language::Toml),
      "md" | "markdown" => Some(Language::Markdown),
      "html" | "htm" => Some(Language::Html),
      "css" | "scss" => Some(Language::Css),
      _ => None,
    }
  }

  /// Language for a file path, by extension
  pub fn from_path(path: &str) -> Option<Self> {
    let ext = std::path::Path::new(path).extension()?.to_str()?;
    Self::from_extension(ext)
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Language::Rust => "rust",
      Language::Python => "python",
      Language::JavaScript => "javascript",
      Language::TypeScript => "typescript",
      Language::Go => "go",
      Language::Java => "java",
      Language::C => "c",
      Language::Cpp => "cpp",
      Language::CSharp => "csharp",
      Language::Ruby => "ruby",
      Language::Php => "php",
      Language::Kotlin => "kotlin",
      Language::Swift => "swift",
      Language::Shell => "shell",
      Language::Sql => "sql",
      Language::Json => "json",
      Language::Yaml => "yaml",
      Language::Toml => "toml",
      Language::Markdown => "markdown",
      Language::Html => "html",
      Language::Css => "css",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s.to_lowercase().as_str() {
      "rust" => Some(Language::Rust),
      "python" => Some(Language::Python),
      "javascript" => Some(Language::JavaScript),
      "typescript" => Some(Language::TypeScript),
      "go" => Some(Language::Go),
      "java" => Some(Language::Java),
      "c" => Some(Language::C),
      "cpp" | "c++" => Some(Language::Cpp),
      "csharp" | "c#" => Some(Language::CSharp),
      "ruby" => Some(Language::Ruby),
      "php" => Some(Language::Php),
      "kotlin" => Some(Language::Kotlin),
      "swift" => Some(Language::Swift),
      "shell" | "bash" => Some(Language::Shell),
      "sql" => Some(Language::Sql),
      "json" => Some(Language::Json),
      "yaml" => Some(Language::Yaml),
      "toml" => Some(Language::Toml),
      "markdown" => Some(Language::Markdown),
      "html" => Some(Language::Html),
      "css" => Some(Language::Css),
      _ => None,
    }
  }
}

impl std::fmt::Display for Language {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Kind of an extracted symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
  Function,
  Class,
  Method,
  Variable,
  Constant,
  Interface,
  Enum,
  Type,
  Macro,
  Module,
  Other,
}

impl SymbolKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      SymbolKind::Function => "function",
      SymbolKind::Class => "class",
      SymbolKind::Method => "method",
      SymbolKind::Variable => "variable",
      SymbolKind::Constant => "constant",
      SymbolKind::Interface => "interface",
      SymbolKind::Enum => "enum",
      SymbolKind::Type => "type",
      SymbolKind::Macro => "macro",
      SymbolKind::Module => "module",
      SymbolKind::Other => "other",
    }
  }

  /// Parse a stored kind string; unknown kinds map to `Other`
  pub fn parse(s: &str) -> Self {
    match s {
      "function" => SymbolKind::Function,
      "class" => SymbolKind::Class,
      "method" => SymbolKind::Method,
      "variable" => SymbolKind::Variable,
      "constant" => SymbolKind::Constant,
      "interface" => SymbolKind::Interface,
      "enum" => SymbolKind::Enum,
      "type" => SymbolKind::Type,
      "macro" => SymbolKind::Macro,
      "module" => SymbolKind::Module,
      _ => SymbolKind::Other,
    }
  }
}

impl std::fmt::Display for SymbolKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A symbol row as persisted in the index store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
  pub id: i64,
  pub file_id: i64,
  pub name: String,
  pub kind: SymbolKind,
  pub line_start: u32,
  pub line_end: u32,
  pub signature: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub doc: Option<String>,
}

/// A resolved symbol definition, ready to surface to a caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolDef {
  pub symbol: String,
  pub kind: SymbolKind,
  pub language: Language,
  pub signature: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub doc: Option<String>,
  pub defined_in: String,
  pub line: u32,
  pub span: (u32, u32),
}

/// A single search hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
  pub file: String,
  pub line: u32,
  pub snippet: String,
  pub score: f64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub repository: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub context_before: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub context_after: Vec<String>,
}

/// A reference to a symbol (use site)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
  pub file: String,
  pub line: u32,
}

/// A symbol within an index shard, before it has a database id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardSymbol {
  pub name: String,
  pub kind: SymbolKind,
  pub line_start: u32,
  pub line_end: u32,
  pub signature: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub doc: Option<String>,
}

/// The per-file bundle a plugin produces, later committed to the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexShard {
  pub file: String,
  pub language: Language,
  pub symbols: Vec<ShardSymbol>,
}

/// A file row as persisted in the index store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
  pub id: i64,
  pub repo_id: i64,
  pub abs_path: String,
  pub rel_path: String,
  pub language: Option<Language>,
  pub size: u64,
  pub hash: String,
  pub indexed_at: DateTime<Utc>,
}
