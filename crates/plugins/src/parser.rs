//! Tree-sitter parsing and definition extraction.
//!
//! Parsers and queries load lazily per language; a single `QueryCursor` is
//! reused across queries. The tree cache keyed by content hash avoids
//! reparsing when the same file is processed repeatedly.

use crate::queries::{self, LanguageQueries};
use codescope_core::{Language, SymbolKind};
use std::collections::HashMap;
use tree_sitter::{Language as TsLanguage, Parser, QueryCursor, StreamingIterator, Tree};

/// A definition extracted from code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
  pub name: String,
  pub kind: SymbolKind,
  pub start_line: u32,
  pub end_line: u32,
  pub signature: String,
}

struct CachedTree {
  content_hash: u64,
  tree: Tree,
}

/// Tree-sitter based definition parser
pub struct SymbolParser {
  parsers: HashMap<Language, Parser>,
  queries: HashMap<Language, LanguageQueries>,
  tree_cache: HashMap<Language, CachedTree>,
  query_cursor: QueryCursor,
}

impl Default for SymbolParser {
  fn default() -> Self {
    Self::new()
  }
}

impl SymbolParser {
  pub fn new() -> Self {
    Self {
      parsers: HashMap::new(),
      queries: HashMap::new(),
      tree_cache: HashMap::new(),
      query_cursor: QueryCursor::new(),
    }
  }

  pub fn supports_language(&self, lang: Language) -> bool {
    grammar_for(lang).is_some()
  }

  fn hash_content(content: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
  }

  fn ensure_loaded(&mut self, lang: Language) {
    if self.parsers.contains_key(&lang) {
      return;
    }

    if let Some(grammar) = grammar_for(lang) {
      let mut parser = Parser::new();
      if parser.set_language(&grammar).is_ok() {
        self.parsers.insert(lang, parser);
        self.queries.insert(lang, queries::load_queries(lang, &grammar));
      }
    }
  }

  fn parse_file(&mut self, content: &str, lang: Language) -> bool {
    self.ensure_loaded(lang);

    let content_hash = Self::hash_content(content);
    if let Some(cached) = self.tree_cache.get(&lang)
      && cached.content_hash == content_hash
    {
      return true;
    }

    let Some(parser) = self.parsers.get_mut(&lang) else {
      return false;
    };

    if let Some(tree) = parser.parse(content, None) {
      self.tree_cache.insert(lang, CachedTree { content_hash, tree });
      true
    } else {
      false
    }
  }

  /// Extract all definitions from `content`
  pub fn extract_definitions(&mut self, content: &str, lang: Language) -> Vec<Definition> {
    if !self.parse_file(content, lang) {
      return Vec::new();
    }

    let Some(cached) = self.tree_cache.get(&lang) else {
      return Vec::new();
    };

    let Some(queries) = self.queries.get(&lang) else {
      return Vec::new();
    };

    let Some(query) = &queries.definitions else {
      return Vec::new();
    };

    let mut definitions = Vec::new();
    let lines: Vec<&str> = content.lines().collect();

    let mut matches = self
      .query_cursor
      .matches(query, cached.tree.root_node(), content.as_bytes());

    while let Some(match_) = matches.next() {
      let mut name: Option<String> = None;
      let mut start_line: Option<u32> = None;
      let mut end_line: Option<u32> = None;
      let mut kind = SymbolKind::Function;

      for cap in match_.captures {
        let cap_name = query.capture_names()[cap.index as usize];
        let node = cap.node;

        if cap_name == "name" {
          if let Ok(text) = node.utf8_text(content.as_bytes()) {
            name = Some(text.to_string());
          }
          continue;
        }

        if let Some(captured_kind) = kind_for_capture(cap_name) {
          kind = captured_kind;
          start_line = Some(node.start_position().row as u32 + 1);
          end_line = Some(node.end_position().row as u32 + 1);
        }
      }

      if let (Some(n), Some(sl), Some(el)) = (name, start_line, end_line) {
        // First source line of the definition doubles as the signature
        let signature = lines
          .get(sl as usize - 1)
          .map(|l| l.trim().to_string())
          .unwrap_or_default();

        definitions.push(Definition {
          name: n,
          kind,
          start_line: sl,
          end_line: el,
          signature,
        });
      }
    }

    definitions
  }

  /// Extract call sites as (callee name, line) pairs
  pub fn extract_calls(&mut self, content: &str, lang: Language) -> Vec<(String, u32)> {
    if !self.parse_file(content, lang) {
      return Vec::new();
    }

    let Some(cached) = self.tree_cache.get(&lang) else {
      return Vec::new();
    };

    let Some(query) = self.queries.get(&lang).and_then(|q| q.calls.as_ref()) else {
      return Vec::new();
    };

    let mut calls = Vec::new();
    let mut matches = self
      .query_cursor
      .matches(query, cached.tree.root_node(), content.as_bytes());

    while let Some(match_) = matches.next() {
      for cap in match_.captures {
        if let Ok(text) = cap.node.utf8_text(content.as_bytes()) {
          calls.push((text.to_string(), cap.node.start_position().row as u32 + 1));
        }
      }
    }

    calls
  }

  pub fn clear_cache(&mut self) {
    self.tree_cache.clear();
  }
}

fn kind_for_capture(cap_name: &str) -> Option<SymbolKind> {
  match cap_name {
    "definition.function" => Some(SymbolKind::Function),
    "definition.method" => Some(SymbolKind::Method),
    "definition.class" => Some(SymbolKind::Class),
    "definition.interface" => Some(SymbolKind::Interface),
    "definition.enum" => Some(SymbolKind::Enum),
    "definition.constant" => Some(SymbolKind::Constant),
    "definition.variable" => Some(SymbolKind::Variable),
    "definition.type" => Some(SymbolKind::Type),
    "definition.macro" => Some(SymbolKind::Macro),
    "definition.module" => Some(SymbolKind::Module),
    _ => None,
  }
}

fn grammar_for(lang: Language) -> Option<TsLanguage> {
  match lang {
    Language::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
    Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
    Language::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
    Language::Go => Some(tree_sitter_go::LANGUAGE.into()),
    _ => None,
  }
}
