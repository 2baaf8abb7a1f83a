//! The built-in tree-sitter plugin: one instance per language, building its
//! in-memory symbol and reference tables from the shards it extracts.

use crate::error::PluginError;
use crate::parser::SymbolParser;
use crate::plugin::Plugin;
use codescope_core::{IndexShard, Language, Reference, ShardSymbol, SymbolDef};
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct TreeSitterPlugin {
  language: Language,
  parser: SymbolParser,
  /// name → definitions seen so far, kept sorted by (file, line)
  definitions: BTreeMap<String, Vec<SymbolDef>>,
  /// name → call sites seen so far
  references: BTreeMap<String, Vec<Reference>>,
}

impl TreeSitterPlugin {
  pub fn new(language: Language) -> Result<Self, PluginError> {
    let parser = SymbolParser::new();
    if !parser.supports_language(language) {
      return Err(PluginError::Unsupported(language));
    }

    Ok(Self {
      language,
      parser,
      definitions: BTreeMap::new(),
      references: BTreeMap::new(),
    })
  }
}

impl Plugin for TreeSitterPlugin {
  fn language(&self) -> Language {
    self.language
  }

  fn supports(&self, path: &str) -> bool {
    Language::from_path(path) == Some(self.language)
  }

  fn index_file(&mut self, path: &str, content: &str) -> Result<IndexShard, PluginError> {
    let definitions = self.parser.extract_definitions(content, self.language);
    let calls = self.parser.extract_calls(content, self.language);

    // Re-indexing a file replaces its contribution to both tables
    for defs in self.definitions.values_mut() {
      defs.retain(|d| d.defined_in != path);
    }
    for refs in self.references.values_mut() {
      refs.retain(|r| r.file != path);
    }

    let symbols: Vec<ShardSymbol> = definitions
      .iter()
      .map(|d| ShardSymbol {
        name: d.name.clone(),
        kind: d.kind,
        line_start: d.start_line,
        line_end: d.end_line,
        signature: d.signature.clone(),
        doc: None,
      })
      .collect();

    for def in &definitions {
      let entry = self.definitions.entry(def.name.clone()).or_default();
      entry.push(SymbolDef {
        symbol: def.name.clone(),
        kind: def.kind,
        language: self.language,
        signature: def.signature.clone(),
        doc: None,
        defined_in: path.to_string(),
        line: def.start_line,
        span: (def.start_line, def.end_line),
      });
      entry.sort_by(|a, b| (a.defined_in.as_str(), a.line).cmp(&(b.defined_in.as_str(), b.line)));
    }

    for (name, line) in calls {
      self.references.entry(name).or_default().push(Reference {
        file: path.to_string(),
        line,
      });
    }

    Ok(IndexShard {
      file: path.to_string(),
      language: self.language,
      symbols,
    })
  }

  fn get_definition(&self, name: &str) -> Option<SymbolDef> {
    self.definitions.get(name).and_then(|defs| defs.first().cloned())
  }

  fn find_references(&self, name: &str) -> Vec<Reference> {
    self.references.get(name).cloned().unwrap_or_default()
  }
}

/// Factory instantiating the built-in plugin for any supported language
pub fn treesitter_factory() -> crate::registry::PluginFactory {
  Arc::new(|language| TreeSitterPlugin::new(language).map(|p| Box::new(p) as Box<dyn Plugin>))
}

#[cfg(test)]
mod tests {
  use super::*;
  use codescope_core::SymbolKind;

  #[test]
  fn test_index_and_lookup() {
    let mut plugin = TreeSitterPlugin::new(Language::Python).unwrap();
    let shard = plugin
      .index_file("/w/a.py", "class Foo:\n    def run(self):\n        helper()\n")
      .unwrap();

    assert_eq!(shard.language, Language::Python);
    assert!(shard.symbols.iter().any(|s| s.name == "Foo" && s.kind == SymbolKind::Class));

    let def = plugin.get_definition("Foo").unwrap();
    assert_eq!(def.defined_in, "/w/a.py");
    assert_eq!(def.line, 1);

    let refs = plugin.find_references("helper");
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].line, 3);
  }

  #[test]
  fn test_reindex_replaces_contribution() {
    let mut plugin = TreeSitterPlugin::new(Language::Python).unwrap();
    plugin.index_file("/w/a.py", "def old_name(): pass\n").unwrap();
    plugin.index_file("/w/a.py", "def new_name(): pass\n").unwrap();

    assert!(plugin.get_definition("old_name").is_none());
    assert!(plugin.get_definition("new_name").is_some());
  }

  #[test]
  fn test_definition_ordering_across_files() {
    let mut plugin = TreeSitterPlugin::new(Language::Python).unwrap();
    plugin.index_file("/w/z.py", "def dup(): pass\n").unwrap();
    plugin.index_file("/w/a.py", "def dup(): pass\n").unwrap();

    // Lexicographically first path wins
    assert_eq!(plugin.get_definition("dup").unwrap().defined_in, "/w/a.py");
  }

  #[test]
  fn test_supports_by_extension() {
    let plugin = TreeSitterPlugin::new(Language::Rust).unwrap();
    assert!(plugin.supports("src/main.rs"));
    assert!(!plugin.supports("src/app.py"));
  }

  #[test]
  fn test_unsupported_language_rejected() {
    assert!(TreeSitterPlugin::new(Language::Sql).is_err());
  }

  #[test]
  fn test_search_capability_absent() {
    let plugin = TreeSitterPlugin::new(Language::Rust).unwrap();
    assert!(plugin.search("anything", &crate::plugin::SearchOpts::default()).is_none());
  }
}
