//! Per-language tree-sitter queries.

mod go;
mod javascript;
mod python;
mod rust;

use codescope_core::Language;
use tracing::warn;
use tree_sitter::{Language as TsLanguage, Query};

/// Holds the compiled queries for a specific language
pub struct LanguageQueries {
  pub definitions: Option<Query>,
  pub calls: Option<Query>,
}

/// Compile a query, logging instead of failing when a grammar drifts
pub(crate) fn compile_query(grammar: &TsLanguage, source: &str) -> Option<Query> {
  match Query::new(grammar, source) {
    Ok(query) => Some(query),
    Err(e) => {
      warn!("Query compilation failed: {e}");
      None
    }
  }
}

pub fn load_queries(lang: Language, grammar: &TsLanguage) -> LanguageQueries {
  match lang {
    Language::Rust => rust::queries(grammar),
    Language::Python => python::queries(grammar),
    Language::JavaScript => javascript::queries(grammar),
    Language::Go => go::queries(grammar),
    _ => LanguageQueries {
      definitions: None,
      calls: None,
    },
  }
}
