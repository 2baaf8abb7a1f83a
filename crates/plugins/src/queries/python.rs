//! Python tree-sitter queries

use tree_sitter::Language as TsLanguage;

use super::{LanguageQueries, compile_query};

/// Definition extraction query for Python
const DEFINITIONS_QUERY: &str = r#"
; Functions
(function_definition
  name: (identifier) @name) @definition.function

; Classes
(class_definition
  name: (identifier) @name) @definition.class

; Methods (inside class)
(class_definition
  body: (block
    (function_definition
      name: (identifier) @name) @definition.method))

; Decorated methods
(class_definition
  body: (block
    (decorated_definition
      definition: (function_definition
        name: (identifier) @name) @definition.method)))
"#;

/// Call extraction query for Python
const CALLS_QUERY: &str = r#"
; Direct function calls: foo()
(call
  function: (identifier) @call)

; Method/attribute calls: obj.method()
(call
  function: (attribute
    attribute: (identifier) @call))

; Decorators are effectively calls: @decorator
(decorator
  (identifier) @call)
"#;

pub fn queries(grammar: &TsLanguage) -> LanguageQueries {
  LanguageQueries {
    definitions: compile_query(grammar, DEFINITIONS_QUERY),
    calls: compile_query(grammar, CALLS_QUERY),
  }
}
