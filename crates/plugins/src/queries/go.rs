//! Go tree-sitter queries

use tree_sitter::Language as TsLanguage;

use super::{LanguageQueries, compile_query};

/// Definition extraction query for Go
const DEFINITIONS_QUERY: &str = r#"
; Functions
(function_declaration
  name: (identifier) @name) @definition.function

; Methods
(method_declaration
  name: (field_identifier) @name) @definition.method

; Named types
(type_declaration
  (type_spec
    name: (type_identifier) @name)) @definition.type

; Constants
(const_declaration
  (const_spec
    name: (identifier) @name)) @definition.constant

; Package-level variables
(source_file
  (var_declaration
    (var_spec
      name: (identifier) @name)) @definition.variable)
"#;

/// Call extraction query for Go
const CALLS_QUERY: &str = r#"
; Direct calls: foo()
(call_expression
  function: (identifier) @call)

; Selector calls: pkg.Func() / recv.Method()
(call_expression
  function: (selector_expression
    field: (field_identifier) @call))
"#;

pub fn queries(grammar: &TsLanguage) -> LanguageQueries {
  LanguageQueries {
    definitions: compile_query(grammar, DEFINITIONS_QUERY),
    calls: compile_query(grammar, CALLS_QUERY),
  }
}
