//! JavaScript tree-sitter queries

use tree_sitter::Language as TsLanguage;

use super::{LanguageQueries, compile_query};

/// Definition extraction query for JavaScript
const DEFINITIONS_QUERY: &str = r#"
; Function declarations
(function_declaration
  name: (identifier) @name) @definition.function

; Classes
(class_declaration
  name: (identifier) @name) @definition.class

; Methods
(method_definition
  name: (property_identifier) @name) @definition.method

; Arrow functions bound to a const/let
(lexical_declaration
  (variable_declarator
    name: (identifier) @name
    value: (arrow_function)) @definition.function)
"#;

/// Call extraction query for JavaScript
const CALLS_QUERY: &str = r#"
; Direct calls: foo()
(call_expression
  function: (identifier) @call)

; Member calls: obj.method()
(call_expression
  function: (member_expression
    property: (property_identifier) @call))
"#;

pub fn queries(grammar: &TsLanguage) -> LanguageQueries {
  LanguageQueries {
    definitions: compile_query(grammar, DEFINITIONS_QUERY),
    calls: compile_query(grammar, CALLS_QUERY),
  }
}
