//! Rust tree-sitter queries

use tree_sitter::Language as TsLanguage;

use super::{LanguageQueries, compile_query};

/// Definition extraction query for Rust
const DEFINITIONS_QUERY: &str = r#"
; Free functions
(function_item
  name: (identifier) @name) @definition.function

; Methods inside impl blocks
(impl_item
  body: (declaration_list
    (function_item
      name: (identifier) @name) @definition.method))

; Structs
(struct_item
  name: (type_identifier) @name) @definition.class

; Traits
(trait_item
  name: (type_identifier) @name) @definition.interface

; Enums
(enum_item
  name: (type_identifier) @name) @definition.enum

; Constants and statics
(const_item
  name: (identifier) @name) @definition.constant
(static_item
  name: (identifier) @name) @definition.constant

; Type aliases
(type_item
  name: (type_identifier) @name) @definition.type

; Modules
(mod_item
  name: (identifier) @name) @definition.module

; Declarative macros
(macro_definition
  name: (identifier) @name) @definition.macro
"#;

/// Call extraction query for Rust
const CALLS_QUERY: &str = r#"
; Direct function calls: foo()
(call_expression
  function: (identifier) @call)

; Method calls: obj.method()
(call_expression
  function: (field_expression
    field: (field_identifier) @call))

; Scoped calls: Module::function()
(call_expression
  function: (scoped_identifier
    name: (identifier) @call))
"#;

pub fn queries(grammar: &TsLanguage) -> LanguageQueries {
  LanguageQueries {
    definitions: compile_query(grammar, DEFINITIONS_QUERY),
    calls: compile_query(grammar, CALLS_QUERY),
  }
}
