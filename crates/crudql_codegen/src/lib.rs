//! Static type information for crudql schemas.
//!
//! This crate renders a built [`Schema`] as:
//! - GraphQL SDL
//! - TypeScript declarations
//!
//! Output is a derived artifact; nothing here is read back at runtime.
//!
//! # Example
//!
//! ```ignore
//! use crudql_codegen::{CodeGenerator, Language};
//!
//! let generator = CodeGenerator::new(executable.schema());
//! let sdl = generator.generate(Language::Sdl);
//! ```

mod sdl;
mod typescript;

pub use sdl::SdlPrinter;
pub use typescript::TypeScriptGenerator;

use crudql_runtime::schema::{Schema, TypeRef};
use serde_json::Value;

/// Target format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Sdl,
    TypeScript,
}

impl Language {
    /// Conventional file name for the artifact.
    #[must_use]
    pub const fn default_file_name(self) -> &'static str {
        match self {
            Self::Sdl => "schema.graphql",
            Self::TypeScript => "crudql-typegen.d.ts",
        }
    }
}

/// Code generation options.
#[derive(Debug, Clone)]
pub struct CodegenOptions {
    /// Start the output with a "generated" banner comment.
    pub banner: bool,
    /// Emit `__typename` on TypeScript object interfaces.
    pub typename: bool,
    /// Omit the built-in scalars from SDL output.
    pub skip_builtin_scalars: bool,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            banner: true,
            typename: true,
            skip_builtin_scalars: true,
        }
    }
}

/// Main code generator.
pub struct CodeGenerator<'a> {
    schema: &'a Schema,
    options: CodegenOptions,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            options: CodegenOptions::default(),
        }
    }

    pub fn with_options(schema: &'a Schema, options: CodegenOptions) -> Self {
        Self { schema, options }
    }

    /// Renders the schema in the given format.
    pub fn generate(&self, language: Language) -> String {
        match language {
            Language::Sdl => SdlPrinter::new(self.schema, &self.options).print(),
            Language::TypeScript => {
                TypeScriptGenerator::new(self.schema, &self.options).generate()
            }
        }
    }

    #[must_use]
    pub fn options(mut self, options: CodegenOptions) -> Self {
        self.options = options;
        self
    }
}

/// Maps schema types into a target language.
pub(crate) trait TypeConverter {
    fn convert_type(&self, ty: &TypeRef) -> String;
    fn convert_scalar(&self, name: &str) -> String;
}

pub(crate) const BANNER: &str = "Generated by crudql. Do not edit.";

/// Prints a JSON value as a GraphQL literal.
pub(crate) fn graphql_literal(value: &Value) -> String {
    match value {
        Value::Array(items) => {
            let items: Vec<_> = items.iter().map(graphql_literal).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(fields) => {
            let fields: Vec<_> = fields
                .iter()
                .map(|(k, v)| format!("{k}: {}", graphql_literal(v)))
                .collect();
            format!("{{{}}}", fields.join(", "))
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_codegen_options_default() {
        let options = CodegenOptions::default();
        assert!(options.banner);
        assert!(options.typename);
        assert!(options.skip_builtin_scalars);
    }

    #[test]
    fn test_graphql_literal() {
        assert_eq!(graphql_literal(&json!(10)), "10");
        assert_eq!(graphql_literal(&json!("a\"b")), r#""a\"b""#);
        assert_eq!(graphql_literal(&json!({"take": [1, 2], "on": true})), "{take: [1, 2], on: true}");
        assert_eq!(graphql_literal(&Value::Null), "null");
    }
}
