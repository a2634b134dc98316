//! SDL printer.

use crate::{graphql_literal, CodegenOptions, TypeConverter, BANNER};
use crudql_runtime::model::ScalarType;
use crudql_runtime::schema::{InputValueDef, Schema, TypeDef, TypeRef};
use std::fmt::Write;

/// Prints a schema as GraphQL SDL.
pub struct SdlPrinter<'a> {
    schema: &'a Schema,
    options: &'a CodegenOptions,
    output: String,
}

impl<'a> SdlPrinter<'a> {
    pub fn new(schema: &'a Schema, options: &'a CodegenOptions) -> Self {
        Self {
            schema,
            options,
            output: String::new(),
        }
    }

    pub fn print(mut self) -> String {
        let mut blocks = Vec::new();
        if self.options.banner {
            blocks.push(format!("# {BANNER}"));
        }
        if let Some(block) = self.schema_block() {
            blocks.push(block);
        }

        let schema = self.schema;
        for def in schema.types.values() {
            self.output.clear();
            match def {
                TypeDef::Scalar(scalar) => {
                    let builtin = ScalarType::from_name(&scalar.name).is_some();
                    if builtin && self.options.skip_builtin_scalars {
                        continue;
                    }
                    self.push_description(scalar.description.as_deref(), 0);
                    let _ = write!(self.output, "scalar {}", scalar.name);
                }
                TypeDef::Object(object) => {
                    self.push_description(object.description.as_deref(), 0);
                    let _ = writeln!(self.output, "type {} {{", object.name);
                    for field in object.fields.values() {
                        self.push_description(field.description.as_deref(), 1);
                        self.output.push_str("  ");
                        self.output.push_str(&field.name);
                        self.push_arguments(field.arguments.values());
                        let ty = self.convert_type(&field.ty);
                        let _ = writeln!(self.output, ": {ty}");
                    }
                    self.output.push('}');
                }
                TypeDef::InputObject(input) => {
                    self.push_description(input.description.as_deref(), 0);
                    let _ = writeln!(self.output, "input {} {{", input.name);
                    for field in input.fields.values() {
                        self.push_description(field.description.as_deref(), 1);
                        self.output.push_str("  ");
                        self.push_input_value(field);
                        self.output.push('\n');
                    }
                    self.output.push('}');
                }
            }
            blocks.push(std::mem::take(&mut self.output));
        }

        let mut sdl = blocks.join("\n\n");
        sdl.push('\n');
        sdl
    }

    /// Only needed when a root type is not named after its operation.
    fn schema_block(&self) -> Option<String> {
        let mutation = self.schema.mutation_type.as_deref();
        if self.schema.query_type == "Query" && mutation.map_or(true, |m| m == "Mutation") {
            return None;
        }
        let mut block = format!("schema {{\n  query: {}\n", self.schema.query_type);
        if let Some(mutation) = mutation {
            let _ = writeln!(block, "  mutation: {mutation}");
        }
        block.push('}');
        Some(block)
    }

    fn push_description(&mut self, description: Option<&str>, indent: usize) {
        let Some(description) = description else {
            return;
        };
        let pad = "  ".repeat(indent);
        if description.contains('\n') {
            let _ = writeln!(self.output, "{pad}\"\"\"");
            for line in description.lines() {
                let _ = writeln!(self.output, "{pad}{line}");
            }
            let _ = writeln!(self.output, "{pad}\"\"\"");
        } else {
            let _ = writeln!(self.output, "{pad}\"\"\"{description}\"\"\"");
        }
    }

    fn push_arguments<'v>(&mut self, arguments: impl ExactSizeIterator<Item = &'v InputValueDef>) {
        if arguments.len() == 0 {
            return;
        }
        self.output.push('(');
        for (i, arg) in arguments.enumerate() {
            if i > 0 {
                self.output.push_str(", ");
            }
            self.push_input_value(arg);
        }
        self.output.push(')');
    }

    fn push_input_value(&mut self, value: &InputValueDef) {
        let ty = self.convert_type(&value.ty);
        let _ = write!(self.output, "{}: {ty}", value.name);
        if let Some(default) = &value.default_value {
            let _ = write!(self.output, " = {}", graphql_literal(default));
        }
    }
}

impl TypeConverter for SdlPrinter<'_> {
    fn convert_type(&self, ty: &TypeRef) -> String {
        match ty {
            TypeRef::Named(name) => self.convert_scalar(name),
            TypeRef::List(inner) => format!("[{}]", self.convert_type(inner)),
            TypeRef::NonNull(inner) => format!("{}!", self.convert_type(inner)),
        }
    }

    fn convert_scalar(&self, name: &str) -> String {
        name.to_string()
    }
}
