//! TypeScript declaration generator.

use crate::{CodegenOptions, TypeConverter, BANNER};
use crudql_runtime::schema::{InputValueDef, ObjectDef, Schema, TypeDef, TypeRef};

/// Generates TypeScript declarations for clients of a schema.
pub struct TypeScriptGenerator<'a> {
    schema: &'a Schema,
    options: &'a CodegenOptions,
    output: String,
}

impl<'a> TypeScriptGenerator<'a> {
    pub fn new(schema: &'a Schema, options: &'a CodegenOptions) -> Self {
        Self {
            schema,
            options,
            output: String::new(),
        }
    }

    pub fn generate(mut self) -> String {
        if self.options.banner {
            self.output.push_str("// ");
            self.output.push_str(BANNER);
            self.output.push_str("\n\n");
        }

        let schema = self.schema;
        for def in schema.types.values() {
            match def {
                // Built-in scalars map onto TypeScript primitives.
                TypeDef::Scalar(_) => {}
                TypeDef::Object(object) => {
                    self.generate_object(object);
                    self.generate_args(object);
                }
                TypeDef::InputObject(input) => {
                    self.generate_interface(&input.name, input.fields.values());
                }
            }
        }

        let trimmed = self.output.trim_end().len();
        self.output.truncate(trimmed);
        self.output.push('\n');
        self.output
    }

    fn generate_object(&mut self, object: &ObjectDef) {
        self.output.push_str(&format!("export interface {} {{\n", object.name));
        if self.options.typename {
            self.output
                .push_str(&format!("  __typename?: \"{}\";\n", object.name));
        }
        for field in object.fields.values() {
            self.push_member(&field.name, &field.ty);
        }
        self.output.push_str("}\n\n");
    }

    /// One `<Type><Field>Args` interface per field that takes arguments.
    fn generate_args(&mut self, object: &ObjectDef) {
        for field in object.fields.values() {
            if field.arguments.is_empty() {
                continue;
            }
            let name = format!("{}{}Args", object.name, upper_first(&field.name));
            self.generate_interface(&name, field.arguments.values());
        }
    }

    fn generate_interface<'v>(
        &mut self,
        name: &str,
        fields: impl Iterator<Item = &'v InputValueDef>,
    ) {
        self.output.push_str(&format!("export interface {name} {{\n"));
        for field in fields {
            self.push_member(&field.name, &field.ty);
        }
        self.output.push_str("}\n\n");
    }

    fn push_member(&mut self, name: &str, ty: &TypeRef) {
        let optional = if ty.is_non_null() { "" } else { "?" };
        let ty = self.convert_type(ty);
        self.output.push_str(&format!("  {name}{optional}: {ty};\n"));
    }
}

impl TypeConverter for TypeScriptGenerator<'_> {
    fn convert_type(&self, ty: &TypeRef) -> String {
        let inner = match ty.nullable() {
            TypeRef::List(item) => format!("Array<{}>", self.convert_type(item)),
            TypeRef::Named(name) => self.convert_scalar(name),
            TypeRef::NonNull(inner) => self.convert_type(inner),
        };
        if ty.is_non_null() {
            inner
        } else {
            format!("{inner} | null")
        }
    }

    fn convert_scalar(&self, name: &str) -> String {
        match name {
            "Int" | "Float" => "number".to_string(),
            "String" | "ID" => "string".to_string(),
            "Boolean" => "boolean".to_string(),
            other => other.to_string(),
        }
    }
}

fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crudql_runtime::entity::{Field, ObjectType, RootType};
    use crudql_runtime::schema::SchemaBuilder;

    #[test]
    fn test_convert_type() {
        let executable = SchemaBuilder::new()
            .object(ObjectType::new("Post").field("id", "Int!"))
            .query(RootType::query().add_field(Field::new("posts", "[Post!]!")))
            .build()
            .unwrap();
        let options = CodegenOptions::default();
        let generator = TypeScriptGenerator::new(executable.schema(), &options);

        assert_eq!(generator.convert_type(&TypeRef::parse("Int!")), "number");
        assert_eq!(generator.convert_type(&TypeRef::parse("String")), "string | null");
        assert_eq!(generator.convert_type(&TypeRef::parse("[Post!]!")), "Array<Post>");
        assert_eq!(
            generator.convert_type(&TypeRef::parse("[Post]")),
            "Array<Post | null> | null"
        );
    }

    #[test]
    fn test_upper_first() {
        assert_eq!(upper_first("post"), "Post");
        assert_eq!(upper_first(""), "");
    }
}
