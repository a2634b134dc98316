//! Schema definition and composition.
//!
//! [`SchemaBuilder`] takes the declared object types, root types, the data
//! model and the CRUD plugin, validates them once, and produces an
//! immutable [`ExecutableSchema`]: the type tables plus one compiled resolver
//! per field.

use crate::crud::CrudPlugin;
use crate::entity::{FieldResolution, ObjectType, ResolutionKind, RootType};
use crate::model::{DataModel, ScalarType};
use crate::resolver::{ColumnResolver, RelationResolver, Resolver, ResolverMap, SharedResolver};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Type reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum TypeRef {
    Named(String),
    NonNull(Box<TypeRef>),
    List(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn non_null(inner: TypeRef) -> Self {
        Self::NonNull(Box::new(inner))
    }

    pub fn list(inner: TypeRef) -> Self {
        Self::List(Box::new(inner))
    }

    /// Parses SDL type notation such as `[Post!]!`.
    ///
    /// Malformed input becomes a named type that fails lookup at build time.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if let Some(inner) = s.strip_suffix('!') {
            return Self::non_null(Self::parse(inner));
        }
        if let Some(inner) = s.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
            return Self::list(Self::parse(inner));
        }
        Self::named(s)
    }

    /// The innermost named type.
    pub fn named_type(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::NonNull(inner) | Self::List(inner) => inner.named_type(),
        }
    }

    /// This type with one outer non-null wrapper removed.
    pub fn nullable(&self) -> &TypeRef {
        match self {
            Self::NonNull(inner) => inner,
            other => other,
        }
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, Self::NonNull(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::NonNull(inner) => write!(f, "{inner}!"),
            Self::List(inner) => write!(f, "[{inner}]"),
        }
    }
}

impl From<&str> for TypeRef {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for TypeRef {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

/// A type definition.
#[derive(Debug, Clone, Serialize)]
pub enum TypeDef {
    Scalar(ScalarDef),
    Object(ObjectDef),
    InputObject(InputObjectDef),
}

impl TypeDef {
    pub fn name(&self) -> &str {
        match self {
            Self::Scalar(s) => &s.name,
            Self::Object(o) => &o.name,
            Self::InputObject(i) => &i.name,
        }
    }

    pub fn is_input(&self) -> bool {
        matches!(self, Self::Scalar(_) | Self::InputObject(_))
    }

    pub fn is_output(&self) -> bool {
        matches!(self, Self::Scalar(_) | Self::Object(_))
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "a scalar",
            Self::Object(_) => "an object",
            Self::InputObject(_) => "an input object",
        }
    }
}

/// Scalar type definition.
#[derive(Debug, Clone, Serialize)]
pub struct ScalarDef {
    pub name: String,
    pub description: Option<String>,
}

/// Object type definition.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectDef {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, FieldDef>,
}

/// Input object type definition.
#[derive(Debug, Clone, Serialize)]
pub struct InputObjectDef {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, InputValueDef>,
}

impl InputObjectDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: IndexMap::new(),
        }
    }

    pub fn add_field(&mut self, field: InputValueDef) {
        self.fields.insert(field.name.clone(), field);
    }
}

/// Field definition.
#[derive(Debug, Clone, Serialize)]
pub struct FieldDef {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeRef,
    pub arguments: IndexMap<String, InputValueDef>,
}

/// An argument or input object field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputValueDef {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeRef,
    pub default_value: Option<Value>,
}

impl InputValueDef {
    pub fn new(name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        Self {
            name: name.into(),
            description: None,
            ty: ty.into(),
            default_value: None,
        }
    }

    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }
}

/// A validated GraphQL schema.
#[derive(Debug, Clone, Serialize)]
pub struct Schema {
    pub query_type: String,
    pub mutation_type: Option<String>,
    pub types: IndexMap<String, TypeDef>,
}

impl Schema {
    /// Gets a type by name.
    pub fn get_type(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    pub fn object(&self, name: &str) -> Option<&ObjectDef> {
        match self.types.get(name) {
            Some(TypeDef::Object(object)) => Some(object),
            _ => None,
        }
    }

    pub fn input_object(&self, name: &str) -> Option<&InputObjectDef> {
        match self.types.get(name) {
            Some(TypeDef::InputObject(input)) => Some(input),
            _ => None,
        }
    }

    pub fn field(&self, type_name: &str, field_name: &str) -> Option<&FieldDef> {
        self.object(type_name)?.fields.get(field_name)
    }

    /// Returns all types in declaration order.
    pub fn types(&self) -> impl Iterator<Item = (&String, &TypeDef)> {
        self.types.iter()
    }
}

/// Schema construction error. Always fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("Field `{type_name}.{field}` is declared more than once")]
    DuplicateField { type_name: String, field: String },

    #[error("Type `{0}` is declared more than once")]
    DuplicateType(String),

    #[error("Unknown type `{type_name}` referenced by `{location}`")]
    UnknownType { location: String, type_name: String },

    #[error("`{location}` needs {expected} type, but `{type_name}` is {found}")]
    WrongTypeKind {
        location: String,
        type_name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("CRUD marker on `{root}` names unknown entity `{entity}`")]
    UnknownEntity { root: String, entity: String },

    #[error("`{location}` is declared as `{declared}` but its resolver returns `{returns}`")]
    ReturnTypeMismatch {
        location: String,
        declared: String,
        returns: String,
    },

    #[error("Relation `{location}` points to unknown entity `{target}`")]
    UnknownRelationTarget { location: String, target: String },

    #[error("Schema has no query type")]
    MissingQueryType,

    #[error("`{root}` declares CRUD markers but no CRUD plugin is registered")]
    MissingPlugin { root: String },
}

/// The schema plus its compiled resolvers. Immutable once built.
#[derive(Debug)]
pub struct ExecutableSchema {
    schema: Schema,
    resolvers: ResolverMap,
    kinds: FxHashMap<(String, String), ResolutionKind>,
}

impl ExecutableSchema {
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn resolver(&self, type_name: &str, field_name: &str) -> Option<&dyn Resolver> {
        self.resolvers.get(type_name, field_name)
    }

    /// How a field was resolved after precedence was applied.
    pub fn resolution_kind(&self, type_name: &str, field_name: &str) -> Option<ResolutionKind> {
        self.kinds
            .get(&(type_name.to_string(), field_name.to_string()))
            .copied()
    }

    /// Field names of an object type, in declaration order.
    pub fn field_names(&self, type_name: &str) -> Vec<&str> {
        self.schema
            .object(type_name)
            .map(|o| o.fields.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

/// Composes declarations into an [`ExecutableSchema`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    model: DataModel,
    objects: Vec<ObjectType>,
    query: Option<RootType>,
    mutation: Option<RootType>,
    plugin: Option<CrudPlugin>,
}

impl SchemaBuilder {
    /// Creates a new schema builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the storage model CRUD fields and relations are resolved against.
    #[must_use]
    pub fn model(mut self, model: DataModel) -> Self {
        self.model = model;
        self
    }

    #[must_use]
    pub fn object(mut self, object: ObjectType) -> Self {
        self.objects.push(object);
        self
    }

    #[must_use]
    pub fn query(mut self, query: RootType) -> Self {
        self.query = Some(query);
        self
    }

    #[must_use]
    pub fn mutation(mut self, mutation: RootType) -> Self {
        self.mutation = Some(mutation);
        self
    }

    #[must_use]
    pub fn plugin(mut self, plugin: CrudPlugin) -> Self {
        self.plugin = Some(plugin);
        self
    }

    /// Validates every declaration and compiles resolvers.
    pub fn build(self) -> Result<ExecutableSchema, SchemaError> {
        let Self {
            model,
            objects,
            query,
            mutation,
            plugin,
        } = self;
        let model = Arc::new(model);
        let query = query.ok_or(SchemaError::MissingQueryType)?;
        let query_type = query.name().to_string();
        let mutation_type = mutation.as_ref().map(|m| m.name().to_string());

        let mut objects = objects;
        let mut crud_entities: Vec<String> = Vec::new();
        for root in std::iter::once(query).chain(mutation) {
            let object = compose_root(root, plugin.as_ref(), &model, &mut crud_entities)?;
            objects.push(object);
        }

        let mut types: IndexMap<String, TypeDef> = IndexMap::new();
        for scalar in ScalarType::ALL {
            let name = scalar.as_str().to_string();
            types.insert(
                name.clone(),
                TypeDef::Scalar(ScalarDef {
                    name,
                    description: None,
                }),
            );
        }

        for object in &objects {
            if let Some(field) = object.duplicates.first() {
                return Err(SchemaError::DuplicateField {
                    type_name: object.name.clone(),
                    field: field.clone(),
                });
            }
            let def = ObjectDef {
                name: object.name.clone(),
                description: object.description.clone(),
                fields: object
                    .fields
                    .values()
                    .map(|f| {
                        let def = FieldDef {
                            name: f.name.clone(),
                            description: f.description.clone(),
                            ty: f.ty.clone(),
                            arguments: f.arguments.clone(),
                        };
                        (f.name.clone(), def)
                    })
                    .collect(),
            };
            insert_type(&mut types, TypeDef::Object(def))?;
        }

        if let Some(plugin) = &plugin {
            let inputs = plugin.input_types(crud_entities.iter().map(String::as_str), &model);
            for input in inputs {
                insert_type(&mut types, TypeDef::InputObject(input))?;
            }
        }

        for def in types.values() {
            if let TypeDef::InputObject(input) = def {
                for field in input.fields.values() {
                    let location = format!("{}.{}", input.name, field.name);
                    check_type(&types, &location, &field.ty, Position::Input)?;
                }
            }
        }

        let mut resolvers = ResolverMap::new();
        let mut kinds = FxHashMap::default();
        for object in &objects {
            for field in object.fields.values() {
                let location = format!("{}.{}", object.name, field.name);
                check_type(&types, &location, &field.ty, Position::Output)?;
                for arg in field.arguments.values() {
                    let location = format!("{location}({}:)", arg.name);
                    check_type(&types, &location, &arg.ty, Position::Input)?;
                }

                let resolver = compile_resolution(&location, field, &types, &model)?;
                resolvers.register(&object.name, &field.name, resolver);
                kinds.insert(
                    (object.name.clone(), field.name.clone()),
                    field.resolution.kind(),
                );
            }
        }

        tracing::info!(
            types = types.len(),
            resolvers = resolvers.len(),
            "schema built"
        );

        Ok(ExecutableSchema {
            schema: Schema {
                query_type,
                mutation_type,
                types,
            },
            resolvers,
            kinds,
        })
    }
}

/// Registers each marker's field into its root, honoring precedence: a
/// hand-written resolver or relation wins over a derived field, and a
/// derived field replaces a plain delegated one.
fn compose_root(
    root: RootType,
    plugin: Option<&CrudPlugin>,
    model: &DataModel,
    crud_entities: &mut Vec<String>,
) -> Result<ObjectType, SchemaError> {
    let RootType {
        mut object,
        markers,
    } = root;
    if markers.is_empty() {
        return Ok(object);
    }
    let plugin = plugin.ok_or_else(|| SchemaError::MissingPlugin {
        root: object.name.clone(),
    })?;

    for marker in &markers {
        let field = plugin.field(&object.name, marker, model)?;
        if !crud_entities.contains(&marker.entity) {
            crud_entities.push(marker.entity.clone());
        }
        match object.fields.get(&field.name).map(|f| f.resolution.kind()) {
            None => {
                object.fields.insert(field.name.clone(), field);
            }
            Some(ResolutionKind::Delegated) => {
                tracing::debug!(
                    root = %object.name,
                    field = %field.name,
                    "derived field replaces delegated declaration"
                );
                object.fields.insert(field.name.clone(), field);
            }
            Some(kind) => {
                tracing::debug!(
                    root = %object.name,
                    field = %field.name,
                    ?kind,
                    operation = %marker.operation,
                    "hand-written field takes precedence over derived"
                );
            }
        }
    }
    Ok(object)
}

fn insert_type(types: &mut IndexMap<String, TypeDef>, def: TypeDef) -> Result<(), SchemaError> {
    let name = def.name().to_string();
    if types.contains_key(&name) {
        return Err(SchemaError::DuplicateType(name));
    }
    types.insert(name, def);
    Ok(())
}

#[derive(Clone, Copy)]
enum Position {
    Input,
    Output,
}

fn check_type(
    types: &IndexMap<String, TypeDef>,
    location: &str,
    ty: &TypeRef,
    position: Position,
) -> Result<(), SchemaError> {
    let name = ty.named_type();
    let def = types.get(name).ok_or_else(|| SchemaError::UnknownType {
        location: location.to_string(),
        type_name: name.to_string(),
    })?;
    let (ok, expected) = match position {
        Position::Input => (def.is_input(), "an input"),
        Position::Output => (def.is_output(), "an output"),
    };
    if ok {
        Ok(())
    } else {
        Err(SchemaError::WrongTypeKind {
            location: location.to_string(),
            type_name: name.to_string(),
            expected,
            found: def.kind_name(),
        })
    }
}

fn compile_resolution(
    location: &str,
    field: &crate::entity::Field,
    types: &IndexMap<String, TypeDef>,
    model: &Arc<DataModel>,
) -> Result<SharedResolver, SchemaError> {
    let mismatch = |returns: String| SchemaError::ReturnTypeMismatch {
        location: location.to_string(),
        declared: field.ty.to_string(),
        returns,
    };

    let resolver: SharedResolver = match &field.resolution {
        FieldResolution::Delegated(column) => Arc::new(ColumnResolver::new(column.clone())),
        FieldResolution::Custom(resolver, returns) => {
            if !returns.matches(&field.ty) {
                return Err(mismatch(returns.to_string()));
            }
            Arc::clone(resolver)
        }
        FieldResolution::Derived(operation, entity) => {
            let list = *operation == crate::crud::CrudOperation::FindMany;
            if field.ty.named_type() != entity || field.ty.nullable().is_list() != list {
                let returns = if list {
                    format!("[{entity}]")
                } else {
                    entity.clone()
                };
                return Err(mismatch(returns));
            }
            Arc::new(CrudPlugin::new().resolver(*operation, entity, Arc::clone(model)))
        }
        FieldResolution::Relation(relation) => {
            let known = model.contains(&relation.target)
                && matches!(types.get(&relation.target), Some(TypeDef::Object(_)));
            if !known {
                return Err(SchemaError::UnknownRelationTarget {
                    location: location.to_string(),
                    target: relation.target.clone(),
                });
            }
            if field.ty.named_type() != relation.target
                || field.ty.nullable().is_list() != relation.is_list()
            {
                let returns = if relation.is_list() {
                    format!("[{}]", relation.target)
                } else {
                    relation.target.clone()
                };
                return Err(mismatch(returns));
            }
            Arc::new(RelationResolver::new(relation.clone()))
        }
    };
    Ok(resolver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crud::{CrudMarker, CrudOperation};
    use crate::entity::Returns;
    use crate::model::{ModelDef, ModelField, Relation};
    use crate::resolver::FnResolver;

    fn model() -> DataModel {
        DataModel::new()
            .model(
                ModelDef::new("User")
                    .field(ModelField::id("id"))
                    .field(ModelField::new("email", ScalarType::String).required().unique())
                    .relation("posts", Relation::many("Post", "author_id")),
            )
            .model(
                ModelDef::new("Post")
                    .field(ModelField::id("id"))
                    .field(ModelField::new("title", ScalarType::String).required())
                    .field(
                        ModelField::new("authorId", ScalarType::Int)
                            .column("author_id")
                            .required(),
                    )
                    .relation("author", Relation::belongs_to("User", "author_id")),
            )
    }

    fn user() -> ObjectType {
        ObjectType::new("User")
            .field("id", "Int!")
            .field("email", "String!")
            .relation("posts", "[Post!]!", Relation::many("Post", "author_id"))
    }

    fn post() -> ObjectType {
        ObjectType::new("Post")
            .field("id", "Int!")
            .field("title", "String!")
            .source_field("authorId", "Int!", "author_id")
            .relation("author", "User", Relation::belongs_to("User", "author_id"))
    }

    fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
            .model(model())
            .object(user())
            .object(post())
            .plugin(CrudPlugin::new())
    }

    fn null_resolver() -> FnResolver {
        FnResolver::new(|_, _, _, _| Ok(Value::Null))
    }

    #[test]
    fn test_type_ref_parse() {
        let ty = TypeRef::parse("[Post!]!");
        assert_eq!(
            ty,
            TypeRef::non_null(TypeRef::list(TypeRef::non_null(TypeRef::named("Post"))))
        );
        assert_eq!(ty.to_string(), "[Post!]!");
        assert_eq!(ty.named_type(), "Post");
        assert!(ty.is_non_null());
        assert!(ty.nullable().is_list());
        assert_eq!(TypeRef::parse(" Int ").to_string(), "Int");
    }

    #[test]
    fn test_build_composes_roots() {
        let schema = builder()
            .query(
                RootType::query()
                    .crud(CrudMarker::find_many("User"))
                    .crud(CrudMarker::find_one("Post")),
            )
            .mutation(RootType::mutation().crud(CrudMarker::create_one("User")))
            .build()
            .unwrap();

        assert_eq!(schema.field_names("Query"), vec!["users", "post"]);
        assert_eq!(schema.field_names("Mutation"), vec!["createOneUser"]);
        assert_eq!(
            schema.resolution_kind("Query", "users"),
            Some(ResolutionKind::Derived(CrudOperation::FindMany))
        );
        assert_eq!(
            schema.resolution_kind("User", "posts"),
            Some(ResolutionKind::Relation)
        );
        assert!(schema.resolver("Post", "authorId").is_some());
        assert!(schema.schema().input_object("UserCreateInput").is_some());
        assert!(schema.schema().input_object("PostCreateNestedManyInput").is_some());
        assert_eq!(schema.schema().mutation_type.as_deref(), Some("Mutation"));
    }

    #[test]
    fn test_custom_field_wins_over_derived() {
        let schema = builder()
            .query(
                RootType::query()
                    .resolve_field("posts", "[Post!]!", Returns::list("Post"), null_resolver())
                    .crud(CrudMarker::find_many("Post")),
            )
            .build()
            .unwrap();

        assert_eq!(schema.field_names("Query"), vec!["posts"]);
        assert_eq!(
            schema.resolution_kind("Query", "posts"),
            Some(ResolutionKind::Custom)
        );
    }

    #[test]
    fn test_derived_replaces_delegated() {
        let schema = builder()
            .query(
                RootType::query()
                    .add_field(crate::entity::Field::new("users", "[User!]!"))
                    .crud(CrudMarker::find_many("User")),
            )
            .build()
            .unwrap();

        assert_eq!(
            schema.resolution_kind("Query", "users"),
            Some(ResolutionKind::Derived(CrudOperation::FindMany))
        );
    }

    #[test]
    fn test_build_errors() {
        let err = builder().build().unwrap_err();
        assert_eq!(err, SchemaError::MissingQueryType);

        let err = builder()
            .query(RootType::query().crud(CrudMarker::find_many("Comment")))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownEntity { ref entity, .. } if entity == "Comment"));

        let err = SchemaBuilder::new()
            .model(model())
            .object(user())
            .object(post())
            .query(RootType::query().crud(CrudMarker::find_many("User")))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::MissingPlugin { .. }));

        let err = builder()
            .object(ObjectType::new("Comment").field("id", "Int!").field("id", "Int"))
            .query(RootType::query())
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::DuplicateField {
                type_name: "Comment".into(),
                field: "id".into()
            }
        );

        let err = builder()
            .query(RootType::query().add_field(crate::entity::Field::new("when", "DateTime")))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownType { ref type_name, .. } if type_name == "DateTime"));

        let err = builder()
            .query(RootType::query().resolve_field(
                "post",
                "Post",
                Returns::list("Post"),
                null_resolver(),
            ))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::ReturnTypeMismatch { .. }));
        assert_eq!(
            err.to_string(),
            "`Query.post` is declared as `Post` but its resolver returns `[Post]`"
        );

        let err = builder()
            .object(
                ObjectType::new("Tag")
                    .field("id", "Int!")
                    .relation("owner", "User", Relation::belongs_to("Owner", "owner_id")),
            )
            .query(RootType::query())
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownRelationTarget { .. }));
    }

    #[test]
    fn test_input_in_output_position() {
        let err = builder()
            .query(
                RootType::query()
                    .crud(CrudMarker::find_many("User"))
                    .add_field(crate::entity::Field::new("draft", "UserCreateInput")),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::WrongTypeKind { expected: "an output", .. }));
    }
}
