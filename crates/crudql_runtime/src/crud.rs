//! CRUD auto-resolution.
//!
//! Root types carry [`CrudMarker`]s. At build time the [`CrudPlugin`] turns
//! each marker into a field, synthesizes the input types that field needs,
//! and binds a [`CrudResolver`] that translates arguments into data source
//! calls through the [`DataModel`].

use crate::context::Context;
use crate::datasource::{DataSource, Filter, Record};
use crate::entity::{Field, FieldResolution};
use crate::model::{DataModel, ModelDef, ModelField, Relation, RelationKind};
use crate::resolver::{Resolver, ResolverArgs, ResolverError, ResolverFuture, ResolverInfo};
use crate::schema::{InputObjectDef, InputValueDef, SchemaError, TypeRef};
use indexmap::IndexSet;
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A derivable operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrudOperation {
    FindOne,
    FindMany,
    CreateOne,
    UpdateOne,
    DeleteOne,
}

impl CrudOperation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FindOne => "findOne",
            Self::FindMany => "findMany",
            Self::CreateOne => "createOne",
            Self::UpdateOne => "updateOne",
            Self::DeleteOne => "deleteOne",
        }
    }

    #[must_use]
    pub const fn is_mutation(self) -> bool {
        matches!(self, Self::CreateOne | Self::UpdateOne | Self::DeleteOne)
    }
}

impl fmt::Display for CrudOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request for a derived field on a root type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CrudMarker {
    pub operation: CrudOperation,
    pub entity: String,
    alias: Option<String>,
}

impl CrudMarker {
    pub fn new(operation: CrudOperation, entity: impl Into<String>) -> Self {
        Self {
            operation,
            entity: entity.into(),
            alias: None,
        }
    }

    /// `user(where: UserWhereUniqueInput!): User`
    pub fn find_one(entity: impl Into<String>) -> Self {
        Self::new(CrudOperation::FindOne, entity)
    }

    /// `users: [User!]!`
    pub fn find_many(entity: impl Into<String>) -> Self {
        Self::new(CrudOperation::FindMany, entity)
    }

    /// `createOneUser(data: UserCreateInput!): User!`
    pub fn create_one(entity: impl Into<String>) -> Self {
        Self::new(CrudOperation::CreateOne, entity)
    }

    /// `updateOneUser(data: UserUpdateInput!, where: UserWhereUniqueInput!): User`
    pub fn update_one(entity: impl Into<String>) -> Self {
        Self::new(CrudOperation::UpdateOne, entity)
    }

    /// `deleteOneUser(where: UserWhereUniqueInput!): User`
    pub fn delete_one(entity: impl Into<String>) -> Self {
        Self::new(CrudOperation::DeleteOne, entity)
    }

    /// Exposes the derived field under another name.
    #[must_use]
    pub fn alias(mut self, name: impl Into<String>) -> Self {
        self.alias = Some(name.into());
        self
    }

    /// The field name this marker registers.
    #[must_use]
    pub fn field_name(&self) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        let entity = &self.entity;
        match self.operation {
            CrudOperation::FindOne => lower_first(entity),
            CrudOperation::FindMany => pluralize(&lower_first(entity)),
            CrudOperation::CreateOne => format!("createOne{entity}"),
            CrudOperation::UpdateOne => format!("updateOne{entity}"),
            CrudOperation::DeleteOne => format!("deleteOne{entity}"),
        }
    }
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn pluralize(s: &str) -> String {
    let consonant_y = s.ends_with('y')
        && !matches!(s.chars().rev().nth(1), Some('a' | 'e' | 'i' | 'o' | 'u'));
    if consonant_y {
        format!("{}ies", &s[..s.len() - 1])
    } else if s.ends_with('s') || s.ends_with('x') || s.ends_with("ch") || s.ends_with("sh") {
        format!("{s}es")
    } else {
        format!("{s}s")
    }
}

/// Input type names.
pub mod inputs {
    pub fn where_unique(entity: &str) -> String {
        format!("{entity}WhereUniqueInput")
    }

    pub fn create(entity: &str) -> String {
        format!("{entity}CreateInput")
    }

    pub fn update(entity: &str) -> String {
        format!("{entity}UpdateInput")
    }

    pub fn nested_many(entity: &str) -> String {
        format!("{entity}CreateNestedManyInput")
    }

    pub fn nested_one(entity: &str) -> String {
        format!("{entity}CreateNestedOneInput")
    }
}

/// Synthesizes CRUD fields and their input types from the data model.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrudPlugin;

impl CrudPlugin {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Builds the field a marker asks for.
    pub fn field(
        &self,
        root: &str,
        marker: &CrudMarker,
        model: &DataModel,
    ) -> Result<Field, SchemaError> {
        let entity = marker.entity.as_str();
        if !model.contains(entity) {
            return Err(SchemaError::UnknownEntity {
                root: root.to_string(),
                entity: entity.to_string(),
            });
        }

        let name = marker.field_name();
        let field = match marker.operation {
            CrudOperation::FindOne => Field::new(name, TypeRef::named(entity))
                .argument("where", TypeRef::non_null(TypeRef::named(inputs::where_unique(entity)))),
            CrudOperation::FindMany => Field::new(
                name,
                TypeRef::non_null(TypeRef::list(TypeRef::non_null(TypeRef::named(entity)))),
            ),
            CrudOperation::CreateOne => {
                Field::new(name, TypeRef::non_null(TypeRef::named(entity)))
                    .argument("data", TypeRef::non_null(TypeRef::named(inputs::create(entity))))
            }
            CrudOperation::UpdateOne => Field::new(name, TypeRef::named(entity))
                .argument("data", TypeRef::non_null(TypeRef::named(inputs::update(entity))))
                .argument("where", TypeRef::non_null(TypeRef::named(inputs::where_unique(entity)))),
            CrudOperation::DeleteOne => Field::new(name, TypeRef::named(entity))
                .argument("where", TypeRef::non_null(TypeRef::named(inputs::where_unique(entity)))),
        };

        let mut field = field;
        field.resolution = FieldResolution::Derived(marker.operation, entity.to_string());
        Ok(field)
    }

    /// Binds the resolver for a derived field.
    pub fn resolver(
        &self,
        operation: CrudOperation,
        entity: &str,
        model: Arc<DataModel>,
    ) -> CrudResolver {
        CrudResolver {
            operation,
            entity: entity.to_string(),
            model,
        }
    }

    /// Runs a `createOne` write outside of a request, nested inputs included.
    pub async fn create(
        &self,
        model: &DataModel,
        entity: &str,
        data: &Map<String, Value>,
        source: &dyn DataSource,
    ) -> Result<Record, ResolverError> {
        let def = model
            .get(entity)
            .ok_or_else(|| crate::datasource::DataSourceError::UnknownEntity(entity.to_string()))?;
        create_record(model, def, data, source).await
    }

    /// Synthesizes every input type the given entities need, following
    /// relations so nested creates are fully typed. Output follows model
    /// declaration order.
    pub fn input_types<'a>(
        &self,
        entities: impl IntoIterator<Item = &'a str>,
        model: &DataModel,
    ) -> Vec<InputObjectDef> {
        let mut needed: IndexSet<String> = IndexSet::new();
        let mut queue: Vec<String> = entities.into_iter().map(str::to_string).collect();
        while let Some(entity) = queue.pop() {
            if !needed.insert(entity.clone()) {
                continue;
            }
            if let Some(def) = model.get(&entity) {
                queue.extend(def.relations.values().map(|r| r.target.clone()));
            }
        }

        let mut types = Vec::new();
        for def in model.models().filter(|m| needed.contains(&m.name)) {
            types.push(where_unique_input(def));
            types.push(create_input(def));
            types.push(update_input(def));
        }

        // Nested wrappers, once per target.
        let mut wrappers = IndexSet::new();
        for def in model.models().filter(|m| needed.contains(&m.name)) {
            for relation in def.relations.values() {
                wrappers.insert((relation.target.clone(), relation.is_list()));
            }
        }
        for (target, many) in wrappers {
            types.push(nested_input(&target, many));
        }

        types
    }
}

fn scalar_type(field: &ModelField, non_null: bool) -> TypeRef {
    let ty = TypeRef::named(field.scalar.as_str());
    if non_null {
        TypeRef::non_null(ty)
    } else {
        ty
    }
}

fn where_unique_input(def: &ModelDef) -> InputObjectDef {
    let mut input = InputObjectDef::new(inputs::where_unique(&def.name));
    for field in def.unique_fields() {
        input.add_field(InputValueDef::new(&field.name, scalar_type(field, false)));
    }
    input
}

fn create_input(def: &ModelDef) -> InputObjectDef {
    let mut input = InputObjectDef::new(inputs::create(&def.name));
    for field in def.fields.values().filter(|f| !f.id) {
        // A foreign key can also be supplied through its relation.
        let via_relation = def.belongs_to_for(&field.column).is_some();
        let non_null = field.required && field.default.is_none() && !via_relation;
        input.add_field(InputValueDef::new(&field.name, scalar_type(field, non_null)));
    }
    for (name, relation) in &def.relations {
        let wrapper = if relation.is_list() {
            inputs::nested_many(&relation.target)
        } else {
            inputs::nested_one(&relation.target)
        };
        input.add_field(InputValueDef::new(name, TypeRef::named(wrapper)));
    }
    input
}

fn update_input(def: &ModelDef) -> InputObjectDef {
    let mut input = InputObjectDef::new(inputs::update(&def.name));
    for field in def.fields.values().filter(|f| !f.id) {
        input.add_field(InputValueDef::new(&field.name, scalar_type(field, false)));
    }
    input
}

fn nested_input(target: &str, many: bool) -> InputObjectDef {
    let create = TypeRef::named(inputs::create(target));
    let connect = TypeRef::named(inputs::where_unique(target));
    if many {
        let mut input = InputObjectDef::new(inputs::nested_many(target));
        input.add_field(InputValueDef::new(
            "create",
            TypeRef::list(TypeRef::non_null(create)),
        ));
        input.add_field(InputValueDef::new(
            "connect",
            TypeRef::list(TypeRef::non_null(connect)),
        ));
        input
    } else {
        let mut input = InputObjectDef::new(inputs::nested_one(target));
        input.add_field(InputValueDef::new("create", create));
        input.add_field(InputValueDef::new("connect", connect));
        input
    }
}

type WriteFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ResolverError>> + Send + 'a>>;

/// Resolves a derived field against the data source.
#[derive(Debug, Clone)]
pub struct CrudResolver {
    operation: CrudOperation,
    entity: String,
    model: Arc<DataModel>,
}

impl CrudResolver {
    pub fn operation(&self) -> CrudOperation {
        self.operation
    }

    async fn run(
        &self,
        args: &ResolverArgs,
        source: &dyn DataSource,
    ) -> Result<Value, ResolverError> {
        let def = self.model.get(&self.entity).ok_or_else(|| {
            crate::datasource::DataSourceError::UnknownEntity(self.entity.clone())
        })?;
        let entity = def.name.as_str();

        match self.operation {
            CrudOperation::FindOne => {
                let filter = unique_filter(def, object_arg(args, "where")?)?;
                let record = source.find_one(entity, &filter).await?;
                Ok(record.map_or(Value::Null, Value::Object))
            }
            CrudOperation::FindMany => {
                let records = source.find_many(entity, None).await?;
                Ok(Value::Array(records.into_iter().map(Value::Object).collect()))
            }
            CrudOperation::CreateOne => {
                let data = object_arg(args, "data")?;
                let record = create_record(&self.model, def, data, source).await?;
                Ok(Value::Object(record))
            }
            CrudOperation::UpdateOne => {
                let where_arg = object_arg(args, "where")?;
                let filter = unique_filter(def, where_arg)?;
                let patch = update_patch(def, object_arg(args, "data")?)?;
                match source.update(entity, &filter, patch).await? {
                    Some(record) => Ok(Value::Object(record)),
                    None => Err(not_found(entity, where_arg)),
                }
            }
            CrudOperation::DeleteOne => {
                let where_arg = object_arg(args, "where")?;
                let filter = unique_filter(def, where_arg)?;
                match source.delete(entity, &filter).await? {
                    Some(record) => Ok(Value::Object(record)),
                    None => Err(not_found(entity, where_arg)),
                }
            }
        }
    }
}

impl Resolver for CrudResolver {
    fn resolve<'a>(
        &'a self,
        _parent: &'a Value,
        args: &'a ResolverArgs,
        ctx: &'a Context,
        _info: &'a ResolverInfo,
    ) -> ResolverFuture<'a> {
        Box::pin(self.run(args, ctx.datasource()))
    }
}

fn object_arg<'a>(
    args: &'a ResolverArgs,
    name: &str,
) -> Result<&'a Map<String, Value>, ResolverError> {
    match args.get(name) {
        Some(Value::Object(map)) => Ok(map),
        None | Some(Value::Null) => Err(ResolverError::MissingArgument(name.to_string())),
        Some(_) => Err(ResolverError::InvalidArgument {
            name: name.to_string(),
            message: "expected an input object".to_string(),
        }),
    }
}

fn not_found(entity: &str, where_arg: &Map<String, Value>) -> ResolverError {
    ResolverError::NotFound(format!(
        "No {} found for where: {}",
        entity.to_lowercase(),
        Value::Object(where_arg.clone())
    ))
}

/// Translates a `WhereUniqueInput` into a storage filter.
fn unique_filter(def: &ModelDef, where_arg: &Map<String, Value>) -> Result<Filter, ResolverError> {
    let mut filter = Filter::all();
    for (name, value) in where_arg {
        if value.is_null() {
            continue;
        }
        match def.fields.get(name) {
            Some(field) if field.unique => {
                filter = filter.and(field.column.clone(), value.clone());
            }
            _ => {
                return Err(ResolverError::InvalidArgument {
                    name: "where".to_string(),
                    message: format!("`{name}` is not a unique field of {}", def.name),
                })
            }
        }
    }
    if filter.is_empty() {
        return Err(ResolverError::InvalidArgument {
            name: "where".to_string(),
            message: "at least one unique field must be provided".to_string(),
        });
    }
    Ok(filter)
}

/// Translates an `UpdateInput` into a storage patch.
fn update_patch(def: &ModelDef, data: &Map<String, Value>) -> Result<Record, ResolverError> {
    let mut patch = Record::new();
    for (name, value) in data {
        let Some(field) = def.fields.get(name).filter(|f| !f.id) else {
            return Err(ResolverError::InvalidArgument {
                name: "data".to_string(),
                message: format!("unknown field `{name}`"),
            });
        };
        if value.is_null() && field.required {
            return Err(ResolverError::InvalidArgument {
                name: "data".to_string(),
                message: format!("field `{name}` cannot be null"),
            });
        }
        patch.insert(field.column.clone(), value.clone());
    }
    Ok(patch)
}

fn id_of(def: &ModelDef, record: &Record) -> Value {
    def.id_field()
        .and_then(|f| record.get(&f.column))
        .cloned()
        .unwrap_or(Value::Null)
}

fn relation_target<'m>(
    model: &'m DataModel,
    relation: &Relation,
) -> Result<&'m ModelDef, ResolverError> {
    model.get(&relation.target).ok_or_else(|| {
        crate::datasource::DataSourceError::UnknownEntity(relation.target.clone()).into()
    })
}

/// One side of a `CreateNestedOneInput`.
enum NestedOne<'v> {
    Create(&'v Value),
    Connect(&'v Value),
}

fn nested_one<'v>(
    relation_name: &str,
    nested: &'v Map<String, Value>,
) -> Result<NestedOne<'v>, ResolverError> {
    let create = nested.get("create").filter(|v| !v.is_null());
    let connect = nested.get("connect").filter(|v| !v.is_null());
    match (create, connect) {
        (Some(create), None) => Ok(NestedOne::Create(create)),
        (None, Some(connect)) => Ok(NestedOne::Connect(connect)),
        _ => Err(ResolverError::InvalidArgument {
            name: "data".to_string(),
            message: format!("`{relation_name}` needs exactly one of `create` or `connect`"),
        }),
    }
}

fn nested_list<'v>(nested: &'v Map<String, Value>, key: &str) -> Vec<&'v Value> {
    match nested.get(key) {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(single) => vec![single],
    }
}

fn as_object<'v>(value: &'v Value, what: &str) -> Result<&'v Map<String, Value>, ResolverError> {
    value.as_object().ok_or_else(|| ResolverError::InvalidArgument {
        name: "data".to_string(),
        message: format!("`{what}` must be an input object"),
    })
}

/// Creates a record and any nested records it carries.
///
/// The whole input tree is checked first, `connect` targets included, so a
/// malformed or dangling nested input fails before anything is written.
/// Only store failures during the writes themselves can leave earlier rows
/// behind.
async fn create_record(
    model: &DataModel,
    def: &ModelDef,
    data: &Map<String, Value>,
    source: &dyn DataSource,
) -> Result<Record, ResolverError> {
    let plan = plan_create(model, def, data, None, source).await?;
    write_plan(plan, None, source).await
}

/// A checked create, ready to write.
struct CreatePlan<'a> {
    def: &'a ModelDef,
    record: Record,
    /// `BelongsTo` keys, filled in once the owner is known.
    owners: Vec<(&'a str, Owner<'a>)>,
    dependents: Vec<Dependents<'a>>,
}

enum Owner<'a> {
    Existing(Value),
    /// A new owner and the column its key is read from.
    New(Box<CreatePlan<'a>>, &'a str),
}

/// Records that point back at the new row.
struct Dependents<'a> {
    relation: &'a Relation,
    target: &'a ModelDef,
    creates: Vec<CreatePlan<'a>>,
    connects: Vec<(Filter, &'a Map<String, Value>)>,
}

fn set_by_parent(field: &str) -> ResolverError {
    ResolverError::InvalidArgument {
        name: "data".to_string(),
        message: format!("`{field}` is set by the enclosing create"),
    }
}

/// Checks one level of create input and plans its nested writes.
/// `parent_key` names the column the enclosing create fills in.
fn plan_create<'a>(
    model: &'a DataModel,
    def: &'a ModelDef,
    data: &'a Map<String, Value>,
    parent_key: Option<&'a str>,
    source: &'a dyn DataSource,
) -> WriteFuture<'a, CreatePlan<'a>> {
    Box::pin(async move {
        let mut record = Record::new();
        for (name, value) in data {
            if let Some(field) = def.fields.get(name).filter(|f| !f.id) {
                record.insert(field.column.clone(), value.clone());
            }
        }

        if let Some(column) = parent_key {
            if record.get(column).is_some_and(|v| !v.is_null()) {
                let field = def.field_by_column(column).map_or(column, |f| f.name.as_str());
                return Err(set_by_parent(field));
            }
        }

        let mut owners = Vec::new();
        let mut dependents = Vec::new();
        for (name, relation) in &def.relations {
            let Some(nested) = data.get(name).filter(|v| !v.is_null()) else {
                continue;
            };
            let nested = as_object(nested, name)?;
            let target = relation_target(model, relation)?;
            if relation.kind != RelationKind::BelongsTo {
                let planned =
                    plan_dependents(model, name, relation, target, nested, source).await?;
                dependents.push(planned);
                continue;
            }
            if parent_key == Some(relation.key.as_str()) {
                return Err(set_by_parent(name));
            }
            let owner = match nested_one(name, nested)? {
                NestedOne::Connect(connect) => {
                    let where_arg = as_object(connect, "connect")?;
                    let filter = unique_filter(target, where_arg)?;
                    let found = source
                        .find_one(&target.name, &filter)
                        .await?
                        .ok_or_else(|| not_found(&target.name, where_arg))?;
                    Owner::Existing(found.get(&relation.references).cloned().unwrap_or(Value::Null))
                }
                NestedOne::Create(create) => {
                    let data = as_object(create, "create")?;
                    let plan = plan_create(model, target, data, None, source).await?;
                    Owner::New(Box::new(plan), relation.references.as_str())
                }
            };
            owners.push((relation.key.as_str(), owner));
        }

        for field in def.fields.values().filter(|f| !f.id) {
            let column = field.column.as_str();
            let filled_later =
                parent_key == Some(column) || owners.iter().any(|(key, _)| *key == column);
            if filled_later || record.get(column).is_some_and(|v| !v.is_null()) {
                continue;
            }
            if let Some(default) = &field.default {
                record.insert(field.column.clone(), default.clone());
            } else if field.required {
                return Err(ResolverError::InvalidArgument {
                    name: "data".to_string(),
                    message: format!("missing required field `{}`", field.name),
                });
            }
        }

        Ok(CreatePlan {
            def,
            record,
            owners,
            dependents,
        })
    })
}

async fn plan_dependents<'a>(
    model: &'a DataModel,
    name: &'a str,
    relation: &'a Relation,
    target: &'a ModelDef,
    nested: &'a Map<String, Value>,
    source: &'a dyn DataSource,
) -> Result<Dependents<'a>, ResolverError> {
    let (creates, connects) = if relation.is_list() {
        (nested_list(nested, "create"), nested_list(nested, "connect"))
    } else {
        match nested_one(name, nested)? {
            NestedOne::Create(create) => (vec![create], Vec::new()),
            NestedOne::Connect(connect) => (Vec::new(), vec![connect]),
        }
    };

    let mut planned = Dependents {
        relation,
        target,
        creates: Vec::with_capacity(creates.len()),
        connects: Vec::with_capacity(connects.len()),
    };
    for item in creates {
        let data = as_object(item, "create")?;
        let plan = plan_create(model, target, data, Some(relation.key.as_str()), source).await?;
        planned.creates.push(plan);
    }
    for item in connects {
        let where_arg = as_object(item, "connect")?;
        let filter = unique_filter(target, where_arg)?;
        if source.find_one(&target.name, &filter).await?.is_none() {
            return Err(not_found(&target.name, where_arg));
        }
        planned.connects.push((filter, where_arg));
    }
    Ok(planned)
}

/// Writes a checked create. Owners go first, then the row, then the rows
/// pointing back at it.
fn write_plan<'a>(
    plan: CreatePlan<'a>,
    parent: Option<(&'a str, Value)>,
    source: &'a dyn DataSource,
) -> WriteFuture<'a, Record> {
    Box::pin(async move {
        let CreatePlan {
            def,
            mut record,
            owners,
            dependents,
        } = plan;

        for (column, owner) in owners {
            let key = match owner {
                Owner::Existing(key) => key,
                Owner::New(plan, references) => {
                    let created = write_plan(*plan, None, source).await?;
                    created.get(references).cloned().unwrap_or(Value::Null)
                }
            };
            record.insert(column.to_string(), key);
        }
        if let Some((column, value)) = parent {
            record.insert(column.to_string(), value);
        }

        let created = source.create(&def.name, record).await?;
        let id = id_of(def, &created);

        for group in dependents {
            let key = group.relation.key.as_str();
            for plan in group.creates {
                write_plan(plan, Some((key, id.clone())), source).await?;
            }
            for (filter, where_arg) in group.connects {
                let mut patch = Record::new();
                patch.insert(key.to_string(), id.clone());
                if source.update(&group.target.name, &filter, patch).await?.is_none() {
                    return Err(not_found(&group.target.name, where_arg));
                }
            }
        }

        Ok(created)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScalarType;

    fn blog() -> DataModel {
        DataModel::new()
            .model(
                ModelDef::new("User")
                    .field(ModelField::id("id"))
                    .field(ModelField::new("email", ScalarType::String).required().unique())
                    .field(ModelField::new("name", ScalarType::String))
                    .relation("posts", Relation::many("Post", "author_id")),
            )
            .model(
                ModelDef::new("Post")
                    .field(ModelField::id("id"))
                    .field(ModelField::new("title", ScalarType::String).required())
                    .field(
                        ModelField::new("published", ScalarType::Boolean)
                            .required()
                            .default(false),
                    )
                    .field(
                        ModelField::new("authorId", ScalarType::Int)
                            .column("author_id")
                            .required(),
                    )
                    .relation("author", Relation::belongs_to("User", "author_id")),
            )
    }

    #[test]
    fn test_field_names() {
        assert_eq!(CrudMarker::find_one("User").field_name(), "user");
        assert_eq!(CrudMarker::find_many("User").field_name(), "users");
        assert_eq!(CrudMarker::find_many("Profile").field_name(), "profiles");
        assert_eq!(CrudMarker::find_many("Category").field_name(), "categories");
        assert_eq!(CrudMarker::find_many("Address").field_name(), "addresses");
        assert_eq!(CrudMarker::create_one("Post").field_name(), "createOnePost");
        assert_eq!(CrudMarker::update_one("Post").field_name(), "updateOnePost");
        assert_eq!(CrudMarker::delete_one("Post").field_name(), "deleteOnePost");
        assert_eq!(
            CrudMarker::find_many("Post").alias("feed").field_name(),
            "feed"
        );
    }

    #[test]
    fn test_synthesized_field_shapes() {
        let plugin = CrudPlugin::new();
        let model = blog();

        let users = plugin
            .field("Query", &CrudMarker::find_many("User"), &model)
            .unwrap();
        assert_eq!(users.ty.to_string(), "[User!]!");
        assert!(users.arguments.is_empty());

        let update = plugin
            .field("Mutation", &CrudMarker::update_one("Post"), &model)
            .unwrap();
        assert_eq!(update.ty.to_string(), "Post");
        assert_eq!(update.arguments["data"].ty.to_string(), "PostUpdateInput!");
        assert_eq!(update.arguments["where"].ty.to_string(), "PostWhereUniqueInput!");

        let err = plugin
            .field("Query", &CrudMarker::find_many("Comment"), &model)
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownEntity { .. }));
    }

    #[test]
    fn test_input_types() {
        let types = CrudPlugin::new().input_types(["Post"], &blog());
        let names: Vec<_> = types.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "UserWhereUniqueInput",
                "UserCreateInput",
                "UserUpdateInput",
                "PostWhereUniqueInput",
                "PostCreateInput",
                "PostUpdateInput",
                "PostCreateNestedManyInput",
                "UserCreateNestedOneInput",
            ]
        );

        let post_create = &types[4];
        assert_eq!(post_create.fields["title"].ty.to_string(), "String!");
        assert_eq!(post_create.fields["published"].ty.to_string(), "Boolean");
        assert_eq!(post_create.fields["authorId"].ty.to_string(), "Int");
        assert_eq!(post_create.fields["author"].ty.to_string(), "UserCreateNestedOneInput");

        let user_where = &types[0];
        assert_eq!(
            user_where.fields.keys().collect::<Vec<_>>(),
            vec!["id", "email"]
        );
    }

    #[test]
    fn test_unique_filter() {
        let model = blog();
        let user = model.get("User").unwrap();

        let mut where_arg = Map::new();
        where_arg.insert("email".into(), Value::from("alice@prisma.io"));
        let filter = unique_filter(user, &where_arg).unwrap();
        assert_eq!(filter, Filter::eq("email", "alice@prisma.io"));

        let empty = unique_filter(user, &Map::new()).unwrap_err();
        assert!(matches!(empty, ResolverError::InvalidArgument { .. }));

        let mut by_name = Map::new();
        by_name.insert("name".into(), Value::from("Alice"));
        assert!(unique_filter(user, &by_name).is_err());
    }

    #[test]
    fn test_update_patch_maps_columns() {
        let model = blog();
        let post = model.get("Post").unwrap();

        let mut data = Map::new();
        data.insert("authorId".into(), Value::from(2));
        data.insert("published".into(), Value::from(true));
        let patch = update_patch(post, &data).unwrap();
        assert_eq!(patch.get("author_id"), Some(&Value::from(2)));
        assert_eq!(patch.get("published"), Some(&Value::from(true)));

        let mut null_title = Map::new();
        null_title.insert("title".into(), Value::Null);
        assert!(update_patch(post, &null_title).is_err());
    }
}
