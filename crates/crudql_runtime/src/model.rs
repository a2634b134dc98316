//! Storage-level data model.
//!
//! A [`ModelDef`] describes how one entity is stored: which columns exist,
//! which are required or unique, and how the entity relates to others. Field
//! names seen by clients are mapped to storage columns here, once; the CRUD
//! layer and the store both read this mapping.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

/// Built-in scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ScalarType {
    Int,
    Float,
    String,
    Boolean,
    ID,
}

impl ScalarType {
    pub const ALL: [ScalarType; 5] = [
        ScalarType::Int,
        ScalarType::Float,
        ScalarType::String,
        ScalarType::Boolean,
        ScalarType::ID,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Int => "Int",
            Self::Float => "Float",
            Self::String => "String",
            Self::Boolean => "Boolean",
            Self::ID => "ID",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }
}

impl std::fmt::Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored scalar column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelField {
    /// Name exposed to clients.
    pub name: String,
    /// Storage column name.
    pub column: String,
    pub scalar: ScalarType,
    pub required: bool,
    pub unique: bool,
    /// Primary key, generated by the store.
    pub id: bool,
    /// Value stored when a create omits the column.
    pub default: Option<Value>,
}

impl ModelField {
    /// A nullable column stored under its own name.
    pub fn new(name: impl Into<String>, scalar: ScalarType) -> Self {
        let name = name.into();
        Self {
            column: name.clone(),
            name,
            scalar,
            required: false,
            unique: false,
            id: false,
            default: None,
        }
    }

    /// An autoincrement integer primary key.
    pub fn id(name: impl Into<String>) -> Self {
        Self {
            required: true,
            unique: true,
            id: true,
            ..Self::new(name, ScalarType::Int)
        }
    }

    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// How two entities relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RelationKind {
    /// The target holds a foreign key to this entity; many targets per record.
    Many,
    /// The target holds a unique foreign key to this entity; at most one target.
    OneReverse,
    /// This entity holds the foreign key.
    BelongsTo,
}

/// A relationship to another entity.
///
/// `key` is always a storage column. For [`RelationKind::BelongsTo`] it lives
/// on this entity; otherwise it lives on the target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Relation {
    pub target: String,
    pub kind: RelationKind,
    pub key: String,
    /// Column on the referenced side, usually `id`.
    pub references: String,
}

impl Relation {
    /// `parent.<rel>` lists every `target` whose `foreign_key` equals the parent id.
    pub fn many(target: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self::with_kind(RelationKind::Many, target, foreign_key)
    }

    /// `parent.<rel>` is the single `target` whose `foreign_key` equals the parent id.
    pub fn one_reverse(target: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self::with_kind(RelationKind::OneReverse, target, foreign_key)
    }

    /// `parent.<rel>` is the `target` whose id equals `parent.<local_key>`.
    pub fn belongs_to(target: impl Into<String>, local_key: impl Into<String>) -> Self {
        Self::with_kind(RelationKind::BelongsTo, target, local_key)
    }

    fn with_kind(kind: RelationKind, target: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            kind,
            key: key.into(),
            references: "id".to_string(),
        }
    }

    #[must_use]
    pub fn is_list(&self) -> bool {
        self.kind == RelationKind::Many
    }
}

/// Storage description of one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelDef {
    pub name: String,
    pub fields: IndexMap<String, ModelField>,
    pub relations: IndexMap<String, Relation>,
}

impl ModelDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
            relations: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn field(mut self, field: ModelField) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    #[must_use]
    pub fn relation(mut self, name: impl Into<String>, relation: Relation) -> Self {
        self.relations.insert(name.into(), relation);
        self
    }

    /// The primary key field.
    pub fn id_field(&self) -> Option<&ModelField> {
        self.fields.values().find(|f| f.id)
    }

    /// Fields usable in a `WhereUniqueInput`.
    pub fn unique_fields(&self) -> impl Iterator<Item = &ModelField> {
        self.fields.values().filter(|f| f.unique)
    }

    /// Looks a field up by its storage column.
    pub fn field_by_column(&self, column: &str) -> Option<&ModelField> {
        self.fields.values().find(|f| f.column == column)
    }

    /// Returns the relation that owns `column` as its local foreign key.
    pub fn belongs_to_for(&self, column: &str) -> Option<(&String, &Relation)> {
        self.relations
            .iter()
            .find(|(_, r)| r.kind == RelationKind::BelongsTo && r.key == column)
    }
}

/// All stored entities.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataModel {
    models: IndexMap<String, ModelDef>,
}

impl DataModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn model(mut self, model: ModelDef) -> Self {
        self.models.insert(model.name.clone(), model);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ModelDef> {
        self.models.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelDef> {
        self.models.values()
    }

    /// Every `(entity, relation)` whose foreign key points at `target`.
    pub fn referencing(&self, target: &str) -> impl Iterator<Item = (&ModelDef, &Relation)> + '_ {
        let target = target.to_string();
        self.models.values().flat_map(move |model| {
            let target = target.clone();
            model
                .relations
                .values()
                .filter(move |r| r.kind == RelationKind::BelongsTo && r.target == target)
                .map(move |r| (model, r))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn blog() -> DataModel {
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
    fn test_model_lookup() {
        let model = blog();
        let post = model.get("Post").unwrap();

        assert_eq!(post.id_field().unwrap().name, "id");
        assert_eq!(post.field_by_column("author_id").unwrap().name, "authorId");
        assert_eq!(post.fields["published"].default, Some(json!(false)));
        assert_eq!(post.belongs_to_for("author_id").unwrap().0, "author");

        let user = model.get("User").unwrap();
        let unique: Vec<_> = user.unique_fields().map(|f| f.name.as_str()).collect();
        assert_eq!(unique, vec!["id", "email"]);
    }

    #[test]
    fn test_referencing() {
        let model = blog();
        let refs: Vec<_> = model
            .referencing("User")
            .map(|(m, r)| (m.name.as_str(), r.key.as_str()))
            .collect();
        assert_eq!(refs, vec![("Post", "author_id")]);
        assert_eq!(model.referencing("Post").count(), 0);
    }

    #[test]
    fn test_scalar_names() {
        assert_eq!(ScalarType::from_name("Boolean"), Some(ScalarType::Boolean));
        assert_eq!(ScalarType::from_name("Date"), None);
    }
}
