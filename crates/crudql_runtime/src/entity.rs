//! Declarative object and root type definitions.
//!
//! Declaring a type is pure: nothing is fetched and nothing is validated
//! until [`SchemaBuilder::build`](crate::schema::SchemaBuilder::build).

use crate::crud::{CrudMarker, CrudOperation};
use crate::model::Relation;
use crate::resolver::{Resolver, SharedResolver};
use crate::schema::{InputValueDef, TypeRef};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// The shape a custom resolver promises to return: a named type, either as a
/// single value or as a list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Returns {
    pub type_name: String,
    pub list: bool,
}

impl Returns {
    pub fn one(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            list: false,
        }
    }

    pub fn list(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            list: true,
        }
    }

    /// Returns true if a field declared as `ty` can carry this shape.
    /// Nullability is not compared.
    #[must_use]
    pub fn matches(&self, ty: &TypeRef) -> bool {
        ty.named_type() == self.type_name && ty.nullable().is_list() == self.list
    }
}

impl fmt::Display for Returns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.list {
            write!(f, "[{}]", self.type_name)
        } else {
            f.write_str(&self.type_name)
        }
    }
}

/// How a field obtains its value.
#[derive(Clone)]
pub enum FieldResolution {
    /// Read verbatim from a storage column of the parent record.
    Delegated(String),
    /// A hand-written resolver.
    Custom(SharedResolver, Returns),
    /// Synthesized by the CRUD plugin.
    Derived(CrudOperation, String),
    /// Fetched through the data source, scoped to the parent record.
    Relation(Relation),
}

impl FieldResolution {
    #[must_use]
    pub fn kind(&self) -> ResolutionKind {
        match self {
            Self::Delegated(_) => ResolutionKind::Delegated,
            Self::Custom(..) => ResolutionKind::Custom,
            Self::Derived(op, _) => ResolutionKind::Derived(*op),
            Self::Relation(_) => ResolutionKind::Relation,
        }
    }
}

impl fmt::Debug for FieldResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delegated(column) => f.debug_tuple("Delegated").field(column).finish(),
            Self::Custom(_, returns) => f.debug_tuple("Custom").field(returns).finish(),
            Self::Derived(op, entity) => f.debug_tuple("Derived").field(op).field(entity).finish(),
            Self::Relation(relation) => f.debug_tuple("Relation").field(relation).finish(),
        }
    }
}

/// A field's resolution without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionKind {
    Delegated,
    Custom,
    Derived(CrudOperation),
    Relation,
}

/// A field declaration.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeRef,
    pub arguments: IndexMap<String, InputValueDef>,
    pub resolution: FieldResolution,
}

impl Field {
    /// A field delegated to the storage column of the same name.
    pub fn new(name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        let name = name.into();
        Self {
            resolution: FieldResolution::Delegated(name.clone()),
            name,
            description: None,
            ty: ty.into(),
            arguments: IndexMap::new(),
        }
    }

    /// Delegates to a differently named storage column.
    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.resolution = FieldResolution::Delegated(column.into());
        self
    }

    /// Backs the field with a custom resolver.
    #[must_use]
    pub fn resolve(mut self, returns: Returns, resolver: impl Resolver + 'static) -> Self {
        self.resolution = FieldResolution::Custom(Arc::new(resolver), returns);
        self
    }

    #[must_use]
    pub fn relation(mut self, relation: Relation) -> Self {
        self.resolution = FieldResolution::Relation(relation);
        self
    }

    #[must_use]
    pub fn argument(mut self, name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        let arg = InputValueDef::new(name, ty);
        self.arguments.insert(arg.name.clone(), arg);
        self
    }

    #[must_use]
    pub fn argument_with_default(
        mut self,
        name: impl Into<String>,
        ty: impl Into<TypeRef>,
        default: Value,
    ) -> Self {
        let arg = InputValueDef::new(name, ty).with_default(default);
        self.arguments.insert(arg.name.clone(), arg);
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// An object type declaration.
#[derive(Debug, Clone)]
pub struct ObjectType {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, Field>,
    /// Names declared more than once; rejected at build time.
    pub duplicates: Vec<String>,
}

impl ObjectType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: IndexMap::new(),
            duplicates: Vec::new(),
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds a field. A name already present is recorded as a duplicate and
    /// the first declaration is kept.
    #[must_use]
    pub fn add_field(mut self, field: Field) -> Self {
        if self.fields.contains_key(&field.name) {
            self.duplicates.push(field.name);
        } else {
            self.fields.insert(field.name.clone(), field);
        }
        self
    }

    /// A field delegated verbatim to the source column of the same name.
    #[must_use]
    pub fn field(self, name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        self.add_field(Field::new(name, ty))
    }

    /// A field delegated to a differently named source column.
    #[must_use]
    pub fn source_field(
        self,
        name: impl Into<String>,
        ty: impl Into<TypeRef>,
        column: impl Into<String>,
    ) -> Self {
        self.add_field(Field::new(name, ty).column(column))
    }

    #[must_use]
    pub fn resolve_field(
        self,
        name: impl Into<String>,
        ty: impl Into<TypeRef>,
        returns: Returns,
        resolver: impl Resolver + 'static,
    ) -> Self {
        self.add_field(Field::new(name, ty).resolve(returns, resolver))
    }

    #[must_use]
    pub fn relation(
        self,
        name: impl Into<String>,
        ty: impl Into<TypeRef>,
        relation: Relation,
    ) -> Self {
        self.add_field(Field::new(name, ty).relation(relation))
    }
}

/// A root operation type: hand-written fields plus CRUD markers.
#[derive(Debug, Clone)]
pub struct RootType {
    pub object: ObjectType,
    pub markers: Vec<CrudMarker>,
}

impl RootType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            object: ObjectType::new(name),
            markers: Vec::new(),
        }
    }

    pub fn query() -> Self {
        Self::new("Query")
    }

    pub fn mutation() -> Self {
        Self::new("Mutation")
    }

    pub fn name(&self) -> &str {
        &self.object.name
    }

    /// Requests a CRUD-derived field. A marker repeated verbatim is ignored.
    #[must_use]
    pub fn crud(mut self, marker: CrudMarker) -> Self {
        if !self.markers.contains(&marker) {
            self.markers.push(marker);
        }
        self
    }

    #[must_use]
    pub fn add_field(mut self, field: Field) -> Self {
        self.object = self.object.add_field(field);
        self
    }

    #[must_use]
    pub fn resolve_field(
        mut self,
        name: impl Into<String>,
        ty: impl Into<TypeRef>,
        returns: Returns,
        resolver: impl Resolver + 'static,
    ) -> Self {
        self.object = self.object.resolve_field(name, ty, returns, resolver);
        self
    }
}
