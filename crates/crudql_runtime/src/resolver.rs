//! Resolver system.
//!
//! Every field of an executable schema is backed by exactly one
//! [`Resolver`], compiled from its declared resolution when the schema is
//! built.

use crate::context::Context;
use crate::datasource::{DataSourceError, Filter};
use crate::executor::{FieldError, PathSegment};
use crate::model::{Relation, RelationKind};
use crate::schema::TypeRef;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Message sent to clients in place of infrastructure failures.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error: data source unavailable";

/// Error codes reported in `extensions.code`.
pub mod codes {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const BAD_USER_INPUT: &str = "BAD_USER_INPUT";
    pub const CONSTRAINT_VIOLATION: &str = "CONSTRAINT_VIOLATION";
    pub const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";
    pub const GRAPHQL_PARSE_FAILED: &str = "GRAPHQL_PARSE_FAILED";
    pub const GRAPHQL_VALIDATION_FAILED: &str = "GRAPHQL_VALIDATION_FAILED";
}

/// Arguments passed to a resolver, already coerced against the field's
/// argument definitions.
#[derive(Debug, Clone, Default)]
pub struct ResolverArgs {
    args: HashMap<String, Value>,
}

impl ResolverArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates resolver args from a list of (name, value) pairs.
    pub fn from_pairs(pairs: Vec<(String, Value)>) -> Self {
        Self {
            args: pairs.into_iter().collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }

    /// Gets an argument as a specific type.
    pub fn get_as<T: serde::de::DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.args
            .get(name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Gets a required argument, returning an error if absent or `null`.
    pub fn require<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<T, ResolverError> {
        match self.args.get(name) {
            None | Some(Value::Null) => Err(ResolverError::MissingArgument(name.to_string())),
            Some(v) => serde_json::from_value(v.clone()).map_err(|e| {
                ResolverError::InvalidArgument {
                    name: name.to_string(),
                    message: e.to_string(),
                }
            }),
        }
    }

    pub fn all(&self) -> &HashMap<String, Value> {
        &self.args
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.args.insert(name.into(), value);
    }
}

/// Info about the field being resolved.
#[derive(Debug, Clone)]
pub struct ResolverInfo {
    pub field_name: String,
    pub return_type: TypeRef,
    pub parent_type: String,
    pub path: Vec<PathSegment>,
}

impl ResolverInfo {
    pub fn new(field_name: impl Into<String>, parent_type: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            return_type: TypeRef::named("String"),
            parent_type: parent_type.into(),
            path: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_return_type(mut self, ty: TypeRef) -> Self {
        self.return_type = ty;
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = path;
        self
    }
}

/// Result type for resolvers.
pub type ResolverResult = Result<Value, ResolverError>;

/// Future type for async resolvers.
pub type ResolverFuture<'a> = Pin<Box<dyn Future<Output = ResolverResult> + Send + 'a>>;

/// Error from a resolver.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolverError {
    /// The requested record does not exist.
    #[error("{0}")]
    NotFound(String),

    #[error("Missing required argument: {0}")]
    MissingArgument(String),

    #[error("Invalid argument '{name}': {message}")]
    InvalidArgument { name: String, message: String },

    #[error("{0}")]
    Custom(String),

    #[error(transparent)]
    DataSource(#[from] DataSourceError),
}

impl ResolverError {
    /// Returns true if the error must be hidden from clients.
    #[must_use]
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::DataSource(e) if e.is_infrastructure())
    }

    /// The `extensions.code` reported for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => codes::NOT_FOUND,
            Self::MissingArgument(_) | Self::InvalidArgument { .. } | Self::Custom(_) => {
                codes::BAD_USER_INPUT
            }
            Self::DataSource(DataSourceError::Constraint(_)) => codes::CONSTRAINT_VIOLATION,
            Self::DataSource(_) => codes::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ResolverError> for FieldError {
    fn from(error: ResolverError) -> Self {
        if error.is_infrastructure() {
            FieldError::new(INTERNAL_ERROR_MESSAGE).with_code(codes::INTERNAL_SERVER_ERROR)
        } else {
            let code = error.code();
            FieldError::new(error.to_string()).with_code(code)
        }
    }
}

/// Trait for field resolvers.
pub trait Resolver: Send + Sync {
    fn resolve<'a>(
        &'a self,
        parent: &'a Value,
        args: &'a ResolverArgs,
        ctx: &'a Context,
        info: &'a ResolverInfo,
    ) -> ResolverFuture<'a>;
}

/// A shared resolver.
pub type SharedResolver = Arc<dyn Resolver>;

/// A sync resolver function.
pub type SyncResolverFn =
    Arc<dyn Fn(&Value, &ResolverArgs, &Context, &ResolverInfo) -> ResolverResult + Send + Sync>;

/// A wrapper for sync resolver functions.
pub struct FnResolver {
    func: SyncResolverFn,
}

impl FnResolver {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value, &ResolverArgs, &Context, &ResolverInfo) -> ResolverResult
            + Send
            + Sync
            + 'static,
    {
        Self { func: Arc::new(f) }
    }
}

impl Resolver for FnResolver {
    fn resolve<'a>(
        &'a self,
        parent: &'a Value,
        args: &'a ResolverArgs,
        ctx: &'a Context,
        info: &'a ResolverInfo,
    ) -> ResolverFuture<'a> {
        let result = (self.func)(parent, args, ctx, info);
        Box::pin(async move { result })
    }
}

/// An async resolver function type.
pub type AsyncResolverFn = Arc<
    dyn Fn(Value, ResolverArgs, Context, ResolverInfo) -> ResolverFuture<'static> + Send + Sync,
>;

/// A wrapper for async resolver functions.
pub struct AsyncFnResolver {
    func: AsyncResolverFn,
}

impl AsyncFnResolver {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Value, ResolverArgs, Context, ResolverInfo) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResolverResult> + Send + 'static,
    {
        Self {
            func: Arc::new(move |parent, args, ctx, info| Box::pin(f(parent, args, ctx, info))),
        }
    }
}

impl Resolver for AsyncFnResolver {
    fn resolve<'a>(
        &'a self,
        parent: &'a Value,
        args: &'a ResolverArgs,
        ctx: &'a Context,
        info: &'a ResolverInfo,
    ) -> ResolverFuture<'a> {
        let parent = parent.clone();
        let args = args.clone();
        let ctx = ctx.clone();
        let info = info.clone();
        let func = Arc::clone(&self.func);
        Box::pin(async move { func(parent, args, ctx, info).await })
    }
}

/// Reads a storage column off the parent record.
#[derive(Debug, Clone)]
pub struct ColumnResolver {
    column: String,
}

impl ColumnResolver {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Resolver for ColumnResolver {
    fn resolve<'a>(
        &'a self,
        parent: &'a Value,
        _args: &'a ResolverArgs,
        _ctx: &'a Context,
        _info: &'a ResolverInfo,
    ) -> ResolverFuture<'a> {
        let value = parent.get(&self.column).cloned().unwrap_or(Value::Null);
        Box::pin(async move { Ok(value) })
    }
}

/// Fetches related records through the data source, scoped to the parent.
#[derive(Debug, Clone)]
pub struct RelationResolver {
    relation: Relation,
}

impl RelationResolver {
    pub fn new(relation: Relation) -> Self {
        Self { relation }
    }
}

impl Resolver for RelationResolver {
    fn resolve<'a>(
        &'a self,
        parent: &'a Value,
        _args: &'a ResolverArgs,
        ctx: &'a Context,
        _info: &'a ResolverInfo,
    ) -> ResolverFuture<'a> {
        Box::pin(async move {
            let relation = &self.relation;
            let source = ctx.datasource();
            match relation.kind {
                RelationKind::Many | RelationKind::OneReverse => {
                    let Some(id) = parent.get(&relation.references).filter(|v| !v.is_null())
                    else {
                        return Ok(if relation.is_list() {
                            Value::Array(Vec::new())
                        } else {
                            Value::Null
                        });
                    };
                    let filter = Filter::eq(&relation.key, id.clone());
                    let records = source.find_many(&relation.target, Some(&filter)).await?;
                    if relation.is_list() {
                        Ok(Value::Array(records.into_iter().map(Value::Object).collect()))
                    } else {
                        Ok(records
                            .into_iter()
                            .next()
                            .map_or(Value::Null, Value::Object))
                    }
                }
                RelationKind::BelongsTo => {
                    let Some(key) = parent.get(&relation.key).filter(|v| !v.is_null()) else {
                        return Ok(Value::Null);
                    };
                    let filter = Filter::eq(&relation.references, key.clone());
                    let record = source.find_one(&relation.target, &filter).await?;
                    Ok(record.map_or(Value::Null, Value::Object))
                }
            }
        })
    }
}

/// Resolvers indexed by type and field.
#[derive(Default, Clone)]
pub struct ResolverMap {
    resolvers: FxHashMap<(String, String), SharedResolver>,
}

impl ResolverMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resolver for a specific type and field.
    pub fn register(
        &mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        resolver: SharedResolver,
    ) {
        self.resolvers
            .insert((type_name.into(), field_name.into()), resolver);
    }

    /// Registers a sync function as a resolver.
    pub fn register_fn<F>(
        &mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        f: F,
    ) where
        F: Fn(&Value, &ResolverArgs, &Context, &ResolverInfo) -> ResolverResult
            + Send
            + Sync
            + 'static,
    {
        self.register(type_name, field_name, Arc::new(FnResolver::new(f)));
    }

    pub fn get(&self, type_name: &str, field_name: &str) -> Option<&dyn Resolver> {
        self.resolvers
            .get(&(type_name.to_string(), field_name.to_string()))
            .map(|r| r.as_ref())
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl Debug for ResolverMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverMap")
            .field("resolver_count", &self.resolvers.len())
            .finish()
    }
}
