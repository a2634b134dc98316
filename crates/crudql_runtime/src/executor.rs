//! Query execution.
//!
//! Sibling fields of a selection set are spawned as tokio tasks and joined
//! in document order; a child field runs only after its parent resolved.
//! Mutation root fields run one after another.

use crate::context::Context;
use crate::query::{FieldInfo, PlanNode, QueryPlan};
use crate::resolver::{codes, ResolverArgs, ResolverInfo, INTERNAL_ERROR_MESSAGE};
use crate::schema::{ExecutableSchema, TypeDef, TypeRef};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::RwLock;

/// The query executor.
#[derive(Debug, Clone)]
pub struct Executor {
    schema: Arc<ExecutableSchema>,
}

impl Executor {
    pub fn new(schema: Arc<ExecutableSchema>) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Arc<ExecutableSchema> {
        &self.schema
    }

    /// Executes a query plan.
    pub async fn execute(&self, plan: &QueryPlan, ctx: &Context) -> Response {
        let exec_ctx = ExecutionContext {
            schema: Arc::clone(&self.schema),
            ctx: ctx.clone(),
            errors: Arc::new(RwLock::new(Vec::new())),
        };

        // Root value is an empty object for Query and Mutation.
        let root_value = Value::Object(Map::new());

        let data = match execute_node(&plan.root, root_value, Vec::new(), &exec_ctx).await {
            Ok(map) => Value::Object(map),
            Err(NullBubble) => Value::Null,
        };

        let errors = std::mem::take(&mut *exec_ctx.errors.write().await);
        let errors = if errors.is_empty() { None } else { Some(errors) };

        Response {
            data: Some(data),
            errors,
        }
    }
}

/// A `null` in a non-null position, travelling up to the nearest nullable
/// parent. The error that caused it has already been recorded.
#[derive(Debug, Clone, Copy)]
struct NullBubble;

type ExecFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, NullBubble>> + Send + 'a>>;

#[derive(Clone)]
struct ExecutionContext {
    schema: Arc<ExecutableSchema>,
    ctx: Context,
    errors: Arc<RwLock<Vec<FieldError>>>,
}

impl ExecutionContext {
    async fn record(&self, error: FieldError) {
        self.errors.write().await.push(error);
    }
}

/// Executes a plan node into the response object it contributes.
fn execute_node<'a>(
    node: &'a PlanNode,
    parent: Value,
    path: Vec<PathSegment>,
    ctx: &'a ExecutionContext,
) -> ExecFuture<'a, Map<String, Value>> {
    Box::pin(async move {
        match node {
            PlanNode::Sequence(nodes) => execute_sequence(nodes, parent, path, ctx).await,
            PlanNode::Parallel(nodes) => execute_parallel(nodes, parent, path, ctx).await,
            PlanNode::Field {
                info,
                response_name,
                children,
            } => {
                let value =
                    execute_field(info, response_name, Some(children), &parent, path, ctx).await?;
                Ok(single(response_name, value))
            }
            PlanNode::Leaf { field } => {
                let key = field.response_key();
                let value = execute_field(field, key, None, &parent, path, ctx).await?;
                Ok(single(key, value))
            }
        }
    })
}

fn single(key: &str, value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    map
}

/// Executes nodes one after another.
async fn execute_sequence(
    nodes: &[PlanNode],
    parent: Value,
    path: Vec<PathSegment>,
    ctx: &ExecutionContext,
) -> Result<Map<String, Value>, NullBubble> {
    let mut result = Map::new();
    for node in nodes {
        let map = execute_node(node, parent.clone(), path.clone(), ctx).await?;
        result.extend(map);
    }
    Ok(result)
}

/// Executes nodes concurrently, merging results in document order.
async fn execute_parallel(
    nodes: &[PlanNode],
    parent: Value,
    path: Vec<PathSegment>,
    ctx: &ExecutionContext,
) -> Result<Map<String, Value>, NullBubble> {
    let mut handles = Vec::with_capacity(nodes.len());

    for node in nodes {
        let parent = parent.clone();
        let path = path.clone();
        let local_ctx = ctx.clone();
        let node = node.clone();

        handles.push(tokio::spawn(async move {
            execute_node(&node, parent, path, &local_ctx).await
        }));
    }

    let mut result = Map::new();
    let mut bubbled = false;

    for (handle, node) in handles.into_iter().zip(nodes) {
        match handle.await {
            Ok(Ok(map)) => result.extend(map),
            Ok(Err(NullBubble)) => bubbled = true,
            Err(e) => {
                tracing::error!(error = %e, "field task failed");
                let Some(info) = node.field_info() else {
                    bubbled = true;
                    continue;
                };
                let mut field_path = path.clone();
                field_path.push(PathSegment::Field(info.response_key().to_string()));
                ctx.record(
                    FieldError::new(INTERNAL_ERROR_MESSAGE)
                        .with_path(field_path)
                        .with_code(codes::INTERNAL_SERVER_ERROR),
                )
                .await;
                if info.return_type.is_non_null() {
                    bubbled = true;
                } else {
                    result.insert(info.response_key().to_string(), Value::Null);
                }
            }
        }
    }

    if bubbled {
        Err(NullBubble)
    } else {
        Ok(result)
    }
}

/// Resolves one field and completes its value against the declared type.
async fn execute_field(
    info: &FieldInfo,
    response_key: &str,
    children: Option<&PlanNode>,
    parent: &Value,
    mut path: Vec<PathSegment>,
    ctx: &ExecutionContext,
) -> Result<Value, NullBubble> {
    path.push(PathSegment::Field(response_key.to_string()));

    if info.is_introspection {
        return Ok(Value::String(info.parent_type.clone()));
    }

    let Some(resolver) = ctx.schema.resolver(&info.parent_type, &info.name) else {
        // Planning only admits declared fields.
        return Ok(parent.get(&info.name).cloned().unwrap_or(Value::Null));
    };

    let args = ResolverArgs::from_pairs(info.arguments.clone());
    let resolver_info = ResolverInfo::new(&info.name, &info.parent_type)
        .with_return_type(info.return_type.clone())
        .with_path(path.clone());

    let (value, failed) = match resolver.resolve(parent, &args, &ctx.ctx, &resolver_info).await {
        Ok(value) => (value, false),
        Err(e) => {
            if e.is_infrastructure() {
                tracing::error!(
                    error = %e,
                    field = %format!("{}.{}", info.parent_type, info.name),
                    "data source failure"
                );
            } else {
                tracing::debug!(error = %e, field = %info.name, "resolver returned an error");
            }
            let error = FieldError::from(e)
                .with_path(path.clone())
                .with_locations(info.location);
            ctx.record(error).await;
            (Value::Null, true)
        }
    };

    complete_value(&info.return_type, value, children, path, ctx, info, failed).await
}

/// Completes a resolved value. Nullable positions absorb a bubbling null.
fn complete_value<'a>(
    ty: &'a TypeRef,
    value: Value,
    children: Option<&'a PlanNode>,
    path: Vec<PathSegment>,
    ctx: &'a ExecutionContext,
    info: &'a FieldInfo,
    already_reported: bool,
) -> ExecFuture<'a, Value> {
    Box::pin(async move {
        if let TypeRef::NonNull(inner) = ty {
            if value.is_null() {
                if !already_reported {
                    let message = format!(
                        "Cannot return null for non-nullable field {}.{}.",
                        info.parent_type, info.name
                    );
                    ctx.record(
                        FieldError::new(message)
                            .with_path(path)
                            .with_locations(info.location),
                    )
                    .await;
                }
                return Err(NullBubble);
            }
            return complete_inner(inner, value, children, path, ctx, info).await;
        }

        if value.is_null() {
            return Ok(Value::Null);
        }
        Ok(complete_inner(ty, value, children, path, ctx, info)
            .await
            .unwrap_or(Value::Null))
    })
}

fn complete_inner<'a>(
    ty: &'a TypeRef,
    value: Value,
    children: Option<&'a PlanNode>,
    path: Vec<PathSegment>,
    ctx: &'a ExecutionContext,
    info: &'a FieldInfo,
) -> ExecFuture<'a, Value> {
    Box::pin(async move {
        let invalid = |message: String, path: Vec<PathSegment>| {
            FieldError::new(message)
                .with_path(path)
                .with_locations(info.location)
        };

        match ty {
            TypeRef::NonNull(inner) => {
                complete_value(inner, value, children, path, ctx, info, false).await
            }
            TypeRef::List(item_ty) => {
                let Value::Array(items) = value else {
                    let message = format!(
                        "Expected a list for field {}.{}.",
                        info.parent_type, info.name
                    );
                    ctx.record(invalid(message, path)).await;
                    return Err(NullBubble);
                };
                let mut completed = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    let mut item_path = path.clone();
                    item_path.push(PathSegment::Index(i));
                    completed.push(
                        complete_value(item_ty, item, children, item_path, ctx, info, false).await?,
                    );
                }
                Ok(Value::Array(completed))
            }
            TypeRef::Named(name) => match ctx.schema.schema().get_type(name) {
                Some(TypeDef::Object(_)) => {
                    let Some(children) = children else {
                        return Ok(value);
                    };
                    if !value.is_object() {
                        let message = format!(
                            "Expected an object of type {name} for field {}.{}.",
                            info.parent_type, info.name
                        );
                        ctx.record(invalid(message, path)).await;
                        return Err(NullBubble);
                    }
                    execute_node(children, value, path, ctx)
                        .await
                        .map(Value::Object)
                }
                Some(TypeDef::Scalar(_)) => match coerce_output(name, value) {
                    Ok(value) => Ok(value),
                    Err(message) => {
                        ctx.record(invalid(message, path)).await;
                        Err(NullBubble)
                    }
                },
                _ => Ok(value),
            },
        }
    })
}

/// Serializes a resolved value as a built-in scalar.
#[allow(clippy::cast_possible_truncation)]
fn coerce_output(scalar: &str, value: Value) -> Result<Value, String> {
    let coerced = match (scalar, &value) {
        ("Int", Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .filter(|i| i32::try_from(*i).is_ok())
            .map(Value::from),
        ("Float", Value::Number(_))
        | ("String", Value::String(_))
        | ("Boolean", Value::Bool(_))
        | ("ID", Value::String(_)) => Some(value.clone()),
        ("String", Value::Number(n)) => Some(Value::String(n.to_string())),
        ("String", Value::Bool(b)) => Some(Value::String(b.to_string())),
        ("ID", Value::Number(n)) if n.is_i64() || n.is_u64() => Some(Value::String(n.to_string())),
        ("Int" | "Float" | "String" | "Boolean" | "ID", _) => None,
        _ => Some(value.clone()),
    };
    coerced.ok_or_else(|| format!("{scalar} cannot represent value: {value}"))
}

/// A position in a GraphQL document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl From<crudql_core::LineCol> for Location {
    fn from(lc: crudql_core::LineCol) -> Self {
        Self {
            line: lc.line,
            column: lc.column,
        }
    }
}

/// A GraphQL error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    /// The error message.
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<Location>>,
    /// The path to the field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PathSegment>>,
    /// Error extensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<HashMap<String, Value>>,
}

/// A path segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(s: &str) -> Self {
        Self::Field(s.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(i: usize) -> Self {
        Self::Index(i)
    }
}

impl FieldError {
    /// Creates a new field error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: None,
            path: None,
            extensions: None,
        }
    }

    /// Adds a path to the error.
    #[must_use]
    pub fn with_path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = Some(path);
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: Location) -> Self {
        self.locations.get_or_insert_with(Vec::new).push(location);
        self
    }

    #[must_use]
    pub fn with_locations(self, location: Option<Location>) -> Self {
        match location {
            Some(location) => self.with_location(location),
            None => self,
        }
    }

    /// Adds an extension.
    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extensions
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }

    /// Sets the error code extension.
    #[must_use]
    pub fn with_code(self, code: impl Into<String>) -> Self {
        self.with_extension("code", Value::String(code.into()))
    }

    /// The `extensions.code` value, if set.
    pub fn code(&self) -> Option<&str> {
        self.extensions.as_ref()?.get("code")?.as_str()
    }
}

/// A GraphQL response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// The data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// The errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

impl Response {
    /// Creates a successful response with data.
    pub fn data(data: Value) -> Self {
        Self {
            data: Some(data),
            errors: None,
        }
    }

    /// Creates an error response.
    pub fn error(error: FieldError) -> Self {
        Self::errors(vec![error])
    }

    /// Creates an error response with multiple errors.
    pub fn errors(errors: Vec<FieldError>) -> Self {
        Self {
            data: None,
            errors: Some(errors),
        }
    }

    /// Returns true if the response has errors.
    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().is_some_and(|e| !e.is_empty())
    }

    /// Returns true if the response has data.
    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// Error messages, in the order they were recorded.
    pub fn error_messages(&self) -> Vec<&str> {
        self.errors
            .iter()
            .flatten()
            .map(|e| e.message.as_str())
            .collect()
    }
}
