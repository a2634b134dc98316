//! Runtime for crudql.
//!
//! This crate provides the schema and execution runtime:
//! - `datasource`: The data source adapter contract
//! - `model`: Storage shape of entities
//! - `context`: Request-scoped context and its factory
//! - `entity`: Object and root type declarations
//! - `crud`: CRUD field derivation from the data model
//! - `schema`: Schema building and validation
//! - `query`: Request validation and planning
//! - `executor`: Query execution

pub mod context;
pub mod crud;
pub mod datasource;
pub mod entity;
pub mod executor;
pub mod model;
pub mod query;
pub mod resolver;
pub mod schema;

pub use context::{Context, ContextFactory, Extensions, Session};
pub use crud::{CrudMarker, CrudOperation, CrudPlugin};
pub use datasource::{DataSource, DataSourceError, DataSourceResult, Filter, Record};
pub use entity::{Field, FieldResolution, ObjectType, ResolutionKind, Returns, RootType};
pub use executor::{Executor, FieldError, Location, PathSegment, Response};
pub use model::{DataModel, ModelDef, ModelField, Relation, RelationKind, ScalarType};
pub use query::{prepare, PlanNode, QueryPlan, RequestError};
pub use resolver::{
    AsyncFnResolver, FnResolver, Resolver, ResolverArgs, ResolverError, ResolverInfo,
    ResolverResult,
};
pub use schema::{ExecutableSchema, Schema, SchemaBuilder, SchemaError, TypeDef, TypeRef};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// A GraphQL request as sent over the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphQLRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Map<String, Value>>,
    #[serde(default, rename = "operationName", skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
}

impl GraphQLRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables = Some(variables);
        self
    }

    #[must_use]
    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }
}

/// Prepares and executes one request. A request that fails to parse or
/// validate yields an errors-only response and runs no resolver.
pub async fn execute(
    schema: &Arc<ExecutableSchema>,
    request: &GraphQLRequest,
    ctx: &Context,
) -> Response {
    let empty = Map::new();
    let variables = request.variables.as_ref().unwrap_or(&empty);
    let plan = match prepare(
        schema,
        &request.query,
        request.operation_name.as_deref(),
        variables,
    ) {
        Ok(plan) => plan,
        Err(e) => {
            tracing::debug!(error = %e, "request rejected");
            return e.into_response();
        }
    };
    Executor::new(Arc::clone(schema)).execute(&plan, ctx).await
}
