//! The blog schema: `User`, `Post` and `Profile` with CRUD roots.

pub mod mutation;
pub mod post;
pub mod profile;
pub mod query;
pub mod user;

use crudql_runtime::{CrudPlugin, ExecutableSchema, SchemaBuilder, SchemaError};
use crudql_store::blog_model;

/// All declarations, ready to build.
pub fn builder() -> SchemaBuilder {
    SchemaBuilder::new()
        .model(blog_model())
        .object(user::object())
        .object(post::object())
        .object(profile::object())
        .query(query::root())
        .mutation(mutation::root())
        .plugin(CrudPlugin::new())
}

/// Builds the blog schema.
pub fn build_schema() -> Result<ExecutableSchema, SchemaError> {
    builder().build()
}
