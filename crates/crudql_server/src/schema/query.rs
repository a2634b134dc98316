use crudql_runtime::{
    AsyncFnResolver, Context, CrudMarker, Field, Filter, ResolverError, ResolverResult, Returns,
    RootType,
};
use serde_json::Value;

/// `users`, `posts` and `profiles` from the CRUD plugin, plus `post(id)`.
pub fn root() -> RootType {
    RootType::query()
        .crud(CrudMarker::find_many("User"))
        .crud(CrudMarker::find_many("Post"))
        .crud(CrudMarker::find_many("Profile"))
        .add_field(
            Field::new("post", "Post")
                .description("A single post by id.")
                .argument("id", "Int!")
                .resolve(
                    Returns::one("Post"),
                    AsyncFnResolver::new(|_, args, ctx, _| async move {
                        let id: i64 = args.require("id")?;
                        post_by_id(&ctx, id).await
                    }),
                ),
        )
}

/// Fetches one post. A missing post is an error rather than `null`;
/// data source failures pass through untouched.
pub async fn post_by_id(ctx: &Context, id: i64) -> ResolverResult {
    let filter = Filter::eq("id", id);
    match ctx.datasource().find_one("Post", &filter).await? {
        Some(post) => Ok(Value::Object(post)),
        None => Err(ResolverError::NotFound(format!("No post with id of \"{id}\""))),
    }
}
