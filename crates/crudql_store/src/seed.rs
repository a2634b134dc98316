//! Sample data.

use crate::MemoryStore;
use crudql_runtime::crud::CrudPlugin;
use crudql_runtime::datasource::Record;
use crudql_runtime::resolver::ResolverError;
use serde_json::{json, Map, Value};
use tracing::info;

/// Creates Alice together with her first post and her profile, through the
/// same nested create the `createOneUser` mutation runs.
pub async fn seed(store: &MemoryStore) -> Result<Record, ResolverError> {
    let data = json!({
        "name": "Alice",
        "email": "alice@prisma.io",
        "posts": {
            "create": { "title": "Hello World" }
        },
        "profile": {
            "create": { "bio": "I like turtles" }
        }
    });
    let data: Map<String, Value> =
        serde_json::from_value(data).map_err(|e| ResolverError::Custom(e.to_string()))?;

    let user = CrudPlugin::new()
        .create(store.model(), "User", &data, store)
        .await?;
    let posts = store.count("Post").await;
    let profiles = store.count("Profile").await;
    info!(posts, profiles, "store seeded");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blog_model;
    use crudql_runtime::datasource::{DataSource, Filter};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_seed() {
        let store = MemoryStore::new(Arc::new(blog_model()));
        let alice = seed(&store).await.unwrap();
        assert_eq!(alice["email"], json!("alice@prisma.io"));

        let posts = store
            .find_many("Post", Some(&Filter::eq("author_id", alice["id"].clone())))
            .await
            .unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0]["title"], json!("Hello World"));
        assert_eq!(posts[0]["published"], json!(false));

        let profile = store
            .find_one("Profile", &Filter::eq("user_id", alice["id"].clone()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile["bio"], json!("I like turtles"));
    }

    #[tokio::test]
    async fn test_seed_twice_violates_unique_email() {
        let store = MemoryStore::new(Arc::new(blog_model()));
        seed(&store).await.unwrap();
        let err = seed(&store).await.unwrap_err();
        assert!(!err.is_infrastructure());
        assert_eq!(store.count("User").await, 1);
    }
}
