//! Storage layout of the blog entities.

use crudql_runtime::model::{DataModel, ModelDef, ModelField, Relation, ScalarType};

/// `User`, `Post` and `Profile`, with their columns and relations.
///
/// Posts reference their author through `author_id`; a profile references
/// its user through the unique `user_id`.
#[must_use]
pub fn blog_model() -> DataModel {
    DataModel::new()
        .model(
            ModelDef::new("User")
                .field(ModelField::id("id"))
                .field(ModelField::new("email", ScalarType::String).required().unique())
                .field(ModelField::new("name", ScalarType::String))
                .relation("posts", Relation::many("Post", "author_id"))
                .relation("profile", Relation::one_reverse("Profile", "user_id")),
        )
        .model(
            ModelDef::new("Post")
                .field(ModelField::id("id"))
                .field(ModelField::new("title", ScalarType::String).required())
                .field(ModelField::new("content", ScalarType::String))
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
        .model(
            ModelDef::new("Profile")
                .field(ModelField::id("id"))
                .field(ModelField::new("bio", ScalarType::String))
                .field(
                    ModelField::new("userId", ScalarType::Int)
                        .column("user_id")
                        .required()
                        .unique(),
                )
                .relation("user", Relation::belongs_to("User", "user_id")),
        )
}
