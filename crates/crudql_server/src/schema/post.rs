use crudql_runtime::{ObjectType, Relation};

pub fn object() -> ObjectType {
    ObjectType::new("Post")
        .field("id", "Int!")
        .field("title", "String!")
        .field("content", "String")
        .field("published", "Boolean!")
        .source_field("authorId", "Int!", "author_id")
        .relation("author", "User!", Relation::belongs_to("User", "author_id"))
}
