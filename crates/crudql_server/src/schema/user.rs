use crudql_runtime::{ObjectType, Relation};

pub fn object() -> ObjectType {
    ObjectType::new("User")
        .field("id", "Int!")
        .field("email", "String!")
        .field("name", "String")
        .relation("posts", "[Post!]!", Relation::many("Post", "author_id"))
        .relation("profile", "Profile", Relation::one_reverse("Profile", "user_id"))
}
