use crudql_runtime::{ObjectType, Relation};

pub fn object() -> ObjectType {
    ObjectType::new("Profile")
        .field("id", "Int!")
        .field("bio", "String")
        .source_field("userId", "Int!", "user_id")
        .relation("user", "User!", Relation::belongs_to("User", "user_id"))
}
