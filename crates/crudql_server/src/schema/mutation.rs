use crudql_runtime::{CrudMarker, RootType};

const ENTITIES: [&str; 3] = ["User", "Post", "Profile"];

/// `createOne*`, `deleteOne*` and `updateOne*` for every entity.
pub fn root() -> RootType {
    ENTITIES.iter().fold(RootType::mutation(), |root, entity| {
        root.crud(CrudMarker::create_one(*entity))
            .crud(CrudMarker::delete_one(*entity))
            .crud(CrudMarker::update_one(*entity))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markers() {
        let names: Vec<_> = root().markers.iter().map(CrudMarker::field_name).collect();
        assert_eq!(
            names,
            vec![
                "createOneUser",
                "deleteOneUser",
                "updateOneUser",
                "createOnePost",
                "deleteOnePost",
                "updateOnePost",
                "createOneProfile",
                "deleteOneProfile",
                "updateOneProfile",
            ]
        );
    }
}
