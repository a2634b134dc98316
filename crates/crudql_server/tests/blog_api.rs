use common::CountingStore;
use crudql_runtime::resolver::{codes, INTERNAL_ERROR_MESSAGE};
use crudql_runtime::{ContextFactory, DataSource, GraphQLRequest, PathSegment, Response, Session};
use crudql_server::schema::build_schema;
use crudql_server::{RequestPipeline, ServerConfig};
use crudql_store::{blog_model, seed, MemoryStore};
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use std::sync::Arc;

mod common;

struct Api {
    store: Arc<MemoryStore>,
    pipeline: Arc<RequestPipeline>,
}

impl Api {
    fn empty() -> Self {
        let store = Arc::new(MemoryStore::new(Arc::new(blog_model())));
        Self::with_source(Arc::clone(&store), store)
    }

    async fn seeded() -> Self {
        let api = Self::empty();
        seed(&api.store).await.unwrap();
        api
    }

    fn with_source(store: Arc<MemoryStore>, source: Arc<dyn DataSource>) -> Self {
        let pipeline = RequestPipeline::new(
            Arc::new(build_schema().unwrap()),
            ContextFactory::new(source),
            Arc::new(ServerConfig::default()),
        );
        Self {
            store,
            pipeline: Arc::new(pipeline),
        }
    }

    async fn run(&self, query: &str) -> Response {
        self.pipeline
            .handle(GraphQLRequest::new(query), Session::anonymous())
            .await
    }

    async fn run_with(&self, query: &str, variables: Value) -> Response {
        let Value::Object(variables) = variables else {
            panic!("variables must be an object");
        };
        let request = GraphQLRequest::new(query).variables(variables);
        self.pipeline.handle(request, Session::anonymous()).await
    }
}

fn single_error(response: &Response) -> &crudql_runtime::FieldError {
    let errors = response.errors.as_ref().expect("expected errors");
    assert_eq!(errors.len(), 1, "{errors:?}");
    &errors[0]
}

#[tokio::test]
async fn create_then_read_user() {
    let api = Api::empty();

    let created = api
        .run(r#"mutation { createOneUser(data: {email: "bob@example.com", name: "Bob"}) { id email name } }"#)
        .await;
    assert!(created.errors.is_none(), "{:?}", created.errors);
    assert_eq!(
        created.data,
        Some(json!({"createOneUser": {"id": 1, "email": "bob@example.com", "name": "Bob"}}))
    );

    let read = api.run("{ users { id email name } }").await;
    assert_eq!(
        read.data,
        Some(json!({"users": [{"id": 1, "email": "bob@example.com", "name": "Bob"}]}))
    );
}

#[tokio::test]
async fn create_then_read_post_and_profile() {
    let api = Api::empty();
    api.run(r#"mutation { createOneUser(data: {email: "bob@example.com"}) { id } }"#)
        .await;

    let post = api
        .run(
            r#"mutation {
                createOnePost(data: {title: "Draft", author: {connect: {id: 1}}}) {
                    id title content published authorId author { email }
                }
            }"#,
        )
        .await;
    assert!(post.errors.is_none(), "{:?}", post.errors);
    assert_eq!(
        post.data,
        Some(json!({"createOnePost": {
            "id": 1,
            "title": "Draft",
            "content": null,
            "published": false,
            "authorId": 1,
            "author": {"email": "bob@example.com"}
        }}))
    );

    let profile = api
        .run(r#"mutation { createOneProfile(data: {bio: "Hi", userId: 1}) { id bio userId user { email } } }"#)
        .await;
    assert!(profile.errors.is_none(), "{:?}", profile.errors);
    assert_eq!(
        profile.data,
        Some(json!({"createOneProfile": {
            "id": 1, "bio": "Hi", "userId": 1, "user": {"email": "bob@example.com"}
        }}))
    );

    let read = api
        .run("{ posts { title } profiles { bio } users { posts { id } profile { id } } }")
        .await;
    assert_eq!(
        read.data,
        Some(json!({
            "posts": [{"title": "Draft"}],
            "profiles": [{"bio": "Hi"}],
            "users": [{"posts": [{"id": 1}], "profile": {"id": 1}}]
        }))
    );
}

#[tokio::test]
async fn post_by_id_found() {
    let api = Api::seeded().await;
    let response = api
        .run("{ post(id: 1) { id title published author { name } } }")
        .await;

    assert!(response.errors.is_none());
    assert_eq!(
        response.data,
        Some(json!({"post": {
            "id": 1, "title": "Hello World", "published": false, "author": {"name": "Alice"}
        }}))
    );
}

#[tokio::test]
async fn post_by_id_not_found() {
    let api = Api::seeded().await;
    let response = api.run("{ post(id: 42) { id title } }").await;

    assert_eq!(response.data, Some(json!({"post": null})));
    let error = single_error(&response);
    assert_eq!(error.message, r#"No post with id of "42""#);
    assert_eq!(error.path, Some(vec![PathSegment::from("post")]));
    assert_eq!(error.code(), Some(codes::NOT_FOUND));
}

#[tokio::test]
async fn delete_then_read() {
    let api = Api::seeded().await;

    let deleted = api
        .run("mutation { deleteOnePost(where: {id: 1}) { id title } }")
        .await;
    assert_eq!(
        deleted.data,
        Some(json!({"deleteOnePost": {"id": 1, "title": "Hello World"}}))
    );

    let read = api.run("{ post(id: 1) { id } }").await;
    assert_eq!(read.error_messages(), vec![r#"No post with id of "1""#]);

    let again = api
        .run("mutation { deleteOnePost(where: {id: 1}) { id } }")
        .await;
    assert_eq!(again.data, Some(json!({"deleteOnePost": null})));
    assert_eq!(
        again.error_messages(),
        vec![r#"No post found for where: {"id":1}"#]
    );
}

#[tokio::test]
async fn referenced_user_cannot_be_deleted() {
    let api = Api::seeded().await;

    let blocked = api
        .run("mutation { deleteOneUser(where: {id: 1}) { id } }")
        .await;
    assert_eq!(blocked.data, Some(json!({"deleteOneUser": null})));
    let error = single_error(&blocked);
    assert_eq!(error.code(), Some(codes::CONSTRAINT_VIOLATION));
    assert!(error.message.starts_with("Foreign key constraint failed"));

    api.run("mutation { deleteOnePost(where: {id: 1}) { id } deleteOneProfile(where: {id: 1}) { id } }")
        .await;
    let deleted = api
        .run(r#"mutation { deleteOneUser(where: {email: "alice@prisma.io"}) { name } }"#)
        .await;
    assert_eq!(deleted.data, Some(json!({"deleteOneUser": {"name": "Alice"}})));
    assert_eq!(api.run("{ users { id } }").await.data, Some(json!({"users": []})));
}

#[tokio::test]
async fn nested_create_points_back_to_owner() {
    let api = Api::empty();
    let created = api
        .run(
            r#"mutation {
                createOneUser(data: {
                    email: "u@example.com"
                    name: "U"
                    posts: {create: [{title: "First"}]}
                    profile: {create: {bio: "hi"}}
                }) {
                    id
                    posts { title author { email } }
                    profile { bio user { id } }
                }
            }"#,
        )
        .await;

    assert!(created.errors.is_none(), "{:?}", created.errors);
    assert_eq!(
        created.data,
        Some(json!({"createOneUser": {
            "id": 1,
            "posts": [{"title": "First", "author": {"email": "u@example.com"}}],
            "profile": {"bio": "hi", "user": {"id": 1}}
        }}))
    );

    let users = api.run("{ users { id posts { id authorId } } }").await;
    assert_eq!(
        users.data,
        Some(json!({"users": [{"id": 1, "posts": [{"id": 1, "authorId": 1}]}]}))
    );
}

#[tokio::test]
async fn failed_nested_create_writes_nothing() {
    let api = Api::seeded().await;
    let cases = [
        (
            r#"mutation { createOneUser(data: {email: "z@x.io", posts: {connect: [{id: 999}]}}) { id } }"#,
            codes::NOT_FOUND,
        ),
        (
            r#"mutation { createOneUser(data: {email: "y@x.io", posts: {create: [{title: "t"}], connect: [{id: 999}]}}) { id } }"#,
            codes::NOT_FOUND,
        ),
        (
            r#"mutation { createOneUser(data: {email: "y@x.io", profile: {create: {bio: "b", userId: 5}}}) { id } }"#,
            codes::BAD_USER_INPUT,
        ),
        (
            r#"mutation { createOneUser(data: {email: "w@x.io", profile: {create: {bio: "b"}, connect: {id: 1}}}) { id } }"#,
            codes::BAD_USER_INPUT,
        ),
        (
            r#"mutation { createOnePost(data: {title: "t", author: {connect: {email: "nobody@x.io"}}}) { id } }"#,
            codes::NOT_FOUND,
        ),
    ];

    for (query, code) in cases {
        let response = api.run(query).await;
        assert_eq!(response.data, Some(Value::Null), "{query}");
        assert_eq!(single_error(&response).code(), Some(code), "{query}");
        assert_eq!(api.store.count("User").await, 1, "{query}");
        assert_eq!(api.store.count("Post").await, 1, "{query}");
        assert_eq!(api.store.count("Profile").await, 1, "{query}");
    }

    let connected = api
        .run(r#"mutation { createOneUser(data: {email: "v@x.io", posts: {connect: [{id: 1}]}}) { id posts { id } } }"#)
        .await;
    assert!(connected.errors.is_none(), "{:?}", connected.errors);
    assert_eq!(
        connected.data,
        Some(json!({"createOneUser": {"id": 2, "posts": [{"id": 1}]}}))
    );
}

#[tokio::test]
async fn deeply_nested_document_is_an_error() {
    let api = Api::seeded().await;
    let query = format!(
        "{{ post(id: {}1{}) {{ id }} }}",
        "[".repeat(50_000),
        "]".repeat(50_000)
    );

    let response = api.run(&query).await;

    assert_eq!(response.data, None);
    let error = single_error(&response);
    assert!(error.message.contains("nesting exceeds 128 levels"), "{}", error.message);
}

#[tokio::test]
async fn update_one() {
    let api = Api::seeded().await;

    let updated = api
        .run(r#"mutation { updateOneUser(where: {email: "alice@prisma.io"}, data: {name: "Alicia"}) { id name } }"#)
        .await;
    assert_eq!(
        updated.data,
        Some(json!({"updateOneUser": {"id": 1, "name": "Alicia"}}))
    );

    let missing = api
        .run(r#"mutation { updateOneUser(where: {id: 9}, data: {name: "x"}) { id } }"#)
        .await;
    assert_eq!(missing.data, Some(json!({"updateOneUser": null})));
    assert_eq!(
        missing.error_messages(),
        vec![r#"No user found for where: {"id":9}"#]
    );
}

#[tokio::test]
async fn unique_violation_nulls_non_null_root() {
    let api = Api::seeded().await;
    let response = api
        .run(r#"mutation { createOneUser(data: {email: "alice@prisma.io"}) { id } }"#)
        .await;

    // `createOneUser` is non-null, so the whole payload is null.
    assert_eq!(response.data, Some(Value::Null));
    let error = single_error(&response);
    assert_eq!(error.code(), Some(codes::CONSTRAINT_VIOLATION));
    assert_eq!(api.store.count("User").await, 1);
}

#[tokio::test]
async fn variables_fragments_and_aliases() {
    let api = Api::seeded().await;
    let query = r#"
        query Feed($id: Int!) {
            first: post(id: $id) { ...PostFields }
            all: posts { ...PostFields }
        }

        fragment PostFields on Post {
            id
            headline: title
            __typename
        }
    "#;

    let response = api.run_with(query, json!({"id": 1})).await;
    assert!(response.errors.is_none(), "{:?}", response.errors);
    let post = json!({"id": 1, "headline": "Hello World", "__typename": "Post"});
    assert_eq!(response.data, Some(json!({"first": post, "all": [post]})));

    let missing = api.run_with(query, json!({})).await;
    assert!(!missing.has_data());
    assert_eq!(
        missing.error_messages(),
        vec![r#"Variable "$id" of required type "Int!" was not provided."#]
    );
    assert_eq!(single_error(&missing).code(), Some(codes::BAD_USER_INPUT));
}

#[tokio::test]
async fn root_typename() {
    let api = Api::empty();
    let response = api.run("{ __typename }").await;
    assert_eq!(response.data, Some(json!({"__typename": "Query"})));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_matches_serial() {
    let api = Api::seeded().await;
    for i in 0..5 {
        api.run(&format!(
            r#"mutation {{ createOneUser(data: {{email: "user{i}@example.com", posts: {{create: [{{title: "Post {i}"}}]}}}}) {{ id }} }}"#
        ))
        .await;
    }

    let users = api.run("{ users { id email posts { title } } }").await;
    let posts = api.run("{ posts { id title author { email } } }").await;
    let mut serial = users.data.unwrap();
    serial
        .as_object_mut()
        .unwrap()
        .extend(posts.data.unwrap().as_object().unwrap().clone());

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let pipeline = Arc::clone(&api.pipeline);
            tokio::spawn(async move {
                pipeline
                    .handle(
                        GraphQLRequest::new(
                            "{ users { id email posts { title } } posts { id title author { email } } }",
                        ),
                        Session::anonymous(),
                    )
                    .await
            })
        })
        .collect();

    for handle in handles {
        let response = handle.await.unwrap();
        assert!(response.errors.is_none());
        assert_eq!(response.data.as_ref(), Some(&serial));
    }
}

#[tokio::test]
async fn unavailable_store_is_not_not_found() {
    let api = Api::seeded().await;
    api.store.set_available(false);

    let response = api.run("{ post(id: 1) { id } }").await;
    assert_eq!(response.data, Some(json!({"post": null})));
    let error = single_error(&response);
    assert_eq!(error.message, INTERNAL_ERROR_MESSAGE);
    assert_eq!(error.code(), Some(codes::INTERNAL_SERVER_ERROR));

    // `users` is non-null, so the failure nulls the whole payload.
    let response = api.run("{ users { id } }").await;
    assert_eq!(response.data, Some(Value::Null));
    assert_eq!(response.error_messages(), vec![INTERNAL_ERROR_MESSAGE]);

    api.store.set_available(true);
    assert!(api.run("{ post(id: 1) { id } }").await.errors.is_none());
}

#[tokio::test]
async fn rejected_requests_touch_no_data() {
    let store = Arc::new(MemoryStore::new(Arc::new(blog_model())));
    let counting = Arc::new(CountingStore::new(Arc::clone(&store)));
    let api = Api::with_source(store, counting.clone());

    let parse = api.run("{ users { id }").await;
    assert!(!parse.has_data());
    assert_eq!(single_error(&parse).code(), Some(codes::GRAPHQL_PARSE_FAILED));

    let validation = api.run("{ users { nope } }").await;
    assert!(!validation.has_data());
    assert_eq!(
        single_error(&validation).code(),
        Some(codes::GRAPHQL_VALIDATION_FAILED)
    );

    let wrong_arg = api.run(r#"{ post(id: "one") { id } }"#).await;
    assert!(!wrong_arg.has_data());

    assert_eq!(counting.calls.load(Ordering::SeqCst), 0);

    let ok = api.run("{ users { id } }").await;
    assert_eq!(ok.data, Some(json!({"users": []})));
    assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn contexts_share_one_datasource() {
    let api = Api::empty();
    let first = api.pipeline.contexts().create(Session::anonymous());
    let second = api.pipeline.contexts().create(Session::anonymous());

    assert!(Arc::ptr_eq(&first.datasource_handle(), &second.datasource_handle()));
    assert_eq!(
        Arc::as_ptr(&first.datasource_handle()).cast::<()>(),
        Arc::as_ptr(&api.store).cast::<()>()
    );
}
