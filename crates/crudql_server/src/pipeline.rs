//! Request pipeline.
//!
//! Every GraphQL request moves through the same states:
//! `received -> parsed -> validated -> executing -> responded`.
//! A request that fails to parse or validate is answered with errors only and
//! never reaches a resolver.

use crate::config::ServerConfig;
use crudql_runtime::query::OperationType;
use crudql_runtime::resolver::codes;
use crudql_runtime::{
    prepare, ContextFactory, ExecutableSchema, Executor, Extensions, FieldError, GraphQLRequest,
    RequestError, Response, Session,
};
use serde_json::Map;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, Instrument};

/// Sequence number of a request within this process. Available to resolvers
/// through `Context::get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestId(pub u64);

/// Message returned when a mutation arrives over `GET`.
pub const MUTATION_OVER_GET: &str = "Mutations can only be sent with a POST request.";

/// Turns a [`GraphQLRequest`] plus session into a [`Response`].
pub struct RequestPipeline {
    schema: Arc<ExecutableSchema>,
    executor: Executor,
    contexts: ContextFactory,
    config: Arc<ServerConfig>,
    next_id: AtomicU64,
}

impl RequestPipeline {
    pub fn new(
        schema: Arc<ExecutableSchema>,
        contexts: ContextFactory,
        config: Arc<ServerConfig>,
    ) -> Self {
        Self {
            executor: Executor::new(Arc::clone(&schema)),
            schema,
            contexts,
            config,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn schema(&self) -> &Arc<ExecutableSchema> {
        &self.schema
    }

    pub fn contexts(&self) -> &ContextFactory {
        &self.contexts
    }

    pub fn config(&self) -> &Arc<ServerConfig> {
        &self.config
    }

    /// Handles a request of any operation type.
    pub async fn handle(&self, request: GraphQLRequest, session: Session) -> Response {
        self.run(request, session, false).await
    }

    /// Handles a request that must not mutate, as sent with `GET`.
    pub async fn handle_read_only(&self, request: GraphQLRequest, session: Session) -> Response {
        self.run(request, session, true).await
    }

    async fn run(&self, request: GraphQLRequest, session: Session, read_only: bool) -> Response {
        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let span = tracing::debug_span!("request", id = id.0);
        self.process(id, request, session, read_only)
            .instrument(span)
            .await
    }

    async fn process(
        &self,
        id: RequestId,
        request: GraphQLRequest,
        session: Session,
        read_only: bool,
    ) -> Response {
        trace!(state = "received", operation = ?request.operation_name, "request");

        let empty = Map::new();
        let variables = request.variables.as_ref().unwrap_or(&empty);
        let plan = match prepare(
            &self.schema,
            &request.query,
            request.operation_name.as_deref(),
            variables,
        ) {
            Ok(plan) => plan,
            Err(error) => {
                let state = match &error {
                    RequestError::Parse(_) => "received",
                    _ => "parsed",
                };
                debug!(state, error = %error, "request rejected");
                return error.into_response();
            }
        };
        debug!(
            state = "validated",
            kind = plan.operation_kind.as_str(),
            "request"
        );

        if read_only && plan.operation_kind == OperationType::Mutation {
            debug!(state = "validated", "mutation rejected on read-only transport");
            let error = FieldError::new(MUTATION_OVER_GET).with_code(codes::BAD_USER_INPUT);
            return Response::error(error);
        }

        let mut extensions = Extensions::new();
        extensions.insert(id);
        let ctx = self.contexts.create_with(session, extensions);

        trace!(state = "executing", "request");
        let response = self.executor.execute(&plan, &ctx).await;
        debug!(
            state = "responded",
            errors = response.errors.as_ref().map_or(0, Vec::len),
            "request"
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crudql_runtime::{AsyncFnResolver, Field, Returns, RootType, SchemaBuilder};
    use crudql_store::{blog_model, MemoryStore};
    use serde_json::{json, Value};

    fn pipeline() -> RequestPipeline {
        let schema = SchemaBuilder::new()
            .query(
                RootType::query()
                    .add_field(Field::new("hello", "String!").resolve(
                        Returns::one("String"),
                        AsyncFnResolver::new(|_, _, ctx, _| async move {
                            let id = ctx.get::<RequestId>().map_or(0, |id| id.0);
                            let who = ctx.session().id().unwrap_or("anonymous").to_string();
                            Ok(json!(format!("hello {who} #{id}")))
                        }),
                    )),
            )
            .mutation(RootType::mutation().add_field(
                Field::new("noop", "Boolean!").resolve(
                    Returns::one("Boolean"),
                    AsyncFnResolver::new(|_, _, _, _| async { Ok(Value::Bool(true)) }),
                ),
            ))
            .build()
            .unwrap();
        let store = Arc::new(MemoryStore::new(Arc::new(blog_model())));
        RequestPipeline::new(
            Arc::new(schema),
            ContextFactory::new(store),
            Arc::new(ServerConfig::default()),
        )
    }

    #[tokio::test]
    async fn test_request_ids_and_session() {
        let pipeline = pipeline();
        let first = pipeline
            .handle(GraphQLRequest::new("{ hello }"), Session::anonymous())
            .await;
        let second = pipeline
            .handle(
                GraphQLRequest::new("{ hello }"),
                Session::new("s1", Map::new()),
            )
            .await;

        assert_eq!(first.data, Some(json!({"hello": "hello anonymous #1"})));
        assert_eq!(second.data, Some(json!({"hello": "hello s1 #2"})));
    }

    #[tokio::test]
    async fn test_parse_error_has_no_data() {
        let response = pipeline()
            .handle(GraphQLRequest::new("{ hello"), Session::anonymous())
            .await;

        assert!(!response.has_data());
        let errors = response.errors.unwrap();
        assert_eq!(errors[0].code(), Some(codes::GRAPHQL_PARSE_FAILED));
    }

    #[tokio::test]
    async fn test_read_only_rejects_mutation() {
        let pipeline = pipeline();
        let response = pipeline
            .handle_read_only(GraphQLRequest::new("mutation { noop }"), Session::anonymous())
            .await;
        assert_eq!(response.error_messages(), vec![MUTATION_OVER_GET]);
        assert!(!response.has_data());

        let response = pipeline
            .handle(GraphQLRequest::new("mutation { noop }"), Session::anonymous())
            .await;
        assert_eq!(response.data, Some(json!({"noop": true})));
    }
}
