//! HTTP transport.
//!
//! Routes:
//! - `POST <endpoint>`: GraphQL queries and mutations (JSON body)
//! - `GET <endpoint>?query=...`: GraphQL queries
//! - `OPTIONS <endpoint>`: CORS preflight
//! - `GET /health`: health check
//!
//! Each accepted connection is served on its own task.

use crate::error::{ServerError, ServerResult};
use crate::pipeline::RequestPipeline;
use crate::session::SessionStore;
use bytes::Bytes;
use crudql_runtime::{FieldError, GraphQLRequest, Response as GraphQLResponse};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Incoming};
use hyper::header::{self, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use serde_json::{Map, Value};
use std::convert::Infallible;
use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

const JSON: &str = "application/json";

fn full<T: Into<Bytes>>(chunk: T) -> BoxBody {
    Full::new(chunk.into())
        .map_err(|never| match never {})
        .boxed()
}

fn respond(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> Response<BoxBody> {
    let mut response = Response::new(full(body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, data: &T) -> Response<BoxBody> {
    match serde_json::to_vec(data) {
        Ok(body) => respond(status, JSON, body),
        Err(e) => {
            error!(error = %e, "failed to serialize response");
            respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                JSON,
                r#"{"errors":[{"message":"Internal server error"}]}"#,
            )
        }
    }
}

/// A GraphQL-shaped error body for requests that never reach the pipeline.
fn error_response(status: StatusCode, message: impl Into<String>) -> Response<BoxBody> {
    json_response(status, &GraphQLResponse::error(FieldError::new(message)))
}

fn preflight() -> Response<BoxBody> {
    let mut response = respond(StatusCode::NO_CONTENT, "text/plain", Bytes::new());
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    response
}

/// Parses a `GET` query string into a request.
pub fn parse_query_string(query: &str) -> Result<GraphQLRequest, String> {
    let mut request = GraphQLRequest::default();
    let mut found = false;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "query" => {
                request.query = value.into_owned();
                found = true;
            }
            "operationName" if !value.is_empty() => {
                request.operation_name = Some(value.into_owned());
            }
            "variables" if !value.is_empty() => {
                let variables: Map<String, Value> = serde_json::from_str(&value)
                    .map_err(|e| format!("Variables are invalid JSON: {e}"))?;
                request.variables = Some(variables);
            }
            _ => {}
        }
    }
    if found {
        Ok(request)
    } else {
        Err("Must provide query string.".to_string())
    }
}

/// The HTTP front of a [`RequestPipeline`].
pub struct HttpServer {
    pipeline: Arc<RequestPipeline>,
    sessions: Arc<SessionStore>,
}

impl HttpServer {
    pub fn new(pipeline: Arc<RequestPipeline>, sessions: Arc<SessionStore>) -> Self {
        Self { pipeline, sessions }
    }

    pub fn pipeline(&self) -> &Arc<RequestPipeline> {
        &self.pipeline
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Binds the configured address.
    pub async fn bind(&self) -> ServerResult<TcpListener> {
        let addr = self.pipeline.config().addr();
        TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::http(format!("failed to bind {addr}: {e}")))
    }

    /// Serves until the process is stopped.
    pub async fn run(self: Arc<Self>) -> ServerResult<()> {
        let listener = self.bind().await?;
        self.serve(listener, std::future::pending()).await
    }

    /// Accepts connections on `listener` until `shutdown` completes.
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        shutdown: impl Future<Output = ()>,
    ) -> ServerResult<()> {
        let local = listener.local_addr()?;
        let endpoint = &self.pipeline.config().endpoint;
        info!("Listening on http://{local}{endpoint}");

        tokio::pin!(shutdown);
        loop {
            let (stream, peer) = tokio::select! {
                () = &mut shutdown => {
                    info!("Shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                },
            };

            let server = Arc::clone(&self);
            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let server = Arc::clone(&server);
                    async move { Ok::<_, Infallible>(server.handle(req).await) }
                });
                if let Err(err) = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await
                {
                    debug!(%peer, error = %err, "connection error");
                }
            });
        }
    }

    /// Routes one HTTP request.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<BoxBody>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        let (parts, body) = req.into_parts();
        let endpoint = self.pipeline.config().endpoint.as_str();
        let path = parts.uri.path();
        debug!(method = %parts.method, path, "http request");

        match parts.method {
            Method::GET if path == "/health" => respond(StatusCode::OK, JSON, r#"{"status":"ok"}"#),
            Method::OPTIONS if path == endpoint => preflight(),
            Method::POST if path == endpoint => {
                let limit = self.pipeline.config().body_limit;
                let bytes = match Limited::new(body, limit).collect().await {
                    Ok(collected) => collected.to_bytes(),
                    Err(e) if e.is::<LengthLimitError>() => {
                        warn!(limit, "request body too large");
                        return error_response(
                            StatusCode::PAYLOAD_TOO_LARGE,
                            format!("Request body is larger than {limit} bytes."),
                        );
                    }
                    Err(e) => {
                        return error_response(
                            StatusCode::BAD_REQUEST,
                            format!("Failed to read body: {e}"),
                        );
                    }
                };
                let request: GraphQLRequest = match serde_json::from_slice(&bytes) {
                    Ok(request) => request,
                    Err(e) => {
                        let message = format!("Invalid JSON: {e}");
                        return error_response(StatusCode::BAD_REQUEST, message);
                    }
                };
                self.graphql(request, parts.headers.get(header::COOKIE), false)
                    .await
            }
            Method::GET if path == endpoint => {
                match parse_query_string(parts.uri.query().unwrap_or("")) {
                    Ok(request) => {
                        self.graphql(request, parts.headers.get(header::COOKIE), true)
                            .await
                    }
                    Err(message) => error_response(StatusCode::BAD_REQUEST, message),
                }
            }
            _ => respond(StatusCode::NOT_FOUND, JSON, r#"{"error":"Not Found"}"#),
        }
    }

    async fn graphql(
        &self,
        request: GraphQLRequest,
        cookie: Option<&HeaderValue>,
        read_only: bool,
    ) -> Response<BoxBody> {
        let cookie = cookie.and_then(|value| value.to_str().ok());
        let resolved = self.sessions.resolve(cookie).await;

        let result = if read_only {
            self.pipeline
                .handle_read_only(request, resolved.session)
                .await
        } else {
            self.pipeline.handle(request, resolved.session).await
        };

        let mut response = json_response(StatusCode::OK, &result);
        if let Some(cookie) = resolved.set_cookie {
            match HeaderValue::from_str(&cookie) {
                Ok(value) => {
                    response.headers_mut().insert(header::SET_COOKIE, value);
                }
                Err(e) => warn!(error = %e, "session cookie is not a valid header"),
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_string() {
        let request = parse_query_string(
            "query=query%20Q(%24id%3A%20Int!)%20%7B%20post(id%3A%20%24id)%20%7B%20id%20%7D%20%7D\
             &operationName=Q&variables=%7B%22id%22%3A1%7D",
        )
        .unwrap();

        assert_eq!(request.query, "query Q($id: Int!) { post(id: $id) { id } }");
        assert_eq!(request.operation_name.as_deref(), Some("Q"));
        assert_eq!(request.variables.unwrap()["id"], 1);
    }

    #[test]
    fn test_parse_query_string_errors() {
        assert_eq!(
            parse_query_string("operationName=Q").unwrap_err(),
            "Must provide query string."
        );
        assert!(parse_query_string("query=%7B%20users%20%7B%20id%20%7D%20%7D&variables=%5B")
            .unwrap_err()
            .starts_with("Variables are invalid JSON"));

        let request = parse_query_string("query=%7Busers%7Bid%7D%7D&variables=").unwrap();
        assert!(request.variables.is_none());
    }
}
