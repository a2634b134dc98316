use bytes::Bytes;
use crudql_server::{App, HttpServer, ServerConfig};
use http_body_util::{BodyExt, Full};
use hyper::header;
use hyper::{Method, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

async fn server() -> HttpServer {
    let app = App::build(Arc::new(ServerConfig::default())).await.unwrap();
    app.http()
}

fn request(method: Method, uri: &str, body: &str) -> Request<Full<Bytes>> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

fn graphql(query: &str) -> Request<Full<Bytes>> {
    request(Method::POST, "/graphql", &json!({"query": query}).to_string())
}

async fn body_json(
    response: hyper::Response<impl hyper::body::Body<Error = hyper::Error>>,
) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn post_query() {
    let server = server().await;
    let response = server
        .handle(graphql("{ post(id: 1) { title author { name } } }"))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(
        body_json(response).await,
        json!({"data": {"post": {"title": "Hello World", "author": {"name": "Alice"}}}})
    );
}

#[tokio::test]
async fn not_found_is_still_200() {
    let server = server().await;
    let response = server.handle(graphql("{ post(id: 7) { id } }")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"], json!({"post": null}));
    assert_eq!(body["errors"][0]["message"], r#"No post with id of "7""#);
    assert_eq!(body["errors"][0]["path"], json!(["post"]));
    assert_eq!(body["errors"][0]["extensions"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn parse_error_has_no_data_key() {
    let server = server().await;
    let body = body_json(server.handle(graphql("{ users {")).await).await;

    assert!(body.get("data").is_none());
    assert_eq!(body["errors"][0]["extensions"]["code"], "GRAPHQL_PARSE_FAILED");
}

#[tokio::test]
async fn malformed_json_is_400() {
    let server = server().await;
    let response = server
        .handle(request(Method::POST, "/graphql", "{not json"))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body.get("data").is_none());
    assert!(body["errors"][0]["message"]
        .as_str()
        .unwrap()
        .starts_with("Invalid JSON"));
}

#[tokio::test]
async fn oversized_body_is_413() {
    let config = ServerConfig::default().body_limit(64);
    let server = App::build(Arc::new(config)).await.unwrap().http();

    let query = format!("{{ users {{ {} }} }}", "email ".repeat(20));
    let response = server.handle(graphql(&query)).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body = body_json(response).await;
    assert!(body.get("data").is_none());
    assert_eq!(
        body["errors"][0]["message"],
        "Request body is larger than 64 bytes."
    );

    let response = server.handle(graphql("{ users { id } }")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn get_query() {
    let server = server().await;
    let response = server
        .handle(request(
            Method::GET,
            "/graphql?query=%7B%20users%20%7B%20email%20%7D%20%7D",
            "",
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"data": {"users": [{"email": "alice@prisma.io"}]}})
    );
}

#[tokio::test]
async fn get_mutation_rejected() {
    let server = server().await;
    let response = server
        .handle(request(
            Method::GET,
            "/graphql?query=mutation%20%7B%20deleteOnePost(where%3A%20%7Bid%3A%201%7D)%20%7B%20id%20%7D%20%7D",
            "",
        ))
        .await;

    let body = body_json(response).await;
    assert!(body.get("data").is_none());
    assert_eq!(
        body["errors"][0]["message"],
        "Mutations can only be sent with a POST request."
    );
    // Nothing was deleted.
    let body = body_json(server.handle(graphql("{ posts { id } }")).await).await;
    assert_eq!(body["data"]["posts"], json!([{"id": 1}]));
}

#[tokio::test]
async fn get_without_query_is_400() {
    let server = server().await;
    let response = server.handle(request(Method::GET, "/graphql", "")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_preflight_and_404() {
    let server = server().await;

    let health = server.handle(request(Method::GET, "/health", "")).await;
    assert_eq!(health.status(), StatusCode::OK);
    assert_eq!(body_json(health).await, json!({"status": "ok"}));

    let preflight = server.handle(request(Method::OPTIONS, "/graphql", "")).await;
    assert_eq!(preflight.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        preflight.headers()[header::ACCESS_CONTROL_ALLOW_METHODS],
        "GET, POST, OPTIONS"
    );

    let missing = server.handle(request(Method::GET, "/nope", "")).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn session_cookie_round_trip() {
    let server = server().await;

    let first = server.handle(graphql("{ __typename }")).await;
    let cookie = first.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(cookie.starts_with("crudql.sid="));
    let pair = cookie.split(';').next().unwrap().to_string();
    assert_eq!(server.sessions().len().await, 1);

    let mut second = graphql("{ __typename }");
    second
        .headers_mut()
        .insert(header::COOKIE, pair.parse().unwrap());
    let second = server.handle(second).await;
    assert!(second.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(server.sessions().len().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn serves_over_tcp() {
    let server = Arc::new(server().await);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let serving = tokio::spawn(Arc::clone(&server).serve(listener, async {
        let _ = stopped.await;
    }));

    let body = r#"{"query":"{ users { name } }"}"#;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let raw = format!(
        "POST /graphql HTTP/1.1\r\nHost: {addr}\r\nContent-Type: application/json\r\n\
         Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
    assert!(response.ends_with(r#"{"data":{"users":[{"name":"Alice"}]}}"#));

    stop.send(()).unwrap();
    serving.await.unwrap().unwrap();
}
