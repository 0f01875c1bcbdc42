//! End-to-end Streamable HTTP scenarios
//!
//! Drives the real server facade and engine through the transport's axum
//! router with `tower::ServiceExt::oneshot`, so the full wire contract is
//! exercised without binding a socket.

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Map, Value};
use tower::ServiceExt;

use mcp_runtime::integration::{McpServer, McpServerBuilder};
use mcp_runtime::protocol::{CallToolResult, ServerCapabilities, ToolsCapability};
use mcp_runtime::transport::{
    StreamableHttpServerConfig, StreamableHttpServerTransportBuilder,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("mcp_runtime=debug")
        .with_test_writer()
        .try_init();
}

async fn spawn_server(config: StreamableHttpServerConfig) -> (McpServer, Router) {
    init_tracing();
    let builder = StreamableHttpServerTransportBuilder::new().with_config(config);
    let handle = builder.handle();

    let server = McpServerBuilder::new()
        .server_info("s", "1")
        .capabilities(ServerCapabilities {
            tools: Some(ToolsCapability::default()),
            ..Default::default()
        })
        .connect(builder)
        .await
        .unwrap();

    server
        .on_call_tool(|request, _context| async move {
            let args = request.arguments.unwrap_or_default();
            let a = args.get("a").and_then(Value::as_i64).unwrap_or(0);
            let b = args.get("b").and_then(Value::as_i64).unwrap_or(0);
            let mut payload = Map::new();
            payload.insert("result".to_string(), json!(a + b));
            Ok(CallToolResult::structured(payload))
        })
        .unwrap();

    (server, handle.router().unwrap())
}

fn json_mode_config() -> StreamableHttpServerConfig {
    StreamableHttpServerConfig {
        enable_json_response: true,
        ..Default::default()
    }
}

fn post(body: Value, session: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/mcp")
        .header(header::ACCEPT, "application/json, text/event-stream")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(session) = session {
        builder = builder.header("mcp-session-id", session);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn initialize_body() -> Value {
    json!({
        "jsonrpc": "2.0", "id": 0, "method": "initialize",
        "params": {
            "protocolVersion": "2025-03-26",
            "capabilities": {},
            "clientInfo": {"name": "c", "version": "1"}
        }
    })
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn initialize_handshake_over_http() {
    let (server, router) = spawn_server(json_mode_config()).await;

    let response = router
        .clone()
        .oneshot(post(initialize_body(), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let session = response
        .headers()
        .get("mcp-session-id")
        .expect("session header")
        .to_str()
        .unwrap()
        .to_string();
    assert!(uuid::Uuid::parse_str(&session).is_ok());

    let body = body_json(response).await;
    assert_eq!(body["id"], json!(0));
    assert_eq!(body["result"]["protocolVersion"], json!("2025-03-26"));
    assert_eq!(body["result"]["serverInfo"]["name"], json!("s"));

    // A second initialize in the same session is a 400.
    let response = router
        .clone()
        .oneshot(post(initialize_body(), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    server.close().await.unwrap();
}

#[tokio::test]
async fn tool_call_returns_structured_content() {
    let (server, router) = spawn_server(json_mode_config()).await;

    let response = router
        .clone()
        .oneshot(post(initialize_body(), None))
        .await
        .unwrap();
    let session = response
        .headers()
        .get("mcp-session-id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let _ = body_json(response).await;

    let call = json!({
        "jsonrpc": "2.0", "id": 1, "method": "tools/call",
        "params": {"name": "calc", "arguments": {"op": "add", "a": 2, "b": 3}}
    });
    let response = router
        .clone()
        .oneshot(post(call, Some(&session)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["result"]["structuredContent"]["result"], json!(5));
    assert!(body["result"].get("isError").is_none());

    server.close().await.unwrap();
}

#[tokio::test]
async fn session_enforcement_never_reaches_the_engine() {
    let (server, router) = spawn_server(json_mode_config()).await;

    let response = router
        .clone()
        .oneshot(post(initialize_body(), None))
        .await
        .unwrap();
    let _ = body_json(response).await;

    let ping = json!({"jsonrpc": "2.0", "id": 1, "method": "ping"});

    // Missing session header: 400.
    let response = router
        .clone()
        .oneshot(post(ping.clone(), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Mismatched session header: 404.
    let response = router
        .clone()
        .oneshot(post(ping, Some("not-the-session")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    server.close().await.unwrap();
}

#[tokio::test]
async fn sse_mode_streams_tool_responses() {
    let (server, router) = spawn_server(StreamableHttpServerConfig::default()).await;

    let response = router
        .clone()
        .oneshot(post(initialize_body(), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let session = response
        .headers()
        .get("mcp-session-id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let call = json!({
        "jsonrpc": "2.0", "id": 2, "method": "tools/call",
        "params": {"name": "calc", "arguments": {"a": 4, "b": 6}}
    });
    let response = router
        .clone()
        .oneshot(post(call, Some(&session)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Read frames until the response for id 2 shows up.
    use futures::StreamExt;
    let mut collected = String::new();
    let mut stream = response.into_body().into_data_stream();
    loop {
        let chunk = tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .expect("timed out waiting for SSE frame")
            .expect("stream ended early")
            .unwrap();
        collected.push_str(std::str::from_utf8(&chunk).unwrap());
        if collected.contains("event: message") && collected.contains(r#""id":2"#) {
            break;
        }
    }
    assert!(collected.contains(r#""result":10"#));

    server.close().await.unwrap();
}

#[tokio::test]
async fn delete_terminates_the_session() {
    let (server, router) = spawn_server(json_mode_config()).await;

    let response = router
        .clone()
        .oneshot(post(initialize_body(), None))
        .await
        .unwrap();
    let session = response
        .headers()
        .get("mcp-session-id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let _ = body_json(response).await;

    let request = Request::builder()
        .method("DELETE")
        .uri("/mcp")
        .header("mcp-session-id", &session)
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    server.close().await.unwrap();
}

#[tokio::test]
async fn options_is_always_ok() {
    let (server, router) = spawn_server(json_mode_config()).await;

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/mcp")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    server.close().await.unwrap();
}
