//! End-to-end client/server scenarios over in-memory stream transports
//!
//! Exercises the full stack (facades -> engine -> framing -> duplex pipes)
//! without touching the filesystem or network.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map};
use tokio_util::sync::CancellationToken;

use mcp_runtime::engine::RequestOptions;
use mcp_runtime::integration::{McpClientBuilder, McpServerBuilder, McpServer};
use mcp_runtime::protocol::messages::ListToolsResult;
use mcp_runtime::protocol::{
    CallToolResult, Content, McpError, ResourcesCapability, ServerCapabilities, Tool,
    ToolSchema, ToolsCapability,
};
use mcp_runtime::transport::duplex_pair;
use mcp_runtime::McpClient;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("mcp_runtime=debug")
        .with_test_writer()
        .try_init();
}

async fn connected_pair(capabilities: ServerCapabilities) -> (McpClient, McpServer) {
    init_tracing();
    let (client_side, server_side) = duplex_pair(256 * 1024);

    let server = McpServerBuilder::new()
        .server_info("s", "1")
        .capabilities(capabilities)
        .connect(server_side)
        .await
        .unwrap();

    let client = McpClientBuilder::new()
        .client_info("c", "1")
        .timeout(Duration::from_secs(5))
        .connect(client_side)
        .await
        .unwrap();

    (client, server)
}

fn tool_capabilities() -> ServerCapabilities {
    ServerCapabilities {
        tools: Some(ToolsCapability::default()),
        ..Default::default()
    }
}

#[tokio::test]
async fn ping_round_trip() {
    let (client, server) = connected_pair(ServerCapabilities::default()).await;

    // Ping works both before and after the handshake.
    client.ping().await.unwrap();
    client.initialize().await.unwrap();
    client.ping().await.unwrap();

    client.close().await.unwrap();
    server.close().await.unwrap();
}

#[tokio::test]
async fn initialize_handshake_negotiates_version_and_capabilities() {
    let (client, server) = connected_pair(tool_capabilities()).await;

    let result = client.initialize().await.unwrap();
    assert_eq!(result.protocol_version, "2025-03-26");
    assert_eq!(result.server_info.name, "s");
    assert!(result.capabilities.tools.is_some());

    // Give the initialized notification a moment to land server-side.
    for _ in 0..100 {
        if server.is_initialized() {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(server.is_initialized());
    assert_eq!(server.client_info().unwrap().name, "c");
    assert_eq!(server.negotiated_version().as_deref(), Some("2025-03-26"));

    client.close().await.unwrap();
    server.close().await.unwrap();
}

#[tokio::test]
async fn tool_call_with_structured_output() {
    let (client, server) = connected_pair(tool_capabilities()).await;

    server
        .on_list_tools(|_request, _context| async move {
            Ok(ListToolsResult {
                tools: vec![Tool {
                    name: "calc".to_string(),
                    description: Some("arithmetic".to_string()),
                    input_schema: ToolSchema::object(
                        Map::new(),
                        vec!["op".to_string(), "a".to_string(), "b".to_string()],
                    ),
                    output_schema: None,
                    annotations: None,
                }],
                next_cursor: None,
            })
        })
        .unwrap();
    server
        .on_call_tool(|request, _context| async move {
            let args = request.arguments.unwrap_or_default();
            let a = args["a"].as_i64().unwrap_or(0);
            let b = args["b"].as_i64().unwrap_or(0);
            let mut payload = Map::new();
            payload.insert("result".to_string(), json!(a + b));
            Ok(CallToolResult::structured(payload))
        })
        .unwrap();

    client.initialize().await.unwrap();

    let tools = client.list_tools(None).await.unwrap();
    assert_eq!(tools.tools[0].name, "calc");
    assert_eq!(
        tools.tools[0].input_schema.required.as_deref(),
        Some(["op".to_string(), "a".to_string(), "b".to_string()].as_slice())
    );

    let mut args = Map::new();
    args.insert("op".to_string(), json!("add"));
    args.insert("a".to_string(), json!(2));
    args.insert("b".to_string(), json!(3));
    let result = client.call_tool("calc", Some(args)).await.unwrap();

    match &result {
        CallToolResult::Structured {
            structured_content, ..
        } => assert_eq!(structured_content["result"], json!(5)),
        other => panic!("expected structured result, got {other:?}"),
    }
    assert!(!result.is_error());

    // The wire form must not carry isError in structured mode.
    let encoded = serde_json::to_value(&result).unwrap();
    assert!(encoded.get("isError").is_none());

    client.close().await.unwrap();
    server.close().await.unwrap();
}

#[tokio::test]
async fn tool_error_uses_unstructured_flag() {
    let (client, server) = connected_pair(tool_capabilities()).await;

    server
        .on_call_tool(|request, _context| async move {
            if request.name == "broken" {
                Ok(CallToolResult::error(vec![Content::text("tool blew up")]))
            } else {
                Ok(CallToolResult::success(vec![Content::text("ok")]))
            }
        })
        .unwrap();

    client.initialize().await.unwrap();

    let result = client.call_tool("broken", None).await.unwrap();
    assert!(result.is_error());

    client.close().await.unwrap();
    server.close().await.unwrap();
}

#[tokio::test]
async fn cancellation_reaches_the_server_handler() {
    let (client, server) = connected_pair(tool_capabilities()).await;

    let observed_cancel = Arc::new(AtomicBool::new(false));
    let observed = Arc::clone(&observed_cancel);
    server
        .on_call_tool(move |_request, context| {
            let observed = Arc::clone(&observed);
            async move {
                // Wait for the peer's cancellation rather than finishing.
                context.cancellation.cancelled().await;
                observed.store(true, Ordering::SeqCst);
                Ok(CallToolResult::success(vec![]))
            }
        })
        .unwrap();

    client.initialize().await.unwrap();

    let token = CancellationToken::new();
    let options = RequestOptions::default()
        .with_timeout(Duration::from_secs(30))
        .with_cancellation(token.clone());

    let call = {
        let client = client.clone();
        tokio::spawn(async move { client.call_tool_with_options("slow", None, options).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel();

    let result = call.await.unwrap();
    assert!(matches!(result, Err(McpError::Aborted { .. })));

    // The cancelled notification propagates and trips the handler's token.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !observed_cancel.load(Ordering::SeqCst) {
        assert!(
            tokio::time::Instant::now() < deadline,
            "server handler never observed cancellation"
        );
        tokio::task::yield_now().await;
    }

    client.close().await.unwrap();
    server.close().await.unwrap();
}

#[tokio::test]
async fn progress_notifications_drive_the_callback() {
    let (client, server) = connected_pair(tool_capabilities()).await;

    let engine = server.engine().clone();
    server
        .on_call_tool(move |_request, context| {
            let engine = engine.clone();
            async move {
                for step in 1..=3u32 {
                    engine
                        .send_progress(&context, f64::from(step) / 3.0, Some(1.0), None)
                        .await?;
                }
                Ok(CallToolResult::success(vec![Content::text("done")]))
            }
        })
        .unwrap();

    client.initialize().await.unwrap();

    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen_cb = Arc::clone(&seen);
    let options = RequestOptions::default()
        .with_timeout(Duration::from_secs(5))
        .with_progress(Arc::new(move |progress| {
            seen_cb.lock().unwrap().push(progress.progress);
        }));

    let result = client
        .call_tool_with_options("slow", None, options)
        .await
        .unwrap();
    assert!(!result.is_error());

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 3);
    assert!(seen[0] < seen[2]);

    client.close().await.unwrap();
    server.close().await.unwrap();
}

#[tokio::test]
async fn strict_client_rejects_unadvertised_operations_locally() {
    let (client_side, server_side) = duplex_pair(64 * 1024);

    // Server advertises resources but no subscribe flag and no tools.
    let server = McpServerBuilder::new()
        .capabilities(ServerCapabilities {
            resources: Some(ResourcesCapability {
                subscribe: Some(false),
                list_changed: None,
            }),
            ..Default::default()
        })
        .connect(server_side)
        .await
        .unwrap();

    let client = McpClientBuilder::new()
        .enforce_strict_capabilities(true)
        .timeout(Duration::from_secs(5))
        .connect(client_side)
        .await
        .unwrap();

    client.initialize().await.unwrap();

    let err = client.list_tools(None).await.unwrap_err();
    assert!(matches!(err, McpError::CapabilityUnsupported { .. }));
    let err = client.subscribe_resource("file:///tmp/a").await.unwrap_err();
    assert!(matches!(err, McpError::CapabilityUnsupported { .. }));

    client.close().await.unwrap();
    server.close().await.unwrap();
}

#[tokio::test]
async fn server_side_close_fails_outstanding_client_requests() {
    let (client, server) = connected_pair(tool_capabilities()).await;

    server
        .on_call_tool(|_request, context| async move {
            // Never answers; waits until the connection goes away.
            context.cancellation.cancelled().await;
            Ok(CallToolResult::success(vec![]))
        })
        .unwrap();

    client.initialize().await.unwrap();

    let pending = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .call_tool_with_options(
                    "slow",
                    None,
                    RequestOptions::default().with_timeout(Duration::from_secs(30)),
                )
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    server.close().await.unwrap();

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(McpError::ConnectionClosed)));
}
