//! Integration tests for the remote tool transport
//!
//! Uses wiremock to stand in for the branch service:
//! - Retry budget and exponential backoff
//! - Event-stream and plain JSON bodies
//! - JSON-RPC result unwrapping

use serde_json::json;
use std::time::Duration;
use wiremock::{
    matchers::{body_partial_json, header, header_exists, method, path},
    Mock, MockServer, ResponseTemplate,
};

use devagent_engine::config::McpConfig;
use devagent_engine::mcp::{McpClient, TransportError};

fn client_for(server: &MockServer) -> McpClient {
    McpClient::new(&McpConfig {
        base_url: format!("{}/mcp/sse", server.uri()),
        request_timeout_secs: 5,
        status_timeout_secs: 5,
        max_retries: 3,
        retry_backoff_ms: 1,
    })
}

#[tokio::test]
async fn test_server_errors_exhaust_retry_budget() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/mcp/sse"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(3)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .invoke("get_branch", json!({"branch_id": "b1"}))
        .await
        .unwrap_err();

    match err {
        TransportError::RetriesExhausted {
            method,
            attempts,
            last,
        } => {
            assert_eq!(method, "tools/call");
            assert_eq!(attempts, 3);
            assert!(matches!(*last, TransportError::Http { status: 500, .. }));
        }
        other => panic!("expected RetriesExhausted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_success_on_last_attempt() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {"branch_id": "b1", "status": "running"}
        })))
        .mount(&server)
        .await;

    let value = client_for(&server)
        .get_branch("b1")
        .await
        .expect("third attempt should succeed");
    assert_eq!(value, json!({"branch_id": "b1", "status": "running"}));
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_event_stream_body_is_decoded() {
    let server = MockServer::start().await;

    let body = concat!(
        ": keep-alive\n\n",
        "event: message\n",
        "data: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"structuredContent\":",
        "{\"branches\":[{\"branch_id\":\"b7\"}]}}}\n\n",
        "data: [DONE]\n\n"
    );
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let value = client_for(&server)
        .parallel_explore("demo", "b-root", "do it", "claude_code", 1)
        .await
        .unwrap();
    assert_eq!(value, json!({"branches": [{"branch_id": "b7"}]}));
}

#[tokio::test]
async fn test_rpc_error_is_returned_unchanged() {
    let server = MockServer::start().await;

    let response = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "error": {"code": -32602, "message": "unknown branch"}
    });
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(response.clone()))
        .mount(&server)
        .await;

    let value = client_for(&server).get_branch("nope").await.unwrap();
    assert_eq!(value, response);
}

#[tokio::test]
async fn test_unparsable_body_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("not json at all", "text/plain"))
        .expect(3)
        .mount(&server)
        .await;

    let err = client_for(&server).get_branch("b1").await.unwrap_err();
    match err {
        TransportError::RetriesExhausted { last, .. } => {
            assert!(matches!(*last, TransportError::Parse(_)));
        }
        other => panic!("expected RetriesExhausted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_request_shape() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/mcp/sse"))
        .and(header("Content-Type", "application/json"))
        .and(header_exists("Mcp-Session-Id"))
        .and(body_partial_json(json!({
            "jsonrpc": "2.0",
            "method": "tools/call",
            "params": {
                "name": "branch_read_file",
                "arguments": {"branch_id": "b2", "file_path": "/workspace/worklog.md"}
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {"content": "# Worklog"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let value = client_for(&server)
        .branch_read_file("b2", "/workspace/worklog.md")
        .await
        .unwrap();
    assert_eq!(value["content"], "# Worklog");
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"result": {}}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let client = McpClient::new(&McpConfig {
        base_url: server.uri(),
        max_retries: 1,
        retry_backoff_ms: 1,
        ..McpConfig::default()
    });
    let err = client
        .call("tools/list", json!({}), Duration::from_millis(50))
        .await
        .unwrap_err();
    match err {
        TransportError::RetriesExhausted { attempts, last, .. } => {
            assert_eq!(attempts, 1);
            assert!(matches!(*last, TransportError::Network(_)));
        }
        other => panic!("expected RetriesExhausted, got {:?}", other),
    }
}
