//! Integration tests for the Chat Completions Brain provider
//!
//! Validates request shape, tool-call decoding and retry behavior using
//! wiremock in place of the completion endpoint.

use serde_json::json;
use std::time::Duration;
use wiremock::{
    matchers::{body_partial_json, header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

use devagent_engine::config::LLMConfig;
use devagent_engine::llm::{openai::OpenAIProvider, LLMError, LLMProvider, Message};

fn provider(config: LLMConfig) -> OpenAIProvider {
    OpenAIProvider::new(config, "sk-test".into()).with_retry_base(Duration::from_millis(1))
}

fn plain_config(server: &MockServer) -> LLMConfig {
    LLMConfig {
        base_url: format!("{}/v1", server.uri()),
        model: "gpt-5".into(),
        ..LLMConfig::default()
    }
}

#[tokio::test]
async fn test_tool_calls_are_decoded() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({"model": "gpt-5", "tool_choice": "auto"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "execute_agent",
                            "arguments": "{\"agent\":\"claude_code\"}"
                        }
                    }]
                }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tools = vec![json!({"type": "function", "function": {"name": "execute_agent"}})];
    let turn = provider(plain_config(&server))
        .generate(&[Message::user("go")], &tools)
        .await
        .unwrap();

    assert!(turn.content.is_empty());
    assert_eq!(turn.tool_calls.len(), 1);
    assert_eq!(turn.tool_calls[0].id, "call_1");
    assert_eq!(turn.tool_calls[0].name, "execute_agent");
    assert_eq!(turn.tool_calls[0].arguments, "{\"agent\":\"claude_code\"}");
}

#[tokio::test]
async fn test_azure_mode_uses_deployment_url_and_api_key() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/openai/deployments/gpt-5-prod/chat/completions"))
        .and(query_param("api-version", "2024-12-01-preview"))
        .and(header("api-key", "sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "hello"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = LLMConfig {
        base_url: server.uri(),
        model: "gpt-5-prod".into(),
        api_version: Some("2024-12-01-preview".into()),
        ..LLMConfig::default()
    };
    let turn = provider(config)
        .generate(&[Message::user("hi")], &[])
        .await
        .unwrap();
    assert_eq!(turn.content, "hello");
    assert!(!turn.has_tool_calls());
}

#[tokio::test]
async fn test_null_tool_calls_is_a_plain_turn() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "{\"is_finished\": true, \"task\": \"T\"}",
                    "tool_calls": null
                }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let turn = provider(plain_config(&server))
        .generate(&[Message::user("report")], &[])
        .await
        .unwrap();
    assert_eq!(turn.content, "{\"is_finished\": true, \"task\": \"T\"}");
    assert!(!turn.has_tool_calls());
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "recovered"}}]
        })))
        .mount(&server)
        .await;

    let turn = provider(plain_config(&server))
        .generate(&[Message::user("hi")], &[])
        .await
        .unwrap();
    assert_eq!(turn.content, "recovered");
}

#[tokio::test]
async fn test_authentication_failure_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .expect(1)
        .mount(&server)
        .await;

    let err = provider(plain_config(&server))
        .generate(&[Message::user("hi")], &[])
        .await
        .unwrap_err();
    assert!(matches!(err, LLMError::AuthenticationFailed(ref body) if body == "invalid api key"));
}

#[tokio::test]
async fn test_retry_budget_is_bounded() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let err = provider(plain_config(&server))
        .generate(&[Message::user("hi")], &[])
        .await
        .unwrap_err();
    assert!(matches!(err, LLMError::RateLimitExceeded));
}

#[tokio::test]
async fn test_empty_choices_is_parse_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let mut config = plain_config(&server);
    config.max_retries = 1;
    let err = provider(config)
        .generate(&[Message::user("hi")], &[])
        .await
        .unwrap_err();
    assert!(matches!(err, LLMError::ParseError(_)));
}
