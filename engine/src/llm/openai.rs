use super::{AssistantTurn, LLMError, LLMProvider, Message, MessageRole, ToolCall};
use crate::config::LLMConfig;
use crate::secrets::SecretString;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Chat completions provider for OpenAI and Azure OpenAI
///
/// Azure mode is selected by `LLMConfig::api_version`: the request goes to
/// `{base_url}/openai/deployments/{model}/chat/completions?api-version=..`
/// with an `api-key` header. Otherwise `{base_url}/chat/completions` with a
/// bearer token.
pub struct OpenAIProvider {
    config: LLMConfig,
    api_key: SecretString,
    client: reqwest::Client,
    retry_base: Duration,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

fn function_kind() -> String {
    "function".to_string()
}

impl From<&ToolCall> for WireToolCall {
    fn from(call: &ToolCall) -> Self {
        Self {
            id: call.id.clone(),
            kind: function_kind(),
            function: WireFunction {
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            },
        }
    }
}

impl From<WireToolCall> for ToolCall {
    fn from(wire: WireToolCall) -> Self {
        ToolCall::new(wire.id, wire.function.name, wire.function.arguments)
    }
}

impl OpenAIProvider {
    pub fn new(config: LLMConfig, api_key: SecretString) -> Self {
        Self {
            config,
            api_key,
            client: reqwest::Client::new(),
            retry_base: Duration::from_secs(1),
        }
    }

    /// Override the base delay between attempts (doubles after each failure)
    pub fn with_retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    fn endpoint(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        match &self.config.api_version {
            Some(version) => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                base, self.config.model, version
            ),
            None => format!("{}/chat/completions", base),
        }
    }

    fn wire_message(msg: &Message) -> Value {
        match msg.role {
            MessageRole::Tool => json!({
                "role": "tool",
                "tool_call_id": msg.tool_call_id.clone().unwrap_or_default(),
                "content": msg.content,
            }),
            MessageRole::Assistant if !msg.tool_calls.is_empty() => {
                let calls: Vec<WireToolCall> = msg.tool_calls.iter().map(Into::into).collect();
                json!({
                    "role": "assistant",
                    "content": msg.content,
                    "tool_calls": calls,
                })
            }
            role => json!({
                "role": role.to_string(),
                "content": msg.content,
            }),
        }
    }

    fn payload(&self, messages: &[Message], tools: &[Value]) -> Value {
        let api_messages: Vec<Value> = messages.iter().map(Self::wire_message).collect();

        let mut payload = json!({
            "messages": api_messages,
            "max_completion_tokens": self.config.max_completion_tokens,
        });
        if !self.config.is_azure() {
            payload["model"] = json!(self.config.model);
        }
        if !tools.is_empty() {
            payload["tools"] = json!(tools);
            payload["tool_choice"] = json!("auto");
        }
        payload
    }

    async fn request_once(&self, payload: &Value) -> super::Result<AssistantTurn> {
        let request = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .json(payload);

        let request = if self.config.is_azure() {
            request.header("api-key", self.api_key.unsecure())
        } else {
            request.header(
                "Authorization",
                format!("Bearer {}", self.api_key.unsecure()),
            )
        };

        let response = request
            .send()
            .await
            .map_err(|e| LLMError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            return Err(match status.as_u16() {
                401 | 403 => LLMError::AuthenticationFailed(text),
                429 => LLMError::RateLimitExceeded,
                s if s >= 500 => LLMError::ProviderUnavailable(format!("HTTP {}: {}", s, text)),
                _ => LLMError::InvalidRequest(text),
            });
        }

        let data: ChatResponse = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))?;

        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::ParseError("No choices in response".to_string()))?;

        Ok(AssistantTurn {
            content: choice.message.content.unwrap_or_default(),
            tool_calls: choice
                .message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(ToolCall::from)
                .collect(),
        })
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    fn name(&self) -> &str {
        if self.config.is_azure() {
            "azure"
        } else {
            "openai"
        }
    }

    async fn generate(&self, messages: &[Message], tools: &[Value]) -> super::Result<AssistantTurn> {
        let payload = self.payload(messages, tools);
        let attempts = self.config.max_retries.max(1);

        let mut attempt = 0;
        loop {
            match self.request_once(&payload).await {
                Ok(turn) => {
                    tracing::debug!(
                        provider = self.name(),
                        tool_calls = turn.tool_calls.len(),
                        "Brain turn received"
                    );
                    return Ok(turn);
                }
                Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                    let delay = crate::mcp::backoff_delay(self.retry_base, attempt);
                    tracing::warn!(
                        "LLM call failed (attempt {}/{}): {}. Retrying in {:?}",
                        attempt + 1,
                        attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
