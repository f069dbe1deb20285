use std::time::Duration;

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    serde_json::{Value, json},
    tgrelay_common::{Role, Turn},
    tgrelay_config::{ProviderConfig, ServerToolConfig},
    tgrelay_relay::{Capability, CompletionClient, CompletionError, CompletionRequest},
    tracing::{debug, trace, warn},
};

/// Sent when the engine answers without any text.
pub const FALLBACK_REPLY: &str = "I couldn't generate a response. Please try again.";

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API client.
pub struct AnthropicClient {
    api_key: Secret<String>,
    model: String,
    base_url: String,
    max_tokens: u32,
    system_prompt: String,
    server_tools: Vec<ServerToolConfig>,
    client: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(config: &ProviderConfig) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_tokens: config.max_tokens,
            system_prompt: config.system_prompt.clone(),
            server_tools: config.server_tools.clone(),
            client,
        })
    }

    fn request_body(&self, request: &CompletionRequest<'_>) -> Value {
        let mut body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": to_anthropic_messages(request.history, request.text),
        });
        if !self.system_prompt.is_empty() {
            body["system"] = Value::String(self.system_prompt.clone());
        }
        if !self.server_tools.is_empty() {
            body["tools"] = self
                .server_tools
                .iter()
                .map(|t| json!({ "type": t.tool_type, "name": t.name }))
                .collect();
        }
        body
    }
}

/// History plus the new user message, oldest first. The API requires the
/// conversation to open with a user message, so leading assistant turns
/// left behind by eviction are skipped.
fn to_anthropic_messages(history: &[Turn], text: &str) -> Vec<Value> {
    history
        .iter()
        .skip_while(|t| t.role == Role::Assistant)
        .map(|t| json!({ "role": t.role.as_str(), "content": t.content }))
        .chain(std::iter::once(json!({ "role": "user", "content": text })))
        .collect()
}

/// Concatenated text blocks; tool-use and tool-result blocks are skipped.
fn extract_text(resp: &Value) -> String {
    resp["content"]
        .as_array()
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b["type"].as_str() == Some("text"))
                .filter_map(|b| b["text"].as_str())
                .collect::<String>()
        })
        .unwrap_or_default()
}

#[async_trait]
impl CompletionClient for AnthropicClient {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, CompletionError> {
        let body = self.request_body(&request);
        debug!(
            conversation_id = %request.conversation_id,
            model = %self.model,
            history_len = request.history.len(),
            tools_count = self.server_tools.len(),
            "anthropic complete request"
        );
        trace!(body = %body, "anthropic request body");

        let http_resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::transport("anthropic request", e))?;

        let status = http_resp.status();
        if !status.is_success() {
            let body_text = http_resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body_text, "anthropic API error");
            return Err(CompletionError::Http {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let resp = http_resp
            .json::<Value>()
            .await
            .map_err(CompletionError::invalid_response)?;
        trace!(response = %resp, "anthropic raw response");

        debug!(
            stop_reason = resp["stop_reason"].as_str().unwrap_or_default(),
            input_tokens = resp["usage"]["input_tokens"].as_u64().unwrap_or(0),
            output_tokens = resp["usage"]["output_tokens"].as_u64().unwrap_or(0),
            "anthropic response"
        );

        let text = extract_text(&resp);
        if text.trim().is_empty() {
            return Ok(FALLBACK_REPLY.to_string());
        }
        Ok(text)
    }

    fn capabilities(&self) -> Vec<Capability> {
        self.server_tools
            .iter()
            .map(|t| Capability {
                name: t.name.clone(),
                description: t.description.clone(),
            })
            .collect()
    }
}
