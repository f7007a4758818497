use async_trait::async_trait;
use serde::Serialize;
use reqwest::Client;
use tracing::debug;
use crate::error::{Result, AppError};
use crate::models::Role;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Message {
            role: role.as_str().to_string(),
            content: content.into(),
        }
    }
}

/// One chat-completion call: the messages plus sampling knobs.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub json_response: bool,
}

/// A chat-completion endpoint that returns the assistant's text.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

pub struct OpenRouterClient {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
    model: String,
    site_url: Option<String>,
    site_name: Option<String>,
}

impl OpenRouterClient {
    pub fn new(client: Client, api_key: Option<String>, endpoint: String, model: String) -> Self {
        OpenRouterClient {
            client,
            api_key,
            endpoint,
            model,
            site_url: None,
            site_name: Some("report-digest".to_string()),
        }
    }

    pub fn with_site_url(mut self, site_url: impl Into<String>) -> Self {
        self.site_url = Some(site_url.into());
        self
    }
}

#[async_trait]
impl ChatCompletion for OpenRouterClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::ConfigError("OPENROUTER_API_KEY is not set".to_string()))?;

        let body = ChatRequest {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request
                .json_response
                .then_some(ResponseFormat { kind: "json_object" }),
        };

        let mut http_request = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body);

        // Add optional headers if provided
        if let Some(url) = &self.site_url {
            http_request = http_request.header("HTTP-Referer", url);
        }

        if let Some(name) = &self.site_name {
            http_request = http_request.header("X-Title", name);
        }

        let res = http_request.send().await?;
        let status = res.status();
        if !status.is_success() {
            let detail = res.text().await.unwrap_or_default();
            return Err(AppError::LlmError(format!("LLM API returned {}: {}", status, detail)));
        }

        let json: serde_json::Value = res.json().await?;
        let reply = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| AppError::LlmError("Invalid response format from LLM".to_string()))?
            .to_string();

        debug!(model = %self.model, chars = reply.len(), "LLM call completed");
        Ok(reply)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays queued replies and records every request it receives.
    #[derive(Default)]
    pub(crate) struct ScriptedLlm {
        pub replies: Mutex<VecDeque<Result<String>>>,
        pub requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedLlm {
        pub(crate) fn with_replies(replies: Vec<Result<String>>) -> Self {
            ScriptedLlm {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatCompletion for ScriptedLlm {
        async fn complete(&self, request: CompletionRequest) -> Result<String> {
            self.requests.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AppError::LlmError("no scripted reply".to_string())))
        }
    }

    #[tokio::test]
    async fn test_missing_api_key_is_config_error() {
        let client = OpenRouterClient::new(
            Client::new(),
            None,
            "http://127.0.0.1:9/unused".to_string(),
            "test-model".to_string(),
        );

        let err = client.complete(CompletionRequest::default()).await.unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    fn test_request_body_declares_json_format() {
        let messages = vec![Message::new(Role::User, "hi")];
        let body = ChatRequest {
            model: "m",
            messages: &messages,
            temperature: None,
            max_tokens: Some(100),
            response_format: Some(ResponseFormat { kind: "json_object" }),
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["max_tokens"], 100);
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json.get("temperature").is_none());
    }
}
