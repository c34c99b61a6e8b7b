use crate::env_first;
use devscout_core::{CompletionRequest, LanguageModel, ModelError, SetupError};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

fn openai_compat_base_url_from_env() -> Option<String> {
    env_first(&["DEVSCOUT_OPENAI_COMPAT_BASE_URL"])
}

fn openai_compat_api_key_from_env() -> Option<String> {
    env_first(&["DEVSCOUT_OPENAI_API_KEY", "OPENAI_API_KEY"])
}

/// Chat-completions client for OpenAI and compatible servers (vLLM, llama.cpp, LM Studio, ...).
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompatClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
            model: model.into(),
        }
    }

    /// The hosted default needs a key; a custom base URL may run without one.
    pub fn from_env(client: reqwest::Client, model: Option<String>) -> Result<Self, SetupError> {
        let custom_base = openai_compat_base_url_from_env();
        let api_key = openai_compat_api_key_from_env();
        if custom_base.is_none() && api_key.is_none() {
            return Err(SetupError::MissingCredential(
                "DEVSCOUT_OPENAI_API_KEY (or OPENAI_API_KEY)".to_string(),
            ));
        }
        Ok(Self::new(
            client,
            custom_base.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        ))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint_chat_completions(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait::async_trait]
impl LanguageModel for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, req: &CompletionRequest) -> Result<String, ModelError> {
        let t0 = Instant::now();
        let body = ChatCompletionsRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: req.system.clone(),
                },
                Message {
                    role: "user".to_string(),
                    content: req.user.clone(),
                },
            ],
            max_tokens: req.max_tokens,
            temperature: Some(req.temperature),
            response_format: req.json_mode.then(|| ResponseFormat {
                kind: "json_object".to_string(),
            }),
            stream: Some(false),
        };

        let mut rb = self
            .client
            .post(self.endpoint_chat_completions())
            .timeout(Duration::from_millis(req.timeout_ms));
        if let Some(k) = &self.api_key {
            rb = rb.bearer_auth(k);
        }
        let resp = rb.json(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                ModelError::Timeout(e.to_string())
            } else {
                ModelError::Transport(e.to_string())
            }
        })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ModelError::Http {
                status: status.as_u16(),
            });
        }
        let parsed: ChatCompletionsResponse = resp
            .json()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|s| !s.trim().is_empty())
            .ok_or(ModelError::EmptyResponse)?;
        debug!(
            model = %self.model,
            chars = content.chars().count(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "chat completion"
        );
        Ok(content)
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use std::net::SocketAddr;

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn req(json_mode: bool) -> CompletionRequest {
        CompletionRequest {
            system: "sys".to_string(),
            user: "hello".to_string(),
            temperature: 0.1,
            max_tokens: None,
            json_mode,
            timeout_ms: 2_000,
        }
    }

    #[tokio::test]
    async fn sends_auth_and_json_mode_and_returns_first_choice() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                Json(serde_json::json!({
                    "choices": [{"message": {"role": "assistant", "content": format!(
                        "{}|{}|{}",
                        auth,
                        body["response_format"]["type"].as_str().unwrap_or("none"),
                        body["model"].as_str().unwrap_or("")
                    )}}]
                }))
            }),
        );
        let addr = serve(app).await;
        let c = OpenAiCompatClient::new(
            crate::http_client().unwrap(),
            format!("http://{addr}/"),
            Some("sk-test".to_string()),
            "m1",
        );
        assert_eq!(
            c.complete(&req(true)).await.unwrap(),
            "Bearer sk-test|json_object|m1"
        );
        assert_eq!(c.complete(&req(false)).await.unwrap(), "Bearer sk-test|none|m1");
    }

    #[tokio::test]
    async fn http_errors_and_empty_content_are_model_errors() {
        let app = Router::new()
            .route(
                "/bad/v1/chat/completions",
                post(|| async { StatusCode::TOO_MANY_REQUESTS }),
            )
            .route(
                "/empty/v1/chat/completions",
                post(|| async { Json(serde_json::json!({"choices": []})) }),
            );
        let addr = serve(app).await;
        let http = crate::http_client().unwrap();

        let bad = OpenAiCompatClient::new(http.clone(), format!("http://{addr}/bad"), None, "m");
        assert_eq!(
            bad.complete(&req(true)).await.unwrap_err(),
            ModelError::Http { status: 429 }
        );

        let empty = OpenAiCompatClient::new(http, format!("http://{addr}/empty"), None, "m");
        assert_eq!(
            empty.complete(&req(true)).await.unwrap_err(),
            ModelError::EmptyResponse
        );
    }
}
