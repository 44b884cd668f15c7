use crate::error::{UpstreamError, UpstreamResult};
use crate::upstream::TextGenerator;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Groq chat completions endpoint (OpenAI-compatible).
pub const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Text-generation client for an OpenAI-compatible chat completions API.
pub struct GroqClient {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl GroqClient {
    pub fn new(api_url: String, api_key: String, model: String) -> Self {
        Self {
            client: Client::default(),
            api_url,
            api_key,
            model,
            temperature: 0.0,
        }
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[async_trait]
impl TextGenerator for GroqClient {
    async fn generate(&self, prompt: &str) -> UpstreamResult<String> {
        let start = Instant::now();
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(format!("chat completion request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body, model = %self.model, "Chat completion rejected");
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))?;

        if let Some(usage) = &parsed.usage {
            tracing::debug!(
                model = %self.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Chat completion finished"
            );
        }

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| UpstreamError::Decode("completion had no choices".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, routing::post, Json, Router};
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    async fn serve(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/chat", addr)
    }

    #[tokio::test]
    async fn test_generate_returns_first_choice() {
        let app = Router::new().route(
            "/chat",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Json(json!({
                    "choices": [{"message": {"content": format!("{} | {} | {}", auth, body["model"], body["messages"][0]["content"])}}],
                    "usage": {"prompt_tokens": 3, "completion_tokens": 5}
                }))
            }),
        );
        let url = serve(app).await;

        let client = GroqClient::new(url, "key".into(), "llama".into());
        let text = client.generate("hello").await.unwrap();
        assert_eq!(text, "Bearer key | \"llama\" | \"hello\"");
    }

    #[tokio::test]
    async fn test_generate_surfaces_status() {
        let app = Router::new().route(
            "/chat",
            post(|| async { (axum::http::StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
        let url = serve(app).await;

        let client = GroqClient::new(url, "key".into(), "llama".into());
        assert_eq!(client.generate("hi").await.unwrap_err(), UpstreamError::Status(429));
    }

    #[tokio::test]
    async fn test_generate_rejects_empty_choices() {
        let app = Router::new().route("/chat", post(|| async { Json(json!({"choices": []})) }));
        let url = serve(app).await;

        let client = GroqClient::new(url, "key".into(), "llama".into());
        assert!(matches!(
            client.generate("hi").await.unwrap_err(),
            UpstreamError::Decode(_)
        ));
    }
}
