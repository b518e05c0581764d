//! Claude Messages API client used to draft news copy and match predictions.

use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

const CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, Error)]
pub enum ClaudeApiError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("rate limited")]
    RateLimited,
    #[error("invalid api key")]
    InvalidApiKey,
    #[error("json error: {0}")]
    Serde(String),
    #[error("AI generation is not configured: ANTHROPIC_API_KEY is not set")]
    MissingApiKey,
}

impl ClaudeApiError {
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout | Self::RateLimited => true,
            Self::Http { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }
}

/// Anything that can turn a prompt into a JSON document. News and
/// prediction generation depend on this rather than on the HTTP client.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn ask_json(
        &self,
        prompt: &str,
        system: &str,
        max_tokens: u32,
    ) -> Result<serde_json::Value, ClaudeApiError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ClaudeRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message>,
    system: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
}

impl ClaudeResponse {
    fn text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            ContentBlock::Other => None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ClaudeApiClient {
    http: Client,
    api_key: SecretString,
    model: String,
}

impl ClaudeApiClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

    /// Build a client from the configured key; `CLAUDE_MODEL` overrides the
    /// default model.
    pub fn from_key(api_key: Option<&SecretString>) -> Result<Self, ClaudeApiError> {
        let api_key = api_key.cloned().ok_or(ClaudeApiError::MissingApiKey)?;
        let model = std::env::var("CLAUDE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("ballmtaani/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClaudeApiError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            model,
        })
    }

    async fn complete(&self, prompt: &str, system: &str, max_tokens: u32) -> Result<String, ClaudeApiError> {
        let request = ClaudeRequest {
            model: &self.model,
            max_tokens,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            system,
        };

        let response = (|| async { self.send_request(&request).await })
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Duration::from_secs(1))
                    .with_max_delay(Duration::from_secs(20))
                    .with_max_times(3)
                    .with_jitter(),
            )
            .when(|e: &ClaudeApiError| e.should_retry())
            .notify(|e, dur| {
                warn!(
                    "Claude API call failed, retrying after {:.2}s: {}",
                    dur.as_secs_f64(),
                    e
                )
            })
            .await?;

        if response.stop_reason.as_deref() == Some("max_tokens") {
            warn!(max_tokens, "Claude response was cut off at max_tokens");
        }

        response
            .text()
            .map(str::to_string)
            .ok_or_else(|| ClaudeApiError::Serde("No text content in response".to_string()))
    }

    async fn send_request(&self, request: &ClaudeRequest<'_>) -> Result<ClaudeResponse, ClaudeApiError> {
        let res = self
            .http
            .post(CLAUDE_API_URL)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => res
                .json::<ClaudeResponse>()
                .await
                .map_err(|e| ClaudeApiError::Serde(e.to_string())),
            StatusCode::UNAUTHORIZED => Err(ClaudeApiError::InvalidApiKey),
            StatusCode::TOO_MANY_REQUESTS => Err(ClaudeApiError::RateLimited),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(ClaudeApiError::Http { status, body })
            }
        }
    }
}

#[async_trait]
impl ContentGenerator for ClaudeApiClient {
    async fn ask_json(
        &self,
        prompt: &str,
        system: &str,
        max_tokens: u32,
    ) -> Result<serde_json::Value, ClaudeApiError> {
        let text = self.complete(prompt, system, max_tokens).await?;
        parse_json_reply(&text)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ClaudeApiError {
    if e.is_timeout() {
        ClaudeApiError::Timeout
    } else {
        ClaudeApiError::Transport(e.to_string())
    }
}

/// Parse a model reply that should be JSON but may arrive wrapped in a
/// markdown code fence or with a sentence in front of it.
pub fn parse_json_reply(reply: &str) -> Result<serde_json::Value, ClaudeApiError> {
    let json_str = extract_json(reply);
    if json_str.is_empty() {
        return Err(ClaudeApiError::Serde("Empty response from Claude".to_string()));
    }

    serde_json::from_str(json_str).map_err(|e| {
        error!(
            json_error = %e,
            preview = %json_str.chars().take(300).collect::<String>(),
            "Failed to parse JSON reply from Claude"
        );
        ClaudeApiError::Serde(e.to_string())
    })
}

fn extract_json(text: &str) -> &str {
    let text = text.trim();

    if let Some(start) = text.find("```") {
        let after_fence = start + 3;
        // Skip a language tag such as `json` on the fence line
        let body_start = text[after_fence..]
            .find('\n')
            .map(|i| after_fence + i + 1)
            .unwrap_or(after_fence);
        if let Some(end) = text[body_start..].find("```") {
            return text[body_start..body_start + end].trim();
        }
    }

    // Prose before the object: take the outermost braces
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Replays canned replies in order.
    pub(crate) struct ScriptedGenerator {
        replies: Mutex<Vec<Result<serde_json::Value, ClaudeApiError>>>,
    }

    impl ScriptedGenerator {
        pub(crate) fn new(replies: Vec<Result<serde_json::Value, ClaudeApiError>>) -> Self {
            Self {
                replies: Mutex::new(replies),
            }
        }
    }

    #[async_trait]
    impl ContentGenerator for ScriptedGenerator {
        async fn ask_json(
            &self,
            _prompt: &str,
            _system: &str,
            _max_tokens: u32,
        ) -> Result<serde_json::Value, ClaudeApiError> {
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                return Err(ClaudeApiError::Serde("no scripted reply left".to_string()));
            }
            replies.remove(0)
        }
    }

    #[test]
    fn test_extract_json_plain() {
        assert_eq!(extract_json(r#"{"key": "value"}"#), r#"{"key": "value"}"#);
    }

    #[test]
    fn test_extract_json_fenced() {
        let input = "Here you go:\n```json\n{\"title\": \"Derby day\"}\n```";
        assert_eq!(extract_json(input), r#"{"title": "Derby day"}"#);
    }

    #[test]
    fn test_extract_json_with_leading_prose() {
        let input = r#"Sure! {"outcome": "home"} Hope that helps."#;
        assert_eq!(extract_json(input), r#"{"outcome": "home"}"#);
    }

    #[test]
    fn test_parse_json_reply_rejects_prose() {
        assert!(matches!(
            parse_json_reply("I cannot predict football."),
            Err(ClaudeApiError::Serde(_))
        ));
    }

    #[test]
    fn test_missing_key() {
        assert!(matches!(
            ClaudeApiClient::from_key(None),
            Err(ClaudeApiError::MissingApiKey)
        ));
    }
}
