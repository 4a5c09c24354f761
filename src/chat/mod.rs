//! Client for the hosted chat APIs.
//!
//! One message in, one reply out. Retries, streaming and conversation
//! history are left to the provider.

mod anthropic;
mod openai;

use crate::Config;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatProvider {
    /// Chat-completions API (`/chat/completions`)
    OpenAi,
    /// Messages API (`/messages`)
    Anthropic,
}

impl ChatProvider {
    pub fn default_api_base(&self) -> &'static str {
        match self {
            ChatProvider::OpenAi => "https://api.openai.com/v1",
            ChatProvider::Anthropic => "https://api.anthropic.com/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ChatProvider::OpenAi => "gpt-3.5-turbo",
            ChatProvider::Anthropic => "claude-3-5-sonnet-latest",
        }
    }
}

impl FromStr for ChatProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(ChatProvider::OpenAi),
            "anthropic" => Ok(ChatProvider::Anthropic),
            other => Err(anyhow::anyhow!(
                "Unsupported chat provider: {other}. Use 'openai' or 'anthropic'"
            )),
        }
    }
}

impl fmt::Display for ChatProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatProvider::OpenAi => f.write_str("openai"),
            ChatProvider::Anthropic => f.write_str("anthropic"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Chat API key is not configured")]
    NotConfigured,

    #[error("Chat API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Chat API returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Chat API returned no reply text")]
    EmptyReply,
}

#[derive(Clone)]
pub struct ChatSettings {
    pub provider: ChatProvider,
    pub api_base: String,
    pub model: String,
    pub system_prompt: String,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub api_key: Option<String>,
}

impl fmt::Debug for ChatSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatSettings")
            .field("provider", &self.provider)
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ChatSettings {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let provider: ChatProvider = config.chat_provider.parse()?;
        let api_base = config
            .chat_api_base
            .clone()
            .unwrap_or_else(|| provider.default_api_base().to_string());
        let model = config
            .chat_model
            .clone()
            .unwrap_or_else(|| provider.default_model().to_string());

        Ok(Self {
            provider,
            api_base: api_base.trim_end_matches('/').to_string(),
            model,
            system_prompt: config.chat_system_prompt.clone(),
            max_tokens: config.chat_max_tokens,
            timeout: Duration::from_secs(config.chat_timeout_secs),
            api_key: config.chat_api_key.clone().filter(|key| !key.is_empty()),
        })
    }
}

#[derive(Clone, Debug)]
pub struct ChatClient {
    http: reqwest::Client,
    settings: ChatSettings,
}

impl ChatClient {
    pub fn new(settings: ChatSettings) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(Self { http, settings })
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    pub fn is_configured(&self) -> bool {
        self.settings.api_key.is_some()
    }

    /// Send a single user message and return the assistant's reply text
    pub async fn reply(&self, message: &str) -> Result<String, ChatError> {
        let Some(api_key) = self.settings.api_key.as_deref() else {
            return Err(ChatError::NotConfigured);
        };

        let settings = &self.settings;
        debug!(
            provider = %settings.provider,
            model = %settings.model,
            chars = message.chars().count(),
            "Sending chat message"
        );

        let request = match settings.provider {
            ChatProvider::OpenAi => self
                .http
                .post(format!("{}/chat/completions", settings.api_base))
                .bearer_auth(api_key)
                .json(&openai::request_body(settings, message)),
            ChatProvider::Anthropic => self
                .http
                .post(format!("{}/messages", settings.api_base))
                .header("x-api-key", api_key)
                .header("anthropic-version", anthropic::API_VERSION)
                .json(&anthropic::request_body(settings, message)),
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(provider = %settings.provider, %status, "Chat API returned an error");
            return Err(ChatError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let reply = match settings.provider {
            ChatProvider::OpenAi => openai::reply_text(response.json().await?),
            ChatProvider::Anthropic => anthropic::reply_text(response.json().await?),
        };

        reply
            .filter(|text| !text.trim().is_empty())
            .ok_or(ChatError::EmptyReply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(provider: ChatProvider, api_base: String) -> ChatSettings {
        ChatSettings {
            provider,
            api_base,
            model: "test-model".to_string(),
            system_prompt: "You are a helpful assistant.".to_string(),
            max_tokens: 64,
            timeout: Duration::from_secs(5),
            api_key: Some("test-key".to_string()),
        }
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!("openai".parse::<ChatProvider>().unwrap(), ChatProvider::OpenAi);
        assert_eq!(
            "Anthropic".parse::<ChatProvider>().unwrap(),
            ChatProvider::Anthropic
        );
        assert!("gemini".parse::<ChatProvider>().is_err());
    }

    #[test]
    fn test_settings_from_config_uses_provider_defaults() {
        let config = Config {
            chat_provider: "anthropic".to_string(),
            chat_api_key: Some(String::new()),
            ..Default::default()
        };
        let settings = ChatSettings::from_config(&config).unwrap();

        assert_eq!(settings.api_base, "https://api.anthropic.com/v1");
        assert_eq!(settings.model, "claude-3-5-sonnet-latest");
        // empty key counts as missing
        assert!(settings.api_key.is_none());
    }

    #[test]
    fn test_settings_debug_redacts_key() {
        let settings = settings(ChatProvider::OpenAi, "http://localhost".to_string());
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("test-key"));
        assert!(rendered.contains("<redacted>"));
    }

    #[tokio::test]
    async fn test_openai_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({
                "model": "test-model",
                "messages": [
                    {"role": "system", "content": "You are a helpful assistant."},
                    {"role": "user", "content": "hello"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "hi there"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ChatClient::new(settings(ChatProvider::OpenAi, server.uri())).unwrap();
        assert_eq!(client.reply("hello").await.unwrap(), "hi there");

        // the token limit is only sent to the messages API
        let requests = server.received_requests().await.unwrap();
        let sent: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(sent.get("max_tokens").is_none());
    }

    #[tokio::test]
    async fn test_anthropic_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", anthropic::API_VERSION))
            .and(body_partial_json(json!({
                "model": "test-model",
                "max_tokens": 64,
                "messages": [{"role": "user", "content": "hello"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [
                    {"type": "text", "text": "hi "},
                    {"type": "text", "text": "there"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ChatClient::new(settings(ChatProvider::Anthropic, server.uri())).unwrap();
        assert_eq!(client.reply("hello").await.unwrap(), "hi there");
    }

    #[tokio::test]
    async fn test_upstream_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .expect(1)
            .mount(&server)
            .await;

        let client = ChatClient::new(settings(ChatProvider::OpenAi, server.uri())).unwrap();
        let error = client.reply("hello").await.unwrap_err();
        assert!(matches!(error, ChatError::Upstream { status: 429, .. }));
    }

    #[tokio::test]
    async fn test_empty_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let client = ChatClient::new(settings(ChatProvider::OpenAi, server.uri())).unwrap();
        assert!(matches!(
            client.reply("hello").await,
            Err(ChatError::EmptyReply)
        ));
    }

    #[tokio::test]
    async fn test_missing_key_skips_request() {
        let mut settings = settings(ChatProvider::OpenAi, "http://127.0.0.1:9".to_string());
        settings.api_key = None;

        let client = ChatClient::new(settings).unwrap();
        assert!(!client.is_configured());
        assert!(matches!(
            client.reply("hello").await,
            Err(ChatError::NotConfigured)
        ));
    }
}
