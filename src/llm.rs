use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::{LlmSettings, API_KEY_PLACEHOLDER};
use crate::logger::Logger;

#[derive(Debug, Error)]
pub(crate) enum LlmError {
    #[error("unsupported LLM provider '{0}' (expected openai, deepseek or openrouter)")]
    UnsupportedProvider(String),

    #[error("no API key configured for provider '{0}'; set llm.api_key in the config")]
    MissingApiKey(String),

    #[error("LLM request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("LLM endpoint {url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("LLM response contained no message content")]
    EmptyResponse,

    #[error("failed to decode LLM response envelope: {0}")]
    Decode(String),
}

impl LlmError {
    /// Errors the user fixes in the config rather than by retrying.
    pub(crate) fn is_setup(&self) -> bool {
        matches!(self, Self::UnsupportedProvider(_) | Self::MissingApiKey(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ChatMessage {
    pub(crate) role: String,
    pub(crate) content: String,
}

impl ChatMessage {
    pub(crate) fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub(crate) fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// One chat-completion round trip.
pub(crate) trait ChatClient {
    fn chat(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LlmProvider {
    OpenAiCompatible {
        provider: String,
        base_url: String,
        model: String,
        api_key: String,
    },
}

impl LlmProvider {
    pub(crate) fn from_settings(settings: &LlmSettings) -> Result<Self, LlmError> {
        let provider = settings.provider.trim().to_lowercase();
        let default_base = match provider.as_str() {
            "openai" => "https://api.openai.com/v1",
            "deepseek" => "https://api.deepseek.com/v1",
            "openrouter" => "https://openrouter.ai/api/v1",
            _ => return Err(LlmError::UnsupportedProvider(settings.provider.clone())),
        };
        let api_key = settings.api_key.trim();
        if api_key.is_empty() || api_key == API_KEY_PLACEHOLDER {
            return Err(LlmError::MissingApiKey(provider));
        }
        let base_url = match settings.base_url.trim() {
            "" => default_base.to_string(),
            custom => custom.trim_end_matches('/').to_string(),
        };
        Ok(Self::OpenAiCompatible {
            provider,
            base_url,
            model: settings.model.clone(),
            api_key: api_key.to_string(),
        })
    }

    pub(crate) fn name(&self) -> &str {
        match self {
            Self::OpenAiCompatible { provider, .. } => provider,
        }
    }

    pub(crate) fn model(&self) -> &str {
        match self {
            Self::OpenAiCompatible { model, .. } => model,
        }
    }

    pub(crate) fn endpoint(&self) -> String {
        match self {
            Self::OpenAiCompatible { base_url, .. } => format!("{}/chat/completions", base_url),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

pub(crate) fn extract_content(body: &str) -> Result<String, LlmError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|err| LlmError::Decode(err.to_string()))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(LlmError::EmptyResponse)
}

/// Blocking HTTP client for OpenAI-compatible `/chat/completions` endpoints.
pub(crate) struct HttpChatClient<'a> {
    provider: LlmProvider,
    agent: ureq::Agent,
    logger: &'a Logger,
}

impl<'a> HttpChatClient<'a> {
    pub(crate) fn new(provider: LlmProvider, timeout_secs: u64, logger: &'a Logger) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build();
        Self {
            provider,
            agent,
            logger,
        }
    }

    pub(crate) fn provider(&self) -> &LlmProvider {
        &self.provider
    }
}

impl ChatClient for HttpChatClient<'_> {
    fn chat(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let LlmProvider::OpenAiCompatible { model, api_key, .. } = &self.provider;
        let url = self.provider.endpoint();
        let body = serde_json::to_string(&ChatRequest { model, messages })
            .map_err(|err| LlmError::Decode(err.to_string()))?;

        self.logger.log_event(&format!(
            "llm request provider={} model={} messages={}",
            self.provider.name(),
            model,
            messages.len()
        ));
        self.logger.debug_dump("llm request", &body);

        let response = self
            .agent
            .post(&url)
            .set("Content-Type", "application/json")
            .set("Authorization", &format!("Bearer {}", api_key))
            .send_string(&body);

        let text = match response {
            Ok(resp) => resp.into_string().map_err(|err| LlmError::Request {
                url: url.clone(),
                message: err.to_string(),
            })?,
            Err(ureq::Error::Status(status, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                self.logger
                    .log_event(&format!("llm response status={}", status));
                return Err(LlmError::Status { url, status, body });
            }
            Err(err) => {
                return Err(LlmError::Request {
                    url,
                    message: err.to_string(),
                })
            }
        };

        self.logger
            .log_event(&format!("llm response bytes={}", text.len()));
        self.logger.debug_dump("llm response", &text);
        extract_content(&text)
    }
}

/// Removes a surrounding Markdown code fence (```` ``` ```` or ```` ```json ````).
pub(crate) fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = match rest.get(..4) {
        Some(lang) if lang.eq_ignore_ascii_case("json") => &rest[4..],
        _ => rest,
    };
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}
