use crate::config::Settings;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::{ChatPrompt, LlmClient, Provider};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4";
const PERPLEXITY_DEFAULT_BASE_URL: &str = "https://api.perplexity.ai";
const PERPLEXITY_DEFAULT_MODEL: &str = "llama-3.1-sonar-large-128k-online";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    provider: Provider,
    api_key: String,
    base_url: String,
    model: String,
}

impl ChatCompletionsClient {
    pub fn openai_from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_openai_api_key()?.to_string();
        Self::new(
            Provider::OpenAI,
            api_key,
            settings
                .openai_base_url
                .clone()
                .unwrap_or_else(|| OPENAI_DEFAULT_BASE_URL.to_string()),
            settings
                .openai_model
                .clone()
                .unwrap_or_else(|| OPENAI_DEFAULT_MODEL.to_string()),
        )
    }

    pub fn perplexity_from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_perplexity_api_key()?.to_string();
        Self::new(
            Provider::Perplexity,
            api_key,
            settings
                .perplexity_base_url
                .clone()
                .unwrap_or_else(|| PERPLEXITY_DEFAULT_BASE_URL.to_string()),
            settings
                .perplexity_model
                .clone()
                .unwrap_or_else(|| PERPLEXITY_DEFAULT_MODEL.to_string()),
        )
    }

    fn new(
        provider: Provider,
        api_key: String,
        base_url: String,
        model: String,
    ) -> anyhow::Result<Self> {
        let timeout_secs = std::env::var("LLM_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build chat completions http client")?;

        Ok(Self {
            http,
            provider,
            api_key,
            base_url,
            model,
        })
    }

    fn request(&self, prompt: &ChatPrompt, max_tokens: u32) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system",
                    content: prompt.system.clone(),
                },
                Message {
                    role: "user",
                    content: prompt.user.clone(),
                },
            ],
            temperature: prompt.temperature,
            max_tokens,
            search_recency_filter: match self.provider {
                Provider::Perplexity => prompt.search_recency_filter,
                Provider::OpenAI => None,
            },
        }
    }

    async fn create_completion(
        &self,
        req: &ChatCompletionRequest,
    ) -> anyhow::Result<ChatCompletionResponse> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(req)
            .send()
            .await
            .with_context(|| format!("{} request failed", self.provider))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .with_context(|| format!("failed to read {} response body", self.provider))?;
        if !status.is_success() {
            return Err(
                LlmDiagnosticsError::new(self.provider, "http", format!("status={status}"))
                    .with_raw_output(text)
                    .into(),
            );
        }

        serde_json::from_str::<ChatCompletionResponse>(&text).map_err(|e| {
            LlmDiagnosticsError::new(self.provider, "decode", e.to_string())
                .with_raw_output(text)
                .into()
        })
    }

    fn response_text(res: &ChatCompletionResponse) -> Option<String> {
        res.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

#[async_trait::async_trait]
impl LlmClient for ChatCompletionsClient {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn complete(&self, prompt: ChatPrompt) -> anyhow::Result<String> {
        let mut res = self
            .create_completion(&self.request(&prompt, prompt.max_tokens))
            .await?;

        // A truncated answer usually breaks the JSON we ask for; retry once with more room.
        if res.finish_reason() == Some("length") {
            let bumped = prompt.max_tokens.saturating_mul(2).max(2048);
            tracing::warn!(
                provider = %self.provider,
                from = prompt.max_tokens,
                to = bumped,
                "finish_reason=length; retrying once with higher max_tokens"
            );
            res = self.create_completion(&self.request(&prompt, bumped)).await?;
        }

        Self::response_text(&res).ok_or_else(|| {
            LlmDiagnosticsError::new(self.provider, "empty_choice", "no assistant content").into()
        })
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    search_recency_filter: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

impl ChatCompletionResponse {
    fn finish_reason(&self) -> Option<&str> {
        self.choices.first().and_then(|c| c.finish_reason.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
