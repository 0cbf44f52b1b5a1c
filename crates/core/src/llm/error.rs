use crate::llm::Provider;
use serde_json::Value;
use std::fmt;

/// Chat-completion failure with enough context to debug the provider response.
#[derive(Debug, Clone)]
pub struct LlmDiagnosticsError {
    pub provider: Provider,
    pub stage: &'static str,
    pub detail: String,
    pub raw_output: Option<String>,
    pub raw_response_json: Option<Value>,
}

impl LlmDiagnosticsError {
    pub fn new(provider: Provider, stage: &'static str, detail: impl Into<String>) -> Self {
        Self {
            provider,
            stage,
            detail: detail.into(),
            raw_output: None,
            raw_response_json: None,
        }
    }

    pub fn with_raw_output(mut self, raw: String) -> Self {
        self.raw_response_json = serde_json::from_str::<Value>(&raw).ok();
        self.raw_output = Some(raw);
        self
    }
}

impl fmt::Display for LlmDiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LLM error (provider={}, stage={}): {}",
            self.provider, self.stage, self.detail
        )
    }
}

impl std::error::Error for LlmDiagnosticsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_raw_body_and_parses_json_when_possible() {
        let err = LlmDiagnosticsError::new(Provider::Perplexity, "http", "status=429")
            .with_raw_output(r#"{"error":{"message":"rate limited"}}"#.to_string());
        assert!(err.raw_response_json.is_some());
        assert_eq!(
            err.to_string(),
            "LLM error (provider=perplexity, stage=http): status=429"
        );

        let err = LlmDiagnosticsError::new(Provider::OpenAI, "http", "status=502")
            .with_raw_output("<html>bad gateway</html>".to_string());
        assert!(err.raw_response_json.is_none());
        assert!(err.raw_output.is_some());
    }
}
