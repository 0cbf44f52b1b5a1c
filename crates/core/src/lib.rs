pub mod analysis;
pub mod domain;
pub mod error;
pub mod llm;
pub mod market;
pub mod news;
pub mod report;

pub mod config {
    use anyhow::Context;
    use serde::Serialize;

    const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 15;
    const DEFAULT_ANALYST_TASK_TIMEOUT_SECS: u64 = 30;

    #[derive(Debug, Clone, Default)]
    pub struct Settings {
        pub alpha_vantage_api_key: Option<String>,
        pub alpha_vantage_base_url: Option<String>,
        pub perplexity_api_key: Option<String>,
        pub perplexity_base_url: Option<String>,
        pub perplexity_model: Option<String>,
        pub openai_api_key: Option<String>,
        pub openai_base_url: Option<String>,
        pub openai_model: Option<String>,
        pub upstream_timeout_secs: u64,
        pub analyst_task_timeout_secs: u64,
        pub sentry_dsn: Option<String>,
        pub environment: Option<String>,
    }

    /// Which upstream vendors have credentials, reported by the status endpoint.
    #[derive(Debug, Clone, Copy, Serialize)]
    pub struct ConfiguredServices {
        pub alpha_vantage: bool,
        pub perplexity: bool,
        pub openai: bool,
        pub sentry: bool,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                alpha_vantage_api_key: non_empty_var("ALPHA_VANTAGE_API_KEY"),
                alpha_vantage_base_url: non_empty_var("ALPHA_VANTAGE_BASE_URL"),
                perplexity_api_key: non_empty_var("PERPLEXITY_API_KEY"),
                perplexity_base_url: non_empty_var("PERPLEXITY_BASE_URL"),
                perplexity_model: non_empty_var("PERPLEXITY_MODEL"),
                openai_api_key: non_empty_var("OPENAI_API_KEY"),
                openai_base_url: non_empty_var("OPENAI_BASE_URL"),
                openai_model: non_empty_var("OPENAI_MODEL"),
                upstream_timeout_secs: std::env::var("UPSTREAM_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS),
                analyst_task_timeout_secs: std::env::var("ANALYST_TASK_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(DEFAULT_ANALYST_TASK_TIMEOUT_SECS),
                sentry_dsn: non_empty_var("SENTRY_DSN"),
                environment: non_empty_var("ENVIRONMENT"),
            })
        }

        pub fn require_alpha_vantage_api_key(&self) -> anyhow::Result<&str> {
            self.alpha_vantage_api_key
                .as_deref()
                .context("ALPHA_VANTAGE_API_KEY is required")
        }

        pub fn require_perplexity_api_key(&self) -> anyhow::Result<&str> {
            self.perplexity_api_key
                .as_deref()
                .context("PERPLEXITY_API_KEY is required")
        }

        pub fn require_openai_api_key(&self) -> anyhow::Result<&str> {
            self.openai_api_key
                .as_deref()
                .context("OPENAI_API_KEY is required")
        }

        pub fn configured_services(&self) -> ConfiguredServices {
            ConfiguredServices {
                alpha_vantage: self.alpha_vantage_api_key.is_some(),
                perplexity: self.perplexity_api_key.is_some(),
                openai: self.openai_api_key.is_some(),
                sentry: self.sentry_dsn.is_some(),
            }
        }

        pub fn upstream_timeout(&self) -> std::time::Duration {
            std::time::Duration::from_secs(self.upstream_timeout_secs.max(1))
        }

        pub fn analyst_task_timeout(&self) -> std::time::Duration {
            std::time::Duration::from_secs(self.analyst_task_timeout_secs.max(1))
        }
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn missing_keys_are_reported_as_unconfigured() {
            let settings = Settings {
                alpha_vantage_api_key: Some("demo".to_string()),
                ..Default::default()
            };
            let services = settings.configured_services();
            assert!(services.alpha_vantage);
            assert!(!services.perplexity);
            assert!(!services.openai);
            assert!(settings.require_openai_api_key().is_err());
        }

        #[test]
        fn zero_timeouts_are_raised_to_one_second() {
            let settings = Settings::default();
            assert_eq!(settings.upstream_timeout().as_secs(), 1);
            assert_eq!(settings.analyst_task_timeout().as_secs(), 1);
        }
    }
}
