//! Command-line and environment configuration.
//!
//! Every setting can be given as a flag or through its environment variable;
//! a `.env` file in the working directory is loaded before parsing.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};

use llm::AnthropicConfig;
use orchestrator::{CollaboratorMode, ExecutorConfig};
use policy_api::BizinfoConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Compact human-readable lines.
    Pretty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Sequential,
    Concurrent,
}

impl From<ModeArg> for CollaboratorMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Sequential => CollaboratorMode::Sequential,
            ModeArg::Concurrent => CollaboratorMode::Concurrent,
        }
    }
}

/// ParcelScope land-parcel analysis service.
#[derive(Debug, Parser)]
#[command(name = "parcelscope", version, about)]
pub struct Settings {
    /// Address the HTTP API listens on.
    #[arg(long, env = "PARCELSCOPE_BIND", default_value = "0.0.0.0:8000")]
    pub bind: SocketAddr,

    // --- Knowledge collaborator (Anthropic) ---
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub anthropic_api_key: Option<String>,

    #[arg(long, env = "PARCELSCOPE_ANTHROPIC_MODEL", default_value = llm::DEFAULT_MODEL)]
    pub anthropic_model: String,

    #[arg(long, env = "PARCELSCOPE_ANTHROPIC_BASE_URL", default_value = llm::DEFAULT_BASE_URL)]
    pub anthropic_base_url: String,

    #[arg(long, env = "PARCELSCOPE_ANTHROPIC_MAX_TOKENS", default_value_t = 4096)]
    pub anthropic_max_tokens: u32,

    #[arg(long, env = "PARCELSCOPE_ANTHROPIC_TEMPERATURE", default_value_t = 0.1)]
    pub anthropic_temperature: f32,

    // --- Policy collaborator (Bizinfo) ---
    #[arg(long, env = "BIZINFO_API_KEY", hide_env_values = true)]
    pub bizinfo_api_key: Option<String>,

    #[arg(long, env = "PARCELSCOPE_BIZINFO_BASE_URL", default_value = policy_api::DEFAULT_BASE_URL)]
    pub bizinfo_base_url: String,

    #[arg(long, env = "PARCELSCOPE_BIZINFO_RESULT_COUNT", default_value_t = 10)]
    pub bizinfo_result_count: u32,

    /// Bizinfo project category code (`searchLclasId`).
    #[arg(long, env = "PARCELSCOPE_BIZINFO_CATEGORY")]
    pub bizinfo_category: Option<String>,

    // --- Pipeline ---
    /// Upper bound on each knowledge collaborator attempt, in seconds.
    #[arg(long, env = "PARCELSCOPE_KNOWLEDGE_TIMEOUT_SECS", default_value_t = 120)]
    pub knowledge_timeout_secs: u64,

    /// Upper bound on each policy collaborator attempt, in seconds.
    #[arg(long, env = "PARCELSCOPE_POLICY_TIMEOUT_SECS", default_value_t = 30)]
    pub policy_timeout_secs: u64,

    /// Attempts per collaborator call, including the first.
    #[arg(long, env = "PARCELSCOPE_MAX_ATTEMPTS", default_value_t = 1,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub max_attempts: u32,

    /// Delay between attempts when the collaborator gives no hint, in milliseconds.
    #[arg(long, env = "PARCELSCOPE_RETRY_BACKOFF_MS", default_value_t = 500)]
    pub retry_backoff_ms: u64,

    /// Longest wait between attempts, even when a provider asks for more, in milliseconds.
    #[arg(long, env = "PARCELSCOPE_MAX_RETRY_DELAY_MS", default_value_t = 30_000)]
    pub max_retry_delay_ms: u64,

    #[arg(long, env = "PARCELSCOPE_COLLABORATOR_MODE", value_enum, default_value_t = ModeArg::Sequential)]
    pub collaborator_mode: ModeArg,

    // --- Observability ---
    #[arg(long, env = "PARCELSCOPE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,

    /// OTLP gRPC endpoint; spans are exported only when set.
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

impl Settings {
    pub fn anthropic(&self) -> Result<AnthropicConfig> {
        let Some(api_key) = non_blank(self.anthropic_api_key.as_deref()) else {
            bail!("ANTHROPIC_API_KEY is not set");
        };
        let mut config = AnthropicConfig::new(api_key);
        config.model = self.anthropic_model.clone();
        config.base_url = self.anthropic_base_url.clone();
        config.max_tokens = self.anthropic_max_tokens;
        config.temperature = self.anthropic_temperature;
        // The executor enforces the pipeline bound; keep the transport bound no tighter.
        config.request_timeout = config
            .request_timeout
            .max(Duration::from_secs(self.knowledge_timeout_secs));
        Ok(config)
    }

    pub fn bizinfo(&self) -> Result<BizinfoConfig> {
        let Some(api_key) = non_blank(self.bizinfo_api_key.as_deref()) else {
            bail!("BIZINFO_API_KEY is not set");
        };
        let mut config = BizinfoConfig::new(api_key);
        config.base_url = self.bizinfo_base_url.clone();
        config.result_count = self.bizinfo_result_count;
        config.category = self.bizinfo_category.clone();
        config.request_timeout = config
            .request_timeout
            .max(Duration::from_secs(self.policy_timeout_secs));
        Ok(config)
    }

    pub fn executor(&self) -> ExecutorConfig {
        ExecutorConfig {
            max_attempts: self.max_attempts,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            max_retry_delay: Duration::from_millis(self.max_retry_delay_ms),
            mode: self.collaborator_mode.into(),
            knowledge_timeout: Duration::from_secs(self.knowledge_timeout_secs),
            policy_timeout: Duration::from_secs(self.policy_timeout_secs),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> Settings {
        let mut argv = vec!["parcelscope"];
        argv.extend_from_slice(args);
        Settings::try_parse_from(argv).unwrap()
    }

    #[test]
    fn executor_settings_come_from_flags() {
        let settings = parse(&[
            "--max-attempts",
            "3",
            "--retry-backoff-ms",
            "50",
            "--max-retry-delay-ms",
            "2000",
            "--knowledge-timeout-secs",
            "90",
            "--policy-timeout-secs",
            "10",
            "--collaborator-mode",
            "concurrent",
        ]);
        let config = settings.executor();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.retry_backoff, Duration::from_millis(50));
        assert_eq!(config.max_retry_delay, Duration::from_secs(2));
        assert_eq!(config.knowledge_timeout, Duration::from_secs(90));
        assert_eq!(config.policy_timeout, Duration::from_secs(10));
        assert_eq!(config.mode, CollaboratorMode::Concurrent);
    }

    #[test]
    fn zero_attempts_are_rejected() {
        assert!(Settings::try_parse_from(["parcelscope", "--max-attempts", "0"]).is_err());
    }

    #[test]
    fn collaborator_configs_carry_keys_and_overrides() {
        let settings = parse(&[
            "--anthropic-api-key",
            "sk-test",
            "--anthropic-model",
            "claude-test",
            "--bizinfo-api-key",
            "biz-test",
            "--bizinfo-result-count",
            "5",
            "--bizinfo-category",
            "01",
        ]);
        let anthropic = settings.anthropic().unwrap();
        assert_eq!(anthropic.api_key, "sk-test");
        assert_eq!(anthropic.model, "claude-test");

        let bizinfo = settings.bizinfo().unwrap();
        assert_eq!(bizinfo.api_key, "biz-test");
        assert_eq!(bizinfo.result_count, 5);
        assert_eq!(bizinfo.category.as_deref(), Some("01"));
    }

    #[test]
    fn blank_keys_are_a_startup_error() {
        let settings = parse(&["--anthropic-api-key", " ", "--bizinfo-api-key", ""]);
        assert!(settings.anthropic().is_err());
        assert!(settings.bizinfo().is_err());
    }

    #[test]
    fn log_format_parses() {
        let settings = parse(&["--log-format", "pretty"]);
        assert_eq!(settings.log_format, LogFormat::Pretty);
    }
}
