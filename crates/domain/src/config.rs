//! Service configuration.
//!
//! Config is environment-driven (the deployment contract): every knob has a
//! default, [`Config::from_env`] overlays the process environment, and
//! [`Config::validate`] reports issues with severities so the binary can log
//! warnings and refuse to start on errors.

use std::fmt;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub live: LiveConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_8080")]
    pub port: u16,
    /// Base URL used when generating the webhook callback for outbound
    /// calls. When unset, forwarded host headers are used instead.
    #[serde(default)]
    pub public_base_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: d_host(),
            port: d_8080(),
            public_base_url: None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Telephony provider
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider account identifier; inbound events carrying a different
    /// account are rejected.
    #[serde(default)]
    pub account_id: Option<String>,
    /// Shared secret for webhook signature verification and dial-out auth.
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default = "d_provider_url")]
    pub base_url: String,
    /// Number the outbound monitor call is placed from.
    #[serde(default)]
    pub from_number: Option<String>,
    /// Disables webhook signature verification. Tests only.
    #[serde(default)]
    pub skip_signature_validation: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            account_id: None,
            auth_token: None,
            base_url: d_provider_url(),
            from_number: None,
            skip_signature_validation: false,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Model scorer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// When absent, the model scorer is disabled and coaching runs on the
    /// heuristic alone.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "d_model_name")]
    pub name: String,
    #[serde(default = "d_model_url")]
    pub base_url: String,
    #[serde(default = "d_30")]
    pub rpm_limit: u32,
    /// Overrides the derived minimum interval between model calls.
    #[serde(default)]
    pub min_interval_ms: Option<u64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            name: d_model_name(),
            base_url: d_model_url(),
            rpm_limit: d_30(),
            min_interval_ms: None,
        }
    }
}

impl ModelConfig {
    /// Minimum spacing between model calls for one call session:
    /// `max(2800, ceil(60000 / rpm) + 400)` milliseconds, unless overridden.
    pub fn min_interval_ms(&self) -> u64 {
        if let Some(ms) = self.min_interval_ms {
            return ms;
        }
        let rpm = u64::from(self.rpm_limit.max(1));
        let per_request = 60_000_u64.div_ceil(rpm) + 400;
        per_request.max(2_800)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Live view
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveConfig {
    /// Transcript tail length served by the snapshot endpoint, clamped
    /// to `[1, 500]`.
    #[serde(default = "d_200")]
    pub transcript_limit: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            transcript_limit: d_200(),
        }
    }
}

impl LiveConfig {
    pub fn clamped_transcript_limit(&self) -> usize {
        self.transcript_limit.clamp(1, 500)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Environment loading
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl Config {
    /// Build a config from defaults overlaid with the process environment.
    pub fn from_env() -> Self {
        let mut cfg = Config::default();

        if let Some(host) = env_str("BIND_ADDR") {
            cfg.server.host = host;
        }
        if let Some(port) = env_parse::<u16>("PORT") {
            cfg.server.port = port;
        }
        cfg.server.public_base_url = env_str("PUBLIC_BASE_URL").or_else(|| env_str("APP_BASE_URL"));

        cfg.provider.account_id = env_str("PROVIDER_ACCOUNT_ID");
        cfg.provider.auth_token = env_str("PROVIDER_AUTH_TOKEN");
        if let Some(url) = env_str("PROVIDER_BASE_URL") {
            cfg.provider.base_url = url;
        }
        cfg.provider.from_number = env_str("PROVIDER_FROM_NUMBER");
        cfg.provider.skip_signature_validation =
            env_str("WEBHOOK_SKIP_SIGNATURE_VALIDATION").as_deref() == Some("1");

        cfg.model.api_key = env_str("MODEL_API_KEY");
        if let Some(name) = env_str("MODEL_NAME") {
            cfg.model.name = name;
        }
        if let Some(url) = env_str("MODEL_BASE_URL") {
            cfg.model.base_url = url;
        }
        if let Some(rpm) = env_parse::<u32>("MODEL_RPM_LIMIT") {
            cfg.model.rpm_limit = rpm;
        }
        cfg.model.min_interval_ms = env_parse::<u64>("MODEL_MIN_INTERVAL_MS");

        if let Some(limit) = env_parse::<usize>("LIVE_TRANSCRIPT_LIMIT") {
            cfg.live.transcript_limit = limit;
        }

        cfg
    }
}

fn env_str(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env_str(key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "unparseable env value ignored");
            None
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }

        if self.model.rpm_limit == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "model.rpm_limit".into(),
                message: "rpm limit must be greater than 0".into(),
            });
        }

        for (field, url) in [
            ("provider.base_url", &self.provider.base_url),
            ("model.base_url", &self.model.base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: field.into(),
                    message: format!("must start with http:// or https:// (got \"{url}\")"),
                });
            }
        }

        if self.provider.auth_token.is_some() && self.provider.account_id.is_none() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "provider.account_id".into(),
                message: "auth token set without an account id — inbound account \
                          matching is disabled"
                    .into(),
            });
        }

        if self.provider.auth_token.is_none() && !self.provider.skip_signature_validation {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "provider.auth_token".into(),
                message: "no auth token — webhook signatures cannot be verified".into(),
            });
        }

        if self.provider.skip_signature_validation {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "provider.skip_signature_validation".into(),
                message: "signature validation is DISABLED — test configuration only".into(),
            });
        }

        if self.live.transcript_limit != self.live.clamped_transcript_limit() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "live.transcript_limit".into(),
                message: format!(
                    "{} is outside [1, 500] and will be clamped",
                    self.live.transcript_limit
                ),
            });
        }

        if self.model.api_key.is_none() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "model.api_key".into(),
                message: "no model API key — coaching runs on the heuristic scorer only".into(),
            });
        }

        errors
    }
}

fn d_host() -> String {
    "0.0.0.0".into()
}

fn d_8080() -> u16 {
    8080
}

fn d_provider_url() -> String {
    "https://api.twilio.com".into()
}

fn d_model_name() -> String {
    "gpt-4o-mini".into()
}

fn d_model_url() -> String {
    "https://api.openai.com".into()
}

fn d_30() -> u32 {
    30
}

fn d_200() -> usize {
    200
}
