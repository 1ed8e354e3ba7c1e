//! Configuration system for Condense.

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::session::RETENTION_WINDOW;

/// Main configuration struct for Condense.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,
    /// Compression settings
    pub compression: CompressionConfig,
    /// Session lifetime settings
    pub sessions: SessionsConfig,
    /// Provider configurations
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Default provider
    pub provider: String,
    /// Model used for chat replies; unset uses the provider's default
    pub model: Option<String>,
    /// Maximum tokens per reply
    pub max_tokens: u32,
    /// Temperature for chat replies
    pub temperature: f32,
    /// System prompt sent with every chat turn
    pub system_prompt: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: None,
            max_tokens: 4096,
            temperature: 0.7,
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Whether new sessions start with compression enabled
    pub enabled: bool,
    /// Eligible message count that triggers compression
    pub threshold: usize,
    /// Model used for summarization (prefer fast/cheap models); unset uses
    /// the provider's default
    pub model: Option<String>,
    /// Temperature for summary generation (lower = more focused)
    pub temperature: f32,
    /// Maximum tokens for a generated summary
    pub max_summary_tokens: u32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 10,
            model: None,
            temperature: 0.3,
            max_summary_tokens: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Idle time after which a session is evicted
    pub idle_ttl_secs: u64,
    /// How often the idle sweep runs
    pub sweep_interval_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: 24 * 60 * 60,
            sweep_interval_secs: 60 * 60,
        }
    }
}

impl SessionsConfig {
    pub fn idle_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.idle_ttl_secs)
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Default provider to use
    pub default_provider: Option<String>,
    /// Anthropic configuration
    pub anthropic: Option<ProviderConfig>,
    /// OpenAI (or OpenAI-compatible) configuration
    pub openai: Option<ProviderConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API key (can be set directly or via environment)
    pub api_key: Option<String>,
    /// Environment variable name for API key
    pub api_key_env: Option<String>,
    /// Default model for this provider
    pub default_model: Option<String>,
    /// Base URL (optional, for custom endpoints)
    pub base_url: Option<String>,
}

impl ProviderConfig {
    /// Resolve the API key from either direct value or environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }
        if let Some(ref env_var) = self.api_key_env {
            if let Ok(key) = std::env::var(env_var) {
                return Some(key);
            }
        }
        None
    }
}

/// Validation result with multiple issues.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// List of validation issues
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self { issues: Vec::new() }
    }

    /// Check if validation passed (no errors).
    pub fn is_ok(&self) -> bool {
        !self.issues.iter().any(|i| i.severity == IssueSeverity::Error)
    }

    /// Get only error-level issues.
    pub fn errors(&self) -> Vec<&ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Error)
            .collect()
    }

    /// Get only warning-level issues.
    pub fn warnings(&self) -> Vec<&ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Warning)
            .collect()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity: IssueSeverity::Error,
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity: IssueSeverity::Warning,
            field: field.into(),
            message: message.into(),
        });
    }
}

/// A single validation issue.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity of the issue
    pub severity: IssueSeverity,
    /// Field path (e.g., "compression.threshold")
    pub field: String,
    /// Human-readable message
    pub message: String,
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    /// Warnings don't prevent loading
    Warning,
    /// Errors prevent loading
    Error,
}

impl Config {
    /// Load configuration from all default sources.
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment(None).extract()
    }

    /// Load configuration, layering an explicit file over the defaults.
    pub fn load_from(path: &Path) -> Result<Self, figment::Error> {
        Self::figment(Some(path)).extract()
    }

    fn figment(explicit: Option<&Path>) -> Figment {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            // User config
            .merge(Toml::file(Self::config_dir().join("config.toml")))
            // Project config
            .merge(Toml::file(".condense/config.toml"));

        if let Some(path) = explicit {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed("CONDENSE_").split("__"))
    }

    /// Fail on validation errors, log warnings.
    pub fn ensure_valid(&self) -> Result<(), Error> {
        let result = self.validate();

        if !result.is_ok() {
            let errors: Vec<String> = result
                .errors()
                .iter()
                .map(|e| format!("{}: {}", e.field, e.message))
                .collect();
            return Err(Error::Config(format!(
                "Configuration validation failed:\n  {}",
                errors.join("\n  ")
            )));
        }

        for warning in result.warnings() {
            tracing::warn!("Config warning - {}: {}", warning.field, warning.message);
        }

        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        if self.general.provider.is_empty() {
            result.add_error("general.provider", "Provider name cannot be empty");
        }

        if self.general.model.as_deref() == Some("") {
            result.add_error(
                "general.model",
                "Model name cannot be empty; remove it to use the provider's default",
            );
        }

        if self.general.max_tokens == 0 {
            result.add_error("general.max_tokens", "max_tokens must be greater than 0");
        }

        check_temperature(&mut result, "general.temperature", self.general.temperature);

        // Compression
        if self.compression.threshold <= RETENTION_WINDOW {
            result.add_error(
                "compression.threshold",
                format!(
                    "threshold must be greater than the retention window ({})",
                    RETENTION_WINDOW
                ),
            );
        }

        if self.compression.model.as_deref() == Some("") {
            result.add_error(
                "compression.model",
                "Summarizer model cannot be empty; remove it to use the provider's default",
            );
        }

        if self.compression.max_summary_tokens == 0 {
            result.add_error(
                "compression.max_summary_tokens",
                "max_summary_tokens must be greater than 0",
            );
        }

        check_temperature(
            &mut result,
            "compression.temperature",
            self.compression.temperature,
        );

        if self.compression.temperature > 1.0 {
            result.add_warning(
                "compression.temperature",
                "High summarizer temperature may produce unfaithful summaries",
            );
        }

        // Sessions
        if self.sessions.idle_ttl_secs == 0 {
            result.add_error("sessions.idle_ttl_secs", "idle_ttl_secs must be greater than 0");
        }

        if self.sessions.sweep_interval_secs == 0 {
            result.add_error(
                "sessions.sweep_interval_secs",
                "sweep_interval_secs must be greater than 0",
            );
        }

        // Providers
        for (name, provider) in [
            ("anthropic", &self.providers.anthropic),
            ("openai", &self.providers.openai),
        ] {
            let Some(provider) = provider else { continue };

            if provider.api_key.as_ref().map(|k| k.is_empty()).unwrap_or(false) {
                result.add_warning(
                    format!("providers.{}.api_key", name),
                    "API key is empty string",
                );
            }

            if let Some(ref base_url) = provider.base_url {
                if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                    result.add_error(
                        format!("providers.{}.base_url", name),
                        "base_url must start with http:// or https://",
                    );
                }
            }
        }

        result
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, Error> {
        toml::to_string_pretty(self).map_err(|e| Error::Internal(e.to_string()))
    }

    /// Get the configuration directory.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|p| p.join("condense"))
            .unwrap_or_else(|| PathBuf::from("~/.config/condense"))
    }
}

fn check_temperature(result: &mut ValidationResult, field: &str, value: f32) {
    if !(0.0..=2.0).contains(&value) {
        result.add_error(field, "temperature must be between 0.0 and 2.0");
    }
}
