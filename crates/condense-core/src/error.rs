//! Error types for Condense.
//!
//! Structured errors that carry context and, where one exists, a recovery
//! suggestion for the caller.

use thiserror::Error;

/// Result type alias using Condense's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Condense.
#[derive(Error, Debug)]
pub enum Error {
    /// Operation referenced an unknown session
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// The summarizer call failed; the session was left unmodified
    #[error("Summarization failed: {0}")]
    SummarizationFailed(String),

    /// The reply generator failed
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider error with structured details
    #[error("{0}")]
    Provider(#[from] ProviderError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get a recovery suggestion for this error.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Error::SessionNotFound(_) => Some("Use /sessions to see live sessions"),
            Error::SummarizationFailed(_) => {
                Some("The turn continues uncompressed; compression is retried on the next turn")
            }
            Error::Config(_) => Some("Check your config file at ~/.config/condense/config.toml"),
            Error::Provider(e) => e.recovery_suggestion(),
            _ => None,
        }
    }

    /// Whether the error only affects the current turn.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::SummarizationFailed(_) | Error::Generation(_) | Error::Provider(_)
        )
    }

    /// Create a provider-not-configured error.
    pub fn provider_not_configured(provider: &str) -> Self {
        Error::Provider(ProviderError::NotConfigured {
            provider: provider.to_string(),
            env_var: match provider {
                "anthropic" => Some("ANTHROPIC_API_KEY".to_string()),
                "openai" => Some("OPENAI_API_KEY".to_string()),
                _ => None,
            },
        })
    }
}

/// Provider-specific errors with detailed context.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Provider not configured
    #[error("Provider '{provider}' is not configured")]
    NotConfigured {
        provider: String,
        env_var: Option<String>,
    },

    /// Authentication failed
    #[error("Authentication failed for {provider}: {message}")]
    AuthenticationFailed { provider: String, message: String },

    /// API request failed
    #[error("API request to {provider} failed: {status} - {message}")]
    ApiError {
        provider: String,
        status: u16,
        message: String,
    },

    /// Response carried no usable content
    #[error("Empty response from {provider}")]
    EmptyResponse { provider: String },

    /// Network error
    #[error("Network error connecting to {provider}: {message}")]
    NetworkError { provider: String, message: String },
}

impl ProviderError {
    /// Get a recovery suggestion for this error.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            ProviderError::NotConfigured {
                env_var: Some(_), ..
            } => Some("Set the API key environment variable"),
            ProviderError::NotConfigured { .. } => {
                Some("Configure the provider in ~/.config/condense/config.toml")
            }
            ProviderError::AuthenticationFailed { .. } => {
                Some("Check that your API key is valid and not expired")
            }
            ProviderError::ApiError { status: 429, .. } => {
                Some("You've hit rate limits. Wait a moment and try again")
            }
            ProviderError::ApiError {
                status: 500..=599, ..
            } => Some("The API service is having issues. Try again later"),
            ProviderError::NetworkError { .. } => Some("Check your internet connection"),
            _ => None,
        }
    }

    /// Create an API error from status code and message.
    ///
    /// 401 and 403 are reported as authentication failures.
    pub fn api_error(provider: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        let provider = provider.into();
        let message = message.into();
        match status {
            401 | 403 => ProviderError::AuthenticationFailed { provider, message },
            _ => ProviderError::ApiError {
                provider,
                status,
                message,
            },
        }
    }
}

/// Format an error with its recovery suggestion.
pub fn format_error_with_suggestion(error: &Error) -> String {
    let mut output = error.to_string();
    if let Some(suggestion) = error.recovery_suggestion() {
        output.push_str(&format!("\n  Suggestion: {}", suggestion));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_not_configured() {
        let err = Error::provider_not_configured("anthropic");
        assert!(err.to_string().contains("anthropic"));
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_api_error() {
        let err = ProviderError::api_error("openai", 429, "Rate limited");
        assert!(err.to_string().contains("429"));
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_unauthorized_maps_to_auth_failure() {
        let err = ProviderError::api_error("anthropic", 401, "bad key");
        assert!(matches!(err, ProviderError::AuthenticationFailed { .. }));
    }

    #[test]
    fn test_summarization_failure_is_recoverable() {
        let err = Error::SummarizationFailed("upstream 503".to_string());
        assert!(err.is_recoverable());
        let formatted = format_error_with_suggestion(&err);
        assert!(formatted.contains("upstream 503"));
        assert!(formatted.contains("Suggestion"));
        assert!(!Error::SessionNotFound("x".into()).is_recoverable());
    }
}
