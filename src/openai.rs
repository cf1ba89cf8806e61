//! OpenAI-compatible client configuration.
//!
//! Both the chat and the audio endpoints talk to an OpenAI-compatible API.
//! The base URL and the environment variable holding the key are configurable,
//! so the same client works against OpenAI, Groq or a local gateway.

use crate::error::{AdbriefError, Result};
use async_openai::{config::OpenAIConfig, error::OpenAIError, Client};
use std::time::Duration;

/// Read an API key from the given environment variable.
pub fn api_key_from_env(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(key) if !key.is_empty() => Ok(key),
        Ok(_) => Err(AdbriefError::Config(format!("{} is empty", var))),
        Err(_) => Err(AdbriefError::Config(format!("{} not set", var))),
    }
}

/// Create a client for `api_base` authenticated with `api_key`.
pub fn create_client(api_base: &str, api_key: &str, timeout: Duration) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder().timeout(timeout).build()?;

    let config = OpenAIConfig::new()
        .with_api_base(api_base.trim_end_matches('/'))
        .with_api_key(api_key);

    Ok(Client::with_config(config).with_http_client(http_client))
}

/// Map a provider error onto the collaborator taxonomy.
///
/// Authentication, permission, unknown-model and malformed-request failures are
/// not retryable; network failures, timeouts, rate limits and server errors are.
pub fn classify_error(context: &str, err: OpenAIError) -> AdbriefError {
    let message = format!("{}: {}", context, err);
    match &err {
        OpenAIError::ApiError(api) => {
            let kind = api.r#type.as_deref().unwrap_or_default().to_lowercase();
            let text = api.message.to_lowercase();
            let fatal = ["invalid_api_key", "authentication", "permission", "invalid_request"]
                .iter()
                .any(|needle| kind.contains(needle))
                || text.contains("invalid api key")
                || text.contains("does not exist")
                || text.contains("decommissioned");
            if fatal {
                AdbriefError::fatal(message)
            } else {
                AdbriefError::retryable(message)
            }
        }
        OpenAIError::InvalidArgument(_) => AdbriefError::fatal(message),
        _ => AdbriefError::retryable(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_is_fatal() {
        let err = classify_error("Chat API error", OpenAIError::InvalidArgument("bad".into()));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let err = api_key_from_env("ADBRIEF_TEST_KEY_THAT_IS_NEVER_SET").unwrap_err();
        assert!(matches!(err, AdbriefError::Config(_)));
    }

    #[test]
    fn test_create_client() {
        assert!(create_client("https://api.groq.com/openai/v1/", "key", Duration::from_secs(5)).is_ok());
    }
}
