//! Credentials
//!
//! Secrets are read from the process environment (after `.env` has been
//! loaded by [`crate::config`]) and never written to the config file.
//!
//! - `AZURE_OPENAI_API_KEY` (or `OPENAI_API_KEY`): Brain API key
//! - `GITHUB_ACCESS_TOKEN`: publish credential handed to the implementer agent
//!
//! [`Credentials::scrub`] removes known secret values from text before it is
//! logged or returned to a caller.

pub mod string;

pub use string::SecretString;

use sdk::errors::EngineError;

/// Marker substituted for secret values in scrubbed text
pub const REDACTED: &str = "[REDACTED]";

/// Credentials available to one process
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// Brain API key
    pub llm_api_key: Option<SecretString>,

    /// Publish credential
    pub github_token: Option<SecretString>,
}

impl Credentials {
    /// Read credentials from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read credentials through `lookup`; blank values count as absent
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(SecretString::from)
                .filter(|s| !s.is_empty())
        };

        Self {
            llm_api_key: get("AZURE_OPENAI_API_KEY").or_else(|| get("OPENAI_API_KEY")),
            github_token: get("GITHUB_ACCESS_TOKEN"),
        }
    }

    /// The Brain API key, or a configuration error naming the variable
    pub fn require_llm_key(&self) -> Result<SecretString, EngineError> {
        self.llm_api_key.clone().ok_or_else(|| {
            EngineError::Config(
                "AZURE_OPENAI_API_KEY (or OPENAI_API_KEY) environment variable is required"
                    .to_string(),
            )
        })
    }

    /// Replace every known secret value in `text` with [`REDACTED`]
    pub fn scrub(&self, text: &str) -> String {
        let mut scrubbed = text.to_string();
        for secret in [&self.llm_api_key, &self.github_token].into_iter().flatten() {
            if !secret.is_empty() {
                scrubbed = scrubbed.replace(secret.unsecure(), REDACTED);
            }
        }
        scrubbed
    }
}
