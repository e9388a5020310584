//! Process configuration read from the environment.

use std::env;
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};

use safechat_content_safety::{
    ContentSafetyConfig, ContentSafetyConfigBuilder, SafetyGate,
};
use safechat_openai_model::{OpenAIConfig, OpenAIConfigBuilder};

const CONTENT_SAFETY_ENDPOINT: &str = "AZURE_CONTENT_SAFETY_ENDPOINT";
const CONTENT_SAFETY_KEY: &str = "AZURE_CONTENT_SAFETY_KEY";
const PROMPT_SHIELD_ENDPOINT: &str = "PROMPT_SHIELD_ENDPOINT";
const PROMPT_SHIELD_KEY: &str = "PROMPT_SHIELD_KEY";
const TEXT_MODERATION_ENDPOINT: &str = "TEXT_MODERATION_ENDPOINT";
const TEXT_MODERATION_KEY: &str = "TEXT_MODERATION_KEY";

const AZURE_OPENAI_RESOURCE_NAME: &str = "AZURE_OPENAI_RESOURCE_NAME";
const AZURE_OPENAI_API_KEY: &str = "AZURE_OPENAI_API_KEY";
const AZURE_OPENAI_DEPLOYMENT_NAME: &str = "AZURE_OPENAI_DEPLOYMENT_NAME";
const AZURE_OPENAI_API_VERSION: &str = "AZURE_OPENAI_API_VERSION";
const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
const OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
const OPENAI_MODEL: &str = "OPENAI_MODEL";

/// A required variable is missing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigError {
    variable: &'static str,
}

impl ConfigError {
    /// Returns the name of the missing variable.
    #[inline]
    pub fn variable(&self) -> &'static str {
        self.variable
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} environment variable is not set", self.variable)
    }
}

impl StdError for ConfigError {}

/// Everything the app needs to talk to its services.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// The completion engine.
    pub completion: OpenAIConfig,
    /// The prompt shield classifier.
    pub prompt_shield: ContentSafetyConfig,
    /// The text moderation classifier.
    pub text_moderation: ContentSafetyConfig,
}

impl AppConfig {
    /// Reads the configuration from the process environment.
    ///
    /// The completion engine is Azure OpenAI when any `AZURE_OPENAI_*`
    /// variable is set, and an OpenAI-compatible endpoint otherwise.
    /// `AZURE_OPENAI_API_VERSION` optionally pins the Azure API version.
    /// Content safety uses `AZURE_CONTENT_SAFETY_*`, which
    /// `PROMPT_SHIELD_*` and `TEXT_MODERATION_*` override per classifier.
    ///
    /// # Errors
    ///
    /// Fails on the first missing completion variable. Missing content
    /// safety variables are not an error here; the safety check fails
    /// for every message instead.
    #[inline]
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the configuration through `lookup`. Blank values count as
    /// missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| {
            var(name).ok_or(ConfigError { variable: name })
        };

        let azure_vars = [
            AZURE_OPENAI_RESOURCE_NAME,
            AZURE_OPENAI_API_KEY,
            AZURE_OPENAI_DEPLOYMENT_NAME,
        ];
        let completion = if azure_vars.into_iter().any(|name| var(name).is_some()) {
            let mut builder = OpenAIConfigBuilder::azure(
                required(AZURE_OPENAI_RESOURCE_NAME)?,
                required(AZURE_OPENAI_API_KEY)?,
                required(AZURE_OPENAI_DEPLOYMENT_NAME)?,
            );
            if let Some(version) = var(AZURE_OPENAI_API_VERSION) {
                builder = builder.with_api_version(version);
            }
            builder.build()
        } else {
            OpenAIConfigBuilder::with_api_key(required(OPENAI_API_KEY)?)
                .with_base_url(required(OPENAI_BASE_URL)?)
                .with_model(required(OPENAI_MODEL)?)
                .build()
        };

        let safety_config = |endpoint_var, key_var| {
            let mut builder = ContentSafetyConfigBuilder::default();
            if let Some(endpoint) =
                var(endpoint_var).or_else(|| var(CONTENT_SAFETY_ENDPOINT))
            {
                builder = builder.with_endpoint(endpoint);
            }
            if let Some(key) = var(key_var).or_else(|| var(CONTENT_SAFETY_KEY))
            {
                builder = builder.with_api_key(key);
            }
            builder.build()
        };
        let prompt_shield =
            safety_config(PROMPT_SHIELD_ENDPOINT, PROMPT_SHIELD_KEY);
        let text_moderation =
            safety_config(TEXT_MODERATION_ENDPOINT, TEXT_MODERATION_KEY);
        if !prompt_shield.is_complete() || !text_moderation.is_complete() {
            warn!("content safety is not fully configured");
        }

        Ok(Self {
            completion,
            prompt_shield,
            text_moderation,
        })
    }

    /// Creates the safety gate backed by the configured classifiers.
    #[inline]
    pub fn safety_gate(&self) -> SafetyGate {
        SafetyGate::from_config(
            self.prompt_shield.clone(),
            self.text_moderation.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(
        vars: &[(&str, &str)],
    ) -> impl Fn(&str) -> Option<String> + use<> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_openai() {
        let config = AppConfig::from_lookup(lookup(&[
            (OPENAI_API_KEY, "sk-test"),
            (OPENAI_BASE_URL, "https://api.example.com/v1/"),
            (OPENAI_MODEL, "gpt-4o"),
        ]))
        .unwrap();
        assert_eq!(
            config.completion.completions_url(),
            "https://api.example.com/v1/chat/completions"
        );
        assert!(!config.prompt_shield.is_complete());
        assert!(!config.text_moderation.is_complete());
    }

    #[test]
    fn test_azure_requires_all_variables() {
        let err = AppConfig::from_lookup(lookup(&[
            (AZURE_OPENAI_RESOURCE_NAME, "res"),
            (AZURE_OPENAI_API_KEY, "key"),
            (OPENAI_API_KEY, "sk-test"),
        ]))
        .unwrap_err();
        assert_eq!(err.variable(), AZURE_OPENAI_DEPLOYMENT_NAME);
        assert_eq!(
            err.to_string(),
            "AZURE_OPENAI_DEPLOYMENT_NAME environment variable is not set"
        );

        let config = AppConfig::from_lookup(lookup(&[
            (AZURE_OPENAI_RESOURCE_NAME, "res"),
            (AZURE_OPENAI_API_KEY, "key"),
            (AZURE_OPENAI_DEPLOYMENT_NAME, "chat"),
        ]))
        .unwrap();
        assert!(
            config
                .completion
                .completions_url()
                .starts_with("https://res.openai.azure.com/openai/deployments/chat/")
        );
    }

    #[test]
    fn test_azure_api_version() {
        let config = AppConfig::from_lookup(lookup(&[
            (AZURE_OPENAI_RESOURCE_NAME, "res"),
            (AZURE_OPENAI_API_KEY, "key"),
            (AZURE_OPENAI_DEPLOYMENT_NAME, "chat"),
            (AZURE_OPENAI_API_VERSION, "2024-10-21"),
        ]))
        .unwrap();
        assert!(
            config
                .completion
                .completions_url()
                .ends_with("?api-version=2024-10-21")
        );
    }

    #[test]
    fn test_nothing_set() {
        let err = AppConfig::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err.variable(), OPENAI_API_KEY);
    }

    #[test]
    fn test_blank_counts_as_missing() {
        let err = AppConfig::from_lookup(lookup(&[
            (OPENAI_API_KEY, "  "),
            (OPENAI_BASE_URL, "https://api.example.com/v1"),
            (OPENAI_MODEL, "gpt-4o"),
        ]))
        .unwrap_err();
        assert_eq!(err.variable(), OPENAI_API_KEY);
    }

    #[test]
    fn test_safety_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            (OPENAI_API_KEY, "sk-test"),
            (OPENAI_BASE_URL, "https://api.example.com/v1"),
            (OPENAI_MODEL, "gpt-4o"),
            (CONTENT_SAFETY_ENDPOINT, "https://shared.example.com"),
            (CONTENT_SAFETY_KEY, "shared-key"),
            (TEXT_MODERATION_ENDPOINT, "https://moderation.example.com"),
        ]))
        .unwrap();
        assert!(config.prompt_shield.is_complete());
        assert_eq!(
            config.prompt_shield.endpoint(),
            Some("https://shared.example.com")
        );
        assert!(config.text_moderation.is_complete());
        assert_eq!(
            config.text_moderation.endpoint(),
            Some("https://moderation.example.com")
        );
    }
}
