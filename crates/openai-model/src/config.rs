use std::fmt::Debug;

const DEFAULT_TEMPERATURE: f32 = 0.6;
const DEFAULT_MAX_TOKENS: u32 = 2500;
const DEFAULT_AZURE_API_VERSION: &str = "2024-06-01";

/// Where the chat completions endpoint lives and how to authenticate.
#[derive(Clone, PartialEq)]
pub(crate) enum Endpoint {
    OpenAI {
        base_url: String,
        model: String,
    },
    Azure {
        resource_name: String,
        deployment: String,
        api_version: String,
    },
}

/// Builder for [`OpenAIConfig`].
#[derive(Clone, PartialEq)]
pub struct OpenAIConfigBuilder {
    api_key: String,
    endpoint: BuilderEndpoint,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

#[derive(Clone, PartialEq)]
enum BuilderEndpoint {
    OpenAI {
        model: Option<String>,
        base_url: Option<String>,
    },
    Azure {
        resource_name: String,
        deployment: String,
        api_version: Option<String>,
    },
}

impl OpenAIConfigBuilder {
    /// Creates a builder for the OpenAI API (or any compatible one) with
    /// the given API key.
    #[inline]
    pub fn with_api_key<S: Into<String>>(api_key: S) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: BuilderEndpoint::OpenAI {
                model: None,
                base_url: None,
            },
            temperature: None,
            max_tokens: None,
        }
    }

    /// Creates a builder for an Azure OpenAI deployment.
    #[inline]
    pub fn azure<R, K, D>(resource_name: R, api_key: K, deployment: D) -> Self
    where
        R: Into<String>,
        K: Into<String>,
        D: Into<String>,
    {
        Self {
            api_key: api_key.into(),
            endpoint: BuilderEndpoint::Azure {
                resource_name: resource_name.into(),
                deployment: deployment.into(),
                api_version: None,
            },
            temperature: None,
            max_tokens: None,
        }
    }

    /// Sets the model to use. Ignored for Azure, where the deployment
    /// decides the model.
    #[inline]
    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        if let BuilderEndpoint::OpenAI { model: m, .. } = &mut self.endpoint {
            *m = Some(model.into());
        }
        self
    }

    /// Sets a custom base URL. Ignored for Azure.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        if let BuilderEndpoint::OpenAI { base_url: b, .. } = &mut self.endpoint
        {
            *b = Some(base_url.into());
        }
        self
    }

    /// Sets the Azure REST API version. Ignored for OpenAI.
    #[inline]
    pub fn with_api_version<S: Into<String>>(mut self, version: S) -> Self {
        if let BuilderEndpoint::Azure { api_version, .. } = &mut self.endpoint {
            *api_version = Some(version.into());
        }
        self
    }

    /// Sets the sampling temperature.
    #[inline]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the maximum number of tokens to generate.
    #[inline]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> OpenAIConfig {
        let endpoint = match self.endpoint {
            BuilderEndpoint::OpenAI { model, base_url } => Endpoint::OpenAI {
                base_url: base_url
                    .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
                model: model.unwrap_or_else(|| "gpt-4o-mini".to_string()),
            },
            BuilderEndpoint::Azure {
                resource_name,
                deployment,
                api_version,
            } => Endpoint::Azure {
                resource_name,
                deployment,
                api_version: api_version
                    .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string()),
            },
        };
        OpenAIConfig {
            api_key: self.api_key,
            endpoint,
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        }
    }
}

impl Debug for OpenAIConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIConfigBuilder")
            .field("api_key", &"<deducted>")
            .field("endpoint", &self.endpoint)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl Debug for BuilderEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuilderEndpoint::OpenAI { model, base_url } => f
                .debug_struct("OpenAI")
                .field("model", model)
                .field("base_url", base_url)
                .finish(),
            BuilderEndpoint::Azure {
                resource_name,
                deployment,
                api_version,
            } => f
                .debug_struct("Azure")
                .field("resource_name", resource_name)
                .field("deployment", deployment)
                .field("api_version", api_version)
                .finish(),
        }
    }
}

/// Configuration for the OpenAI-compatible provider.
#[derive(Clone, PartialEq)]
pub struct OpenAIConfig {
    pub(crate) api_key: String,
    pub(crate) endpoint: Endpoint,
    pub(crate) temperature: f32,
    pub(crate) max_tokens: u32,
}

impl OpenAIConfig {
    /// Returns the full URL of the chat completions endpoint.
    pub fn completions_url(&self) -> String {
        match &self.endpoint {
            Endpoint::OpenAI { base_url, .. } => {
                format!("{}/chat/completions", base_url.trim_end_matches('/'))
            }
            Endpoint::Azure {
                resource_name,
                deployment,
                api_version,
            } => format!(
                "https://{resource_name}.openai.azure.com/openai/deployments/\
                 {deployment}/chat/completions?api-version={api_version}"
            ),
        }
    }

    /// Returns the model name sent in the request body, if the endpoint
    /// expects one.
    #[inline]
    pub(crate) fn model(&self) -> Option<&str> {
        match &self.endpoint {
            Endpoint::OpenAI { model, .. } => Some(model),
            Endpoint::Azure { .. } => None,
        }
    }

    #[inline]
    pub(crate) fn is_azure(&self) -> bool {
        matches!(self.endpoint, Endpoint::Azure { .. })
    }
}

impl Debug for OpenAIConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("api_key", &"<deducted>")
            .field("endpoint", &self.endpoint)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::OpenAI { base_url, model } => f
                .debug_struct("OpenAI")
                .field("base_url", base_url)
                .field("model", model)
                .finish(),
            Endpoint::Azure {
                resource_name,
                deployment,
                api_version,
            } => f
                .debug_struct("Azure")
                .field("resource_name", resource_name)
                .field("deployment", deployment)
                .field("api_version", api_version)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_url() {
        let config = OpenAIConfigBuilder::with_api_key("xxx")
            .with_base_url("http://localhost:8080/v1/")
            .build();
        assert_eq!(
            config.completions_url(),
            "http://localhost:8080/v1/chat/completions"
        );
        assert_eq!(config.model(), Some("gpt-4o-mini"));
        assert_eq!(config.temperature, 0.6);
        assert_eq!(config.max_tokens, 2500);
    }

    #[test]
    fn test_azure_url() {
        let config = OpenAIConfigBuilder::azure("contoso", "xxx", "chat")
            .with_model("ignored")
            .build();
        assert_eq!(
            config.completions_url(),
            "https://contoso.openai.azure.com/openai/deployments/chat/\
             chat/completions?api-version=2024-06-01"
        );
        assert_eq!(config.model(), None);
    }

    #[test]
    fn test_azure_api_version() {
        let config = OpenAIConfigBuilder::azure("contoso", "xxx", "chat")
            .with_api_version("2024-10-21")
            .build();
        assert!(
            config
                .completions_url()
                .ends_with("chat/completions?api-version=2024-10-21")
        );

        // Only Azure endpoints carry a version.
        let config = OpenAIConfigBuilder::with_api_key("xxx")
            .with_api_version("2024-10-21")
            .build();
        assert!(!config.completions_url().contains("api-version"));
    }

    #[test]
    fn test_debug_hides_key() {
        let config = OpenAIConfigBuilder::azure("contoso", "secret", "chat")
            .build();
        assert!(!format!("{config:?}").contains("secret"));
    }
}
