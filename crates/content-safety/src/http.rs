//! Classifiers backed by the Azure AI Content Safety REST API.

use std::sync::Arc;

use reqwest::{Client, RequestBuilder};
use serde::Serialize;

use crate::category::{Category, Severities};
use crate::classifier::{AttackDetector, SeverityModerator};
use crate::config::ContentSafetyConfig;
use crate::error::SafetyCheckError;
use crate::proto::{
    ANALYZE_TEXT_PATH, AnalyzeTextRequest, SHIELD_PROMPT_PATH,
    ShieldPromptRequest, parse_analyze_response, parse_shield_response,
};

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// The Prompt Shields classifier (`text:shieldPrompt`).
#[derive(Clone, Debug)]
pub struct PromptShieldClient {
    client: Client,
    config: Arc<ContentSafetyConfig>,
}

impl PromptShieldClient {
    /// Creates a client with the given configuration.
    #[inline]
    pub fn new(config: ContentSafetyConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    /// Creates a client sharing an existing HTTP client.
    #[inline]
    pub fn with_client(client: Client, config: ContentSafetyConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
        }
    }
}

impl AttackDetector for PromptShieldClient {
    #[inline]
    fn is_configured(&self) -> bool {
        self.config.is_complete()
    }

    fn detect_attack(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<bool, SafetyCheckError>> + Send + 'static
    {
        let body = ShieldPromptRequest {
            user_prompt: text,
            documents: [],
        };
        let request = build_request(
            &self.client,
            &self.config,
            SHIELD_PROMPT_PATH,
            &body,
        );
        async move {
            let body = read_success_body(request?).await?;
            parse_shield_response(&body)
        }
    }
}

/// The Text Moderation classifier (`text:analyze`).
#[derive(Clone, Debug)]
pub struct TextModerationClient {
    client: Client,
    config: Arc<ContentSafetyConfig>,
}

impl TextModerationClient {
    /// Creates a client with the given configuration.
    #[inline]
    pub fn new(config: ContentSafetyConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    /// Creates a client sharing an existing HTTP client.
    #[inline]
    pub fn with_client(client: Client, config: ContentSafetyConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
        }
    }
}

impl SeverityModerator for TextModerationClient {
    #[inline]
    fn is_configured(&self) -> bool {
        self.config.is_complete()
    }

    fn moderate(
        &self,
        text: &str,
        categories: &[Category],
    ) -> impl Future<Output = Result<Severities, SafetyCheckError>> + Send + 'static
    {
        let body = AnalyzeTextRequest::new(text, categories);
        let request =
            build_request(&self.client, &self.config, ANALYZE_TEXT_PATH, &body);
        async move {
            let body = read_success_body(request?).await?;
            parse_analyze_response(&body)
        }
    }
}

/// Builds the POST request eagerly, so that the returned future owns
/// everything it needs.
fn build_request<B: Serialize>(
    client: &Client,
    config: &ContentSafetyConfig,
    path: &str,
    body: &B,
) -> Result<RequestBuilder, SafetyCheckError> {
    let Some((endpoint, api_key)) = config.parts() else {
        return Err(SafetyCheckError::config_missing());
    };
    Ok(client
        .post(format!("{endpoint}{path}"))
        .header(SUBSCRIPTION_KEY_HEADER, api_key)
        .json(body))
}

/// Sends the request and returns the body of a 2xx response.
async fn read_success_body(
    request: RequestBuilder,
) -> Result<Vec<u8>, SafetyCheckError> {
    let resp = request.send().await.map_err(|err| {
        error!("content safety request failed: {err}");
        SafetyCheckError::transport_failure().with_detail(format!("{err}"))
    })?;
    let status = resp.status();
    if !status.is_success() {
        error!("content safety endpoint answered {status}");
        return Err(SafetyCheckError::transport_failure()
            .with_detail(format!("unexpected status: {status}")));
    }
    let body = resp.bytes().await.map_err(|err| {
        SafetyCheckError::transport_failure().with_detail(format!("{err}"))
    })?;
    Ok(body.to_vec())
}
