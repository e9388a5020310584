use std::fmt::Debug;

/// Builder for [`ContentSafetyConfig`].
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ContentSafetyConfigBuilder {
    endpoint: Option<String>,
    api_key: Option<String>,
}

impl ContentSafetyConfigBuilder {
    /// Sets the resource endpoint, e.g.
    /// `https://<name>.cognitiveservices.azure.com/contentsafety`.
    #[inline]
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the subscription key.
    #[inline]
    pub fn with_api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Builds the configuration.
    ///
    /// Building never fails. Blank values are dropped, and a classifier
    /// built from an incomplete configuration reports itself as not
    /// configured.
    #[inline]
    pub fn build(self) -> ContentSafetyConfig {
        let non_blank = |v: String| {
            let v = v.trim();
            (!v.is_empty()).then(|| v.to_owned())
        };
        ContentSafetyConfig {
            endpoint: self
                .endpoint
                .and_then(non_blank)
                .map(|e| e.trim_end_matches('/').to_owned()),
            api_key: self.api_key.and_then(non_blank),
        }
    }
}

impl Debug for ContentSafetyConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentSafetyConfigBuilder")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<deducted>"))
            .finish()
    }
}

/// Endpoint and key of one content safety classifier.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ContentSafetyConfig {
    pub(crate) endpoint: Option<String>,
    pub(crate) api_key: Option<String>,
}

impl ContentSafetyConfig {
    /// Whether both the endpoint and the key are present.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.endpoint.is_some() && self.api_key.is_some()
    }

    /// Returns the endpoint, without a trailing slash.
    #[inline]
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Returns the endpoint and key, if both are present.
    #[inline]
    pub(crate) fn parts(&self) -> Option<(&str, &str)> {
        Some((self.endpoint.as_deref()?, self.api_key.as_deref()?))
    }
}

impl Debug for ContentSafetyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentSafetyConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<deducted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete() {
        let config = ContentSafetyConfigBuilder::default()
            .with_endpoint("https://example.com/contentsafety/")
            .with_api_key("key")
            .build();
        assert!(config.is_complete());
        assert_eq!(
            config.parts(),
            Some(("https://example.com/contentsafety", "key"))
        );
        assert!(!format!("{config:?}").contains("\"key\""));
    }

    #[test]
    fn test_blank_is_missing() {
        let config = ContentSafetyConfigBuilder::default()
            .with_endpoint("https://example.com")
            .with_api_key("   ")
            .build();
        assert!(!config.is_complete());
        assert!(!ContentSafetyConfigBuilder::default().build().is_complete());
    }
}
