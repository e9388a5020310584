//! A completion engine for OpenAI-compatible and Azure OpenAI chat
//! completions APIs.

#[macro_use]
extern crate tracing;

mod config;
mod io;
mod proto;
mod response;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use mime::Mime;
use reqwest::{Client, StatusCode, header};
use safechat_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelRequest,
};

pub use config::{OpenAIConfig, OpenAIConfigBuilder};
use io::{Chunks, Sse};
use response::OpenAIResponse;

/// Error type for [`OpenAIProvider`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Statuses are checked separately, so anything reqwest reports here
    /// is a transport problem.
    fn from_reqwest(err: reqwest::Error) -> Self {
        Self::new(format!("{err}"), ErrorKind::Transport)
    }

    /// Classifies a non-2xx answer from its status and body.
    ///
    /// Azure answers `400` with the `content_filter` code when its own
    /// filter rejects the prompt.
    fn from_status(status: StatusCode, body: &[u8]) -> Self {
        let error = serde_json::from_slice::<proto::ErrorResponse>(body)
            .ok()
            .map(|resp| resp.error);
        let code = error.as_ref().and_then(|e| e.code.as_deref());
        let kind = match (status, code) {
            (StatusCode::TOO_MANY_REQUESTS, _) => ErrorKind::RateLimitExceeded,
            (_, Some("content_filter")) => ErrorKind::Moderated,
            _ => ErrorKind::Other,
        };
        let message = error
            .and_then(|e| e.message)
            .unwrap_or_else(|| "unexpected status".to_owned());
        Self::new(format!("{status}: {message}"), kind)
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// OpenAI-compatible model provider.
#[derive(Clone, Debug)]
pub struct OpenAIProvider {
    client: Client,
    config: Arc<OpenAIConfig>,
}

impl OpenAIProvider {
    /// Creates a new `OpenAIProvider` with the given configuration.
    #[inline]
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }
}

impl ModelProvider for OpenAIProvider {
    type Error = Error;
    type Response = OpenAIResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let openai_req = proto::create_request(req, &self.config);
        let url = self.config.completions_url();
        debug!("sending completion request to {url}");
        let builder = self.client.post(url);
        let builder = if self.config.is_azure() {
            builder.header("api-key", &self.config.api_key)
        } else {
            builder.header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.api_key),
            )
        };
        let resp_fut = builder
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "text/event-stream")
            .json(&openai_req)
            .send();

        async move {
            let resp = resp_fut.await.map_err(Error::from_reqwest)?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.bytes().await.map_err(Error::from_reqwest)?;
                error!("completion endpoint answered {status}");
                return Err(Error::from_status(status, &body));
            }

            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());
            let is_event_stream = content_type
                .and_then(|v| v.parse().ok())
                .map(|m: Mime| m.subtype().as_str() == "event-stream")
                .unwrap_or(false);
            if !is_event_stream {
                return Err(Error::new(
                    format!("Unexpected content type: {content_type:?}"),
                    ErrorKind::InvalidResponse,
                ));
            }

            // Here we got a successful response.
            let chunks = Chunks::from_response(resp);
            let sse = Sse::new(chunks);
            Ok(OpenAIResponse::from_sse(sse))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_azure_content_filter_is_moderated() {
        let body = br#"{"error":{"message":"The response was filtered.",
            "type":null,"param":"prompt","code":"content_filter",
            "status":400}}"#;
        let err = Error::from_status(StatusCode::BAD_REQUEST, body);
        assert_eq!(err.kind(), ErrorKind::Moderated);
        assert!(err.message().contains("The response was filtered."));
    }

    #[test]
    fn test_status_kinds() {
        let err = Error::from_status(StatusCode::TOO_MANY_REQUESTS, b"");
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);

        let body = br#"{"error":{"code":"invalid_api_key"}}"#;
        let err = Error::from_status(StatusCode::UNAUTHORIZED, body);
        assert_eq!(err.kind(), ErrorKind::Other);
        assert!(err.message().starts_with("401"));
    }
}
