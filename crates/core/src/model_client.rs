use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::future::poll_fn;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::Stream;
use futures_util::stream::unfold;
use safechat_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelRequest, ModelResponse,
    ModelResponseEvent,
};
use tracing::Instrument;

/// The text fragments of one completion, in arrival order.
pub(crate) type FragmentStream =
    Pin<Box<dyn Stream<Item = Result<String, CompletionError>> + Send>>;
type SendRequestResult = Result<FragmentStream, CompletionError>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
type HandlerFn =
    Arc<dyn Fn(ModelRequest) -> BoxedSendRequestFuture + Send + Sync>;

/// An error from the completion engine.
#[derive(Debug)]
pub struct CompletionError {
    inner: Box<dyn ModelProviderError>,
}

impl CompletionError {
    #[inline]
    fn new<E: ModelProviderError>(err: E) -> Self {
        Self {
            inner: Box::new(err),
        }
    }

    /// Returns the kind of the underlying provider error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.inner.kind()
    }
}

impl Display for CompletionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "completion failed ({}): {}", self.kind(), self.inner)
    }
}

impl StdError for CompletionError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&*self.inner)
    }
}

/// A wrapper around a model provider that provides a type-erased
/// interface for the other modules.
#[derive(Clone)]
pub(crate) struct ModelClient {
    handler_fn: HandlerFn,
}

impl ModelClient {
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        // We have to erase the type `P`, since `ModelClient` doesn't have a
        // generic parameter and we don't want it either.
        let handler_fn: HandlerFn = Arc::new(move |req| {
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    trace!("got a request: {:?}", req);
                    match fut.await {
                        Ok(resp) => Ok(fragments::<P>(resp)),
                        Err(err) => {
                            error!("got an error: {err:?}");
                            Err(CompletionError::new(err))
                        }
                    }
                }
                .instrument(trace_span!("model client req")),
            )
        });
        Self { handler_fn }
    }

    /// Sends a request and returns its fragments once the provider accepts
    /// it.
    ///
    /// # Cancel safety
    ///
    /// Dropping the returned stream stops pulling events from the provider.
    #[inline]
    pub async fn send_request(&self, req: ModelRequest) -> SendRequestResult {
        (self.handler_fn)(req).await
    }
}

/// Turns a provider response into a fragment stream, which ends after the
/// first error.
fn fragments<P: ModelProvider + 'static>(resp: P::Response) -> FragmentStream {
    let resp = Some(Box::pin(resp));
    Box::pin(unfold(resp, |resp| async move {
        let mut resp = resp?;
        loop {
            match poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await {
                Ok(Some(ModelResponseEvent::MessageDelta(delta))) => {
                    return Some((Ok(delta), Some(resp)));
                }
                Ok(Some(ModelResponseEvent::Completed(reason))) => {
                    if reason.is_truncated() {
                        warn!("reply cut short: {reason:?}");
                    } else {
                        trace!("completed: {reason:?}");
                    }
                }
                Ok(None) => {
                    trace!("finished a request");
                    return None;
                }
                Err(err) => {
                    error!("got an error: {err:?}");
                    return Some((Err(CompletionError::new(err)), None));
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;
    use safechat_model::ModelMessage;
    use safechat_test_model::{PresetEvent, PresetResponse, TestModelProvider};

    use super::*;

    fn hi() -> ModelRequest {
        ModelRequest::with_messages([ModelMessage::User("Hi".to_owned())])
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_turn(PresetResponse::with_fragments([
            "How ", "are ", "you?",
        ]));
        let model_client = ModelClient::new(model_provider);

        for _ in 0..3 {
            let fragments: Vec<_> = model_client
                .send_request(hi())
                .await
                .unwrap()
                .map(Result::unwrap)
                .collect()
                .await;
            assert_eq!(fragments, ["How ", "are ", "you?"]);
        }
    }

    #[tokio::test]
    async fn test_error_handling() {
        let model_client = ModelClient::new(TestModelProvider::default());
        assert!(model_client.send_request(hi()).await.is_err());
    }

    #[tokio::test]
    async fn test_stream_ends_after_error() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_turn(PresetResponse::with_events([
            PresetEvent::MessageDelta("Par".to_owned()),
            PresetEvent::Error,
            PresetEvent::MessageDelta("never".to_owned()),
        ]));
        let model_client = ModelClient::new(model_provider);

        let mut fragments = model_client.send_request(hi()).await.unwrap();
        assert_eq!(fragments.next().await.unwrap().unwrap(), "Par");
        let err = fragments.next().await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(fragments.next().await.is_none());
    }
}
