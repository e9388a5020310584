use std::pin::Pin;
use std::task::{self, Poll};

use serde::{Deserialize, Serialize};

use crate::provider::ModelProviderError;

/// The streaming reply to one [`ModelRequest`](crate::ModelRequest).
///
/// Replies are pulled, never pushed: nothing happens unless the caller
/// polls, and a caller that stops polling simply stops consuming. The
/// provider is not told about it.
pub trait ModelResponse: Sized + Send + 'static {
    /// The error type that may be returned while streaming.
    type Error: ModelProviderError;

    /// Polls for the next event of the reply.
    ///
    /// - `Poll::Pending`: no event yet; the waker in `cx` is registered.
    /// - `Poll::Ready(Ok(Some(event)))`: one event, more may follow.
    /// - `Poll::Ready(Ok(None))`: the reply is over. Every later call must
    ///   return this again.
    /// - `Poll::Ready(Err(error))`: the reply broke. Text delivered before
    ///   the error stays valid.
    ///
    /// Text arrives as [`ModelResponseEvent::MessageDelta`] in order; the
    /// full reply is the concatenation of all deltas.
    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>>;
}

/// Why the model stopped writing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelFinishReason {
    /// The reply is complete.
    Stop,
    /// The output token limit was reached.
    Length,
    /// The provider's own filter cut the reply short.
    ContentFilter,
}

impl ModelFinishReason {
    /// Whether the reply ended before the model was done.
    #[inline]
    pub fn is_truncated(self) -> bool {
        !matches!(self, ModelFinishReason::Stop)
    }
}

/// An event of a streaming reply.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelResponseEvent {
    /// The model finished, with the reason.
    Completed(ModelFinishReason),
    /// The next piece of reply text.
    MessageDelta(String),
}
