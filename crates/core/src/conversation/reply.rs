use std::fmt::{self, Debug, Formatter};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use futures_util::{Stream, StreamExt};

use super::{OrchestrationError, Shared};
use crate::accumulator::Snapshots;
use crate::model_client::FragmentStream;
use crate::state::{ConversationState, FailureKind};
use crate::transcript::Transcript;

/// Owns a flight until it settles.
///
/// A flight that is dropped unsettled is abandoned, which returns the
/// conversation to idle.
pub(super) struct FlightGuard {
    shared: Arc<Shared>,
    flight_id: u64,
    settled: bool,
}

impl FlightGuard {
    #[inline]
    pub(super) fn new(shared: Arc<Shared>, flight_id: u64) -> Self {
        Self {
            shared,
            flight_id,
            settled: false,
        }
    }

    pub(super) fn settle(&mut self, next: ConversationState) {
        if !self.settled {
            self.settled = true;
            self.shared.settle(self.flight_id, next);
        }
    }

    /// Whether the conversation ended this flight before it settled.
    #[inline]
    fn is_cancelled(&self) -> bool {
        !self.settled && !self.shared.lock().owns(self.flight_id)
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if self.shared.settle(self.flight_id, ConversationState::Idle) {
            debug!("flight {} abandoned", self.flight_id);
        }
    }
}

/// The streaming reply to an accepted submission.
///
/// Every item is a snapshot of the whole transcript whose last message is
/// the reply so far; the first item adds that message. The stream ends
/// when the reply is complete, right after yielding a
/// [`CompletionFailure`](OrchestrationError::CompletionFailure), or once
/// the reply is deleted from the conversation. The partial reply stays in
/// the transcript after a failure.
///
/// The reply only advances while this stream is polled. Dropping it
/// cancels the reply: the conversation returns to idle and keeps whatever
/// text arrived so far.
#[must_use = "streams do nothing unless polled"]
pub struct ReplyStream {
    flight: FlightGuard,
    snapshots: Snapshots<FragmentStream>,
    transcript: Transcript,
}

impl ReplyStream {
    pub(super) fn new(
        flight: FlightGuard,
        transcript: Transcript,
        fragments: FragmentStream,
    ) -> Self {
        Self {
            flight,
            snapshots: Snapshots::new(fragments),
            transcript,
        }
    }

    /// Returns the transcript as of the latest item.
    ///
    /// Before the first item, this is the transcript right after the user
    /// message was appended. Once the reply is cancelled from the
    /// conversation, this is the conversation's own transcript.
    pub fn transcript(&self) -> Transcript {
        if self.flight.is_cancelled() {
            self.flight.shared.lock().transcript.clone()
        } else {
            self.transcript.clone()
        }
    }

    fn end_cancelled(&mut self) {
        self.flight.settled = true;
        self.transcript = self.flight.shared.lock().transcript.clone();
    }

    /// Drives the reply to its end and returns the final transcript.
    ///
    /// A reply deleted from the conversation ends early, and the returned
    /// transcript no longer has it.
    pub async fn finish(mut self) -> Result<Transcript, OrchestrationError> {
        while let Some(transcript) = self.next().await {
            transcript?;
        }
        Ok(self.transcript)
    }
}

impl Stream for ReplyStream {
    type Item = Result<Transcript, OrchestrationError>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.flight.settled {
            return Poll::Ready(None);
        }
        if this.flight.is_cancelled() {
            this.end_cancelled();
            return Poll::Ready(None);
        }

        match ready!(Pin::new(&mut this.snapshots).poll_next(cx)) {
            Some(Ok(text)) => {
                let flight_id = this.flight.flight_id;
                match this.flight.shared.write_reply(flight_id, text) {
                    Some(transcript) => {
                        this.transcript = transcript.clone();
                        Poll::Ready(Some(Ok(transcript)))
                    }
                    None => {
                        this.end_cancelled();
                        Poll::Ready(None)
                    }
                }
            }
            Some(Err(err)) => {
                warn!("reply failed: {err}");
                this.flight.settle(ConversationState::Failed(
                    FailureKind::CompletionFailure,
                ));
                Poll::Ready(Some(Err(OrchestrationError::CompletionFailure(err))))
            }
            None => {
                trace!("reply completed");
                this.flight.settle(ConversationState::Idle);
                Poll::Ready(None)
            }
        }
    }
}

impl Debug for ReplyStream {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplyStream")
            .field("transcript", &self.transcript)
            .finish_non_exhaustive()
    }
}
