use std::pin::Pin;
use std::task::{Context, Poll, ready};

use pin_project_lite::pin_project;
use safechat_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
};

use crate::Error;
use crate::io::{Sse, SseError};
use crate::proto::ChatCompletionChunk;

struct PartialState {
    sse: Sse,
    // Set once a finish reason arrives; the completed event is emitted
    // on the next poll and then the stream is drained.
    pending_finish_reason: Option<ModelFinishReason>,
    finished: bool,
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<ModelResponseEvent>, PartialState), Error>;

pin_project! {
    pub struct OpenAIResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
    }
}

impl OpenAIResponse {
    #[inline]
    pub fn from_sse(sse: Sse) -> Self {
        let partial_state = PartialState {
            sse,
            pending_finish_reason: None,
            finished: false,
        };
        let next_event_fut = async move { next_event(partial_state).await };
        Self {
            next_event_fut: Some(Box::pin(next_event_fut)),
        }
    }
}

impl ModelResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let (event, partial_state) =
            match ready!(next_event_fut.as_mut().poll(cx)) {
                Ok((Some(event), partial_state)) => (event, partial_state),
                Ok((None, _)) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        // The stream may still have more data to pull, create a new future for
        // the next event.
        let next_event_fut = async move { next_event(partial_state).await };
        *this.next_event_fut = Some(Box::pin(next_event_fut));

        Poll::Ready(Ok(Some(event)))
    }
}

fn finish_reason_from(raw: &str) -> ModelFinishReason {
    match raw {
        "length" => ModelFinishReason::Length,
        "content_filter" => ModelFinishReason::ContentFilter,
        _ => ModelFinishReason::Stop,
    }
}

async fn next_event(
    mut partial_state: PartialState,
) -> Result<(Option<ModelResponseEvent>, PartialState), Error> {
    if let Some(finish_reason) = partial_state.pending_finish_reason.take() {
        partial_state.finished = true;
        return Ok((
            Some(ModelResponseEvent::Completed(finish_reason)),
            partial_state,
        ));
    }
    if partial_state.finished {
        return Ok((None, partial_state));
    }

    let sse = &mut partial_state.sse;
    loop {
        let sse_event = match sse.next_event().await {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(SseError::ChunksError(_)) => {
                return Err(Error::new(
                    "connection broke while streaming",
                    ErrorKind::Transport,
                ));
            }
            Err(err) => {
                return Err(Error::new(
                    format!("{err:?}"),
                    ErrorKind::InvalidResponse,
                ));
            }
        };
        trace!("got sse event: {sse_event}");
        if sse_event == "[DONE]" {
            break;
        }

        let mut chunk = serde_json::from_str::<ChatCompletionChunk>(&sse_event)
            .map_err(|err| {
                Error::new(format!("{err}"), ErrorKind::InvalidResponse)
            })?;

        // Azure sends prompt filter results in a chunk without choices.
        let Some(choice) = chunk.choices.pop() else {
            continue;
        };

        if let Some(finish_reason) = &choice.finish_reason {
            partial_state.pending_finish_reason =
                Some(finish_reason_from(finish_reason));
        }

        match choice.delta.content {
            Some(content) if !content.is_empty() => {
                return Ok((
                    Some(ModelResponseEvent::MessageDelta(content)),
                    partial_state,
                ));
            }
            _ => {}
        }

        if let Some(finish_reason) = partial_state.pending_finish_reason.take()
        {
            partial_state.finished = true;
            return Ok((
                Some(ModelResponseEvent::Completed(finish_reason)),
                partial_state,
            ));
        }
    }

    partial_state.finished = true;
    Ok((None, partial_state))
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use bytes::Bytes;

    use super::*;
    use crate::io::Chunks;

    async fn collect(chunks: Vec<Bytes>) -> Result<Vec<ModelResponseEvent>, Error> {
        let sse = Sse::new(Chunks::from_vec_deque(chunks.into()));
        let mut resp = pin!(OpenAIResponse::from_sse(sse));
        let mut events = vec![];
        while let Some(event) =
            poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await?
        {
            events.push(event);
        }
        Ok(events)
    }

    #[tokio::test]
    async fn test_azure_stream() {
        let events = collect(vec![Bytes::from_static(include_bytes!(
            "../fixtures/azure_stream.txt"
        ))])
        .await
        .unwrap();
        assert_eq!(
            events,
            vec![
                ModelResponseEvent::MessageDelta("Hi".to_owned()),
                ModelResponseEvent::MessageDelta(" there".to_owned()),
                ModelResponseEvent::MessageDelta("!".to_owned()),
                ModelResponseEvent::Completed(ModelFinishReason::Stop),
            ]
        );
    }

    #[tokio::test]
    async fn test_content_filter_finish() {
        let events = collect(vec![
            Bytes::from_static(
                br#"data: {"choices":[{"delta":{"content":"Sure"},"finish_reason":null}]}"#,
            ),
            Bytes::from_static(b"\n\n"),
            Bytes::from_static(
                br#"data: {"choices":[{"delta":{},"finish_reason":"content_filter"}]}"#,
            ),
            Bytes::from_static(b"\n\n"),
        ])
        .await
        .unwrap();
        assert_eq!(
            events,
            vec![
                ModelResponseEvent::MessageDelta("Sure".to_owned()),
                ModelResponseEvent::Completed(ModelFinishReason::ContentFilter),
            ]
        );
    }

    #[tokio::test]
    async fn test_malformed_chunk() {
        let err = collect(vec![Bytes::from_static(b"data: {not json}\n\n")])
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidResponse);
    }
}
