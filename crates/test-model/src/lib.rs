//! Local fakes of the completion engine and the safety classifiers, for
//! testing purpose.

mod preset;
mod safety;

use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use safechat_model::{
    ErrorKind, ModelFinishReason, ModelMessage, ModelProvider,
    ModelProviderError, ModelRequest, ModelResponse, ModelResponseEvent,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;
pub use safety::*;

#[derive(Debug)]
pub struct Error {
    #[allow(dead_code)]
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    events: Vec<PresetEvent>,
    event_idx: usize,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();
        if this.event_idx > this.events.len() {
            // In case this method is called after completion.
            return Poll::Ready(Ok(None));
        }

        let delay = this.delay;
        let sleep = this.sleep.get_or_insert_with(|| Box::pin(sleep(delay)));
        ready!(sleep.as_mut().poll(cx));
        this.sleep = None;

        let idx = this.event_idx;
        this.event_idx += 1;
        match this.events.get(idx) {
            Some(PresetEvent::MessageDelta(msg)) => Poll::Ready(Ok(Some(
                ModelResponseEvent::MessageDelta(msg.clone()),
            ))),
            Some(PresetEvent::Error) => {
                // Nothing follows a broken stream.
                this.event_idx = this.events.len() + 1;
                Poll::Ready(Err(Error {
                    message: "preset stream error",
                    kind: ErrorKind::Transport,
                }))
            }
            None => Poll::Ready(Ok(Some(ModelResponseEvent::Completed(
                ModelFinishReason::Stop,
            )))),
        }
    }
}

#[derive(Clone)]
enum ConversationStep {
    UserInput,
    AssistantResponse(PresetResponse),
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to setup the conversation script, which
/// is how the model should respond to a request. The step is selected by the
/// number of non-system messages in the request. If there are no enough steps
/// in the script, an error will be returned.
///
/// Every request is recorded and can be inspected with
/// [`requests`](Self::requests).
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    conversation_script: Vec<ConversationStep>,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<ModelRequest>>>,
}

impl TestModelProvider {
    #[inline]
    pub fn add_assistant_response_step(&mut self, preset: PresetResponse) {
        self.conversation_script
            .push(ConversationStep::AssistantResponse(preset));
    }

    #[inline]
    pub fn add_user_input_step(&mut self) {
        self.conversation_script.push(ConversationStep::UserInput);
    }

    /// Adds a user step followed by an assistant step.
    #[inline]
    pub fn add_turn(&mut self, preset: PresetResponse) {
        self.add_user_input_step();
        self.add_assistant_response_step(preset);
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns every request received so far, shared by all clones.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn response_for(
        &self,
        req: &ModelRequest,
    ) -> Result<TestModelResponse, Error> {
        let step_idx = req
            .messages
            .iter()
            .filter(|m| !matches!(m, ModelMessage::System(_)))
            .count();
        let preset = match self.conversation_script.get(step_idx) {
            Some(ConversationStep::AssistantResponse(preset)) => preset,
            Some(ConversationStep::UserInput) => {
                return Err(Error {
                    message: "not an assistant response step",
                    kind: ErrorKind::Other,
                });
            }
            None => {
                return Err(Error {
                    message: "no enough steps",
                    kind: ErrorKind::RateLimitExceeded,
                });
            }
        };
        if preset.reject_request {
            return Err(Error {
                message: "preset request rejection",
                kind: ErrorKind::Other,
            });
        }
        Ok(TestModelResponse {
            events: preset.events.clone(),
            event_idx: 0,
            delay: self.delay.unwrap_or(Duration::from_millis(1)),
            sleep: None,
        })
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(req.clone());
        }
        ready(self.response_for(req))
    }
}
