//! The conversation orchestrator.
//!
//! A [`Conversation`] owns the transcript and the explicit
//! [`ConversationState`]. Every submission runs through the safety gate
//! first, and only a message that passes is appended and sent to the
//! completion engine. The reply then streams into the trailing assistant
//! message.
//!
//! At most one submission is in flight at a time. A submission made while
//! another is checking or streaming is refused with
//! [`OrchestrationError::Busy`] and changes nothing.

mod builder;
mod reply;

use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use safechat_content_safety::{SafetyCheckError, SafetyGate};
use safechat_model::{ModelMessage, ModelRequest};
use tokio::sync::watch;

use crate::model_client::{CompletionError, ModelClient};
use crate::state::{ConversationSnapshot, ConversationState, FailureKind};
use crate::transcript::{Message, Transcript};
pub use builder::ConversationBuilder;
use reply::FlightGuard;
pub use reply::ReplyStream;

/// The outcome of an accepted submission.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// The message was refused, with the reasons.
    ///
    /// The transcript is left untouched and nothing is sent to the model.
    Blocked(Vec<String>),
    /// The message was appended and the reply is streaming.
    Streaming(ReplyStream),
}

/// The error type for [`Conversation::submit`].
#[derive(Debug)]
pub enum OrchestrationError {
    /// The message is empty or whitespace only.
    EmptyInput,
    /// Another submission is in flight.
    Busy,
    /// The safety check could not produce a decision.
    SafetyUnavailable(SafetyCheckError),
    /// The completion engine failed.
    CompletionFailure(CompletionError),
}

impl OrchestrationError {
    /// Returns the failure state this error left the conversation in, if
    /// any.
    #[inline]
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            OrchestrationError::EmptyInput | OrchestrationError::Busy => None,
            OrchestrationError::SafetyUnavailable(_) => {
                Some(FailureKind::SafetyUnavailable)
            }
            OrchestrationError::CompletionFailure(_) => {
                Some(FailureKind::CompletionFailure)
            }
        }
    }
}

impl Display for OrchestrationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            OrchestrationError::EmptyInput => write!(f, "message is empty"),
            OrchestrationError::Busy => {
                write!(f, "another message is being processed")
            }
            OrchestrationError::SafetyUnavailable(err) => {
                write!(f, "safety check unavailable: {err}")
            }
            OrchestrationError::CompletionFailure(err) => Display::fmt(err, f),
        }
    }
}

impl StdError for OrchestrationError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            OrchestrationError::EmptyInput | OrchestrationError::Busy => None,
            OrchestrationError::SafetyUnavailable(err) => Some(err),
            OrchestrationError::CompletionFailure(err) => Some(err),
        }
    }
}

/// The submission currently in flight.
struct Flight {
    id: u64,
    /// Whether the trailing message is this flight's reply.
    has_reply: bool,
}

struct Record {
    state: ConversationState,
    transcript: Transcript,
    flight: Option<Flight>,
    next_flight_id: u64,
}

impl Record {
    fn set_state(&mut self, next: ConversationState) {
        debug_assert!(
            self.state.can_transition_to(&next),
            "illegal transition from {:?} to {next:?}",
            self.state
        );
        debug!("state: {:?} -> {next:?}", self.state);
        self.state = next;
    }

    #[inline]
    fn owns(&self, flight_id: u64) -> bool {
        self.flight.as_ref().is_some_and(|f| f.id == flight_id)
    }

    #[inline]
    fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            state: self.state.clone(),
            transcript: self.transcript.clone(),
        }
    }
}

/// State shared by a conversation, its clones and its reply streams.
///
/// The lock is never held across an await point. Snapshots are published
/// while the lock is held, so observers see changes in order.
struct Shared {
    record: Mutex<Record>,
    snapshot_tx: watch::Sender<ConversationSnapshot>,
}

impl Shared {
    fn new(transcript: Transcript) -> Self {
        let record = Record {
            state: ConversationState::Idle,
            transcript,
            flight: None,
            next_flight_id: 1,
        };
        let (snapshot_tx, _) = watch::channel(record.snapshot());
        Self {
            record: Mutex::new(record),
            snapshot_tx,
        }
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, Record> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` and publishes a snapshot.
    fn update<R>(&self, f: impl FnOnce(&mut Record) -> R) -> R {
        let mut record = self.lock();
        let result = f(&mut record);
        self.snapshot_tx.send_replace(record.snapshot());
        result
    }

    /// Runs `f` and publishes a snapshot only if it returns `Some`.
    fn try_update<R>(
        &self,
        f: impl FnOnce(&mut Record) -> Option<R>,
    ) -> Option<R> {
        let mut record = self.lock();
        let result = f(&mut record)?;
        self.snapshot_tx.send_replace(record.snapshot());
        Some(result)
    }

    /// Ends a flight in `next`, unless it was cancelled already.
    fn settle(&self, flight_id: u64, next: ConversationState) -> bool {
        self.try_update(|record| {
            if !record.owns(flight_id) {
                return None;
            }
            record.flight = None;
            record.set_state(next);
            Some(())
        })
        .is_some()
    }

    /// Sets the trailing reply of a flight to `text`, returning the
    /// updated transcript.
    fn write_reply(&self, flight_id: u64, text: String) -> Option<Transcript> {
        self.try_update(|record| {
            let flight =
                record.flight.as_mut().filter(|f| f.id == flight_id)?;
            if flight.has_reply {
                record.transcript.replace_last_content(text);
            } else {
                flight.has_reply = true;
                record.transcript.push(Message::assistant(text));
            }
            Some(record.transcript.clone())
        })
    }
}

/// A conversation between a user and the assistant.
///
/// Cloning a conversation yields another handle to the same transcript
/// and state.
#[derive(Clone)]
pub struct Conversation {
    shared: Arc<Shared>,
    model_client: ModelClient,
    safety_gate: SafetyGate,
    system_prompt: Option<Arc<str>>,
}

impl Conversation {
    fn from_builder(builder: ConversationBuilder) -> Self {
        let ConversationBuilder {
            model_client,
            safety_gate,
            system_prompt,
            transcript,
        } = builder;

        Self {
            shared: Arc::new(Shared::new(transcript)),
            model_client,
            safety_gate,
            system_prompt: system_prompt.map(Into::into),
        }
    }

    /// Submits a user message.
    ///
    /// The message is checked for safety first. If it is blocked, the
    /// transcript is unchanged and [`SubmitOutcome::Blocked`] is returned.
    /// Otherwise the message is appended, the completion request is sent,
    /// and the reply is returned as a [`ReplyStream`] once the engine
    /// accepts the request.
    ///
    /// # Errors
    ///
    /// - [`EmptyInput`](OrchestrationError::EmptyInput) and
    ///   [`Busy`](OrchestrationError::Busy) leave the conversation as it
    ///   was.
    /// - [`SafetyUnavailable`](OrchestrationError::SafetyUnavailable) moves
    ///   the conversation to the matching failed state without touching
    ///   the transcript.
    /// - [`CompletionFailure`](OrchestrationError::CompletionFailure) moves
    ///   the conversation to the matching failed state, with the user
    ///   message already appended.
    ///
    /// # Cancel safety
    ///
    /// Dropping the returned future abandons the submission and returns
    /// the conversation to idle.
    pub async fn submit<S: Into<String>>(
        &self,
        text: S,
    ) -> Result<SubmitOutcome, OrchestrationError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(OrchestrationError::EmptyInput);
        }
        let Some(mut flight) = self.begin_flight() else {
            debug!("busy, refusing submission");
            return Err(OrchestrationError::Busy);
        };

        let decision = match self.safety_gate.evaluate(&text).await {
            Ok(decision) => decision,
            Err(err) => {
                warn!("safety check failed: {err}");
                flight.settle(ConversationState::Failed(
                    FailureKind::SafetyUnavailable,
                ));
                return Err(OrchestrationError::SafetyUnavailable(err));
            }
        };
        if decision.blocked() {
            let reasons = decision.into_reasons();
            info!("message blocked: {reasons:?}");
            flight.settle(ConversationState::Blocked(reasons.clone()));
            return Ok(SubmitOutcome::Blocked(reasons));
        }

        let (transcript, req) = self.shared.update(|record| {
            record.transcript.push(Message::user(text));
            record.set_state(ConversationState::Streaming);
            let req = self.make_request(&record.transcript);
            (record.transcript.clone(), req)
        });
        match self.model_client.send_request(req).await {
            Ok(fragments) => Ok(SubmitOutcome::Streaming(ReplyStream::new(
                flight, transcript, fragments,
            ))),
            Err(err) => {
                flight.settle(ConversationState::Failed(
                    FailureKind::CompletionFailure,
                ));
                Err(OrchestrationError::CompletionFailure(err))
            }
        }
    }

    /// Removes the message at `position` and returns it.
    ///
    /// The relative order of the remaining messages is kept. Deleting the
    /// reply that is still streaming cancels it.
    pub fn delete(&self, position: usize) -> Option<Message> {
        self.shared.try_update(|record| {
            let is_last = record.transcript.len().checked_sub(1) == Some(position);
            let removed = record.transcript.remove(position)?;
            if is_last && record.flight.as_ref().is_some_and(|f| f.has_reply)
            {
                debug!("streaming reply deleted, cancelling");
                record.flight = None;
                record.set_state(ConversationState::Idle);
            }
            Some(removed)
        })
    }

    /// Returns the current state.
    #[inline]
    pub fn state(&self) -> ConversationState {
        self.shared.lock().state.clone()
    }

    /// Returns a snapshot of the transcript.
    #[inline]
    pub fn transcript(&self) -> Transcript {
        self.shared.lock().transcript.clone()
    }

    /// Returns the current state together with the transcript.
    #[inline]
    pub fn snapshot(&self) -> ConversationSnapshot {
        self.shared.lock().snapshot()
    }

    /// Subscribes to changes.
    ///
    /// A new snapshot is published after every state change and every
    /// transcript change, including each step of a streaming reply.
    /// Intermediate snapshots may be skipped by slow receivers.
    #[inline]
    pub fn subscribe(&self) -> watch::Receiver<ConversationSnapshot> {
        self.shared.snapshot_tx.subscribe()
    }

    fn begin_flight(&self) -> Option<FlightGuard> {
        let flight_id = self.shared.try_update(|record| {
            if !record.state.accepts_submission() {
                return None;
            }
            let id = record.next_flight_id;
            record.next_flight_id += 1;
            record.flight = Some(Flight {
                id,
                has_reply: false,
            });
            record.set_state(ConversationState::CheckingSafety);
            Some(id)
        })?;
        Some(FlightGuard::new(Arc::clone(&self.shared), flight_id))
    }

    fn make_request(&self, transcript: &Transcript) -> ModelRequest {
        let system = self
            .system_prompt
            .as_deref()
            .map(|prompt| ModelMessage::System(prompt.to_owned()));
        ModelRequest::with_messages(
            system
                .into_iter()
                .chain(transcript.iter().map(Message::to_model_message))
                .collect::<Vec<_>>(),
        )
    }
}

impl Debug for Conversation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conversation")
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}
