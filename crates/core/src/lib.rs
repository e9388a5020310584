//! Core logic of a safety-gated conversation: the transcript, the
//! conversation state machine, and the orchestrator tying the safety gate
//! to a streaming completion engine.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod accumulator;
pub mod conversation;
mod model_client;
pub mod state;
pub mod transcript;

pub use accumulator::Snapshots;
pub use conversation::{
    Conversation, ConversationBuilder, OrchestrationError, ReplyStream,
    SubmitOutcome,
};
pub use model_client::CompletionError;
pub use state::{ConversationSnapshot, ConversationState, FailureKind};
pub use transcript::{Message, Role, Transcript};
