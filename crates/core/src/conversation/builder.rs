use safechat_content_safety::{ContentSafetyConfigBuilder, SafetyGate};
use safechat_model::ModelProvider;

use super::Conversation;
use crate::model_client::ModelClient;
use crate::transcript::Transcript;

/// [`Conversation`] builder.
pub struct ConversationBuilder {
    pub(super) model_client: ModelClient,
    pub(super) safety_gate: SafetyGate,
    pub(super) system_prompt: Option<String>,
    pub(super) transcript: Transcript,
}

impl ConversationBuilder {
    /// Creates a new builder with the specified model provider.
    ///
    /// Until a safety gate is set, the conversation has an unconfigured
    /// one, and every submission fails its safety check.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        let unconfigured = || ContentSafetyConfigBuilder::default().build();
        Self {
            model_client: ModelClient::new(provider),
            safety_gate: SafetyGate::from_config(unconfigured(), unconfigured()),
            system_prompt: None,
            transcript: Transcript::default(),
        }
    }

    /// Sets the safety gate that every submission runs through.
    #[inline]
    pub fn with_safety_gate(mut self, safety_gate: SafetyGate) -> Self {
        self.safety_gate = safety_gate;
        self
    }

    /// Sets the system instructions sent ahead of the transcript.
    ///
    /// They are never part of the transcript itself.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Starts the conversation from an existing transcript.
    #[inline]
    pub fn with_transcript(mut self, transcript: Transcript) -> Self {
        self.transcript = transcript;
        self
    }

    /// Builds the conversation.
    #[inline]
    pub fn build(self) -> Conversation {
        Conversation::from_builder(self)
    }
}
