//! The explicit state of a conversation.

use std::fmt::{self, Display, Formatter};

use serde::Serialize;

use crate::transcript::Transcript;

/// Why the last submission failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum FailureKind {
    /// The safety check could not produce a decision.
    SafetyUnavailable,
    /// The completion engine failed before or while streaming.
    CompletionFailure,
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::SafetyUnavailable => write!(f, "Safety unavailable"),
            FailureKind::CompletionFailure => write!(f, "Completion failure"),
        }
    }
}

/// The state a conversation is in.
///
/// ```text
/// Idle ──► CheckingSafety ──► Blocked
///  ▲  ▲          │     └────► Failed
///  │  │          ▼               ▲
///  │  └──── Streaming ───────────┘
///  └─ (Blocked, Failed accept the next submission)
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum ConversationState {
    /// Nothing in flight.
    #[default]
    Idle,
    /// Waiting for the safety classifiers.
    CheckingSafety,
    /// The last submission was refused, with the reasons.
    Blocked(Vec<String>),
    /// The assistant reply is growing.
    Streaming,
    /// The last submission failed.
    Failed(FailureKind),
}

impl ConversationState {
    /// Whether a submission is in flight.
    #[inline]
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            ConversationState::CheckingSafety | ConversationState::Streaming
        )
    }

    /// Whether a new submission may start from this state.
    #[inline]
    pub fn accepts_submission(&self) -> bool {
        !self.is_busy()
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// Going back to `Idle` from an in-flight state is only legal when the
    /// caller abandons the submission.
    pub fn can_transition_to(&self, next: &ConversationState) -> bool {
        use ConversationState::*;

        match (self, next) {
            (Idle | Blocked(_) | Failed(_), CheckingSafety) => true,
            (CheckingSafety, Blocked(_) | Streaming | Failed(_) | Idle) => true,
            (Streaming, Idle | Failed(FailureKind::CompletionFailure)) => true,
            _ => false,
        }
    }
}

/// What observers of a conversation receive after every change.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConversationSnapshot {
    /// The current state.
    pub state: ConversationState,
    /// The current transcript.
    pub transcript: Transcript,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_settled_states_accept_submissions() {
        assert!(ConversationState::Idle.accepts_submission());
        assert!(ConversationState::Blocked(vec![]).accepts_submission());
        assert!(
            ConversationState::Failed(FailureKind::SafetyUnavailable)
                .accepts_submission()
        );
        assert!(!ConversationState::CheckingSafety.accepts_submission());
        assert!(!ConversationState::Streaming.accepts_submission());
    }

    #[test]
    fn test_transitions() {
        use ConversationState::*;

        let blocked = Blocked(vec!["hate".to_owned()]);
        let safety_failed = Failed(FailureKind::SafetyUnavailable);
        let completion_failed = Failed(FailureKind::CompletionFailure);

        assert!(Idle.can_transition_to(&CheckingSafety));
        assert!(blocked.can_transition_to(&CheckingSafety));
        assert!(completion_failed.can_transition_to(&CheckingSafety));
        assert!(CheckingSafety.can_transition_to(&blocked));
        assert!(CheckingSafety.can_transition_to(&Streaming));
        assert!(CheckingSafety.can_transition_to(&safety_failed));
        assert!(Streaming.can_transition_to(&Idle));
        assert!(Streaming.can_transition_to(&completion_failed));

        assert!(!Idle.can_transition_to(&Streaming));
        assert!(!Streaming.can_transition_to(&CheckingSafety));
        assert!(!Streaming.can_transition_to(&safety_failed));
        assert!(!blocked.can_transition_to(&Streaming));
    }
}
