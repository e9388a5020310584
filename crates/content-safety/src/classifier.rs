use crate::category::{Category, Severities};
use crate::error::SafetyCheckError;

/// A classifier that detects prompt-injection or jailbreak attempts.
///
/// Like a model provider, implementations behave as stateless objects and
/// return futures that are independent of `self` and of the input.
pub trait AttackDetector: Send + Sync {
    /// Whether the detector has everything it needs to send a request.
    ///
    /// Checked once before any request is sent.
    fn is_configured(&self) -> bool {
        true
    }

    /// Classifies the raw user text.
    fn detect_attack(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<bool, SafetyCheckError>> + Send + 'static;
}

/// A classifier that grades text against a set of harm categories.
pub trait SeverityModerator: Send + Sync {
    /// Whether the moderator has everything it needs to send a request.
    fn is_configured(&self) -> bool {
        true
    }

    /// Grades the raw user text against `categories`.
    fn moderate(
        &self,
        text: &str,
        categories: &[Category],
    ) -> impl Future<Output = Result<Severities, SafetyCheckError>> + Send + 'static;
}
