use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use safechat_content_safety::{
    AttackDetector, Category, SafetyCheckError, Severities, Severity,
    SeverityModerator,
};
use tokio::time::sleep;

/// A fake prompt shield.
///
/// Answers are given in order; once they run out, the last one repeats.
#[derive(Clone, Debug)]
pub struct PresetDetector {
    answers: Vec<Result<bool, SafetyCheckError>>,
    configured: bool,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl PresetDetector {
    /// Answers `attack_detected` to every request.
    #[inline]
    pub fn answering(attack_detected: bool) -> Self {
        Self::with_answer(Ok(attack_detected))
    }

    /// Fails every request with `error`.
    #[inline]
    pub fn failing(error: SafetyCheckError) -> Self {
        Self::with_answer(Err(error))
    }

    /// Answers each request in turn with the next of `answers`.
    ///
    /// # Panics
    ///
    /// Panics if `answers` is empty.
    pub fn answering_in_turn<I>(answers: I) -> Self
    where
        I: IntoIterator<Item = bool>,
    {
        let answers: Vec<_> = answers.into_iter().map(Ok).collect();
        assert!(!answers.is_empty(), "at least one answer is required");
        Self {
            answers,
            configured: true,
            delay: Duration::ZERO,
            calls: Default::default(),
        }
    }

    fn with_answer(answer: Result<bool, SafetyCheckError>) -> Self {
        Self {
            answers: vec![answer],
            configured: true,
            delay: Duration::ZERO,
            calls: Default::default(),
        }
    }

    /// Reports the detector as not configured.
    #[inline]
    pub fn unconfigured(mut self) -> Self {
        self.configured = false;
        self
    }

    /// Delays every answer.
    #[inline]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns how many requests were made, shared by all clones.
    #[inline]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AttackDetector for PresetDetector {
    #[inline]
    fn is_configured(&self) -> bool {
        self.configured
    }

    fn detect_attack(
        &self,
        _text: &str,
    ) -> impl Future<Output = Result<bool, SafetyCheckError>> + Send + 'static
    {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = self.answers[call.min(self.answers.len() - 1)].clone();
        let delay = self.delay;
        async move {
            sleep(delay).await;
            answer
        }
    }
}

/// A fake moderator that always grades the same severities.
#[derive(Clone, Debug)]
pub struct PresetModerator {
    answer: Result<Severities, SafetyCheckError>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl PresetModerator {
    /// Grades every request with `severities`, given in category order.
    #[inline]
    pub fn answering(severities: [Severity; 4]) -> Self {
        Self::with_answer(Ok(Category::ALL.into_iter().zip(severities).collect()))
    }

    /// Grades every category zero.
    #[inline]
    pub fn clean() -> Self {
        Self::answering([0; 4])
    }

    /// Fails every request with `error`.
    #[inline]
    pub fn failing(error: SafetyCheckError) -> Self {
        Self::with_answer(Err(error))
    }

    fn with_answer(answer: Result<Severities, SafetyCheckError>) -> Self {
        Self {
            answer,
            delay: Duration::ZERO,
            calls: Default::default(),
        }
    }

    /// Delays every answer.
    #[inline]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns how many requests were made, shared by all clones.
    #[inline]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SeverityModerator for PresetModerator {
    fn moderate(
        &self,
        _text: &str,
        categories: &[Category],
    ) -> impl Future<Output = Result<Severities, SafetyCheckError>> + Send + 'static
    {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = self.answer.clone().map(|severities| {
            severities
                .into_iter()
                .filter(|(category, _)| categories.contains(category))
                .collect()
        });
        let delay = self.delay;
        async move {
            sleep(delay).await;
            answer
        }
    }
}

#[cfg(test)]
mod tests {
    use safechat_content_safety::{ErrorKind, SafetyGate};

    use super::*;

    #[tokio::test]
    async fn test_presets_drive_gate() {
        let detector = PresetDetector::answering(false);
        let moderator = PresetModerator::answering([0, 0, 2, 0]);
        let gate = SafetyGate::new(detector.clone(), moderator.clone());
        let decision = gate.evaluate("hi").await.unwrap();
        assert_eq!(decision.reasons(), ["selfharm"]);
        assert_eq!(detector.calls(), 1);
        assert_eq!(moderator.calls(), 1);
    }

    #[tokio::test]
    async fn test_answers_in_turn() {
        let detector = PresetDetector::answering_in_turn([true, false]);
        let gate = SafetyGate::new(detector, PresetModerator::clean());
        assert!(gate.evaluate("a").await.unwrap().blocked());
        assert!(!gate.evaluate("b").await.unwrap().blocked());
        assert!(!gate.evaluate("c").await.unwrap().blocked());
    }

    #[tokio::test]
    async fn test_unconfigured() {
        let gate = SafetyGate::new(
            PresetDetector::answering(false).unconfigured(),
            PresetModerator::clean(),
        );
        let err = gate.evaluate("hi").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigMissing);
    }
}
