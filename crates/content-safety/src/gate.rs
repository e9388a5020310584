use std::pin::Pin;
use std::sync::Arc;

use futures_util::future::join;
use tracing::Instrument;

use crate::category::{Category, Severities};
use crate::classifier::{AttackDetector, SeverityModerator};
use crate::config::ContentSafetyConfig;
use crate::decision::SafetyDecision;
use crate::error::SafetyCheckError;
use crate::http::{PromptShieldClient, TextModerationClient};

type BoxedFuture<T> =
    Pin<Box<dyn Future<Output = Result<T, SafetyCheckError>> + Send>>;
type DetectFn = Arc<dyn Fn(&str) -> BoxedFuture<bool> + Send + Sync>;
type ModerateFn = Arc<dyn Fn(&str) -> BoxedFuture<Severities> + Send + Sync>;

/// Runs both classifiers over a candidate message and reduces their
/// results into a single [`SafetyDecision`].
///
/// The gate never retries and never caches: every call to
/// [`evaluate`](Self::evaluate) sends exactly one request to each
/// classifier. Any failure fails the whole evaluation.
#[derive(Clone)]
pub struct SafetyGate {
    detect_fn: DetectFn,
    moderate_fn: ModerateFn,
    configured: bool,
}

impl SafetyGate {
    /// Creates a gate over the given classifiers.
    pub fn new<D, M>(detector: D, moderator: M) -> Self
    where
        D: AttackDetector + 'static,
        M: SeverityModerator + 'static,
    {
        // Configuration is fixed once the classifiers are built.
        let configured = detector.is_configured() && moderator.is_configured();
        // Erase the classifier types, so that callers don't need to carry
        // two extra generic parameters around.
        let detect_fn: DetectFn =
            Arc::new(move |text: &str| -> BoxedFuture<bool> {
                Box::pin(detector.detect_attack(text))
            });
        let moderate_fn: ModerateFn =
            Arc::new(move |text: &str| -> BoxedFuture<Severities> {
                Box::pin(moderator.moderate(text, &Category::ALL))
            });
        Self {
            detect_fn,
            moderate_fn,
            configured,
        }
    }

    /// Creates a gate backed by Azure AI Content Safety, one configuration
    /// per classifier.
    pub fn from_config(
        prompt_shield: ContentSafetyConfig,
        text_moderation: ContentSafetyConfig,
    ) -> Self {
        let client = reqwest::Client::new();
        Self::new(
            PromptShieldClient::with_client(client.clone(), prompt_shield),
            TextModerationClient::with_client(client, text_moderation),
        )
    }

    /// Evaluates `text`, which must not be empty.
    ///
    /// # Errors
    ///
    /// Fails with `ConfigMissing` before sending anything if either
    /// classifier is not configured, and with the classifier's error if
    /// either request fails.
    pub async fn evaluate(
        &self,
        text: &str,
    ) -> Result<SafetyDecision, SafetyCheckError> {
        debug_assert!(!text.trim().is_empty(), "evaluating an empty message");
        if !self.configured {
            warn!("content safety is not configured");
            return Err(SafetyCheckError::config_missing());
        }

        // Both requests run concurrently, and both must finish before the
        // decision is made.
        let (attack, severities) =
            join((self.detect_fn)(text), (self.moderate_fn)(text))
                .instrument(debug_span!("safety check"))
                .await;
        let attack_detected = attack?;
        let severities = severities?;

        if let Some(missing) =
            Category::ALL.into_iter().find(|c| !severities.contains_key(c))
        {
            return Err(SafetyCheckError::upstream_rejected()
                .with_detail(format!("no severity for category {missing}")));
        }

        let decision = SafetyDecision::reduce(attack_detected, severities);
        debug!(
            attack_detected,
            blocked = decision.blocked(),
            "safety decision: {:?}",
            decision.reasons()
        );
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use std::future::ready;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::time::sleep;

    use super::*;
    use crate::error::ErrorKind;

    #[derive(Clone)]
    struct FixedDetector {
        result: Result<bool, SafetyCheckError>,
        configured: bool,
        calls: Arc<AtomicUsize>,
    }

    impl FixedDetector {
        fn new(result: Result<bool, SafetyCheckError>) -> Self {
            Self {
                result,
                configured: true,
                calls: Default::default(),
            }
        }
    }

    impl AttackDetector for FixedDetector {
        fn is_configured(&self) -> bool {
            self.configured
        }

        fn detect_attack(
            &self,
            _text: &str,
        ) -> impl Future<Output = Result<bool, SafetyCheckError>> + Send + 'static
        {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ready(self.result.clone())
        }
    }

    #[derive(Clone)]
    struct FixedModerator {
        result: Result<Severities, SafetyCheckError>,
        delay: Duration,
        calls: Arc<AtomicUsize>,
    }

    impl FixedModerator {
        fn new(values: [u32; 4]) -> Self {
            Self {
                result: Ok(Category::ALL.into_iter().zip(values).collect()),
                delay: Duration::ZERO,
                calls: Default::default(),
            }
        }
    }

    impl SeverityModerator for FixedModerator {
        fn moderate(
            &self,
            _text: &str,
            categories: &[Category],
        ) -> impl Future<Output = Result<Severities, SafetyCheckError>> + Send + 'static
        {
            assert_eq!(categories, Category::ALL);
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = self.result.clone();
            let delay = self.delay;
            async move {
                sleep(delay).await;
                result
            }
        }
    }

    #[tokio::test]
    async fn test_pass() {
        let gate = SafetyGate::new(
            FixedDetector::new(Ok(false)),
            FixedModerator::new([0; 4]),
        );
        let decision = gate.evaluate("hello").await.unwrap();
        assert!(!decision.blocked());
    }

    #[tokio::test]
    async fn test_block_reasons() {
        let gate = SafetyGate::new(
            FixedDetector::new(Ok(true)),
            FixedModerator::new([2, 0, 4, 0]),
        );
        let decision = gate.evaluate("hello").await.unwrap();
        assert!(decision.blocked());
        assert_eq!(
            decision.reasons(),
            ["potential jailbreak", "hate", "selfharm"]
        );
    }

    #[tokio::test]
    async fn test_config_missing_sends_nothing() {
        let mut detector = FixedDetector::new(Ok(false));
        detector.configured = false;
        let moderator = FixedModerator::new([0; 4]);
        let gate = SafetyGate::new(detector.clone(), moderator.clone());

        let err = gate.evaluate("hello").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigMissing);
        assert_eq!(detector.calls.load(Ordering::SeqCst), 0);
        assert_eq!(moderator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_single_failure_fails_all() {
        let gate = SafetyGate::new(
            FixedDetector::new(Err(SafetyCheckError::transport_failure())),
            FixedModerator::new([0; 4]),
        );
        let err = gate.evaluate("hello").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportFailure);

        let mut moderator = FixedModerator::new([0; 4]);
        moderator.result = Err(SafetyCheckError::upstream_rejected());
        let gate = SafetyGate::new(FixedDetector::new(Ok(true)), moderator);
        let err = gate.evaluate("hello").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamRejected);
    }

    #[tokio::test]
    async fn test_missing_category_is_rejected() {
        let mut moderator = FixedModerator::new([0; 4]);
        moderator.result = Ok([(Category::Hate, 0)].into_iter().collect());
        let gate = SafetyGate::new(FixedDetector::new(Ok(false)), moderator);
        let err = gate.evaluate("hello").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamRejected);
    }

    #[tokio::test]
    async fn test_waits_for_both() {
        // The detector answers first, yet the moderator still decides.
        let mut moderator = FixedModerator::new([0, 0, 0, 2]);
        moderator.delay = Duration::from_millis(20);
        let detector = FixedDetector::new(Ok(false));
        let gate = SafetyGate::new(detector.clone(), moderator.clone());

        let decision = gate.evaluate("hello").await.unwrap();
        assert_eq!(decision.reasons(), ["violence"]);
        assert_eq!(detector.calls.load(Ordering::SeqCst), 1);
        assert_eq!(moderator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_caching() {
        let detector = FixedDetector::new(Ok(false));
        let gate =
            SafetyGate::new(detector.clone(), FixedModerator::new([0; 4]));
        gate.evaluate("same").await.unwrap();
        gate.evaluate("same").await.unwrap();
        assert_eq!(detector.calls.load(Ordering::SeqCst), 2);
    }
}
