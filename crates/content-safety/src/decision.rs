use crate::category::{Category, Severities, Severity};

/// The reason reported when the prompt shield flags an attack.
pub const JAILBREAK_REASON: &str = "potential jailbreak";

/// The reduced outcome of both classifiers for one message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SafetyDecision {
    attack_detected: bool,
    severities: Severities,
    blocked: bool,
    reasons: Vec<String>,
}

impl SafetyDecision {
    /// Reduces the classifier outputs into a decision.
    ///
    /// A message is blocked if an attack is detected or any category has a
    /// severity above zero. The magnitude is not surfaced in the reasons.
    pub fn reduce(attack_detected: bool, severities: Severities) -> Self {
        let mut reasons = Vec::new();
        if attack_detected {
            reasons.push(JAILBREAK_REASON.to_owned());
        }
        // `Severities` iterates in category order.
        reasons.extend(
            severities
                .iter()
                .filter(|(_, severity)| **severity > 0)
                .map(|(category, _)| category.reason().to_owned()),
        );
        let blocked = !reasons.is_empty();
        Self {
            attack_detected,
            severities,
            blocked,
            reasons,
        }
    }

    /// Whether the prompt shield flagged an attack.
    #[inline]
    pub fn attack_detected(&self) -> bool {
        self.attack_detected
    }

    /// Returns the severity graded for `category`.
    #[inline]
    pub fn severity(&self, category: Category) -> Severity {
        self.severities.get(&category).copied().unwrap_or_default()
    }

    /// Returns all graded severities.
    #[inline]
    pub fn severities(&self) -> &Severities {
        &self.severities
    }

    /// Whether the message must not reach the model.
    #[inline]
    pub fn blocked(&self) -> bool {
        self.blocked
    }

    /// Human-readable reasons, jailbreak first, then categories.
    #[inline]
    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }

    /// Consumes the decision and returns its reasons.
    #[inline]
    pub fn into_reasons(self) -> Vec<String> {
        self.reasons
    }

    /// Renders a message to show the user when the decision blocks.
    pub fn summary(&self) -> Option<String> {
        self.blocked.then(|| summarize_reasons(&self.reasons))
    }
}

/// Renders the user-facing message for a list of block reasons.
pub fn summarize_reasons(reasons: &[String]) -> String {
    format!(
        "Sorry, we can't process that message as it seems you are trying \
         to send inappropriate content. Detected: {}.",
        reasons.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn severities(values: [Severity; 4]) -> Severities {
        Category::ALL.into_iter().zip(values).collect()
    }

    #[test]
    fn test_clean_message() {
        let decision = SafetyDecision::reduce(false, severities([0; 4]));
        assert!(!decision.blocked());
        assert!(decision.reasons().is_empty());
        assert_eq!(decision.summary(), None);
    }

    #[test]
    fn test_attack_only() {
        let decision = SafetyDecision::reduce(true, severities([0; 4]));
        assert!(decision.blocked());
        assert_eq!(decision.reasons(), ["potential jailbreak"]);
    }

    #[test]
    fn test_reason_order() {
        // Magnitude does not matter, only the fixed category order.
        let decision = SafetyDecision::reduce(true, severities([0, 6, 0, 2]));
        assert_eq!(
            decision.reasons(),
            ["potential jailbreak", "sexual", "violence"]
        );
        assert_eq!(decision.severity(Category::Sexual), 6);
    }

    #[test]
    fn test_every_category() {
        for (idx, category) in Category::ALL.into_iter().enumerate() {
            let mut values = [0; 4];
            values[idx] = 2;
            let decision = SafetyDecision::reduce(false, severities(values));
            assert!(decision.blocked());
            assert_eq!(decision.reasons(), [category.reason()]);
        }
    }

    #[test]
    fn test_summary() {
        let decision = SafetyDecision::reduce(true, severities([4, 0, 0, 0]));
        assert_eq!(
            decision.summary().unwrap(),
            "Sorry, we can't process that message as it seems you are trying \
             to send inappropriate content. Detected: potential jailbreak, \
             hate."
        );
    }
}
