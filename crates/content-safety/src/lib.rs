//! A two-stage content safety gate for user messages.
//!
//! The gate asks a prompt-injection detector and a category-severity
//! moderator about the same text, joins both answers, and reduces them
//! to one allow/block [`SafetyDecision`]. Failures are never treated as
//! a pass.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod category;
mod classifier;
mod config;
mod decision;
mod error;
mod gate;
mod http;
mod proto;

pub use category::{Category, Severities, Severity};
pub use classifier::{AttackDetector, SeverityModerator};
pub use config::{ContentSafetyConfig, ContentSafetyConfigBuilder};
pub use decision::{JAILBREAK_REASON, SafetyDecision, summarize_reasons};
pub use error::{ErrorKind, SafetyCheckError};
pub use gate::SafetyGate;
pub use http::{PromptShieldClient, TextModerationClient};
