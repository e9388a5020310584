use serde::{Deserialize, Serialize};

use crate::category::{Category, Severities, Severity};
use crate::error::SafetyCheckError;

pub const SHIELD_PROMPT_PATH: &str =
    "/text:shieldPrompt?api-version=2024-02-15-preview";
pub const ANALYZE_TEXT_PATH: &str = "/text:analyze?api-version=2023-10-01";

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShieldPromptRequest<'a> {
    pub user_prompt: &'a str,
    pub documents: [&'a str; 0],
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeTextRequest<'a> {
    pub text: &'a str,
    pub categories: Vec<&'static str>,
    pub halt_on_blocklist_hit: bool,
    pub output_type: &'static str,
}

impl<'a> AnalyzeTextRequest<'a> {
    pub fn new(text: &'a str, categories: &[Category]) -> Self {
        Self {
            text,
            categories: categories.iter().map(|c| c.name()).collect(),
            halt_on_blocklist_hit: false,
            output_type: "FourSeverityLevels",
        }
    }
}

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShieldPromptResponse {
    user_prompt_analysis: UserPromptAnalysis,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserPromptAnalysis {
    attack_detected: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeTextResponse {
    categories_analysis: Vec<CategoryAnalysis>,
}

#[derive(Clone, Debug, Deserialize)]
struct CategoryAnalysis {
    category: String,
    severity: Severity,
}

// -------
// Parsing
// -------

pub fn parse_shield_response(body: &[u8]) -> Result<bool, SafetyCheckError> {
    let resp: ShieldPromptResponse =
        serde_json::from_slice(body).map_err(|err| {
            SafetyCheckError::upstream_rejected()
                .with_detail(format!("malformed prompt shield response: {err}"))
        })?;
    Ok(resp.user_prompt_analysis.attack_detected)
}

pub fn parse_analyze_response(
    body: &[u8],
) -> Result<Severities, SafetyCheckError> {
    let resp: AnalyzeTextResponse =
        serde_json::from_slice(body).map_err(|err| {
            SafetyCheckError::upstream_rejected()
                .with_detail(format!("malformed moderation response: {err}"))
        })?;
    let mut severities = Severities::new();
    for analysis in resp.categories_analysis {
        match Category::from_name(&analysis.category) {
            Some(category) => {
                severities.insert(category, analysis.severity);
            }
            None => {
                warn!("ignoring unknown category: {}", analysis.category);
            }
        }
    }
    Ok(severities)
}
