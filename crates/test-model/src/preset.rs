use serde::{Deserialize, Serialize};

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetEvent {
    /// A fragment of the assistant reply.
    #[serde(rename = "message_delta")]
    MessageDelta(String),
    /// The stream breaks at this point.
    #[serde(rename = "error")]
    Error,
}

/// The preset response for an assistant step.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Events in this response.
    pub events: Vec<PresetEvent>,
    /// If set, the request itself fails and no stream is returned.
    #[serde(default)]
    pub reject_request: bool,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            reject_request: false,
        }
    }

    /// Creates a `PresetResponse` streaming the given fragments.
    #[inline]
    pub fn with_fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_events(
            fragments
                .into_iter()
                .map(|f| PresetEvent::MessageDelta(f.into()))
                .collect::<Vec<_>>(),
        )
    }

    /// Creates a `PresetResponse` whose request fails up front.
    #[inline]
    pub fn rejected() -> Self {
        Self {
            events: vec![],
            reject_request: true,
        }
    }
}
