use safechat_model::{ModelMessage, ModelRequest};
use serde::{Deserialize, Serialize};

use crate::OpenAIConfig;

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
pub struct Delta {
    pub content: Option<String>,
}

/// The body of a non-2xx answer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System { content: String },
    User { content: String },
    Assistant { content: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    // Azure picks the model from the deployment in the URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_request(
    req: &ModelRequest,
    config: &OpenAIConfig,
) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: config.model().map(ToOwned::to_owned),
        messages: req.messages.iter().map(create_message).collect(),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        stream: true,
    }
}

#[inline]
fn create_message(msg: &ModelMessage) -> Message {
    let content = msg.content().to_owned();
    match msg {
        ModelMessage::System(_) => Message::System { content },
        ModelMessage::User(_) => Message::User { content },
        ModelMessage::Assistant(_) => Message::Assistant { content },
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::OpenAIConfigBuilder;

    #[test]
    fn test_create_request() {
        let request = ModelRequest::with_messages([
            ModelMessage::System("You are a helpful assistant.".to_owned()),
            ModelMessage::User("Hello".to_owned()),
            ModelMessage::Assistant("Hi!".to_owned()),
        ]);
        let config = OpenAIConfigBuilder::with_api_key("xxx")
            .with_model("custom")
            .with_max_tokens(100)
            .build();
        let body = serde_json::to_value(create_request(&request, &config))
            .unwrap();
        assert_eq!(
            body,
            json!({
                "model": "custom",
                "messages": [
                    { "role": "system", "content": "You are a helpful assistant." },
                    { "role": "user", "content": "Hello" },
                    { "role": "assistant", "content": "Hi!" },
                ],
                "temperature": 0.6f32,
                "max_tokens": 100,
                "stream": true,
            })
        );
    }

    #[test]
    fn test_azure_request_has_no_model() {
        let request = ModelRequest::with_messages([ModelMessage::User(
            "Hello".to_owned(),
        )]);
        let config =
            OpenAIConfigBuilder::azure("contoso", "xxx", "chat").build();
        let body = serde_json::to_value(create_request(&request, &config))
            .unwrap();
        assert!(body.get("model").is_none());
    }

    #[test]
    fn test_parse_prompt_filter_chunk() {
        let chunk: ChatCompletionChunk = serde_json::from_str(
            r#"{"id":"","choices":[],"prompt_filter_results":[]}"#,
        )
        .unwrap();
        assert!(chunk.choices.is_empty());
    }
}
