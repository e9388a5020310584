//! Transcript-related types.

use std::ops::Index;
use std::slice;

use safechat_model::ModelMessage;
use serde::{Deserialize, Serialize};

/// Who wrote a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person chatting.
    User,
    /// The model.
    Assistant,
}

/// A message in the transcript.
///
/// Messages carry no identifier of their own: a message is addressed by its
/// position in the transcript.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    /// The author of this message.
    pub role: Role,
    /// The text of this message.
    pub content: String,
}

impl Message {
    /// Creates a user message.
    #[inline]
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    #[inline]
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    #[inline]
    pub(crate) fn to_model_message(&self) -> ModelMessage {
        match self.role {
            Role::User => ModelMessage::User(self.content.clone()),
            Role::Assistant => ModelMessage::Assistant(self.content.clone()),
        }
    }
}

/// The ordered messages of a conversation, oldest first.
///
/// Values handed out by the conversation are snapshots; mutating the
/// conversation never changes a snapshot already taken.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    /// Returns all messages.
    #[inline]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the number of messages.
    #[inline]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether there are no messages.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Returns the message at `position`.
    #[inline]
    pub fn get(&self, position: usize) -> Option<&Message> {
        self.messages.get(position)
    }

    /// Returns the newest message.
    #[inline]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Iterates over the messages, oldest first.
    #[inline]
    pub fn iter(&self) -> slice::Iter<'_, Message> {
        self.messages.iter()
    }

    #[inline]
    pub(crate) fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    #[inline]
    pub(crate) fn remove(&mut self, position: usize) -> Option<Message> {
        (position < self.messages.len())
            .then(|| self.messages.remove(position))
    }

    /// Replaces the content of the trailing message.
    #[inline]
    pub(crate) fn replace_last_content(&mut self, content: String) {
        if let Some(last) = self.messages.last_mut() {
            last.content = content;
        }
    }
}

impl From<Vec<Message>> for Transcript {
    #[inline]
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

impl Index<usize> for Transcript {
    type Output = Message;

    #[inline]
    fn index(&self, position: usize) -> &Message {
        &self.messages[position]
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Message;
    type IntoIter = slice::Iter<'a, Message>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_remove_keeps_order() {
        let mut transcript = Transcript::from(vec![
            Message::user("a"),
            Message::assistant("b"),
            Message::user("c"),
        ]);
        assert_eq!(transcript.remove(1), Some(Message::assistant("b")));
        assert_eq!(
            transcript.messages(),
            [Message::user("a"), Message::user("c")]
        );
        assert_eq!(transcript.remove(2), None);
        assert_eq!(transcript.len(), 2);
    }

    #[test]
    fn test_serialize() {
        let transcript = Transcript::from(vec![
            Message::user("Hello"),
            Message::assistant("Hi!"),
        ]);
        assert_eq!(
            serde_json::to_value(&transcript).unwrap(),
            json!([
                { "role": "user", "content": "Hello" },
                { "role": "assistant", "content": "Hi!" },
            ])
        );
    }
}
