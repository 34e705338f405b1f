//! Envelopes carried between pipeline stages.
//!
//! An [`Envelope`] is created by the stage that produces it and consumed by
//! value by the next stage, which always answers with a fresh envelope.
//! Its fields are private so nothing downstream can rewrite a hand-off.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CoreError, CoreResult};

/// A message passed from one stage to the next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    sender: String,
    receiver: String,
    content: Value,
}

impl Envelope {
    /// Create a new envelope. Sender and receiver must be non-empty.
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        content: impl Into<Value>,
    ) -> CoreResult<Self> {
        let sender = sender.into();
        let receiver = receiver.into();

        if sender.trim().is_empty() {
            return Err(CoreError::InvalidEnvelope("sender must not be empty".to_string()));
        }
        if receiver.trim().is_empty() {
            return Err(CoreError::InvalidEnvelope("receiver must not be empty".to_string()));
        }

        Ok(Self {
            sender,
            receiver,
            content: content.into(),
        })
    }

    /// Create an envelope whose content is a mapping built from `fields`.
    pub fn from_fields<'a>(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        fields: impl IntoIterator<Item = (&'a str, Value)>,
    ) -> CoreResult<Self> {
        let content: Map<String, Value> = fields
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect();
        Self::new(sender, receiver, Value::Object(content))
    }

    /// Identity of the stage that produced this envelope.
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Advisory identity of the intended next stage.
    pub fn receiver(&self) -> &str {
        &self.receiver
    }

    pub fn content(&self) -> &Value {
        &self.content
    }

    /// Consume the envelope, returning its content.
    pub fn into_content(self) -> Value {
        self.content
    }

    /// Content as a plain string, for envelopes that carry raw text.
    pub fn text(&self) -> Option<&str> {
        self.content.as_str()
    }

    /// Look up a string value under `key`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.content.get(key).and_then(Value::as_str)
    }

    /// Look up a list of strings under `key`.
    ///
    /// Returns `None` if the key is absent or any element is not a string.
    pub fn get_string_list(&self, key: &str) -> Option<Vec<String>> {
        self.content
            .get(key)
            .and_then(Value::as_array)
            .and_then(|items| {
                items
                    .iter()
                    .map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
    }
}
