//! Minimal chat abstraction consumed by the batch subsystem.
//!
//! The batch layer treats conversations as pass-through data: it only needs
//! to turn one into an OpenAI-compatible chat-completions body, and to turn a
//! successful response body back into an assistant turn. Both directions live
//! here so synchronous and batch calls share the same construction.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::Result;
use crate::schema::SchemaNode;

/// Speaker of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// What a turn carries: plain text, or a JSON value decoded from a
/// structured-output response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TurnContent {
    Text(String),
    Json(Value),
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: TurnContent,
}

impl Turn {
    pub fn system(text: impl Into<String>) -> Self {
        Turn {
            role: Role::System,
            content: TurnContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Turn {
            role: Role::User,
            content: TurnContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Turn {
            role: Role::Assistant,
            content: TurnContent::Text(text.into()),
        }
    }

    /// The text of this turn, if it is plain text.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            TurnContent::Text(text) => Some(text),
            TurnContent::Json(_) => None,
        }
    }

    /// The decoded JSON of this turn, if it came from structured output.
    pub fn json(&self) -> Option<&Value> {
        match &self.content {
            TurnContent::Json(value) => Some(value),
            TurnContent::Text(_) => None,
        }
    }

    fn wire_content(&self) -> Value {
        match &self.content {
            TurnContent::Text(text) => Value::String(text.clone()),
            // Structured content is sent back as its serialized form
            TurnContent::Json(value) => Value::String(value.to_string()),
        }
    }
}

/// An ordered sequence of turns submitted as one chat request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub turns: Vec<Turn>,
}

impl Conversation {
    pub fn new(turns: Vec<Turn>) -> Self {
        Conversation { turns }
    }

    /// Convenience constructor for a single-user-message conversation.
    pub fn from_user(text: impl Into<String>) -> Self {
        Conversation {
            turns: vec![Turn::user(text)],
        }
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }
}

/// Build the chat-completions request body shared by synchronous and batch
/// calls. The batch encoder strips the fields the batch endpoint rejects.
pub fn completion_body(conversation: &Conversation, model: &str) -> Value {
    let messages: Vec<Value> = conversation
        .turns
        .iter()
        .map(|turn| {
            json!({
                "role": turn.role,
                "content": turn.wire_content(),
            })
        })
        .collect();

    json!({
        "model": model,
        "messages": messages,
        "stream": false,
    })
}

/// Build the `response_format` block requesting strict structured output for
/// an already-normalized schema.
pub fn response_format_for(schema: SchemaNode) -> Result<Value> {
    Ok(json!({
        "type": "json_schema",
        "json_schema": {
            "name": "structured_output",
            "strict": true,
            "schema": schema.into_value()?,
        },
    }))
}

/// Convert a successful chat-completions response body into an assistant
/// turn.
///
/// With `has_type` set, the message content is itself JSON-decoded into the
/// turn; content that fails to decode yields `None` for that item rather
/// than an error, matching the per-item failure policy.
pub fn assistant_turn_from_body(body: &Value, has_type: bool) -> Option<Turn> {
    let content = body
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()?;

    if has_type {
        let value: Value = serde_json::from_str(content).ok()?;
        Some(Turn {
            role: Role::Assistant,
            content: TurnContent::Json(value),
        })
    } else {
        Some(Turn::assistant(content))
    }
}
