//! Conversion of conversations into newline-delimited batch request records.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chat::{self, Conversation};
use crate::domain::result::CUSTOM_ID_PREFIX;
use crate::error::{Result, VolleyError};
use crate::schema::SchemaNode;

/// Path of the chat-completions endpoint every batch request targets.
pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Body fields the batch endpoint rejects, stripped before serialization.
const UNSUPPORTED_BODY_FIELDS: &[&str] = &["stream", "stream_options", "store"];

/// One line of a batch input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequestRecord {
    pub custom_id: String,
    pub method: String,
    pub url: String,
    pub body: Value,
}

/// Build one request record per conversation, in input order.
///
/// `custom_id` values are `"chat-1"` .. `"chat-N"`, assigned by position.
/// This ordering is the only mechanism establishing the index-to-result
/// correspondence at retrieval time.
///
/// # Errors
/// Returns `Configuration` if the schema explicitly requests permissive
/// additional-properties behavior, which the vendor API cannot honor. The
/// check runs before anything is serialized, so the failure is always
/// pre-network.
pub fn encode_requests(
    conversations: &[Conversation],
    model: &str,
    schema: Option<&SchemaNode>,
) -> Result<Vec<BatchRequestRecord>> {
    let response_format = match schema {
        Some(schema) if schema.requests_permissive() => {
            return Err(VolleyError::Configuration(
                "additionalProperties: true is not supported by the batch API".to_string(),
            ));
        }
        Some(schema) => Some(chat::response_format_for(schema.clone().into_strict())?),
        None => None,
    };

    conversations
        .iter()
        .enumerate()
        .map(|(i, conversation)| {
            let mut body = chat::completion_body(conversation, model);
            if let Value::Object(map) = &mut body {
                for field in UNSUPPORTED_BODY_FIELDS {
                    map.remove(*field);
                }
                if let Some(format) = &response_format {
                    map.insert("response_format".to_string(), format.clone());
                }
            }
            Ok(BatchRequestRecord {
                custom_id: format!("{}{}", CUSTOM_ID_PREFIX, i + 1),
                method: "POST".to_string(),
                url: CHAT_COMPLETIONS_PATH.to_string(),
                body,
            })
        })
        .collect()
}

/// Serialize records as NDJSON, one record per line, preserving order.
pub fn to_ndjson(records: &[BatchRequestRecord]) -> Result<String> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    Ok(out)
}
