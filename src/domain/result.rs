//! Per-request result records parsed from batch output and error files.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Prefix used when generating `custom_id` values for submitted requests.
///
/// The 1-based position of each conversation is appended, so `"chat-3"` is
/// the third conversation in the submitted list. This is the only mechanism
/// tying result records back to submission order.
pub const CUSTOM_ID_PREFIX: &str = "chat-";

/// Echoed per-request response inside a result record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultResponse {
    pub status_code: u16,
    #[serde(default)]
    pub body: Option<serde_json::Value>,
}

/// One line of a batch output or error file.
///
/// `response` is `None` for placeholder records synthesized for requests
/// that never appeared in either file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub custom_id: String,
    #[serde(default)]
    pub response: Option<ResultResponse>,
}

impl ResultRecord {
    /// Parse one output line, degrading malformed JSON to a synthetic
    /// failure record instead of aborting the batch.
    pub fn parse_line(line: &str) -> Self {
        match serde_json::from_str(line) {
            Ok(record) => record,
            Err(error) => {
                tracing::warn!(%error, line_len = line.len(), "Degrading malformed result line");
                metrics::counter!("volley_result_lines_degraded_total").increment(1);
                Self::from_malformed_line(line)
            }
        }
    }

    /// Best-effort recovery for a line that is not valid JSON.
    ///
    /// Scrapes out a `custom_id` if one is visible in the raw text so the
    /// failure lands on the right slot, else tags the record `"unknown"`.
    pub fn from_malformed_line(line: &str) -> Self {
        static CUSTOM_ID_RE: OnceLock<Regex> = OnceLock::new();
        let re = CUSTOM_ID_RE
            .get_or_init(|| Regex::new(r#""custom_id"\s*:\s*"([^"]*)""#).expect("hard-coded pattern"));
        let custom_id = re
            .captures(line)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        ResultRecord {
            custom_id,
            response: Some(ResultResponse {
                status_code: 500,
                body: None,
            }),
        }
    }

    /// Placeholder for a submitted request that appeared in neither the
    /// output nor the error file.
    pub fn missing(index: usize) -> Self {
        ResultRecord {
            custom_id: format!("{}{}", CUSTOM_ID_PREFIX, index),
            response: None,
        }
    }

    /// Numeric position encoded in the custom_id, if it follows the
    /// `"chat-N"` convention.
    pub fn index(&self) -> Option<usize> {
        self.custom_id.strip_prefix(CUSTOM_ID_PREFIX)?.parse().ok()
    }

    /// True when the vendor reports this request succeeded.
    pub fn is_success(&self) -> bool {
        matches!(&self.response, Some(response) if response.status_code == 200)
    }
}
