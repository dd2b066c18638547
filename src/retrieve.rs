//! Reassembly of batch output files into ordered per-conversation results.
//!
//! The remote service may return records in any order, interleaved across
//! the output and error files. Order is restored solely from the numeric
//! suffix of each `custom_id`; the order records appear in the files carries
//! no meaning.

use crate::chat::{self, Turn};
use crate::domain::result::ResultRecord;
use crate::error::{Result, VolleyError};

/// Parse NDJSON file content into result records.
///
/// Blank lines are skipped; every other line yields exactly one record,
/// degrading through the fallback parser when it is not valid JSON.
pub fn parse_ndjson(content: &str) -> Vec<ResultRecord> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(ResultRecord::parse_line)
        .collect()
}

/// Restore submission order and pad gaps.
///
/// Records sort ascending by the integer suffix of their `custom_id`;
/// records without a parseable index sort after all indexed records, in
/// encounter order. When the remote reported a request total, indices
/// missing from the parsed records are padded with failure placeholders so
/// the returned list never silently shrinks below the submitted count.
///
/// # Errors
/// Returns `EmptyBatchOutput` when no records were parsed at all; an empty
/// result set means total batch failure, never an empty success.
pub fn reassemble(mut records: Vec<ResultRecord>, expected_total: i64) -> Result<Vec<ResultRecord>> {
    if records.is_empty() {
        return Err(VolleyError::EmptyBatchOutput);
    }

    if expected_total > 0 {
        let seen: std::collections::HashSet<usize> =
            records.iter().filter_map(ResultRecord::index).collect();
        for index in 1..=expected_total as usize {
            if !seen.contains(&index) {
                tracing::warn!(index, "Request missing from output and error files");
                records.push(ResultRecord::missing(index));
            }
        }
    }

    records.sort_by_key(|record| record.index().unwrap_or(usize::MAX));
    Ok(records)
}

/// Map one result record to an assistant turn.
///
/// Only a 200 response with a decodable body yields a turn; any other
/// status code, a placeholder record, or undecodable content maps to `None`
/// for that position. This is an expected per-item outcome, not an error.
pub fn result_to_turn(result: &ResultRecord, has_type: bool) -> Option<Turn> {
    match &result.response {
        Some(response) if response.status_code == 200 => response
            .body
            .as_ref()
            .and_then(|body| chat::assistant_turn_from_body(body, has_type)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::result::ResultResponse;
    use serde_json::json;

    fn record(custom_id: &str, status_code: u16) -> ResultRecord {
        ResultRecord {
            custom_id: custom_id.to_string(),
            response: Some(ResultResponse {
                status_code,
                body: Some(json!({
                    "choices": [{"message": {"role": "assistant", "content": custom_id}}]
                })),
            }),
        }
    }

    #[test]
    fn restores_submission_order() {
        let shuffled = vec![record("chat-3", 200), record("chat-1", 200), record("chat-2", 200)];
        let ordered = reassemble(shuffled, 3).unwrap();
        let ids: Vec<&str> = ordered.iter().map(|r| r.custom_id.as_str()).collect();
        assert_eq!(ids, ["chat-1", "chat-2", "chat-3"]);
    }

    #[test]
    fn unindexed_records_sort_last() {
        let records = vec![
            ResultRecord::from_malformed_line("garbage"),
            record("chat-2", 200),
            record("chat-1", 200),
        ];
        let ordered = reassemble(records, 0).unwrap();
        let ids: Vec<&str> = ordered.iter().map(|r| r.custom_id.as_str()).collect();
        assert_eq!(ids, ["chat-1", "chat-2", "unknown"]);
    }

    #[test]
    fn gaps_are_padded_to_expected_total() {
        let ordered = reassemble(vec![record("chat-3", 200)], 3).unwrap();
        assert_eq!(ordered.len(), 3);
        assert_eq!(ordered[0].custom_id, "chat-1");
        assert!(ordered[0].response.is_none());
        assert!(ordered[1].response.is_none());
        assert!(ordered[2].is_success());
    }

    #[test]
    fn no_padding_without_expected_total() {
        let ordered = reassemble(vec![record("chat-2", 200)], 0).unwrap();
        assert_eq!(ordered.len(), 1);
    }

    #[test]
    fn empty_input_is_a_hard_failure() {
        assert!(matches!(
            reassemble(Vec::new(), 5),
            Err(VolleyError::EmptyBatchOutput)
        ));
    }

    #[test]
    fn parse_ndjson_skips_blank_lines_and_degrades_bad_ones() {
        let content = "\n{\"custom_id\": \"chat-1\", \"response\": {\"status_code\": 200}}\n\nnot json\n";
        let records = parse_ndjson(content);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].custom_id, "chat-1");
        assert_eq!(records[1].custom_id, "unknown");
    }

    #[test]
    fn only_200_maps_to_a_turn() {
        assert!(result_to_turn(&record("chat-1", 200), false).is_some());
        assert!(result_to_turn(&record("chat-1", 400), false).is_none());
        assert!(result_to_turn(&record("chat-1", 500), false).is_none());
        assert!(result_to_turn(&ResultRecord::missing(1), false).is_none());
    }

    #[test]
    fn typed_mapping_follows_the_same_rule() {
        let typed_ok = ResultRecord {
            custom_id: "chat-1".to_string(),
            response: Some(ResultResponse {
                status_code: 200,
                body: Some(json!({
                    "choices": [{"message": {"role": "assistant", "content": "{\"n\": 1}"}}]
                })),
            }),
        };
        let turn = result_to_turn(&typed_ok, true).unwrap();
        assert_eq!(turn.json(), Some(&json!({"n": 1})));

        let typed_err = record("chat-1", 500);
        assert!(result_to_turn(&typed_err, true).is_none());
    }
}
