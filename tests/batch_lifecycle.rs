use serde_json::{Value, json};
use volley::{
    BatchCapableProvider, BatchClient, BatchStatus, HttpResponse, MockHttpClient, ProviderConfig,
    SchemaNode, VolleyError,
};

fn client(mock: &MockHttpClient) -> BatchClient<MockHttpClient> {
    BatchClient::with_client(
        ProviderConfig::new("https://api.example.com", "test-key", "test-model"),
        mock.clone(),
    )
}

fn conversations(n: usize) -> Vec<volley::Conversation> {
    (1..=n)
        .map(|i| volley::Conversation::from_user(format!("prompt {i}")))
        .collect()
}

fn upload_response(file_id: &str) -> HttpResponse {
    HttpResponse {
        status: 200,
        body: json!({"id": file_id, "purpose": "batch", "filename": "batch_requests.jsonl"})
            .to_string(),
    }
}

fn job_response(id: &str, status: &str, extra: Value) -> HttpResponse {
    let mut body = json!({"id": id, "status": status});
    if let (Some(map), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
        map.extend(extra.clone());
    }
    HttpResponse {
        status: 200,
        body: body.to_string(),
    }
}

fn output_line(custom_id: &str, status_code: u16, content: &str) -> String {
    json!({
        "custom_id": custom_id,
        "response": {
            "status_code": status_code,
            "body": {"choices": [{"message": {"role": "assistant", "content": content}}]}
        }
    })
    .to_string()
}

#[test_log::test(tokio::test)]
async fn submit_uploads_ndjson_and_creates_job() {
    let mock = MockHttpClient::new();
    mock.add_response("POST /v1/files", Ok(upload_response("file-in")));
    mock.add_response(
        "POST /v1/batches",
        Ok(job_response(
            "batch_1",
            "validating",
            json!({"input_file_id": "file-in"}),
        )),
    );

    let job = client(&mock).submit(&conversations(3), None).await.unwrap();
    assert_eq!(*job.id, *"batch_1");
    assert_eq!(job.status, BatchStatus::Validating);

    let calls = mock.get_calls();
    assert_eq!(calls.len(), 2);

    // Upload carries the NDJSON lines, one per conversation, in order
    assert_eq!(calls[0].path, "/v1/files");
    assert_eq!(calls[0].purpose.as_deref(), Some("batch"));
    let lines: Vec<Value> = calls[0]
        .body
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    for (i, line) in lines.iter().enumerate() {
        assert_eq!(line["custom_id"], format!("chat-{}", i + 1));
        assert_eq!(line["method"], "POST");
        assert_eq!(line["url"], "/v1/chat/completions");
        assert!(line["body"].get("stream").is_none());
    }

    // Job creation references the uploaded file and the fixed window
    assert_eq!(calls[1].path, "/v1/batches");
    let create: Value = serde_json::from_str(&calls[1].body).unwrap();
    assert_eq!(create["input_file_id"], "file-in");
    assert_eq!(create["endpoint"], "/v1/chat/completions");
    assert_eq!(create["completion_window"], "24h");
}

#[test_log::test(tokio::test)]
async fn submit_with_schema_requests_strict_structured_output() {
    let mock = MockHttpClient::new();
    mock.add_response("POST /v1/files", Ok(upload_response("file-in")));
    mock.add_response(
        "POST /v1/batches",
        Ok(job_response("batch_1", "validating", json!({}))),
    );

    let schema = SchemaNode::from_value(json!({
        "type": "object",
        "properties": {"answer": {"type": "string"}}
    }));
    client(&mock)
        .submit(&conversations(1), Some(&schema))
        .await
        .unwrap();

    let line: Value = serde_json::from_str(mock.get_calls()[0].body.lines().next().unwrap()).unwrap();
    let format = &line["body"]["response_format"];
    assert_eq!(format["type"], "json_schema");
    assert_eq!(format["json_schema"]["strict"], true);
    assert_eq!(format["json_schema"]["schema"]["additionalProperties"], false);
}

#[test_log::test(tokio::test)]
async fn permissive_schema_fails_before_any_network_call() {
    let mock = MockHttpClient::new();
    let schema = SchemaNode::from_value(json!({
        "type": "object",
        "additionalProperties": true
    }));

    let err = client(&mock)
        .submit(&conversations(1), Some(&schema))
        .await
        .unwrap_err();
    assert!(matches!(err, VolleyError::Configuration(_)));
    assert_eq!(mock.call_count(), 0);
}

#[test_log::test(tokio::test)]
async fn failed_upload_surfaces_as_transport_error() {
    let mock = MockHttpClient::new();
    mock.add_response(
        "POST /v1/files",
        Ok(HttpResponse {
            status: 500,
            body: "upstream broke".to_string(),
        }),
    );

    let err = client(&mock).submit(&conversations(1), None).await.unwrap_err();
    match err {
        VolleyError::Transport { status, .. } => assert_eq!(status, 500),
        other => panic!("expected Transport error, got {other:?}"),
    }
    // Job creation was never attempted
    assert_eq!(mock.call_count(), 1);
}

#[test_log::test(tokio::test)]
async fn poll_returns_fresh_snapshot_with_progress() {
    let mock = MockHttpClient::new();
    mock.add_response(
        "GET /v1/batches/batch_1",
        Ok(job_response(
            "batch_1",
            "in_progress",
            json!({"request_counts": {"total": 10, "completed": 7, "failed": 1}}),
        )),
    );

    let client = client(&mock);
    let submitted: volley::BatchJob =
        serde_json::from_value(json!({"id": "batch_1", "status": "validating"})).unwrap();

    let polled = client.poll(&submitted).await.unwrap();
    assert_eq!(polled.status, BatchStatus::InProgress);

    let summary = client.status(&polled);
    assert!(summary.working);
    assert_eq!(summary.n_processing, 2);
    assert_eq!(summary.n_succeeded, 7);
    assert_eq!(summary.n_failed, 1);

    // The submitted snapshot is untouched
    assert_eq!(submitted.status, BatchStatus::Validating);
}

#[test_log::test(tokio::test)]
async fn retrieve_reassembles_shuffled_output_and_error_files() {
    let mock = MockHttpClient::new();
    // Output and error records arrive shuffled and interleaved across files;
    // chat-4 appears in neither and one output line is corrupt.
    mock.add_download(
        "file-out",
        &format!(
            "{}\n{}\n{}\n",
            output_line("chat-3", 200, "third"),
            output_line("chat-1", 200, "first"),
            r#"{"custom_id": "chat-5", "#,
        ),
    );
    mock.add_download("file-err", &format!("{}\n", output_line("chat-2", 429, "")));

    let job: volley::BatchJob = serde_json::from_value(json!({
        "id": "batch_1",
        "status": "completed",
        "output_file_id": "file-out",
        "error_file_id": "file-err",
        "request_counts": {"total": 5, "completed": 2, "failed": 3}
    }))
    .unwrap();

    let client = client(&mock);
    let results = client.retrieve(&job).await.unwrap();

    let ids: Vec<&str> = results.iter().map(|r| r.custom_id.as_str()).collect();
    assert_eq!(ids, ["chat-1", "chat-2", "chat-3", "chat-4", "chat-5"]);

    // chat-1 and chat-3 succeeded
    assert!(client.result_to_turn(&results[0], false).is_some());
    assert_eq!(
        client.result_to_turn(&results[2], false).unwrap().text(),
        Some("third")
    );
    // chat-2 was rate limited, chat-4 never came back, chat-5 was corrupt
    assert!(client.result_to_turn(&results[1], false).is_none());
    assert!(results[3].response.is_none());
    assert_eq!(results[4].response.as_ref().unwrap().status_code, 500);
}

#[test_log::test(tokio::test)]
async fn retrieve_with_empty_files_is_a_hard_failure() {
    let mock = MockHttpClient::new();
    mock.add_download("file-out", "\n\n");

    let job: volley::BatchJob = serde_json::from_value(json!({
        "id": "batch_1",
        "status": "completed",
        "output_file_id": "file-out"
    }))
    .unwrap();

    let err = client(&mock).retrieve(&job).await.unwrap_err();
    assert!(matches!(err, VolleyError::EmptyBatchOutput));
}

#[test_log::test(tokio::test)]
async fn retrieve_without_any_files_is_a_hard_failure() {
    let mock = MockHttpClient::new();
    let job: volley::BatchJob =
        serde_json::from_value(json!({"id": "batch_1", "status": "failed"})).unwrap();

    let err = client(&mock).retrieve(&job).await.unwrap_err();
    assert!(matches!(err, VolleyError::EmptyBatchOutput));
    assert_eq!(mock.call_count(), 0);
}

#[test_log::test(tokio::test)]
async fn typed_results_decode_structured_content() {
    let mock = MockHttpClient::new();
    mock.add_download(
        "file-out",
        &format!(
            "{}\n{}\n",
            output_line("chat-1", 200, r#"{"answer": 42}"#),
            output_line("chat-2", 200, "not json"),
        ),
    );

    let job: volley::BatchJob = serde_json::from_value(json!({
        "id": "batch_1",
        "status": "completed",
        "output_file_id": "file-out",
        "request_counts": {"total": 2, "completed": 2, "failed": 0}
    }))
    .unwrap();

    let client = client(&mock);
    let results = client.retrieve(&job).await.unwrap();

    let turn = client.result_to_turn(&results[0], true).unwrap();
    assert_eq!(turn.json(), Some(&json!({"answer": 42})));
    // A 200 whose content is not decodable degrades to None for that item
    assert!(client.result_to_turn(&results[1], true).is_none());
}

#[test_log::test(tokio::test)]
async fn full_lifecycle_submit_poll_retrieve() {
    let mock = MockHttpClient::new();
    mock.add_response("POST /v1/files", Ok(upload_response("file-in")));
    mock.add_response(
        "POST /v1/batches",
        Ok(job_response("batch_1", "validating", json!({}))),
    );
    mock.add_response(
        "GET /v1/batches/batch_1",
        Ok(job_response(
            "batch_1",
            "in_progress",
            json!({"request_counts": {"total": 2, "completed": 1, "failed": 0}}),
        )),
    );
    mock.add_response(
        "GET /v1/batches/batch_1",
        Ok(job_response(
            "batch_1",
            "completed",
            json!({
                "output_file_id": "file-out",
                "request_counts": {"total": 2, "completed": 2, "failed": 0}
            }),
        )),
    );
    mock.add_download(
        "file-out",
        &format!(
            "{}\n{}\n",
            output_line("chat-2", 200, "second"),
            output_line("chat-1", 200, "first"),
        ),
    );

    let client = client(&mock);
    let mut job = client.submit(&conversations(2), None).await.unwrap();

    // Caller-driven poll loop: keep polling until the job stops working
    while client.status(&job).working {
        job = client.poll(&job).await.unwrap();
    }
    assert_eq!(job.status, BatchStatus::Completed);

    let results = client.retrieve(&job).await.unwrap();
    let turns: Vec<Option<String>> = results
        .iter()
        .map(|result| {
            client
                .result_to_turn(result, false)
                .and_then(|turn| turn.text().map(str::to_string))
        })
        .collect();
    assert_eq!(
        turns,
        [Some("first".to_string()), Some("second".to_string())]
    );
}
