//! Vendor batch provider: submit, poll, status, retrieve.
//!
//! `BatchClient` drives the whole lifecycle against one vendor endpoint.
//! Every operation is a single awaited round trip; polling cadence, and the
//! decision of what to do with a partially-failed batch, belong to the
//! caller. Jobs are independent handles, so any number of batches can be in
//! flight concurrently from one client.

use async_trait::async_trait;
use metrics::counter;
use serde_json::{Value, json};
use tempfile::NamedTempFile;

use crate::chat::{Conversation, Turn};
use crate::domain::batch::{BatchJob, BatchStatusSummary};
use crate::domain::file::{FileId, FileObject, Purpose};
use crate::domain::result::ResultRecord;
use crate::encode::{self, CHAT_COMPLETIONS_PATH};
use crate::error::{Result, VolleyError};
use crate::http::{ApiRequest, FileDownload, FileUpload, HttpClient, ReqwestHttpClient};
use crate::retrieve;
use crate::schema::SchemaNode;

/// Path of the vendor batches endpoint.
pub const BATCHES_PATH: &str = "/v1/batches";

/// Completion window sent on job creation. The vendor API accepts no other
/// value at present.
pub const COMPLETION_WINDOW: &str = "24h";

/// Filename reported for uploaded batch input files.
const INPUT_FILENAME: &str = "batch_requests.jsonl";

/// Connection settings for an OpenAI-compatible vendor endpoint.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL of the vendor endpoint (e.g. <https://api.example.com>)
    pub base_url: String,
    /// API key sent as an Authorization: Bearer header
    pub api_key: String,
    /// Model identifier placed in every request body
    pub model: String,
    /// Per-round-trip timeout in milliseconds
    pub timeout_ms: u64,
}

impl ProviderConfig {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        ProviderConfig {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout_ms: 30_000,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// Capability interface for providers that can run conversations through a
/// vendor batch endpoint.
///
/// `status` and `result_to_turn` are pure; the async operations are each one
/// blocking round trip. The trait exposes no cancel operation: a caller
/// abandoning a job simply stops polling, and the remote job runs on
/// independently.
#[async_trait]
pub trait BatchCapableProvider: Send + Sync {
    /// Encode, upload, and create a batch job for the given conversations.
    async fn submit(
        &self,
        conversations: &[Conversation],
        schema: Option<&SchemaNode>,
    ) -> Result<BatchJob>;

    /// Re-fetch the job by id, returning a fresh snapshot. The prior
    /// snapshot is never mutated; callers work with the returned value.
    async fn poll(&self, job: &BatchJob) -> Result<BatchJob>;

    /// Compute the derived progress view for a snapshot.
    fn status(&self, job: &BatchJob) -> BatchStatusSummary;

    /// Download and reassemble the results of a finished job, in
    /// submission order.
    async fn retrieve(&self, job: &BatchJob) -> Result<Vec<ResultRecord>>;

    /// Map one retrieved result to an assistant turn, or `None` for a
    /// failed item.
    fn result_to_turn(
        &self,
        result: &ResultRecord,
        has_type: bool,
    ) -> Option<Turn>;
}

/// Batch client for OpenAI-compatible vendors, generic over transport.
#[derive(Clone)]
pub struct BatchClient<H: HttpClient = ReqwestHttpClient> {
    config: ProviderConfig,
    http: H,
}

impl BatchClient<ReqwestHttpClient> {
    pub fn new(config: ProviderConfig) -> Self {
        Self::with_client(config, ReqwestHttpClient::new())
    }
}

impl<H: HttpClient> BatchClient<H> {
    /// Create a client with a specific transport (used by tests to inject
    /// a mock).
    pub fn with_client(config: ProviderConfig, http: H) -> Self {
        BatchClient { config, http }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn execute_json(&self, method: &str, path: &str, body: Option<Value>) -> Result<Value> {
        let body = match body {
            Some(value) => serde_json::to_string(&value)?,
            None => String::new(),
        };
        let request = ApiRequest {
            endpoint: self.config.base_url.clone(),
            method: method.to_string(),
            path: path.to_string(),
            body,
        };
        let response = self
            .http
            .execute(&request, &self.config.api_key, self.config.timeout_ms)
            .await?
            .into_success(path)?;
        Ok(serde_json::from_str(&response.body)?)
    }

    /// Download a stored file through a staging temp file and return its
    /// content. The staging file is removed on drop, on every exit path.
    async fn download_content(&self, file_id: &FileId) -> Result<String> {
        let staging = NamedTempFile::new()?;
        let download = FileDownload {
            endpoint: self.config.base_url.clone(),
            file_id: file_id.clone(),
        };
        self.http
            .download(
                &download,
                staging.path(),
                &self.config.api_key,
                self.config.timeout_ms,
            )
            .await?;
        Ok(tokio::fs::read_to_string(staging.path()).await?)
    }
}

#[async_trait]
impl<H: HttpClient> BatchCapableProvider for BatchClient<H> {
    #[tracing::instrument(skip_all, fields(conversations = conversations.len()))]
    async fn submit(
        &self,
        conversations: &[Conversation],
        schema: Option<&SchemaNode>,
    ) -> Result<BatchJob> {
        let records = encode::encode_requests(conversations, &self.config.model, schema)?;
        let ndjson = encode::to_ndjson(&records)?;

        let staging = NamedTempFile::new()?;
        tokio::fs::write(staging.path(), &ndjson).await?;

        let upload = FileUpload {
            endpoint: self.config.base_url.clone(),
            source: staging.path().to_path_buf(),
            filename: INPUT_FILENAME.to_string(),
            purpose: Purpose::Batch,
        };
        let response = self
            .http
            .upload(&upload, &self.config.api_key, self.config.timeout_ms)
            .await?
            .into_success(crate::http::FILES_PATH)?;
        let input_file: FileObject = serde_json::from_str(&response.body)?;

        let body = json!({
            "input_file_id": input_file.id,
            "endpoint": CHAT_COMPLETIONS_PATH,
            "completion_window": COMPLETION_WINDOW,
        });
        let job: BatchJob =
            serde_json::from_value(self.execute_json("POST", BATCHES_PATH, Some(body)).await?)?;

        counter!("volley_batches_submitted_total").increment(1);
        tracing::info!(
            job_id = %job.id,
            input_file_id = %input_file.id,
            requests = records.len(),
            "Submitted batch job"
        );

        Ok(job)
    }

    #[tracing::instrument(skip(self, job), fields(job_id = %job.id))]
    async fn poll(&self, job: &BatchJob) -> Result<BatchJob> {
        let path = format!("{}/{}", BATCHES_PATH, job.id);
        let snapshot: BatchJob = serde_json::from_value(self.execute_json("GET", &path, None).await?)?;

        counter!("volley_batch_polls_total").increment(1);
        tracing::debug!(status = %snapshot.status, "Polled batch job");

        Ok(snapshot)
    }

    fn status(&self, job: &BatchJob) -> BatchStatusSummary {
        job.summary()
    }

    #[tracing::instrument(skip(self, job), fields(job_id = %job.id))]
    async fn retrieve(&self, job: &BatchJob) -> Result<Vec<ResultRecord>> {
        let mut records = Vec::new();
        let mut any_file = false;

        for file_id in [&job.output_file_id, &job.error_file_id]
            .into_iter()
            .flatten()
        {
            any_file = true;
            let content = self.download_content(file_id).await?;
            records.extend(retrieve::parse_ndjson(&content));
        }

        if !any_file {
            tracing::warn!("Batch job has neither output nor error file");
            return Err(VolleyError::EmptyBatchOutput);
        }

        let results = retrieve::reassemble(records, job.request_counts.total)?;

        counter!("volley_batches_retrieved_total").increment(1);
        tracing::info!(results = results.len(), "Retrieved batch results");

        Ok(results)
    }

    fn result_to_turn(
        &self,
        result: &ResultRecord,
        has_type: bool,
    ) -> Option<Turn> {
        retrieve::result_to_turn(result, has_type)
    }
}
