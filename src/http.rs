//! HTTP client abstraction for talking to the vendor API.
//!
//! This module defines the `HttpClient` trait to abstract request execution,
//! file upload, and file download, enabling testability with mock
//! implementations. Retry policy is deliberately absent: batch jobs are
//! long-lived, and a naive retry around upload could duplicate input files,
//! so retrying is left to the caller.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use crate::domain::file::{FileId, Purpose};
use crate::error::{Result, VolleyError};

/// Path of the vendor files endpoint.
pub const FILES_PATH: &str = "/v1/files";

/// Path serving the raw content of a stored file.
pub fn file_content_path(file_id: &FileId) -> String {
    format!("{}/{}/content", FILES_PATH, file_id)
}

/// A JSON request against the vendor API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    /// Base URL of the vendor endpoint (e.g. <https://api.example.com>)
    pub endpoint: String,
    /// HTTP method (e.g. "POST", "GET")
    pub method: String,
    /// Path portion of the URL (e.g. "/v1/batches")
    pub path: String,
    /// Request body as a JSON string; empty means no body
    pub body: String,
}

/// A multipart upload of a local file to the vendor files endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub endpoint: String,
    /// Local staging file holding the bytes to send
    pub source: PathBuf,
    /// Filename reported to the vendor
    pub filename: String,
    pub purpose: Purpose,
}

/// A streamed download of a stored file's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDownload {
    pub endpoint: String,
    pub file_id: FileId,
}

/// Response from an HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as a string
    pub body: String,
}

impl HttpResponse {
    /// Convert a non-2xx response into a transport error.
    pub fn into_success(self, path: &str) -> Result<HttpResponse> {
        if (200..300).contains(&self.status) {
            Ok(self)
        } else {
            Err(VolleyError::Transport {
                path: path.to_string(),
                status: self.status,
                body: self.body,
            })
        }
    }
}

/// Trait for executing requests against the vendor API.
///
/// This abstraction allows for different implementations (production vs.
/// testing) and makes the batch lifecycle testable without real HTTP calls.
#[async_trait]
pub trait HttpClient: Send + Sync + Clone {
    /// Execute a JSON request.
    ///
    /// # Errors
    /// Returns an error on network failure, timeout, or an invalid method.
    /// Non-2xx responses are returned as `HttpResponse`, not errors; use
    /// [`HttpResponse::into_success`] where a 2xx is required.
    async fn execute(
        &self,
        request: &ApiRequest,
        api_key: &str,
        timeout_ms: u64,
    ) -> Result<HttpResponse>;

    /// Upload a local file via multipart form.
    async fn upload(
        &self,
        upload: &FileUpload,
        api_key: &str,
        timeout_ms: u64,
    ) -> Result<HttpResponse>;

    /// Stream a stored file's content to `dest`.
    ///
    /// The body is written chunk by chunk; output files can be large enough
    /// that buffering them whole in memory is undesirable.
    async fn download(
        &self,
        download: &FileDownload,
        dest: &Path,
        api_key: &str,
        timeout_ms: u64,
    ) -> Result<()>;
}

// ============================================================================
// Production Implementation using reqwest
// ============================================================================

/// Production HTTP client using reqwest.
#[derive(Clone, Default)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn bearer(api_key: &str) -> String {
        format!("Bearer {}", api_key)
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    #[tracing::instrument(skip(self, request, api_key), fields(method = %request.method, path = %request.path))]
    async fn execute(
        &self,
        request: &ApiRequest,
        api_key: &str,
        timeout_ms: u64,
    ) -> Result<HttpResponse> {
        let url = format!("{}{}", request.endpoint, request.path);

        tracing::debug!(url = %url, timeout_ms = timeout_ms, "Executing HTTP request");

        let method = request.method.parse().map_err(|e| {
            tracing::error!(method = %request.method, error = %e, "Invalid HTTP method");
            anyhow::anyhow!("Invalid HTTP method '{}': {}", request.method, e)
        })?;

        let mut req = self
            .client
            .request(method, &url)
            .timeout(Duration::from_millis(timeout_ms));

        if !api_key.is_empty() {
            req = req.header("Authorization", Self::bearer(api_key));
        }

        if !request.body.is_empty() {
            req = req
                .header("Content-Type", "application/json")
                .body(request.body.clone());
        }

        let response = req.send().await.map_err(|e| {
            tracing::error!(url = %url, error = %e, "HTTP request failed");
            e
        })?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        tracing::debug!(status = status, response_len = body.len(), "HTTP request completed");

        Ok(HttpResponse { status, body })
    }

    #[tracing::instrument(skip(self, upload, api_key), fields(filename = %upload.filename, purpose = %upload.purpose))]
    async fn upload(
        &self,
        upload: &FileUpload,
        api_key: &str,
        timeout_ms: u64,
    ) -> Result<HttpResponse> {
        let url = format!("{}{}", upload.endpoint, FILES_PATH);

        let file = tokio::fs::File::open(&upload.source).await?;
        let stream = tokio_util::io::ReaderStream::new(file);
        let part = reqwest::multipart::Part::stream(reqwest::Body::wrap_stream(stream))
            .file_name(upload.filename.clone())
            .mime_str("application/jsonl")?;
        let form = reqwest::multipart::Form::new()
            .text("purpose", upload.purpose.to_string())
            .part("file", part);

        tracing::debug!(url = %url, "Uploading file");

        let mut req = self
            .client
            .post(&url)
            .timeout(Duration::from_millis(timeout_ms))
            .multipart(form);

        if !api_key.is_empty() {
            req = req.header("Authorization", Self::bearer(api_key));
        }

        let response = req.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        tracing::debug!(status = status, "Upload completed");

        Ok(HttpResponse { status, body })
    }

    #[tracing::instrument(skip(self, download, dest, api_key), fields(file_id = %download.file_id))]
    async fn download(
        &self,
        download: &FileDownload,
        dest: &Path,
        api_key: &str,
        timeout_ms: u64,
    ) -> Result<()> {
        let path = file_content_path(&download.file_id);
        let url = format!("{}{}", download.endpoint, path);

        tracing::debug!(url = %url, dest = %dest.display(), "Downloading file");

        let mut req = self
            .client
            .get(&url)
            .timeout(Duration::from_millis(timeout_ms));

        if !api_key.is_empty() {
            req = req.header("Authorization", Self::bearer(api_key));
        }

        let response = req.send().await?;
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(VolleyError::Transport { path, status, body });
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;

        tracing::debug!("Download completed");

        Ok(())
    }
}

// ============================================================================
// Test/Mock Implementation
// ============================================================================

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Mock HTTP client for testing.
///
/// Allows configuring predetermined responses for specific requests without
/// making actual HTTP calls. Responses are keyed as "{method} {path}" and
/// returned in FIFO order; download content is keyed by file id and written
/// to the requested destination.
///
/// # Example
/// ```ignore
/// let mock = MockHttpClient::new();
/// mock.add_response(
///     "POST /v1/batches",
///     Ok(HttpResponse {
///         status: 200,
///         body: r#"{"id": "batch_1", "status": "validating"}"#.to_string(),
///     }),
/// );
/// ```
#[derive(Clone, Default)]
pub struct MockHttpClient {
    responses: Arc<Mutex<HashMap<String, Vec<Result<HttpResponse>>>>>,
    downloads: Arc<Mutex<HashMap<String, String>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

/// Record of a call made to the mock HTTP client.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub method: String,
    pub path: String,
    /// JSON body for API requests; staged file content for uploads
    pub body: String,
    pub api_key: String,
    /// Upload purpose, for upload calls only
    pub purpose: Option<String>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predetermined response for a specific method and path.
    ///
    /// Multiple responses can be added for the same key; they are returned
    /// in FIFO order.
    pub fn add_response(&self, key: &str, response: Result<HttpResponse>) {
        self.responses
            .lock()
            .entry(key.to_string())
            .or_default()
            .push(response);
    }

    /// Set the content served when `file_id` is downloaded.
    pub fn add_download(&self, file_id: &str, content: &str) {
        self.downloads
            .lock()
            .insert(file_id.to_string(), content.to_string());
    }

    /// Get all calls that have been made to this mock client.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn pop_response(&self, key: &str) -> Result<HttpResponse> {
        let mut responses = self.responses.lock();
        match responses.get_mut(key) {
            Some(queue) if !queue.is_empty() => queue.remove(0),
            _ => Err(VolleyError::Other(anyhow::anyhow!(
                "No mock response configured for {}",
                key
            ))),
        }
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn execute(
        &self,
        request: &ApiRequest,
        api_key: &str,
        _timeout_ms: u64,
    ) -> Result<HttpResponse> {
        self.calls.lock().push(MockCall {
            method: request.method.clone(),
            path: request.path.clone(),
            body: request.body.clone(),
            api_key: api_key.to_string(),
            purpose: None,
        });

        self.pop_response(&format!("{} {}", request.method, request.path))
    }

    async fn upload(
        &self,
        upload: &FileUpload,
        api_key: &str,
        _timeout_ms: u64,
    ) -> Result<HttpResponse> {
        // Record the staged content so tests can assert on the encoded lines
        let staged = tokio::fs::read_to_string(&upload.source).await?;
        self.calls.lock().push(MockCall {
            method: "POST".to_string(),
            path: FILES_PATH.to_string(),
            body: staged,
            api_key: api_key.to_string(),
            purpose: Some(upload.purpose.to_string()),
        });

        self.pop_response(&format!("POST {}", FILES_PATH))
    }

    async fn download(
        &self,
        download: &FileDownload,
        dest: &Path,
        api_key: &str,
        _timeout_ms: u64,
    ) -> Result<()> {
        let path = file_content_path(&download.file_id);
        self.calls.lock().push(MockCall {
            method: "GET".to_string(),
            path: path.clone(),
            body: String::new(),
            api_key: api_key.to_string(),
            purpose: None,
        });

        let content = self.downloads.lock().get(&download.file_id.0).cloned();
        match content {
            Some(content) => {
                tokio::fs::write(dest, content).await?;
                Ok(())
            }
            None => Err(VolleyError::Transport {
                path,
                status: 404,
                body: "mock: no download configured".to_string(),
            }),
        }
    }
}
