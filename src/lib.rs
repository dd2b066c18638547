//! Batch chat orchestration for OpenAI-compatible APIs.
//!
//! This crate runs many conversations through a vendor's asynchronous batch
//! endpoint: conversations are encoded as newline-delimited request records,
//! uploaded, submitted as a batch job, polled until terminal, and finally
//! reassembled into ordered per-conversation results. It also normalizes
//! response schemas into the strict form the vendor's structured-output
//! validator requires.
//!
//! The subsystem is synchronous per call: each operation is one awaited
//! round trip, and waiting for completion is the caller's loop.

pub mod chat;
pub mod domain;
pub mod encode;
pub mod error;
pub mod http;
pub mod provider;
pub mod retrieve;
pub mod schema;

// Re-export commonly used types
pub use chat::{Conversation, Role, Turn, TurnContent};
pub use domain::{
    BatchJob, BatchJobId, BatchStatus, BatchStatusSummary, FileId, FileObject, Purpose,
    RequestCounts, ResultRecord, ResultResponse,
};
pub use encode::{BatchRequestRecord, CHAT_COMPLETIONS_PATH};
pub use error::{Result, VolleyError};
pub use http::{HttpClient, HttpResponse, MockHttpClient, ReqwestHttpClient};
pub use provider::{
    BATCHES_PATH, BatchCapableProvider, BatchClient, COMPLETION_WINDOW, ProviderConfig,
};
pub use schema::SchemaNode;
