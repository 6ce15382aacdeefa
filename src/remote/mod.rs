//! Remote service - the key/value endpoint models persist to
//!
//! The contract is a plain GET/PUT pair:
//!
//! - `GET <endpoint>[?param=true]` returns `{param: value}` or the whole document
//! - `PUT <endpoint>` with body `{param: value}` returns the accepted state
//!
//! [`HttpRemote`] talks to a real service; [`MemoryRemote`] serves an
//! in-process [`ResourceStore`] for tests and offline runs.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub mod http;
pub mod memory;

pub use http::HttpRemote;
pub use memory::{MemoryRemote, ResourceStore};

/// Errors surfaced by a remote service
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemoteError {
    /// Service answered with a non-success status; body is kept verbatim
    #[error("remote returned {status} {reason}: {body}")]
    Status { status: u16, reason: String, body: String },

    /// Request never produced a response
    #[error("transport error: {0}")]
    Transport(String),

    /// Response body was not valid JSON
    #[error("invalid response body: {0}")]
    Decode(String),

    /// No response within the request timeout
    #[error("no response within {0} ms")]
    Timeout(u64),
}

impl RemoteError {
    /// `(error, message)` pair handed to `Controller::on_model_fail`
    pub fn parts(&self) -> (String, String) {
        match self {
            RemoteError::Status { reason, body, .. } => (reason.clone(), body.clone()),
            RemoteError::Transport(msg) => ("transport".to_string(), msg.clone()),
            RemoteError::Decode(msg) => ("parsererror".to_string(), msg.clone()),
            RemoteError::Timeout(ms) => ("timeout".to_string(), format!("no response within {} ms", ms)),
        }
    }
}

/// A single remote operation built by a Model
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOp {
    Get { endpoint: String, param: Option<String> },
    Put { endpoint: String, body: Value },
}

impl RemoteOp {
    /// Execute this operation against a service
    pub async fn run(self, remote: &dyn RemoteService) -> Result<Value, RemoteError> {
        match self {
            RemoteOp::Get { endpoint, param } => remote.get(&endpoint, param.as_deref()).await,
            RemoteOp::Put { endpoint, body } => remote.put(&endpoint, &body).await,
        }
    }
}

/// Remote key/value persistence endpoint
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Service name for logs (e.g., "http", "memory")
    fn name(&self) -> &str;

    /// GET a document, scoped to one parameter if `param` is set
    async fn get(&self, endpoint: &str, param: Option<&str>) -> Result<Value, RemoteError>;

    /// PUT a JSON body and return the service's view of the accepted state
    async fn put(&self, endpoint: &str, body: &Value) -> Result<Value, RemoteError>;
}
