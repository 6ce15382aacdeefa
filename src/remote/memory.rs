//! In-process remote service
//!
//! [`ResourceStore`] keeps one JSON document per endpoint and implements the
//! GET/PUT semantics shared by [`MemoryRemote`] and the development API
//! server. [`MemoryRemote`] adds fault injection for tests.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, trace};

use super::{RemoteError, RemoteService};

/// Shared endpoint -> document map
#[derive(Debug, Clone, Default)]
pub struct ResourceStore {
    documents: Arc<RwLock<HashMap<String, Map<String, Value>>>>,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document (builder style)
    pub fn with_document(self, endpoint: &str, document: Value) -> Self {
        if let Value::Object(map) = document {
            self.documents.write().insert(normalize(endpoint), map);
        }
        self
    }

    /// Read `{param: value}` (null if unset) or the whole document (empty if unknown)
    pub fn get(&self, endpoint: &str, param: Option<&str>) -> Value {
        let documents = self.documents.read();
        let document = documents.get(&normalize(endpoint));

        match param {
            Some(param) => {
                let value = document
                    .and_then(|doc| doc.get(param))
                    .cloned()
                    .unwrap_or(Value::Null);
                let mut scoped = Map::new();
                scoped.insert(param.to_string(), value);
                Value::Object(scoped)
            }
            None => Value::Object(document.cloned().unwrap_or_default()),
        }
    }

    /// Merge `body` into the document and return the resulting document
    pub fn put(&self, endpoint: &str, body: &Map<String, Value>) -> Value {
        let mut documents = self.documents.write();
        let document = documents.entry(normalize(endpoint)).or_default();
        for (key, value) in body {
            document.insert(key.clone(), value.clone());
        }
        trace!(endpoint, keys = body.len(), "Document updated");
        Value::Object(document.clone())
    }

    pub fn document(&self, endpoint: &str) -> Option<Map<String, Value>> {
        self.documents.read().get(&normalize(endpoint)).cloned()
    }
}

/// `/api/mixer/`, `api/mixer` and `/api/mixer` all address the same document
fn normalize(endpoint: &str) -> String {
    format!("/{}", endpoint.trim_matches('/'))
}

#[derive(Debug)]
enum Fault {
    Fail(RemoteError),
    Stall,
}

/// Remote service backed by a [`ResourceStore`]
pub struct MemoryRemote {
    store: ResourceStore,
    faults: Mutex<VecDeque<Fault>>,
}

impl MemoryRemote {
    pub fn new(store: ResourceStore) -> Self {
        Self {
            store,
            faults: Mutex::new(VecDeque::new()),
        }
    }

    pub fn store(&self) -> &ResourceStore {
        &self.store
    }

    /// Fail the next request with `err`
    pub fn fail_next(&self, err: RemoteError) {
        self.faults.lock().push_back(Fault::Fail(err));
    }

    /// Never answer the next request
    pub fn stall_next(&self) {
        self.faults.lock().push_back(Fault::Stall);
    }

    async fn before_request(&self) -> Result<(), RemoteError> {
        let fault = self.faults.lock().pop_front();
        match fault {
            Some(Fault::Fail(err)) => {
                debug!(error = %err, "Injected failure");
                Err(err)
            }
            Some(Fault::Stall) => {
                debug!("Injected stall");
                std::future::pending::<()>().await;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteService for MemoryRemote {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, endpoint: &str, param: Option<&str>) -> Result<Value, RemoteError> {
        self.before_request().await?;
        Ok(self.store.get(endpoint, param))
    }

    async fn put(&self, endpoint: &str, body: &Value) -> Result<Value, RemoteError> {
        self.before_request().await?;
        match body {
            Value::Object(map) => Ok(self.store.put(endpoint, map)),
            other => Err(RemoteError::Status {
                status: 400,
                reason: "Bad Request".to_string(),
                body: format!("expected a JSON object, got {}", other),
            }),
        }
    }
}
