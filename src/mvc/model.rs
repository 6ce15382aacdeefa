//! Model - remote persistence and subscriber broadcast
//!
//! A Model names one remote resource and keeps the ordered list of widgets
//! subscribed to it. It builds the remote operation for a read or write and,
//! once the operation completes, decides who hears about the outcome:
//!
//! - reads notify only the origin;
//! - successful writes reach every subscriber, the origin through the
//!   negotiated path and everyone else forced;
//! - failures notify only the origin.

use serde_json::{Map, Value};
use tracing::{debug, trace};

use super::payload::Payload;
use crate::remote::{RemoteError, RemoteOp};

/// Index of a widget inside the hub
pub type WidgetId = usize;

/// What a widget receives when a model transaction completes
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryResult {
    Success {
        payload: Payload,
        force_view_update: bool,
    },
    Failure {
        error: String,
        message: String,
    },
}

/// One notification addressed to one widget
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub target: WidgetId,
    pub result: DeliveryResult,
}

#[derive(Debug, Clone)]
pub struct Model {
    name: String,
    endpoint: String,
    subscribers: Vec<WidgetId>,
}

impl Model {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            subscribers: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Default endpoint used when a request has no override
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn set_endpoint(&mut self, endpoint: impl Into<String>) {
        self.endpoint = endpoint.into();
    }

    /// Add a widget to the broadcast list. Duplicates are the caller's concern.
    pub fn subscribe(&mut self, widget: WidgetId) -> &mut Self {
        self.subscribers.push(widget);
        self
    }

    pub fn subscribers(&self) -> &[WidgetId] {
        &self.subscribers
    }

    /// Remote GET for one parameter, or for the whole document
    pub fn read(&self, param: Option<&str>, endpoint: Option<&str>) -> RemoteOp {
        RemoteOp::Get {
            endpoint: endpoint.unwrap_or(&self.endpoint).to_string(),
            param: param.map(str::to_string),
        }
    }

    /// Remote PUT of `{param: value}`
    pub fn write(&self, param: &str, value: Value, endpoint: Option<&str>) -> RemoteOp {
        let mut body = Map::new();
        body.insert(param.to_string(), value);
        RemoteOp::Put {
            endpoint: endpoint.unwrap_or(&self.endpoint).to_string(),
            body: Value::Object(body),
        }
    }

    /// Outcome of a read: delivered to the origin only
    pub fn complete_read(
        &self,
        origin: WidgetId,
        param: Option<&str>,
        force_view_update: bool,
        result: Result<Value, RemoteError>,
    ) -> Vec<Delivery> {
        let result = match result {
            Ok(data) => {
                let payload = match param {
                    Some(param) => {
                        let value = data.get(param).cloned().unwrap_or(Value::Null);
                        let mut scoped = Map::new();
                        scoped.insert(param.to_string(), value);
                        Payload::Scoped(scoped)
                    }
                    None => Payload::Raw(data),
                };
                trace!(model = %self.name, origin, "Read completed");
                DeliveryResult::Success {
                    payload,
                    force_view_update,
                }
            }
            Err(err) => failure(&err),
        };

        vec![Delivery {
            target: origin,
            result,
        }]
    }

    /// Outcome of a write: success is broadcast, failure goes to the origin
    pub fn complete_write(&self, origin: WidgetId, result: Result<Value, RemoteError>) -> Vec<Delivery> {
        match result {
            Ok(data) => {
                let payload = Payload::scoped_from(data);
                debug!(
                    model = %self.name,
                    origin,
                    subscribers = self.subscribers.len(),
                    "Write accepted, broadcasting"
                );
                self.subscribers
                    .iter()
                    .map(|&target| Delivery {
                        target,
                        result: DeliveryResult::Success {
                            payload: payload.clone(),
                            force_view_update: target != origin,
                        },
                    })
                    .collect()
            }
            Err(err) => vec![Delivery {
                target: origin,
                result: failure(&err),
            }],
        }
    }
}

fn failure(err: &RemoteError) -> DeliveryResult {
    let (error, message) = err.parts();
    DeliveryResult::Failure { error, message }
}
