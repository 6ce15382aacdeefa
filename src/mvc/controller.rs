//! Controller - canonical widget state
//!
//! The Controller is the single source of truth for a widget's parameters.
//! It arbitrates between View-originated edits (`change`) and Model-confirmed
//! state (`on_model_success` / `on_model_fail`), and owns the transaction
//! state that gates further edits.
//!
//! Methods that would re-render the View return a [`ViewUpdate`] instead; the
//! owning [`Widget`](super::widget::Widget) applies it.

use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::effects::Effects;
use super::payload::Payload;
use super::schema::{PartialState, StateSchema, StateSnapshot};
use super::transaction::Transaction;

/// Per-parameter change handler: receives the new value and requests model operations
pub type ChangeHandler = Box<dyn FnMut(&Value, &mut Effects) + Send>;

/// Handler for raw (unscoped) payloads: receives the data and the force flag
pub type RawDataHandler = Box<dyn FnMut(&Value, bool) + Send>;

/// Render instruction produced by the controller for its view
#[derive(Debug, Clone, PartialEq)]
pub enum ViewUpdate {
    /// Nothing to render
    Unchanged,
    /// Subject to echo-suppression comparison against the view's shadow state
    Negotiated(PartialState),
    /// Must be rendered unconditionally
    Forced(PartialState),
    /// Payload was raw and went to the raw data handler
    RawData(Value),
}

pub struct Controller {
    name: String,
    state: StateSnapshot,
    tx: Transaction,
    handlers: HashMap<String, ChangeHandler>,
    raw_handler: Option<RawDataHandler>,
}

impl Controller {
    /// Create a controller with every schema key set to null and the transaction idle
    pub fn new(name: impl Into<String>, schema: &StateSchema) -> Self {
        Self {
            name: name.into(),
            state: StateSnapshot::new(schema),
            tx: Transaction::Idle,
            handlers: HashMap::new(),
            raw_handler: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &StateSchema {
        self.state.schema()
    }

    /// Register the change handler for a parameter, replacing any previous one
    pub fn on_change<F>(&mut self, param: impl Into<String>, handler: F) -> &mut Self
    where
        F: FnMut(&Value, &mut Effects) + Send + 'static,
    {
        let param = param.into();
        if !self.schema().contains(&param) {
            warn!(
                widget = %self.name,
                param = %param,
                "Change handler registered for a parameter outside the schema"
            );
        }
        self.handlers.insert(param, Box::new(handler));
        self
    }

    /// Register a change handler that writes the parameter to a model
    pub fn bind_to_model(
        &mut self,
        param: impl Into<String>,
        model: impl Into<String>,
        endpoint: Option<String>,
    ) -> &mut Self {
        let param = param.into();
        let model = model.into();
        let key = param.clone();
        self.on_change(key, move |value, fx| {
            fx.write_to(model.clone(), param.clone(), value.clone(), endpoint.clone());
        })
    }

    /// Install the handler for raw payloads
    pub fn on_raw_data<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(&Value, bool) + Send + 'static,
    {
        self.raw_handler = Some(Box::new(handler));
        self
    }

    pub fn state(&self) -> &StateSnapshot {
        &self.state
    }

    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }

    pub fn clear_to_send(&self) -> bool {
        self.tx.clear_to_send()
    }

    pub fn model_failure(&self) -> bool {
        self.tx.model_failure()
    }

    /// Reset to idle so view edits are processed again
    pub fn clear_transaction(&mut self) {
        self.tx = Transaction::Idle;
    }

    /// Overwrite changed schema keys without negotiation.
    ///
    /// When anything changed, the view is told to render the caller's partial
    /// state, not the merged snapshot.
    pub fn force_set(&mut self, partial: &PartialState) -> ViewUpdate {
        if self.state.merge_changed(partial) {
            debug!(widget = %self.name, "Forced state set");
            ViewUpdate::Forced(partial.clone())
        } else {
            ViewUpdate::Unchanged
        }
    }

    /// Process an edit that originated in the view.
    ///
    /// Marks the transaction pending, then calls the change handler of every
    /// schema key whose value differs from the canonical snapshot, in schema
    /// order. If the handlers requested no model operation, nothing will ever
    /// answer, so the transaction goes back to idle.
    pub fn change(&mut self, partial: &PartialState, fx: &mut Effects) {
        self.tx = Transaction::pending_now();
        let issued_before = fx.len();

        for (param, value) in self.state.changed_params(partial) {
            match self.handlers.get_mut(&param) {
                Some(handler) => {
                    debug!(widget = %self.name, param = %param, value = %value, "Dispatching change");
                    handler(&value, fx);
                }
                None => {
                    warn!(
                        widget = %self.name,
                        param = %param,
                        "No change handler registered for parameter"
                    );
                }
            }
        }

        if fx.len() == issued_before {
            self.tx = Transaction::Idle;
        }
    }

    /// Handle a successful model transaction.
    ///
    /// Scoped payloads overwrite every schema key they carry. The origin of a
    /// write renders through the negotiated path; other subscribers are forced.
    pub fn on_model_success(&mut self, payload: Payload, force_view_update: bool) -> ViewUpdate {
        self.tx = Transaction::Idle;

        let data = match payload {
            Payload::Raw(data) => {
                self.handle_raw_data(&data, force_view_update);
                return ViewUpdate::RawData(data);
            }
            Payload::Scoped(data) => data,
        };

        self.state.merge(&data);

        if force_view_update {
            ViewUpdate::Forced(self.state.to_partial())
        } else {
            ViewUpdate::Negotiated(self.state.to_partial())
        }
    }

    /// Handle a failed model transaction.
    ///
    /// The canonical snapshot is left untouched; the failure reopens the edit gate.
    pub fn on_model_fail(&mut self, error: impl Into<String>, message: impl Into<String>) {
        let error = error.into();
        let message = message.into();
        warn!(widget = %self.name, error = %error, message = %message, "Model transaction failed");
        self.tx = Transaction::Failed { error, message };
    }

    /// Fail a transaction that has been pending for at least `timeout`.
    ///
    /// Returns true if the transaction was expired.
    pub fn expire_pending(&mut self, now: Instant, timeout: Duration) -> bool {
        match self.tx.pending_for(now) {
            Some(elapsed) if elapsed >= timeout => {
                self.on_model_fail(
                    "timeout",
                    format!("no response within {} ms", timeout.as_millis()),
                );
                true
            }
            _ => false,
        }
    }

    fn handle_raw_data(&mut self, data: &Value, force_view_update: bool) {
        match self.raw_handler.as_mut() {
            Some(handler) => handler(data, force_view_update),
            None => info!(widget = %self.name, "No raw data handler installed, ignoring raw payload"),
        }
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut handlers: Vec<&String> = self.handlers.keys().collect();
        handlers.sort();
        f.debug_struct("Controller")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("tx", &self.tx)
            .field("handlers", &handlers)
            .field("raw_handler", &self.raw_handler.is_some())
            .finish()
    }
}
