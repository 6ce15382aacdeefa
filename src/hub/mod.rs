//! Hub - single-threaded event loop owning every widget and model
//!
//! All widget and model state lives inside the hub and is only touched from
//! its run loop. Remote operations are spawned as separate tasks; their
//! completions come back over a channel and are processed one at a time, the
//! same way commands from [`HubHandle`] are.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                           Hub                            │
//! │   widgets: Vec<Slot>         models: HashMap<_, Model>   │
//! │        ▲                               │                 │
//! │        │ commands / completions        │ RemoteOp        │
//! │  ┌─────┴──────────┐            ┌───────▼────────┐        │
//! │  │ cmd_rx / done  │ ◀───────── │ spawned remote │        │
//! │  └────────────────┘            │     tasks      │        │
//! │                                └────────────────┘        │
//! └──────────────────────────────────────────────────────────┘
//! ```

mod bootstrap;
mod commands;
mod handle;

#[cfg(test)]
mod tests;

pub use commands::{HubCommand, HubError, HubNotification, HubSettings, WidgetSnapshot};
pub use handle::HubHandle;

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, trace, warn};

use crate::mvc::{
    Applied, Delivery, DeliveryResult, Effects, Model, ModelRequest, PartialState, Widget, WidgetId,
};
use crate::remote::{RemoteError, RemoteService};

/// Capacity of the notification broadcast channel
const NOTIFICATION_CAPACITY: usize = 256;

/// Upper bound for the pending-transaction sweep interval
const MAX_SWEEP_INTERVAL: Duration = Duration::from_millis(250);

/// A widget plus the models it is subscribed to
struct Slot {
    widget: Widget,
    models: Vec<String>,
}

/// What a spawned remote operation was for
#[derive(Debug)]
enum RequestKind {
    Read {
        param: Option<String>,
        force_view_update: bool,
    },
    Write,
}

/// A finished remote operation
#[derive(Debug)]
struct Completion {
    origin: WidgetId,
    model: String,
    kind: RequestKind,
    result: Result<Value, RemoteError>,
}

pub struct Hub {
    slots: Vec<Slot>,
    index: HashMap<String, WidgetId>,
    models: HashMap<String, Model>,
    remote: Arc<dyn RemoteService>,
    transaction_timeout: Duration,
    /// Requests queued before the loop starts (initial reads)
    startup: Vec<(WidgetId, ModelRequest)>,
    done_tx: mpsc::UnboundedSender<Completion>,
    done_rx: mpsc::UnboundedReceiver<Completion>,
    notify_tx: broadcast::Sender<HubNotification>,
    in_flight: usize,
}

impl Hub {
    pub fn new(remote: Arc<dyn RemoteService>, transaction_timeout: Duration) -> Self {
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let (notify_tx, _) = broadcast::channel(NOTIFICATION_CAPACITY);

        Self {
            slots: Vec::new(),
            index: HashMap::new(),
            models: HashMap::new(),
            remote,
            transaction_timeout,
            startup: Vec::new(),
            done_tx,
            done_rx,
            notify_tx,
            in_flight: 0,
        }
    }

    /// Receive notifications, including those caused by startup requests
    pub fn subscribe(&self) -> broadcast::Receiver<HubNotification> {
        self.notify_tx.subscribe()
    }

    /// Register a model. A model with the same name is replaced.
    pub fn add_model(&mut self, name: impl Into<String>, endpoint: impl Into<String>) -> &mut Self {
        let name = name.into();
        self.models.insert(name.clone(), Model::new(name, endpoint));
        self
    }

    /// Register a widget and subscribe it to `models`, in that order
    pub fn add_widget(&mut self, widget: Widget, models: &[&str]) -> Result<WidgetId, HubError> {
        let name = widget.name().to_string();
        if self.index.contains_key(&name) {
            return Err(HubError::DuplicateWidget(name));
        }
        if let Some(missing) = models.iter().find(|m| !self.models.contains_key(**m)) {
            return Err(HubError::UnknownModel(missing.to_string()));
        }

        let id = self.slots.len();
        for model in models {
            if let Some(model) = self.models.get_mut(*model) {
                model.subscribe(id);
            }
        }

        debug!(widget = %name, id, models = ?models, "Widget registered");
        self.index.insert(name, id);
        self.slots.push(Slot {
            widget,
            models: models.iter().map(|m| m.to_string()).collect(),
        });
        Ok(id)
    }

    /// Queue a request to run as soon as the loop starts
    pub fn queue_startup(&mut self, origin: WidgetId, request: ModelRequest) {
        self.startup.push((origin, request));
    }

    pub fn widget(&self, id: WidgetId) -> Option<&Widget> {
        self.slots.get(id).map(|slot| &slot.widget)
    }

    /// Spawn the run loop and return its handle.
    ///
    /// The loop stops on [`HubHandle::shutdown`] or once every handle is dropped.
    pub fn spawn(self) -> HubHandle {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let handle = HubHandle::new(cmd_tx, self.notify_tx.clone());
        tokio::spawn(self.run(cmd_rx));
        handle
    }

    /// Main run loop: commands, completions and the pending-transaction sweep
    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<HubCommand>) {
        info!(
            widgets = self.slots.len(),
            models = self.models.len(),
            remote = self.remote.name(),
            "Hub started"
        );

        for (origin, request) in std::mem::take(&mut self.startup) {
            self.dispatch(origin, request);
        }

        let mut sweep = tokio::time::interval(self.sweep_interval());
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(HubCommand::Shutdown) | None => break,
                        Some(HubCommand::UpdateSettings(settings)) => {
                            self.apply_settings(settings);
                            sweep = tokio::time::interval(self.sweep_interval());
                            sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                        }
                        Some(cmd) => self.handle_command(cmd),
                    }
                }
                Some(done) = self.done_rx.recv() => {
                    self.handle_completion(done);
                }
                _ = sweep.tick() => {
                    self.expire_stale_transactions();
                }
            }
        }

        info!(in_flight = self.in_flight, "Hub stopped");
    }

    fn sweep_interval(&self) -> Duration {
        (self.transaction_timeout / 4).clamp(Duration::from_millis(5), MAX_SWEEP_INTERVAL)
    }

    fn handle_command(&mut self, cmd: HubCommand) {
        trace!(?cmd, "Processing command");

        match cmd {
            HubCommand::UserInput {
                widget,
                edit,
                response,
            } => {
                let result = self.user_input(&widget, &edit);
                let _ = response.send(result);
            }
            HubCommand::ForceSet {
                widget,
                state,
                response,
            } => {
                let result = self.lookup(&widget).map(|id| {
                    let changed = self.slots[id].widget.force_set(&state);
                    if changed {
                        self.publish_state(id, true);
                    }
                    changed
                });
                let _ = response.send(result);
            }
            HubCommand::Read {
                widget,
                param,
                force_view_update,
                response,
            } => {
                let result = self.read(&widget, param, force_view_update);
                let _ = response.send(result);
            }
            HubCommand::ClearTransaction { widget, response } => {
                let result = self.lookup(&widget).map(|id| {
                    self.slots[id].widget.controller_mut().clear_transaction();
                });
                let _ = response.send(result);
            }
            HubCommand::Snapshot { widget, response } => {
                let result = self.lookup(&widget).map(|id| self.snapshot(id));
                let _ = response.send(result);
            }
            HubCommand::ListWidgets { response } => {
                let all = (0..self.slots.len()).map(|id| self.snapshot(id)).collect();
                let _ = response.send(Ok(all));
            }
            HubCommand::UpdateSettings(settings) => self.apply_settings(settings),
            HubCommand::Shutdown => {}
        }
    }

    fn lookup(&self, widget: &str) -> Result<WidgetId, HubError> {
        self.index
            .get(widget)
            .copied()
            .ok_or_else(|| HubError::UnknownWidget(widget.to_string()))
    }

    fn user_input(&mut self, widget: &str, edit: &PartialState) -> Result<bool, HubError> {
        let id = self.lookup(widget)?;
        let mut fx = Effects::new();
        let accepted = self.slots[id].widget.user_input(edit, &mut fx);
        if !accepted {
            self.notify(HubNotification::EditDropped {
                widget: widget.to_string(),
            });
        }
        self.dispatch_all(id, fx);
        Ok(accepted)
    }

    fn read(&mut self, widget: &str, param: Option<String>, force_view_update: bool) -> Result<(), HubError> {
        let id = self.lookup(widget)?;
        let model = self.slots[id]
            .models
            .first()
            .cloned()
            .ok_or_else(|| HubError::NoModel(widget.to_string()))?;
        self.dispatch(
            id,
            ModelRequest::Read {
                model,
                param,
                force_view_update,
                endpoint: None,
            },
        );
        Ok(())
    }

    fn dispatch_all(&mut self, origin: WidgetId, fx: Effects) {
        for request in fx.into_requests() {
            self.dispatch(origin, request);
        }
    }

    /// Turn a model request into a spawned remote operation
    fn dispatch(&mut self, origin: WidgetId, request: ModelRequest) {
        let Some(model) = self.models.get(request.model()) else {
            let name = request.model().to_string();
            warn!(model = %name, origin, "Request for unknown model");
            self.deliver(
                origin,
                DeliveryResult::Failure {
                    error: "unknown model".to_string(),
                    message: name,
                },
            );
            return;
        };

        let model_name = model.name().to_string();
        let (op, kind) = match request {
            ModelRequest::Read {
                param,
                force_view_update,
                endpoint,
                ..
            } => (
                model.read(param.as_deref(), endpoint.as_deref()),
                RequestKind::Read {
                    param,
                    force_view_update,
                },
            ),
            ModelRequest::Write {
                param,
                value,
                endpoint,
                ..
            } => (model.write(&param, value, endpoint.as_deref()), RequestKind::Write),
        };

        debug!(model = %model_name, origin, ?op, "Dispatching remote operation");
        self.in_flight += 1;

        let remote = self.remote.clone();
        let done_tx = self.done_tx.clone();
        tokio::spawn(async move {
            let result = op.run(remote.as_ref()).await;
            let _ = done_tx.send(Completion {
                origin,
                model: model_name,
                kind,
                result,
            });
        });
    }

    fn handle_completion(&mut self, done: Completion) {
        self.in_flight = self.in_flight.saturating_sub(1);

        let Some(model) = self.models.get(&done.model) else {
            warn!(model = %done.model, "Completion for a model that no longer exists");
            return;
        };

        let deliveries: Vec<Delivery> = match done.kind {
            RequestKind::Read {
                param,
                force_view_update,
            } => model.complete_read(done.origin, param.as_deref(), force_view_update, done.result),
            RequestKind::Write => model.complete_write(done.origin, done.result),
        };

        for delivery in deliveries {
            self.deliver(delivery.target, delivery.result);
        }
    }

    /// Apply one delivery, publish what happened and run any resend it caused
    fn deliver(&mut self, target: WidgetId, result: DeliveryResult) {
        let Some(slot) = self.slots.get_mut(target) else {
            warn!(target, "Delivery for unknown widget");
            return;
        };

        let mut fx = Effects::new();
        let applied = slot.widget.deliver(result, &mut fx);
        let name = slot.widget.name().to_string();

        match applied {
            Applied::Negotiated(_) => self.publish_state(target, false),
            Applied::Forced => self.publish_state(target, true),
            Applied::RawData(data) => self.notify(HubNotification::RawData { widget: name, data }),
            Applied::Failed { error, message } => self.notify(HubNotification::ModelFailure {
                widget: name,
                error,
                message,
            }),
        }

        self.dispatch_all(target, fx);
    }

    fn expire_stale_transactions(&mut self) {
        let now = Instant::now();
        let timeout = self.transaction_timeout;
        let mut expired = Vec::new();

        for slot in &mut self.slots {
            if slot.widget.controller_mut().expire_pending(now, timeout) {
                expired.push(slot.widget.name().to_string());
            }
        }

        for widget in expired {
            warn!(widget = %widget, timeout_ms = timeout.as_millis() as u64, "Transaction expired");
            self.notify(HubNotification::ModelFailure {
                widget,
                error: "timeout".to_string(),
                message: format!("no response within {} ms", timeout.as_millis()),
            });
        }
    }

    fn apply_settings(&mut self, settings: HubSettings) {
        for (name, endpoint) in settings.endpoints {
            match self.models.get_mut(&name) {
                Some(model) if model.endpoint() != endpoint => {
                    info!(model = %name, endpoint = %endpoint, "Model endpoint updated");
                    model.set_endpoint(endpoint);
                }
                Some(_) => {}
                None => warn!(model = %name, "Ignoring endpoint for a model this hub was not built with"),
            }
        }

        if self.transaction_timeout != settings.transaction_timeout {
            info!(
                timeout_ms = settings.transaction_timeout.as_millis() as u64,
                "Transaction timeout updated"
            );
            self.transaction_timeout = settings.transaction_timeout;
        }
    }

    fn publish_state(&self, id: WidgetId, forced: bool) {
        let widget = &self.slots[id].widget;
        self.notify(HubNotification::Confirmed {
            widget: widget.name().to_string(),
            state: serde_json::to_value(widget.controller().state()).unwrap_or(Value::Null),
            forced,
        });
    }

    fn notify(&self, notification: HubNotification) {
        // No receivers is fine: nobody is listening
        let _ = self.notify_tx.send(notification);
    }

    fn snapshot(&self, id: WidgetId) -> WidgetSnapshot {
        let slot = &self.slots[id];
        let controller = slot.widget.controller();
        WidgetSnapshot {
            name: slot.widget.name().to_string(),
            models: slot.models.clone(),
            state: serde_json::to_value(controller.state()).unwrap_or(Value::Null),
            shadow: serde_json::to_value(slot.widget.view().shadow()).unwrap_or(Value::Null),
            transaction: controller.transaction().label(),
            clear_to_send: controller.clear_to_send(),
            model_failure: controller.model_failure(),
        }
    }
}
