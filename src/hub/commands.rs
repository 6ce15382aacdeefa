//! Commands, notifications and errors for the hub actor

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::mvc::PartialState;

/// Errors returned by [`HubHandle`](super::HubHandle) requests
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    #[error("unknown widget '{0}'")]
    UnknownWidget(String),

    #[error("unknown model '{0}'")]
    UnknownModel(String),

    #[error("duplicate widget '{0}'")]
    DuplicateWidget(String),

    #[error("widget '{0}' is not subscribed to any model")]
    NoModel(String),

    #[error("hub is not running")]
    Closed,
}

/// Reply channel for request-response commands
pub type Reply<T> = oneshot::Sender<Result<T, HubError>>;

/// Runtime-adjustable settings
#[derive(Debug, Clone, PartialEq)]
pub struct HubSettings {
    /// New default endpoint per model name
    pub endpoints: HashMap<String, String>,
    pub transaction_timeout: Duration,
}

/// Commands for the hub actor
///
/// Every command is processed on the hub's single task, interleaved with
/// remote completions, so widget state is never touched concurrently.
#[derive(Debug)]
pub enum HubCommand {
    /// A user edit entering through the widget's view
    UserInput {
        widget: String,
        edit: PartialState,
        response: Reply<bool>,
    },

    /// Programmatic, non-negotiated state override
    ForceSet {
        widget: String,
        state: PartialState,
        response: Reply<bool>,
    },

    /// Read from the widget's model; `param: None` reads the whole document
    Read {
        widget: String,
        param: Option<String>,
        force_view_update: bool,
        response: Reply<()>,
    },

    /// Reset the widget's transaction to idle
    ClearTransaction { widget: String, response: Reply<()> },

    /// Current state of one widget
    Snapshot {
        widget: String,
        response: Reply<WidgetSnapshot>,
    },

    /// Current state of every widget, in registration order
    ListWidgets { response: Reply<Vec<WidgetSnapshot>> },

    /// Apply new runtime settings
    UpdateSettings(HubSettings),

    /// Stop the event loop
    Shutdown,
}

/// Events published to the hosting application
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HubNotification {
    /// Model-confirmed state merged into a widget
    Confirmed {
        widget: String,
        state: Value,
        forced: bool,
    },
    /// A model transaction failed (diagnostic channel)
    ModelFailure {
        widget: String,
        error: String,
        message: String,
    },
    /// Raw payload delivered to a widget's raw data handler
    RawData { widget: String, data: Value },
    /// A user edit was dropped because a transaction was pending
    EditDropped { widget: String },
}

/// Serializable view of one widget
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidgetSnapshot {
    pub name: String,
    pub models: Vec<String>,
    pub state: Value,
    pub shadow: Value,
    pub transaction: &'static str,
    pub clear_to_send: bool,
    pub model_failure: bool,
}
