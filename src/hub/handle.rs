//! HubHandle - Public API for the hub actor
//!
//! Wraps message passing to the hub with ergonomic async methods. Every
//! request gets its answer over a oneshot channel; settings updates and
//! shutdown are fire-and-forget.

use tokio::sync::{broadcast, mpsc, oneshot};

use super::commands::{HubCommand, HubError, HubNotification, HubSettings, Reply, WidgetSnapshot};
use crate::mvc::PartialState;

#[derive(Clone)]
pub struct HubHandle {
    cmd_tx: mpsc::UnboundedSender<HubCommand>,
    notify_tx: broadcast::Sender<HubNotification>,
}

impl HubHandle {
    pub(crate) fn new(
        cmd_tx: mpsc::UnboundedSender<HubCommand>,
        notify_tx: broadcast::Sender<HubNotification>,
    ) -> Self {
        Self { cmd_tx, notify_tx }
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> HubCommand) -> Result<T, HubError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.cmd_tx
            .send(make(response_tx))
            .map_err(|_| HubError::Closed)?;
        response_rx.await.map_err(|_| HubError::Closed)?
    }

    /// Submit a user edit. Returns false if the edit was dropped by the gate.
    pub async fn user_input(&self, widget: &str, edit: PartialState) -> Result<bool, HubError> {
        let widget = widget.to_string();
        self.request(|response| HubCommand::UserInput {
            widget,
            edit,
            response,
        })
        .await
    }

    /// Override widget state without negotiation. Returns whether anything changed.
    pub async fn force_set(&self, widget: &str, state: PartialState) -> Result<bool, HubError> {
        let widget = widget.to_string();
        self.request(|response| HubCommand::ForceSet {
            widget,
            state,
            response,
        })
        .await
    }

    /// Issue a read for the widget. The result arrives later as a notification.
    pub async fn read(
        &self,
        widget: &str,
        param: Option<String>,
        force_view_update: bool,
    ) -> Result<(), HubError> {
        let widget = widget.to_string();
        self.request(|response| HubCommand::Read {
            widget,
            param,
            force_view_update,
            response,
        })
        .await
    }

    pub async fn clear_transaction(&self, widget: &str) -> Result<(), HubError> {
        let widget = widget.to_string();
        self.request(|response| HubCommand::ClearTransaction { widget, response })
            .await
    }

    pub async fn snapshot(&self, widget: &str) -> Result<WidgetSnapshot, HubError> {
        let widget = widget.to_string();
        self.request(|response| HubCommand::Snapshot { widget, response })
            .await
    }

    pub async fn list_widgets(&self) -> Result<Vec<WidgetSnapshot>, HubError> {
        self.request(|response| HubCommand::ListWidgets { response })
            .await
    }

    /// Apply new settings (fire-and-forget)
    pub fn update_settings(&self, settings: HubSettings) {
        let _ = self.cmd_tx.send(HubCommand::UpdateSettings(settings));
    }

    /// Receive notifications published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<HubNotification> {
        self.notify_tx.subscribe()
    }

    /// Check if the hub is still running
    pub fn is_alive(&self) -> bool {
        !self.cmd_tx.is_closed()
    }

    /// Signal the hub to stop (fire-and-forget)
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(HubCommand::Shutdown);
    }
}
