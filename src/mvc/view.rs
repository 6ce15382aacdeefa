//! View - shadow state, edit gating and echo suppression
//!
//! The View mirrors the controller's state in a shadow snapshot. The shadow
//! only ever changes through [`View::render`], so any difference found by
//! [`View::reconcile`] is a local edit the model has not acknowledged yet.

use tracing::{debug, trace};

use super::controller::Controller;
use super::effects::Effects;
use super::schema::{PartialState, StateSchema, StateSnapshot};

/// On-screen representation of a widget
///
/// Implementations draw `state` however the hosting application displays
/// widgets. The shadow snapshot is maintained by [`View`] itself.
pub trait Renderer: Send {
    fn render(&mut self, widget: &str, state: &PartialState);
}

/// Outcome of a negotiated update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconcile {
    /// Shadow already matches the received state
    InSync,
    /// Shadow diverged and was resubmitted; `accepted` is false if the gate dropped it
    Resent { accepted: bool },
}

pub struct View {
    name: String,
    shadow: StateSnapshot,
    renderer: Box<dyn Renderer>,
}

impl View {
    /// Create a view whose shadow holds every schema key set to null
    pub fn new(name: impl Into<String>, schema: &StateSchema, renderer: Box<dyn Renderer>) -> Self {
        Self {
            name: name.into(),
            shadow: StateSnapshot::new(schema),
            renderer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shadow(&self) -> &StateSnapshot {
        &self.shadow
    }

    /// Render `state` unconditionally and mirror it into the shadow snapshot
    pub fn render(&mut self, state: &PartialState) {
        self.shadow.merge(state);
        self.renderer.render(&self.name, state);
    }

    /// A user edit: shown locally, then submitted to the controller.
    ///
    /// Returns whether the controller accepted the edit.
    pub fn user_input(&mut self, controller: &mut Controller, edit: &PartialState, fx: &mut Effects) -> bool {
        self.render(edit);
        self.submit_edit(controller, edit, fx)
    }

    /// Forward an edit to the controller if it is clear to send or its last
    /// transaction failed. Other edits are dropped.
    pub fn submit_edit(&mut self, controller: &mut Controller, edit: &PartialState, fx: &mut Effects) -> bool {
        if controller.transaction().accepts_edits() {
            controller.change(edit, fx);
            true
        } else {
            debug!(widget = %self.name, "Transaction pending, edit dropped");
            false
        }
    }

    /// Compare a negotiated update with the shadow state.
    ///
    /// Keys are scanned in schema order. On the first differing key the whole
    /// shadow is resubmitted, once per call. The shadow itself is left alone.
    pub fn reconcile(
        &mut self,
        controller: &mut Controller,
        received: &PartialState,
        fx: &mut Effects,
    ) -> Reconcile {
        let diverged = self
            .shadow
            .iter()
            .find(|(param, shadow)| received.get(*param).is_some_and(|value| value != *shadow))
            .map(|(param, _)| param.to_string());

        let Some(param) = diverged else {
            trace!(widget = %self.name, "Shadow in sync");
            return Reconcile::InSync;
        };

        debug!(widget = %self.name, param = %param, "Shadow diverged, resending view state");
        let shadow = self.shadow.to_partial();
        let accepted = self.submit_edit(controller, &shadow, fx);
        Reconcile::Resent { accepted }
    }
}

impl std::fmt::Debug for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("View")
            .field("name", &self.name)
            .field("shadow", &self.shadow)
            .finish()
    }
}
