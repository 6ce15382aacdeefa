//! Widget - one View wired to one Controller
//!
//! The widget carries out the render instructions its controller produces:
//! negotiated updates go through the view's reconcile step, forced updates
//! render directly.

use super::controller::{Controller, ViewUpdate};
use super::effects::Effects;
use super::model::DeliveryResult;
use super::schema::{PartialState, StateSchema};
use super::view::{Reconcile, Renderer, View};

/// What a delivery did to the widget
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// Negotiated update and the view's reconcile outcome
    Negotiated(Reconcile),
    /// Forced update rendered unconditionally
    Forced,
    /// Raw payload routed to the raw data handler
    RawData(serde_json::Value),
    /// Transaction failed
    Failed { error: String, message: String },
}

#[derive(Debug)]
pub struct Widget {
    controller: Controller,
    view: View,
}

impl Widget {
    pub fn new(name: impl Into<String>, schema: StateSchema, renderer: Box<dyn Renderer>) -> Self {
        let name = name.into();
        Self {
            controller: Controller::new(name.clone(), &schema),
            view: View::new(name, &schema, renderer),
        }
    }

    pub fn name(&self) -> &str {
        self.controller.name()
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut Controller {
        &mut self.controller
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    /// A user edit entering through the view. Returns whether the gate accepted it.
    pub fn user_input(&mut self, edit: &PartialState, fx: &mut Effects) -> bool {
        self.view.user_input(&mut self.controller, edit, fx)
    }

    /// Programmatic override of the canonical state
    pub fn force_set(&mut self, state: &PartialState) -> bool {
        match self.controller.force_set(state) {
            ViewUpdate::Forced(state) => {
                self.view.render(&state);
                true
            }
            _ => false,
        }
    }

    /// Apply the outcome of a model transaction
    pub fn deliver(&mut self, result: DeliveryResult, fx: &mut Effects) -> Applied {
        match result {
            DeliveryResult::Success {
                payload,
                force_view_update,
            } => {
                let update = self.controller.on_model_success(payload, force_view_update);
                self.apply(update, fx)
            }
            DeliveryResult::Failure { error, message } => {
                self.controller.on_model_fail(error.clone(), message.clone());
                Applied::Failed { error, message }
            }
        }
    }

    fn apply(&mut self, update: ViewUpdate, fx: &mut Effects) -> Applied {
        match update {
            ViewUpdate::Negotiated(state) => {
                Applied::Negotiated(self.view.reconcile(&mut self.controller, &state, fx))
            }
            ViewUpdate::Forced(state) => {
                self.view.render(&state);
                Applied::Forced
            }
            ViewUpdate::RawData(data) => Applied::RawData(data),
            ViewUpdate::Unchanged => Applied::Negotiated(Reconcile::InSync),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mvc::effects::ModelRequest;
    use crate::mvc::model::Model;
    use crate::render::RecordingRenderer;
    use serde_json::{json, Value};

    fn partial(value: Value) -> PartialState {
        value.as_object().cloned().unwrap()
    }

    fn volume_widget(name: &str) -> (Widget, RecordingRenderer) {
        let recorder = RecordingRenderer::new();
        let mut widget = Widget::new(name, StateSchema::new(["volume"]), Box::new(recorder.clone()));
        widget.controller_mut().bind_to_model("volume", "mixer", None);
        (widget, recorder)
    }

    fn apply_write(model: &Model, widgets: &mut [Widget], origin: usize, result: Result<Value, crate::remote::RemoteError>) {
        for delivery in model.complete_write(origin, result) {
            let mut fx = Effects::new();
            widgets[delivery.target].deliver(delivery.result, &mut fx);
        }
    }

    #[test]
    fn test_volume_scenario_two_subscribers() {
        let (origin, _) = volume_widget("left");
        let (other, other_frames) = volume_widget("right");
        let mut widgets = vec![origin, other];
        let mut model = Model::new("mixer", "/api/mixer");
        model.subscribe(0).subscribe(1);

        widgets[1].force_set(&partial(json!({"volume": 2})));

        let mut fx = Effects::new();
        assert!(widgets[0].user_input(&partial(json!({"volume": 5})), &mut fx));
        assert!(!widgets[0].controller().clear_to_send());

        let request = fx.into_requests().remove(0);
        assert!(matches!(request, ModelRequest::Write { ref param, .. } if param == "volume"));

        apply_write(&model, &mut widgets, 0, Ok(json!({"volume": 5})));

        assert_eq!(widgets[0].controller().state().get("volume"), Some(&json!(5)));
        assert!(widgets[0].controller().clear_to_send());
        assert_eq!(widgets[1].controller().state().get("volume"), Some(&json!(5)));
        assert_eq!(widgets[1].view().shadow().get("volume"), Some(&json!(5)));
        assert_eq!(other_frames.frames().last(), Some(&partial(json!({"volume": 5}))));
    }

    fn success(state: Value) -> DeliveryResult {
        DeliveryResult::Success {
            payload: crate::mvc::payload::Payload::Scoped(partial(state)),
            force_view_update: false,
        }
    }

    fn written_volumes(fx: &Effects) -> Vec<Value> {
        fx.requests()
            .iter()
            .filter_map(|r| match r {
                ModelRequest::Write { value, .. } => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_raced_read_does_not_revert_latest_edit() {
        let (mut widget, _) = volume_widget("left");
        let mut fx = Effects::new();
        assert!(widget.user_input(&partial(json!({"volume": 5})), &mut fx));
        // Dropped while 5 is in flight
        assert!(!widget.user_input(&partial(json!({"volume": 7})), &mut fx));

        let mut fx = Effects::new();
        let applied = widget.deliver(success(json!({"volume": 5})), &mut fx);
        assert_eq!(applied, Applied::Negotiated(Reconcile::Resent { accepted: true }));
        assert_eq!(written_volumes(&fx), vec![json!(7)]);

        // A read answered before the resend lands still carries the old value
        let mut fx = Effects::new();
        widget.deliver(success(json!({"volume": 5})), &mut fx);
        assert_eq!(widget.view().shadow().get("volume"), Some(&json!(7)));
        assert!(!written_volumes(&fx).contains(&json!(5)));

        let mut fx = Effects::new();
        let applied = widget.deliver(success(json!({"volume": 7})), &mut fx);
        assert_eq!(applied, Applied::Negotiated(Reconcile::InSync));
        assert!(fx.is_empty());
        assert_eq!(widget.controller().state().get("volume"), Some(&json!(7)));
    }

    #[test]
    fn test_failure_scenario() {
        let (origin, _) = volume_widget("left");
        let (other, _) = volume_widget("right");
        let mut widgets = vec![origin, other];
        let mut model = Model::new("mixer", "/api/mixer");
        model.subscribe(0).subscribe(1);

        let mut fx = Effects::new();
        widgets[0].user_input(&partial(json!({"volume": 5})), &mut fx);

        apply_write(
            &model,
            &mut widgets,
            0,
            Err(crate::remote::RemoteError::Status {
                status: 504,
                reason: "timeout".to_string(),
                body: "504".to_string(),
            }),
        );

        let origin = &widgets[0];
        assert!(origin.controller().model_failure());
        assert!(origin.controller().clear_to_send());
        assert_eq!(origin.controller().state().get("volume"), Some(&Value::Null));
        // The user still sees their value
        assert_eq!(origin.view().shadow().get("volume"), Some(&json!(5)));
        assert_eq!(widgets[1].controller().transaction().label(), "idle");

        // Gate is open again: resubmitting dispatches a fresh write
        let mut fx = Effects::new();
        assert!(widgets[0].user_input(&partial(json!({"volume": 5})), &mut fx));
        assert_eq!(fx.len(), 1);
    }

    #[test]
    fn test_force_set_only_renders_on_change() {
        let (mut widget, frames) = volume_widget("solo");
        assert!(widget.force_set(&partial(json!({"volume": 1}))));
        assert!(!widget.force_set(&partial(json!({"volume": 1}))));
        assert_eq!(frames.frames().len(), 1);
    }
}
