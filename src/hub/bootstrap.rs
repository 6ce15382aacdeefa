//! Building a hub from configuration

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::{Hub, HubError, HubSettings};
use crate::config::{AppConfig, WidgetConfig};
use crate::mvc::{ModelRequest, Renderer, StateSchema, Widget};
use crate::remote::RemoteService;

impl Hub {
    /// Register every model and widget in `config`.
    ///
    /// Each widget parameter is bound to the widget's model, honoring endpoint
    /// overrides. Widgets with `initial_read` get one forced read per parameter
    /// queued for startup.
    pub fn from_config<F>(
        config: &AppConfig,
        remote: Arc<dyn RemoteService>,
        mut renderer_for: F,
    ) -> Result<Self, HubError>
    where
        F: FnMut(&WidgetConfig) -> Box<dyn Renderer>,
    {
        let mut hub = Hub::new(remote, config.transaction_timeout());

        for model in &config.models {
            hub.add_model(model.name.clone(), model.endpoint.clone());
        }

        for wc in &config.widgets {
            let mut widget = Widget::new(
                wc.name.clone(),
                StateSchema::new(wc.params.iter().cloned()),
                renderer_for(wc),
            );

            let controller = widget.controller_mut();
            for param in &wc.params {
                controller.bind_to_model(param.clone(), wc.model.clone(), wc.endpoints.get(param).cloned());
            }

            let id = hub.add_widget(widget, &[wc.model.as_str()])?;

            if wc.initial_read {
                for param in &wc.params {
                    hub.queue_startup(
                        id,
                        ModelRequest::Read {
                            model: wc.model.clone(),
                            param: Some(param.clone()),
                            force_view_update: true,
                            endpoint: wc.endpoints.get(param).cloned(),
                        },
                    );
                }
            }
            debug!(widget = %wc.name, model = %wc.model, params = wc.params.len(), "Widget configured");
        }

        info!(
            models = config.models.len(),
            widgets = config.widgets.len(),
            "Hub built from configuration"
        );
        Ok(hub)
    }
}

impl HubSettings {
    /// Runtime-adjustable subset of `config`
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            endpoints: config
                .models
                .iter()
                .map(|m| (m.name.clone(), m.endpoint.clone()))
                .collect::<HashMap<_, _>>(),
            transaction_timeout: config.transaction_timeout(),
        }
    }

    /// Settings from a reloaded `next` that a hub built from `running` can
    /// apply. Models added since startup keep waiting for a restart.
    pub fn for_reload(running: &AppConfig, next: &AppConfig) -> Self {
        let mut settings = Self::from_config(next);
        settings.endpoints.retain(|name, _| running.model(name).is_some());
        settings
    }
}
