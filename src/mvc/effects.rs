//! Model operations requested by controller change handlers
//!
//! Change handlers never talk to a Model directly. They push requests into an
//! [`Effects`] sink; the hub executes them with the handler's controller as
//! the origin.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum ModelRequest {
    /// Remote GET. `param: None` requests the whole document (raw payload).
    Read {
        model: String,
        param: Option<String>,
        force_view_update: bool,
        endpoint: Option<String>,
    },
    /// Remote PUT of `{param: value}`, broadcast to all subscribers on success
    Write {
        model: String,
        param: String,
        value: Value,
        endpoint: Option<String>,
    },
}

impl ModelRequest {
    pub fn model(&self) -> &str {
        match self {
            ModelRequest::Read { model, .. } | ModelRequest::Write { model, .. } => model,
        }
    }
}

/// Collected model requests
#[derive(Debug, Default)]
pub struct Effects {
    requests: Vec<ModelRequest>,
}

impl Effects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `{param: value}` to the model's default endpoint
    pub fn write(&mut self, model: impl Into<String>, param: impl Into<String>, value: Value) {
        self.write_to(model, param, value, None);
    }

    /// Write `{param: value}`, optionally to an endpoint other than the model's default
    pub fn write_to(
        &mut self,
        model: impl Into<String>,
        param: impl Into<String>,
        value: Value,
        endpoint: Option<String>,
    ) {
        self.requests.push(ModelRequest::Write {
            model: model.into(),
            param: param.into(),
            value,
            endpoint,
        });
    }

    /// Read one parameter, or the whole document when `param` is `None`
    pub fn read(&mut self, model: impl Into<String>, param: Option<String>, force_view_update: bool) {
        self.read_from(model, param, force_view_update, None);
    }

    pub fn read_from(
        &mut self,
        model: impl Into<String>,
        param: Option<String>,
        force_view_update: bool,
        endpoint: Option<String>,
    ) {
        self.requests.push(ModelRequest::Read {
            model: model.into(),
            param,
            force_view_update,
            endpoint,
        });
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn requests(&self) -> &[ModelRequest] {
        &self.requests
    }

    pub fn into_requests(self) -> Vec<ModelRequest> {
        self.requests
    }
}
