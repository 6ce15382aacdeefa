//! Renderers for widget views

use colored::*;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::mvc::{PartialState, Renderer};

/// Prints every render to stdout, one line per widget update
#[derive(Debug, Default)]
pub struct ConsoleRenderer;

impl ConsoleRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for ConsoleRenderer {
    fn render(&mut self, widget: &str, state: &PartialState) {
        let fields = state
            .iter()
            .map(|(param, value)| format!("{}={}", param.yellow(), value.to_string().green()))
            .collect::<Vec<_>>()
            .join(" ");
        println!("  {} {} {}", "▸".cyan(), widget.bright_white(), fields);
    }
}

/// Keeps every render in memory; clones share the same log
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderer {
    calls: Arc<Mutex<Vec<(String, PartialState)>>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rendered states, oldest first
    pub fn frames(&self) -> Vec<PartialState> {
        self.calls.lock().iter().map(|(_, state)| state.clone()).collect()
    }
}

impl Renderer for RecordingRenderer {
    fn render(&mut self, widget: &str, state: &PartialState) {
        self.calls.lock().push((widget.to_string(), state.clone()));
    }
}
