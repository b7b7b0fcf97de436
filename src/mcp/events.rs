use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;

use super::message::McpMessage;

/// One item of server traffic seen by `McpSession::process`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum McpEvent {
    Message(McpMessage),
    /// Ordinary MUCK output
    Text(String),
    /// An MCP line that could not be accepted
    Unrecognized { line: String, reason: String },
}

pub type Handler = Box<dyn FnMut(&McpMessage) + Send>;

/// Per-package callbacks fired as messages complete
#[derive(Default)]
pub struct EventHandlers {
    by_package: HashMap<String, Vec<Handler>>,
    any: Vec<Handler>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&mut self, package: &str, handler: F)
    where
        F: FnMut(&McpMessage) + Send + 'static,
    {
        self.by_package
            .entry(package.to_ascii_lowercase())
            .or_default()
            .push(Box::new(handler));
    }

    /// Called for every message, after the package's own handlers
    pub fn on_any<F>(&mut self, handler: F)
    where
        F: FnMut(&McpMessage) + Send + 'static,
    {
        self.any.push(Box::new(handler));
    }

    /// Run the handlers for `message`; returns how many ran
    pub fn dispatch(&mut self, message: &McpMessage) -> usize {
        let mut called = 0;

        if let Some(handlers) = self.by_package.get_mut(&message.package) {
            for handler in handlers.iter_mut() {
                handler(message);
                called += 1;
            }
        }
        for handler in self.any.iter_mut() {
            handler(message);
            called += 1;
        }

        tracing::trace!("Dispatched {} to {} handler(s)", message.name(), called);
        called
    }

    pub fn is_empty(&self) -> bool {
        self.by_package.is_empty() && self.any.is_empty()
    }
}

impl std::fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandlers")
            .field("packages", &self.by_package.keys().collect::<Vec<_>>())
            .field("any", &self.any.len())
            .finish()
    }
}

/// Everything a single `process` call picked up, in arrival order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Processed {
    events: Vec<McpEvent>,
    closed: bool,
}

impl Processed {
    pub(crate) fn push(&mut self, event: McpEvent) {
        self.events.push(event);
    }

    pub(crate) fn mark_closed(&mut self) {
        self.closed = true;
    }

    pub fn events(&self) -> &[McpEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<McpEvent> {
        self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The server closed the connection during this call
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn messages(&self) -> impl Iterator<Item = &McpMessage> {
        self.events.iter().filter_map(|event| match event {
            McpEvent::Message(message) => Some(message),
            _ => None,
        })
    }

    pub fn text(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                McpEvent::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// `(line, reason)` pairs
    pub fn unrecognized(&self) -> Vec<(&str, &str)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                McpEvent::Unrecognized { line, reason } => Some((line.as_str(), reason.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Messages grouped by package, packages in order of first appearance
    pub fn by_package(&self) -> IndexMap<&str, Vec<&McpMessage>> {
        let mut grouped: IndexMap<&str, Vec<&McpMessage>> = IndexMap::new();
        for message in self.messages() {
            grouped.entry(message.package.as_str()).or_default().push(message);
        }
        grouped
    }
}
