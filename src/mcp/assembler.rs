use std::collections::HashMap;
use thiserror::Error;

use super::message::{McpMessage, McpValue};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssembleError {
    #[error("no multi-line message is open with data tag '{0}'")]
    UnknownTag(String),

    #[error("message with data tag '{tag}' has no multi-line key '{key}'")]
    UnknownKey { tag: String, key: String },
}

/// Normalised form of a data tag
///
/// Fuzzball pads the tags it sends with leading zeros and is loose about
/// case, so `00a7` and `A7` name the same message.
pub fn normalize_tag(tag: &str) -> String {
    let trimmed = tag.trim().trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_ascii_uppercase()
    }
}

/// Collects continuation lines for multi-line messages until their end line
///
/// Any number of messages may be open at once; lines for different tags can
/// interleave with each other and with ordinary traffic.
#[derive(Debug, Default)]
pub struct MultilineAssembler {
    open: HashMap<String, OpenMessage>,
}

#[derive(Debug)]
struct OpenMessage {
    /// The line that opened the message, as received
    first_line: String,
    message: McpMessage,
}

impl MultilineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold `message` until `#$#: tag` arrives; its multi-line keys must
    /// already be present as `McpValue::Lines`
    pub fn start(&mut self, tag: &str, first_line: impl Into<String>, message: McpMessage) {
        let tag = normalize_tag(tag);
        let open = OpenMessage {
            first_line: first_line.into(),
            message,
        };
        if let Some(replaced) = self.open.insert(tag.clone(), open) {
            tracing::warn!(
                "Data tag {} reused before '{}' finished; dropping the old message",
                tag,
                replaced.message.name()
            );
        }
    }

    pub fn continuation(&mut self, tag: &str, key: &str, value: String) -> Result<(), AssembleError> {
        let open = self
            .open
            .get_mut(&normalize_tag(tag))
            .ok_or_else(|| AssembleError::UnknownTag(tag.to_string()))?;

        match open.message.args.get_mut(key) {
            Some(McpValue::Lines(lines)) => {
                lines.push(value);
                Ok(())
            }
            _ => Err(AssembleError::UnknownKey {
                tag: tag.to_string(),
                key: key.to_string(),
            }),
        }
    }

    pub fn end(&mut self, tag: &str) -> Result<McpMessage, AssembleError> {
        self.open
            .remove(&normalize_tag(tag))
            .map(|open| open.message)
            .ok_or_else(|| AssembleError::UnknownTag(tag.to_string()))
    }

    pub fn is_pending(&self) -> bool {
        !self.open.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.open.len()
    }

    /// Give up on every open message, returning each unfinished message
    /// with the line that opened it, oldest first
    pub fn abandon_all(&mut self) -> Vec<(String, McpMessage)> {
        let mut abandoned: Vec<OpenMessage> = self.open.drain().map(|(_, open)| open).collect();
        abandoned.sort_by_key(|open| open.message.received_at);
        abandoned
            .into_iter()
            .map(|open| (open.first_line, open.message))
            .collect()
    }
}
