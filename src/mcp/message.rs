use indexmap::IndexMap;
use jiff::Timestamp;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::LazyLock;
use uuid::Uuid;

use crate::errors::{MuckError, MuckResult};

/// Message names and argument keys: a letter or `_`, then letters, digits,
/// `-` or `_`
static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$")
        .unwrap_or_else(|e| panic!("invalid identifier pattern: {e}"))
});

/// A single MCP argument value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum McpValue {
    Text(String),
    /// A multi-line value, one entry per line
    Lines(Vec<String>),
}

impl McpValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            McpValue::Text(text) => Some(text),
            McpValue::Lines(_) => None,
        }
    }

    pub fn as_lines(&self) -> Option<&[String]> {
        match self {
            McpValue::Lines(lines) => Some(lines),
            McpValue::Text(_) => None,
        }
    }

    pub fn is_multiline(&self) -> bool {
        matches!(self, McpValue::Lines(_))
    }
}

impl From<&str> for McpValue {
    fn from(text: &str) -> Self {
        McpValue::Text(text.to_string())
    }
}

impl From<String> for McpValue {
    fn from(text: String) -> Self {
        McpValue::Text(text)
    }
}

impl From<Vec<String>> for McpValue {
    fn from(lines: Vec<String>) -> Self {
        McpValue::Lines(lines)
    }
}

impl From<Vec<&str>> for McpValue {
    fn from(lines: Vec<&str>) -> Self {
        McpValue::Lines(lines.into_iter().map(str::to_string).collect())
    }
}

pub type McpArgs = IndexMap<String, McpValue>;

/// A complete MCP message received from the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpMessage {
    pub package: String,
    /// Message name within the package; empty for the package's bare message
    pub message: String,
    pub args: McpArgs,
    pub received_at: Timestamp,
}

impl McpMessage {
    pub fn new(package: impl Into<String>, message: impl Into<String>, args: McpArgs) -> Self {
        Self {
            package: package.into(),
            message: message.into(),
            args,
            received_at: Timestamp::now(),
        }
    }

    /// The full wire name: `package` or `package-message`
    pub fn name(&self) -> String {
        if self.message.is_empty() {
            self.package.clone()
        } else {
            format!("{}-{}", self.package, self.message)
        }
    }

    pub fn get(&self, key: &str) -> Option<&McpValue> {
        self.args.get(key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(McpValue::as_text)
    }

    pub fn lines(&self, key: &str) -> Option<&[String]> {
        self.args.get(key).and_then(McpValue::as_lines)
    }
}

/// Backslash-escape `\` and `"` for use inside a quoted value
pub fn escape(value: &str) -> Cow<'_, str> {
    if !value.contains(['\\', '"']) {
        return Cow::Borrowed(value);
    }

    let mut escaped = String::with_capacity(value.len() + 4);
    for c in value.chars() {
        if c == '\\' || c == '"' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    Cow::Owned(escaped)
}

/// Undo `escape`: a backslash makes the next character literal
pub fn unescape(value: &str) -> Cow<'_, str> {
    if !value.contains('\\') {
        return Cow::Borrowed(value);
    }

    let mut unescaped = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    unescaped.push(next);
                }
            }
            other => unescaped.push(other),
        }
    }
    Cow::Owned(unescaped)
}

pub fn is_identifier(text: &str) -> bool {
    IDENTIFIER.is_match(text)
}

/// A random token for data tags and authentication keys
pub fn generate_tag() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Build the wire text for one outgoing message, CRLF line endings included
///
/// `auth_key` is `None` only for the opening `mcp` message. Multi-line
/// values are sent as `key*: ""` on the first line and one continuation line
/// per value line, all joined by `data_tag`.
pub fn encode(name: &str, auth_key: Option<&str>, args: &McpArgs, data_tag: &str) -> MuckResult<String> {
    if !is_identifier(name) {
        return Err(MuckError::InvalidArgument(format!(
            "'{}' is not a valid MCP message name",
            name
        )));
    }

    let mut first = format!("#$#{}", name);
    if let Some(key) = auth_key {
        first.push(' ');
        first.push_str(key);
    }

    let mut continuations = String::new();
    for (key, value) in args {
        if !is_identifier(key) {
            return Err(MuckError::InvalidArgument(format!(
                "'{}' is not a valid MCP argument key",
                key
            )));
        }

        match value {
            McpValue::Text(text) => {
                check_single_line(key, text)?;
                first.push_str(&format!(" {}: \"{}\"", key, escape(text)));
            }
            McpValue::Lines(lines) => {
                first.push_str(&format!(" {}*: \"\"", key));
                for line in lines {
                    check_single_line(key, line)?;
                    continuations.push_str(&format!("#$#* {} {}: {}\r\n", data_tag, key, line));
                }
            }
        }
    }

    if args.values().any(McpValue::is_multiline) {
        first.push_str(&format!(" _data-tag: {}", data_tag));
        continuations.push_str(&format!("#$#: {}\r\n", data_tag));
    }

    first.push_str("\r\n");
    first.push_str(&continuations);
    Ok(first)
}

fn check_single_line(key: &str, value: &str) -> MuckResult<()> {
    if value.contains(['\r', '\n']) {
        return Err(MuckError::InvalidArgument(format!(
            "value for '{}' contains a line break; send it as a list of lines",
            key
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, McpValue)]) -> McpArgs {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_escape_and_unescape() {
        assert_eq!(escape(r#"say "hi" \o/"#), r#"say \"hi\" \\o/"#);
        assert_eq!(unescape(r#"say \"hi\" \\o/"#), r#"say "hi" \o/"#);
        assert!(matches!(escape("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_name_joins_package_and_message() {
        let bare = McpMessage::new("mcp", "", McpArgs::new());
        assert_eq!(bare.name(), "mcp");

        let full = McpMessage::new("mcp-negotiate", "can", McpArgs::new());
        assert_eq!(full.name(), "mcp-negotiate-can");
    }

    #[test]
    fn test_encode_simple_message() {
        let wire = encode(
            "org-fuzzball-help-request",
            Some("KEY1"),
            &args(&[("topic", "say \"hi\"".into()), ("type", "man".into())]),
            "unused",
        )
        .unwrap();

        assert_eq!(
            wire,
            "#$#org-fuzzball-help-request KEY1 topic: \"say \\\"hi\\\"\" type: \"man\"\r\n"
        );
    }

    #[test]
    fn test_encode_opening_message_without_key() {
        let wire = encode(
            "mcp",
            None,
            &args(&[
                ("authentication-key", "abc".into()),
                ("version", "2.1".into()),
                ("to", "2.1".into()),
            ]),
            "unused",
        )
        .unwrap();
        assert_eq!(
            wire,
            "#$#mcp authentication-key: \"abc\" version: \"2.1\" to: \"2.1\"\r\n"
        );
    }

    #[test]
    fn test_encode_multiline_values() {
        let wire = encode(
            "dns-org-mud-moo-simpleedit-set",
            Some("K"),
            &args(&[
                ("reference", "#123.desc".into()),
                ("content", vec!["line one", "", "line \"three\""].into()),
                ("type", "string-list".into()),
            ]),
            "T42",
        )
        .unwrap();

        let expected = concat!(
            "#$#dns-org-mud-moo-simpleedit-set K reference: \"#123.desc\" content*: \"\" type: \"string-list\" _data-tag: T42\r\n",
            "#$#* T42 content: line one\r\n",
            "#$#* T42 content: \r\n",
            "#$#* T42 content: line \"three\"\r\n",
            "#$#: T42\r\n",
        );
        assert_eq!(wire, expected);
    }

    #[test]
    fn test_encode_rejects_bad_input() {
        assert!(encode("bad name", Some("K"), &McpArgs::new(), "T").is_err());
        assert!(encode("pkg", Some("K"), &args(&[("bad key", "v".into())]), "T").is_err());
        assert!(encode("pkg", Some("K"), &args(&[("k", "a\r\nb".into())]), "T").is_err());
    }

    #[test]
    fn test_generated_tags_are_distinct_tokens() {
        let a = generate_tag();
        let b = generate_tag();
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
