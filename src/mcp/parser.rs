//! Line-level MCP 2.1 parsing
//!
//! Every line from the server is either plain text or an MCP line starting
//! with `#$#`. MCP lines come in three shapes:
//!
//! ```text
//! #$#name [auth-key] key: value key: "quoted value" ...
//! #$#* data-tag key: continuation value
//! #$#: data-tag
//! ```
//!
//! Fuzzball includes its copy of the authentication key on messages it
//! sends, so the key is recognised whenever the second token is not a
//! `key:` token.

use thiserror::Error;

use super::message::{McpArgs, McpValue};

pub const MCP_PREFIX: &str = "#$#";
/// Out-of-band quoting for text lines that happen to start with `#$#`
pub const QUOTE_PREFIX: &str = "#$\"";

pub const DATA_TAG_KEY: &str = "_data-tag";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum McpParseError {
    #[error("MCP line has no message name")]
    EmptyName,

    #[error("expected 'key:' but found '{0}'")]
    KeyWithoutColon(String),

    #[error("key '{0}' has no value")]
    MissingValue(String),

    #[error("unterminated quoted value for key '{0}'")]
    UnterminatedQuote(String),

    #[error("value for key '{0}' ends in a dangling escape")]
    DanglingEscape(String),

    #[error("message '{0}' has multi-line keys but no _data-tag")]
    MissingDataTag(String),

    #[error("malformed continuation line: {0}")]
    MalformedContinuation(String),

    #[error("malformed end line: {0}")]
    MalformedEnd(String),

    #[error("invalid MCP version '{0}'")]
    InvalidVersion(String),

    #[error("invalid package request '{0}'; expected name or name:min:max")]
    InvalidPackageRequest(String),
}

/// The first line of a message as it appeared on the wire
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    /// Full message name, lower-cased
    pub name: String,
    pub auth_key: Option<String>,
    /// Arguments in wire order; multi-line keys start as empty `Lines`
    pub args: McpArgs,
    pub data_tag: Option<String>,
}

impl RawMessage {
    pub fn multiline_keys(&self) -> Vec<String> {
        self.args
            .iter()
            .filter(|(_, value)| value.is_multiline())
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(McpValue::as_text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum McpLine {
    /// Ordinary MUCK output
    Text(String),
    Message(RawMessage),
    Continuation {
        tag: String,
        key: String,
        value: String,
    },
    End {
        tag: String,
    },
}

pub fn parse_line(line: &str) -> Result<McpLine, McpParseError> {
    if let Some(quoted) = line.strip_prefix(QUOTE_PREFIX) {
        return Ok(McpLine::Text(quoted.to_string()));
    }

    let Some(body) = line.strip_prefix(MCP_PREFIX) else {
        return Ok(McpLine::Text(line.to_string()));
    };

    if let Some(rest) = body.strip_prefix('*') {
        return parse_continuation(rest);
    }

    if let Some(rest) = body.strip_prefix(':') {
        let tag = rest.trim();
        if tag.is_empty() || tag.contains(char::is_whitespace) {
            return Err(McpParseError::MalformedEnd(line.to_string()));
        }
        return Ok(McpLine::End {
            tag: tag.to_string(),
        });
    }

    parse_message(body).map(McpLine::Message)
}

fn parse_continuation(rest: &str) -> Result<McpLine, McpParseError> {
    let malformed = || McpParseError::MalformedContinuation(format!("#$#*{}", rest));

    let rest = rest.strip_prefix(' ').ok_or_else(malformed)?.trim_start();
    let (tag, rest) = rest.split_once(' ').ok_or_else(malformed)?;
    let (key, value) = rest.trim_start().split_once(':').ok_or_else(malformed)?;
    if tag.is_empty() || key.is_empty() || key.contains(char::is_whitespace) {
        return Err(malformed());
    }

    Ok(McpLine::Continuation {
        tag: tag.to_string(),
        key: key.to_ascii_lowercase(),
        value: value.strip_prefix(' ').unwrap_or(value).to_string(),
    })
}

fn parse_message(body: &str) -> Result<RawMessage, McpParseError> {
    let mut cursor = Cursor::new(body);

    let name = cursor.bare_token();
    if name.is_empty() {
        return Err(McpParseError::EmptyName);
    }

    let mut message = RawMessage {
        name: name.to_ascii_lowercase(),
        auth_key: None,
        args: McpArgs::new(),
        data_tag: None,
    };

    cursor.skip_spaces();
    if !cursor.at_end() {
        let second = cursor.peek_token();
        if !second.contains(':') {
            message.auth_key = Some(cursor.bare_token().to_string());
        }
    }

    loop {
        cursor.skip_spaces();
        if cursor.at_end() {
            break;
        }

        let key = cursor.key()?;
        cursor.skip_spaces();
        let value = cursor.value(&key)?;

        if key == DATA_TAG_KEY {
            message.data_tag = Some(value);
        } else if let Some(multi) = key.strip_suffix('*') {
            message
                .args
                .insert(multi.to_string(), McpValue::Lines(Vec::new()));
        } else {
            message.args.insert(key, McpValue::Text(value));
        }
    }

    if message.data_tag.is_none() && message.args.values().any(McpValue::is_multiline) {
        return Err(McpParseError::MissingDataTag(message.name));
    }

    Ok(message)
}

/// Walks the argument part of a message line
struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        let text: &'a str = self.text;
        &text[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn skip_spaces(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn peek_token(&self) -> &'a str {
        let rest = self.rest();
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        &rest[..end]
    }

    fn bare_token(&mut self) -> &'a str {
        let token = self.peek_token();
        self.pos += token.len();
        token
    }

    /// `key:` with the colon consumed; keys are case-insensitive
    fn key(&mut self) -> Result<String, McpParseError> {
        let rest = self.rest();
        let end = rest
            .find(|c: char| c == ':' || c.is_whitespace())
            .unwrap_or(rest.len());

        if !rest[end..].starts_with(':') || end == 0 {
            return Err(McpParseError::KeyWithoutColon(
                self.peek_token().to_string(),
            ));
        }

        self.pos += end + 1;
        Ok(rest[..end].to_ascii_lowercase())
    }

    fn value(&mut self, key: &str) -> Result<String, McpParseError> {
        let rest = self.rest();
        if rest.is_empty() {
            return Err(McpParseError::MissingValue(key.to_string()));
        }

        if !rest.starts_with('"') {
            return Ok(self.bare_token().to_string());
        }

        let mut value = String::new();
        let mut chars = rest.char_indices().skip(1);
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += i + 1;
                    return Ok(value);
                }
                '\\' => match chars.next() {
                    Some((_, escaped)) => value.push(escaped),
                    None => return Err(McpParseError::DanglingEscape(key.to_string())),
                },
                other => value.push(other),
            }
        }

        Err(McpParseError::UnterminatedQuote(key.to_string()))
    }
}
