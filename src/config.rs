use crate::errors::{MuckError, MuckResult};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server: ServerConfig,
    pub timeouts: TimeoutConfig,
    pub terminal: TerminalConfig,
    pub mcp: McpConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    /// Accept any certificate (self-signed MUCK servers)
    pub ignore_tls_cert: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub connect_secs: u64,
    /// Per attempt while waiting for the MCP banner
    pub banner_secs: u64,
    /// Waiting for the server's package list
    pub negotiate_secs: u64,
    pub login_secs: u64,
    /// How long `process` waits for the rest of a multi-line MCP message
    pub multiline_secs: u64,
    /// Quiet period that ends a `process` or `drain` read
    pub idle_poll_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    /// Names offered through TERMINAL-TYPE, most specific first
    pub terminal_types: Vec<String>,
    pub width: u16,
    pub height: u16,
    pub strip_ansi: bool,
    pub max_line_length: usize,
    /// Default size for raw reads
    pub read_chunk: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    pub enabled: bool,
    pub banner_attempts: u32,
    /// Packages negotiated right after the handshake (`name` or `name:min:max`)
    pub packages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 4201,
            use_tls: false,
            ignore_tls_cert: false,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 30,
            banner_secs: 10,
            negotiate_secs: 5,
            login_secs: 30,
            multiline_secs: 5,
            idle_poll_ms: 250,
        }
    }
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            terminal_types: vec!["fuzzball".to_string(), "ansi".to_string()],
            width: 80,
            height: 24,
            strip_ansi: false,
            // Fuzzball's output buffer is 8192 bytes; leave plenty of room
            max_line_length: 16384,
            read_chunk: 8194,
        }
    }
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            banner_attempts: 3,
            packages: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn banner(&self) -> Duration {
        Duration::from_secs(self.banner_secs)
    }

    pub fn negotiate(&self) -> Duration {
        Duration::from_secs(self.negotiate_secs)
    }

    pub fn login(&self) -> Duration {
        Duration::from_secs(self.login_secs)
    }

    pub fn multiline(&self) -> Duration {
        Duration::from_secs(self.multiline_secs)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }
}

impl ClientConfig {
    /// Load a config file, writing the defaults to `path` if it does not exist
    pub fn load_from_file(path: impl AsRef<Path>) -> MuckResult<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let default_config = Self::default();
                match default_config.to_toml_string() {
                    Ok(content) => {
                        if let Err(e) = fs::write(path, content) {
                            tracing::warn!(
                                "Could not create default config file {}: {}",
                                path.display(),
                                e
                            );
                        }
                    }
                    Err(e) => tracing::warn!("Could not render default config: {}", e),
                }
                Ok(default_config)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn from_toml_str(content: &str) -> MuckResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> MuckResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> MuckResult<()> {
        let invalid = |key: &str, value: String| {
            Err(MuckError::Configuration(format!(
                "invalid value for {}: {}",
                key, value
            )))
        };

        if self.server.host.trim().is_empty() {
            return invalid("server.host", "empty".to_string());
        }
        if self.server.port == 0 {
            return invalid("server.port", "0".to_string());
        }
        if self.terminal.terminal_types.iter().all(|t| t.trim().is_empty()) {
            return invalid("terminal.terminal_types", "no names".to_string());
        }
        if self.terminal.max_line_length == 0 {
            return invalid("terminal.max_line_length", "0".to_string());
        }
        if self.terminal.read_chunk == 0 {
            return invalid("terminal.read_chunk", "0".to_string());
        }
        if self.timeouts.idle_poll_ms == 0 {
            return invalid("timeouts.idle_poll_ms", "0".to_string());
        }
        if self.mcp.banner_attempts == 0 {
            return invalid("mcp.banner_attempts", "0".to_string());
        }
        Ok(())
    }
}
