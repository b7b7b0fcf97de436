use thiserror::Error;

use crate::mcp::McpParseError;
use crate::mcp::version::McpVersion;

/// Errors raised by the MUCK client
#[derive(Debug, Error)]
pub enum MuckError {
    /// I/O related errors (network, config file, ...)
    #[error("I/O error: {0}")]
    Io(std::io::Error),

    /// The server closed the connection
    #[error("Connection closed by server")]
    Disconnected,

    /// The connection was closed locally
    #[error("Not connected")]
    NotConnected,

    /// Nothing arrived in time for a step that needs an answer
    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("Invalid server name for TLS: {0}")]
    InvalidServerName(String),

    /// The MCP opening exchange did not go as expected
    #[error("MCP handshake failed: {0}")]
    Handshake(String),

    #[error("Server supports MCP {server_min} to {server_max}, we support {ours}")]
    UnsupportedVersion {
        server_min: McpVersion,
        server_max: McpVersion,
        ours: McpVersion,
    },

    #[error("Package '{0}' is not available on the server")]
    PackageUnavailable(String),

    #[error("Package '{0}' was not negotiated with the server")]
    PackageNotNegotiated(String),

    #[error("Packages can only be negotiated once per session")]
    AlreadyNegotiated,

    #[error("No common version for package '{package}': {detail}")]
    VersionMismatch { package: String, detail: String },

    /// Caller supplied something that cannot go on the wire
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("MCP parse error: {0}")]
    Parse(#[from] McpParseError),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<std::io::Error> for MuckError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe => MuckError::Disconnected,
            _ => MuckError::Io(err),
        }
    }
}

impl From<toml::de::Error> for MuckError {
    fn from(err: toml::de::Error) -> Self {
        MuckError::Configuration(err.to_string())
    }
}

impl From<toml::ser::Error> for MuckError {
    fn from(err: toml::ser::Error) -> Self {
        MuckError::Configuration(err.to_string())
    }
}

/// Result type alias for client operations
pub type MuckResult<T> = Result<T, MuckError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_disconnect_kinds_map_to_disconnected() {
        for kind in [
            ErrorKind::UnexpectedEof,
            ErrorKind::ConnectionReset,
            ErrorKind::ConnectionAborted,
            ErrorKind::BrokenPipe,
        ] {
            assert!(matches!(
                MuckError::from(Error::new(kind, "gone")),
                MuckError::Disconnected
            ));
        }

        assert!(matches!(
            MuckError::from(Error::new(ErrorKind::PermissionDenied, "no")),
            MuckError::Io(_)
        ));
    }

    #[test]
    fn test_version_error_message() {
        let err = MuckError::UnsupportedVersion {
            server_min: McpVersion::new(1, 0),
            server_max: McpVersion::new(1, 0),
            ours: McpVersion::new(2, 1),
        };
        assert_eq!(
            err.to_string(),
            "Server supports MCP 1.0 to 1.0, we support 2.1"
        );
    }
}
