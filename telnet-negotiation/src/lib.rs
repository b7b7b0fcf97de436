//! # Telnet Negotiation Library
//!
//! Client-side Telnet for MUD/MUCK connections:
//! - RFC 854: Telnet Protocol Specification
//! - RFC 1143: The Q Method of Implementing TELNET Option Negotiation
//! - RFC 1091: Terminal-Type Option
//! - RFC 1073: Window Size Option (NAWS)
//!
//! ## Architecture Overview
//!
//! - `protocol`: command and option constants, sequence serialization
//! - `parser`: splits a byte stream into data and command sequences
//! - `negotiation`: the RFC 1143 state machine with an accept policy
//! - `options`: TERMINAL-TYPE and NAWS handlers
//! - `stream`: `TelnetStream`, a `Read + Write` wrapper tying it together

pub mod negotiation;
pub mod options;
pub mod parser;
pub mod protocol;
pub mod stream;

pub use negotiation::{NegotiationResult, OptionNegotiator, OptionPolicy, OptionState, Side};
pub use options::{NawsOption, OptionError, OptionHandler, TerminalTypeOption, WindowSize};
pub use parser::{ParseResult, TelnetParser};
pub use protocol::{IAC, TelnetCommand, TelnetOption, TelnetSequence, escape_iac};
pub use stream::TelnetStream;

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Supported Telnet RFCs
pub const SUPPORTED_RFCS: &[&str] = &[
    "RFC 854 - Telnet Protocol Specification",
    "RFC 1143 - The Q Method of Implementing TELNET Option Negotiation",
    "RFC 1091 - Telnet Terminal-Type Option",
    "RFC 1073 - Telnet Window Size Option",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_available() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_rfc_list() {
        assert!(SUPPORTED_RFCS.contains(&"RFC 854 - Telnet Protocol Specification"));
        assert_eq!(SUPPORTED_RFCS.len(), 4);
    }
}
