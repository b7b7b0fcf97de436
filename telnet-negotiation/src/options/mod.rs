//! # Telnet Option Implementations (client side)
//!
//! Options that need more than a yes/no answer carry data through
//! sub-negotiation. A MUCK client answers two of them:
//!
//! ### Terminal Type Option (RFC 1091)
//! The server asks `SEND`, the client answers `IS <name>`.
//!
//! ### NAWS - Negotiate About Window Size (RFC 1073)
//! The client reports its window size once NAWS is enabled and again
//! whenever it changes.

pub mod naws;
pub mod terminal_type;

pub use naws::{NawsOption, WindowSize};
pub use terminal_type::TerminalTypeOption;

use crate::protocol::TelnetOption;

/// Common trait for option handlers owned by a `TelnetStream`
pub trait OptionHandler: Send {
    /// The telnet option code this handler manages
    fn option(&self) -> TelnetOption;

    /// Payload to send right after the option became enabled on our side
    fn on_enabled(&mut self) -> Option<Vec<u8>> {
        None
    }

    /// Handle an incoming sub-negotiation payload, returning a reply payload
    fn handle_subnegotiation(&mut self, data: &[u8]) -> Result<Option<Vec<u8>>, OptionError>;

    /// Return to the state of a fresh connection
    fn reset(&mut self);

    fn as_any(&self) -> &dyn std::any::Any;

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

/// Sub-negotiation verbs shared by TERMINAL-TYPE and friends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SubNegotiationCommand {
    /// Provide current value (0)
    Is = 0,
    /// Send current value (1)
    Send = 1,
}

/// Errors that can occur during option processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionError {
    /// Invalid sub-negotiation data format
    InvalidData(String),
    /// Unsupported sub-negotiation command
    UnsupportedCommand(u8),
}

impl std::fmt::Display for OptionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionError::InvalidData(msg) => write!(f, "Invalid option data: {}", msg),
            OptionError::UnsupportedCommand(cmd) => write!(f, "Unsupported command: {}", cmd),
        }
    }
}

impl std::error::Error for OptionError {}
