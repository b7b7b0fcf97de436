//! # NAWS Option (RFC 1073), client side
//!
//! Once the server sends `DO NAWS` and we agree with `WILL NAWS`, the client
//! reports its size and repeats the report on every resize:
//!
//! ```text
//! IAC SB NAWS <width-high> <width-low> <height-high> <height-low> IAC SE
//! ```
//!
//! Values are 16-bit big-endian; 0 means "unknown". A byte of 255 in the
//! payload is doubled on the wire, which `TelnetSequence::to_bytes` takes
//! care of.

use super::{OptionError, OptionHandler};
use crate::protocol::TelnetOption;

/// Terminal window size information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    /// Terminal width in characters
    pub width: u16,
    /// Terminal height in lines
    pub height: u16,
}

impl WindowSize {
    pub fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    /// Big-endian NAWS payload, unescaped
    pub fn encode(self) -> Vec<u8> {
        let [wh, wl] = self.width.to_be_bytes();
        let [hh, hl] = self.height.to_be_bytes();
        vec![wh, wl, hh, hl]
    }
}

#[derive(Debug, Clone)]
pub struct NawsOption {
    size: WindowSize,
}

impl NawsOption {
    pub fn new(size: WindowSize) -> Self {
        Self { size }
    }

    pub fn window_size(&self) -> WindowSize {
        self.size
    }

    /// Record a new size and return the payload to report it
    pub fn set_size(&mut self, size: WindowSize) -> Vec<u8> {
        self.size = size;
        size.encode()
    }
}

impl OptionHandler for NawsOption {
    fn option(&self) -> TelnetOption {
        TelnetOption::NAWS
    }

    fn on_enabled(&mut self) -> Option<Vec<u8>> {
        Some(self.size.encode())
    }

    fn handle_subnegotiation(&mut self, data: &[u8]) -> Result<Option<Vec<u8>>, OptionError> {
        // Only the client sends NAWS data
        Err(OptionError::InvalidData(format!(
            "unexpected NAWS payload from server ({} bytes)",
            data.len()
        )))
    }

    fn reset(&mut self) {}

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
