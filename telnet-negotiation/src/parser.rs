//! # Telnet Command Parser
//!
//! Separates application data from Telnet command sequences in a byte stream
//! according to **RFC 854**. The parser keeps its state between calls, so a
//! sequence split across two socket reads is still recognised.
//!
//! ### IAC State Machine
//! - **Data**: normal data bytes, watching for IAC and CR
//! - **Iac**: found 255, next byte decides the meaning
//! - **Command**: WILL/WONT/DO/DONT waiting for the option byte
//! - **SubOption**: IAC SB waiting for the option byte
//! - **Sub / SubIac**: collecting sub-negotiation payload until IAC SE

use crate::protocol::{IAC, TelnetCommand, TelnetOption, TelnetSequence};

const CR: u8 = b'\r';
const NUL: u8 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
enum ParserState {
    Data,
    /// Saw a CR; a following NUL is dropped (RFC 854 bare carriage return)
    Cr,
    Iac,
    Command(TelnetCommand),
    SubOption,
    Sub {
        option: TelnetOption,
        data: Vec<u8>,
    },
    SubIac {
        option: TelnetOption,
        data: Vec<u8>,
    },
}

/// Result of parsing a chunk of bytes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseResult {
    /// Data bytes that belong to the application
    pub data: Vec<u8>,
    /// Telnet command sequences, in stream order
    pub sequences: Vec<TelnetSequence>,
}

/// Telnet command parser with stateful IAC sequence detection
#[derive(Debug, Clone)]
pub struct TelnetParser {
    state: ParserState,
}

impl Default for TelnetParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TelnetParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::Data,
        }
    }

    /// Parse a chunk of bytes, returning data and command sequences
    ///
    /// # Example
    /// ```rust
    /// use telnet_negotiation::parser::TelnetParser;
    ///
    /// let mut parser = TelnetParser::new();
    ///
    /// // "hello" + IAC WILL ECHO + "world"
    /// let input = vec![104, 101, 108, 108, 111, 255, 251, 1, 119, 111, 114, 108, 100];
    /// let result = parser.parse(&input);
    ///
    /// assert_eq!(result.data, b"helloworld");
    /// assert_eq!(result.sequences.len(), 1);
    /// ```
    pub fn parse(&mut self, input: &[u8]) -> ParseResult {
        let mut result = ParseResult::default();

        for &byte in input {
            let state = std::mem::replace(&mut self.state, ParserState::Data);
            self.state = match state {
                ParserState::Cr if byte == NUL => ParserState::Data,

                ParserState::Data | ParserState::Cr => {
                    if byte == IAC {
                        ParserState::Iac
                    } else {
                        result.data.push(byte);
                        if byte == CR {
                            ParserState::Cr
                        } else {
                            ParserState::Data
                        }
                    }
                }

                ParserState::Iac => match TelnetCommand::from_byte(byte) {
                    _ if byte == IAC => {
                        result.data.push(IAC);
                        ParserState::Data
                    }
                    Some(TelnetCommand::SB) => ParserState::SubOption,
                    Some(command) if command.is_negotiation_command() => {
                        ParserState::Command(command)
                    }
                    Some(command) => {
                        result.sequences.push(TelnetSequence::Command(command));
                        ParserState::Data
                    }
                    None => {
                        // Not a command byte: hand both bytes to the application
                        result.data.extend_from_slice(&[IAC, byte]);
                        ParserState::Data
                    }
                },

                ParserState::Command(command) => {
                    result
                        .sequences
                        .push(TelnetSequence::negotiation(command, TelnetOption::from_byte(byte)));
                    ParserState::Data
                }

                ParserState::SubOption => ParserState::Sub {
                    option: TelnetOption::from_byte(byte),
                    data: Vec::new(),
                },

                ParserState::Sub { option, mut data } => {
                    if byte == IAC {
                        ParserState::SubIac { option, data }
                    } else {
                        data.push(byte);
                        ParserState::Sub { option, data }
                    }
                }

                ParserState::SubIac { option, mut data } => {
                    if byte == IAC {
                        data.push(IAC);
                        ParserState::Sub { option, data }
                    } else if byte == TelnetCommand::SE.to_byte() {
                        result
                            .sequences
                            .push(TelnetSequence::SubNegotiation { option, data });
                        ParserState::Data
                    } else {
                        tracing::warn!(
                            "Malformed sub-negotiation for {:?}: IAC {} before SE, dropping {} bytes",
                            option,
                            byte,
                            data.len()
                        );
                        ParserState::Data
                    }
                }
            };
        }

        result
    }

    /// Get the current parser state (for debugging/testing)
    pub fn state(&self) -> String {
        format!("{:?}", self.state)
    }

    /// Reset parser to initial state (new connection)
    pub fn reset(&mut self) {
        self.state = ParserState::Data;
    }

    /// True while a command sequence is only partially received
    pub fn is_mid_sequence(&self) -> bool {
        !matches!(self.state, ParserState::Data | ParserState::Cr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_data() {
        let mut parser = TelnetParser::new();
        let result = parser.parse(b"Hello, World!\r\n");

        assert_eq!(result.data, b"Hello, World!\r\n");
        assert!(result.sequences.is_empty());
        assert!(!parser.is_mid_sequence());
    }

    #[test]
    fn test_simple_command() {
        let mut parser = TelnetParser::new();
        let result = parser.parse(&[b'>', b' ', 255, 249]); // prompt + IAC GA

        assert_eq!(result.data, b"> ");
        assert_eq!(
            result.sequences,
            vec![TelnetSequence::Command(TelnetCommand::GA)]
        );
    }

    #[test]
    fn test_negotiation_with_unknown_option() {
        let mut parser = TelnetParser::new();
        let result = parser.parse(&[255, 253, 99]); // IAC DO 99

        assert!(result.data.is_empty());
        assert_eq!(
            result.sequences,
            vec![TelnetSequence::negotiation(
                TelnetCommand::DO,
                TelnetOption::Unknown(99)
            )]
        );
    }

    #[test]
    fn test_escaped_iac_in_data() {
        let mut parser = TelnetParser::new();
        let result = parser.parse(&[1, 255, 255, 2]);

        assert_eq!(result.data, vec![1, 255, 2]);
        assert!(result.sequences.is_empty());
    }

    #[test]
    fn test_sub_negotiation_with_escaped_iac() {
        let mut parser = TelnetParser::new();
        // IAC SB NAWS 0 255 255 0 24 IAC SE
        let result = parser.parse(&[255, 250, 31, 0, 255, 255, 0, 24, 255, 240]);

        assert_eq!(
            result.sequences,
            vec![TelnetSequence::SubNegotiation {
                option: TelnetOption::NAWS,
                data: vec![0, 255, 0, 24],
            }]
        );
        assert!(result.data.is_empty());
    }

    #[test]
    fn test_sequence_split_across_chunks() {
        let mut parser = TelnetParser::new();

        let first = parser.parse(&[b'a', 255, 250, 24]);
        assert_eq!(first.data, b"a");
        assert!(first.sequences.is_empty());
        assert!(parser.is_mid_sequence());

        let second = parser.parse(&[1, 255]);
        assert!(second.sequences.is_empty());

        let third = parser.parse(&[240, b'b']);
        assert_eq!(third.data, b"b");
        assert_eq!(
            third.sequences,
            vec![TelnetSequence::SubNegotiation {
                option: TelnetOption::TERMINAL_TYPE,
                data: vec![1],
            }]
        );
    }

    #[test]
    fn test_cr_nul_becomes_cr() {
        let mut parser = TelnetParser::new();
        let result = parser.parse(&[b'a', b'\r', 0, b'b']);
        assert_eq!(result.data, b"a\rb");

        // NUL arriving in the next chunk is still dropped
        let mut parser = TelnetParser::new();
        assert_eq!(parser.parse(b"x\r").data, b"x\r");
        assert_eq!(parser.parse(&[0, b'y']).data, b"y");
    }

    #[test]
    fn test_invalid_command_passes_through() {
        let mut parser = TelnetParser::new();
        let result = parser.parse(&[255, 99]);

        assert_eq!(result.data, vec![255, 99]);
        assert!(result.sequences.is_empty());
    }

    #[test]
    fn test_malformed_sub_negotiation_is_dropped() {
        let mut parser = TelnetParser::new();
        let result = parser.parse(&[255, 250, 24, 1, 255, 1, b'o', b'k']);

        assert!(result.sequences.is_empty());
        assert_eq!(result.data, b"ok");
    }

    #[test]
    fn test_parser_reset() {
        let mut parser = TelnetParser::new();
        parser.parse(&[255, 251]);
        assert!(parser.is_mid_sequence());

        parser.reset();
        assert!(!parser.is_mid_sequence());
        assert_eq!(parser.state(), "Data");
        assert_eq!(parser.parse(b"hello").data, b"hello");
    }
}
