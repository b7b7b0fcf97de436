//! # Terminal Type Option (RFC 1091), client side
//!
//! ```text
//! server: IAC SB TERMINAL-TYPE SEND IAC SE
//! client: IAC SB TERMINAL-TYPE IS <name> IAC SE
//! ```
//!
//! A client may know several names for its terminal, most specific first.
//! Each `SEND` gets the next name; once the list is exhausted the last name
//! is sent again, which tells the server it has seen them all. Some MUCK
//! servers use the cycle to pick a charset or colour mode.

use super::{OptionError, OptionHandler, SubNegotiationCommand};
use crate::protocol::TelnetOption;

#[derive(Debug, Clone)]
pub struct TerminalTypeOption {
    names: Vec<String>,
    next: usize,
}

impl TerminalTypeOption {
    /// `names` must not be empty; an empty list falls back to `"UNKNOWN"`
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            names.push("UNKNOWN".to_string());
        }
        Self { names, next: 0 }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Name the next `SEND` will be answered with
    pub fn current(&self) -> &str {
        &self.names[self.next.min(self.names.len() - 1)]
    }

    fn advance(&mut self) -> Vec<u8> {
        let name = self.current().to_string();
        if self.next < self.names.len() {
            self.next += 1;
        }

        let mut payload = Vec::with_capacity(name.len() + 1);
        payload.push(SubNegotiationCommand::Is as u8);
        payload.extend(name.bytes().map(|b| b.to_ascii_uppercase()));
        payload
    }
}

impl OptionHandler for TerminalTypeOption {
    fn option(&self) -> TelnetOption {
        TelnetOption::TERMINAL_TYPE
    }

    fn handle_subnegotiation(&mut self, data: &[u8]) -> Result<Option<Vec<u8>>, OptionError> {
        match data.first() {
            Some(&cmd) if cmd == SubNegotiationCommand::Send as u8 => Ok(Some(self.advance())),
            Some(&cmd) => Err(OptionError::UnsupportedCommand(cmd)),
            None => Err(OptionError::InvalidData(
                "Empty terminal type data".to_string(),
            )),
        }
    }

    fn reset(&mut self) {
        self.next = 0;
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEND: &[u8] = &[1];

    #[test]
    fn test_cycles_names_and_repeats_last() {
        let mut ttype = TerminalTypeOption::new(["fuzzball", "ansi"]);

        assert_eq!(
            ttype.handle_subnegotiation(SEND).unwrap(),
            Some(b"\0FUZZBALL".to_vec())
        );
        assert_eq!(
            ttype.handle_subnegotiation(SEND).unwrap(),
            Some(b"\0ANSI".to_vec())
        );
        // End of list: the last name again
        assert_eq!(
            ttype.handle_subnegotiation(SEND).unwrap(),
            Some(b"\0ANSI".to_vec())
        );

        ttype.reset();
        assert_eq!(ttype.current(), "fuzzball");
    }

    #[test]
    fn test_rejects_other_commands() {
        let mut ttype = TerminalTypeOption::new(["ansi"]);

        assert_eq!(
            ttype.handle_subnegotiation(&[0, b'X']),
            Err(OptionError::UnsupportedCommand(0))
        );
        assert!(matches!(
            ttype.handle_subnegotiation(&[]),
            Err(OptionError::InvalidData(_))
        ));
    }

    #[test]
    fn test_empty_name_list_falls_back() {
        let ttype = TerminalTypeOption::new(Vec::<String>::new());
        assert_eq!(ttype.names(), ["UNKNOWN".to_string()]);
    }
}
