//! # TelnetStream - Transparent Telnet Protocol Wrapper
//!
//! `TelnetStream` wraps any `Read + Write` byte stream (a `TcpStream`, a TLS
//! stream, an in-memory test double) and speaks the client half of Telnet:
//!
//! - reads return application data only, with command sequences removed;
//! - negotiation requests from the server are answered automatically
//!   following RFC 1143 and the configured [`OptionPolicy`];
//! - TERMINAL-TYPE and NAWS sub-negotiations are answered by their handlers;
//! - writes double any IAC byte in the data.
//!
//! ```rust,no_run
//! use telnet_negotiation::{TelnetStream, WindowSize};
//! use std::io::{Read, Write};
//! use std::net::TcpStream;
//!
//! fn main() -> std::io::Result<()> {
//!     let tcp = TcpStream::connect("127.0.0.1:4201")?;
//!     let mut stream = TelnetStream::new(tcp)
//!         .with_terminal_types(["fuzzball", "ansi"])
//!         .with_window_size(WindowSize::new(80, 24));
//!
//!     stream.write_all(b"WHO\r\n")?;
//!     let mut buffer = [0; 1024];
//!     let n = stream.read(&mut buffer)?;
//!     // buffer[..n] contains only application data
//!     Ok(())
//! }
//! ```

use crate::negotiation::{OptionNegotiator, OptionPolicy, Side};
use crate::options::{NawsOption, OptionHandler, TerminalTypeOption, WindowSize};
use crate::parser::TelnetParser;
use crate::protocol::{TelnetCommand, TelnetOption, TelnetSequence, escape_iac};
use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Write};

/// A wrapper around a byte stream that handles Telnet protocol automatically
pub struct TelnetStream<S> {
    inner: S,
    parser: TelnetParser,
    negotiator: OptionNegotiator,
    handlers: HashMap<TelnetOption, Box<dyn OptionHandler>>,
    /// Clean application data not yet handed to the reader
    data_buffer: VecDeque<u8>,
}

impl<S: Read + Write> TelnetStream<S> {
    /// Wrap `inner` with the default client policy: the server may echo and
    /// suppress go-ahead, every other option is refused.
    pub fn new(inner: S) -> Self {
        Self::with_policy(inner, OptionPolicy::default())
    }

    pub fn with_policy(inner: S, policy: OptionPolicy) -> Self {
        Self {
            inner,
            parser: TelnetParser::new(),
            negotiator: OptionNegotiator::new(policy),
            handlers: HashMap::new(),
            data_buffer: VecDeque::new(),
        }
    }

    /// Answer TERMINAL-TYPE requests with `names`, most specific first
    pub fn with_terminal_types<I, T>(self, names: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.with_handler(Box::new(TerminalTypeOption::new(names)))
    }

    /// Report `size` when the server asks for NAWS
    pub fn with_window_size(self, size: WindowSize) -> Self {
        self.with_handler(Box::new(NawsOption::new(size)))
    }

    /// Register a handler and agree to enable its option on our side
    pub fn with_handler(mut self, handler: Box<dyn OptionHandler>) -> Self {
        self.register_handler(handler);
        self
    }

    pub fn register_handler(&mut self, handler: Box<dyn OptionHandler>) {
        let option = handler.option();
        self.negotiator.policy_mut().allow(Side::Local, option);
        self.handlers.insert(option, handler);
        tracing::debug!("Registered handler for option {:?}", option);
    }

    pub fn set_queue_enabled(&mut self, enabled: bool) {
        self.negotiator.set_queue_enabled(enabled);
    }

    pub fn is_option_enabled(&self, side: Side, option: TelnetOption) -> bool {
        self.negotiator.is_enabled(side, option)
    }

    /// True while the server has ECHO enabled, usually around password prompts
    pub fn server_echo(&self) -> bool {
        self.negotiator.is_enabled(Side::Remote, TelnetOption::ECHO)
    }

    /// Ask the server to enable an option (DO) or to let us enable one (WILL)
    pub fn request_enable(&mut self, side: Side, option: TelnetOption) -> io::Result<()> {
        let result = self.negotiator.request_enable(side, option);
        if let Some(error) = result.error {
            tracing::debug!("Enable request for {:?} ignored: {}", option, error);
        }
        self.send_optional(result.response)
    }

    pub fn request_disable(&mut self, side: Side, option: TelnetOption) -> io::Result<()> {
        let result = self.negotiator.request_disable(side, option);
        if let Some(error) = result.error {
            tracing::debug!("Disable request for {:?} ignored: {}", option, error);
        }
        self.send_optional(result.response)
    }

    /// Send a bare command such as NOP (keepalive) or AYT
    pub fn send_command(&mut self, command: TelnetCommand) -> io::Result<()> {
        self.send_sequence(&TelnetSequence::Command(command))
    }

    /// Update the window size, reporting it if NAWS is active
    pub fn set_window_size(&mut self, size: WindowSize) -> io::Result<()> {
        let payload = match self.naws_mut() {
            Some(naws) => naws.set_size(size),
            None => {
                self.register_handler(Box::new(NawsOption::new(size)));
                return Ok(());
            }
        };

        if self.negotiator.is_enabled(Side::Local, TelnetOption::NAWS) {
            self.send_sequence(&TelnetSequence::SubNegotiation {
                option: TelnetOption::NAWS,
                data: payload,
            })?;
        }
        Ok(())
    }

    pub fn window_size(&self) -> Option<WindowSize> {
        self.handlers
            .get(&TelnetOption::NAWS)
            .and_then(|h| h.as_any().downcast_ref::<NawsOption>())
            .map(NawsOption::window_size)
    }

    fn naws_mut(&mut self) -> Option<&mut NawsOption> {
        self.handlers
            .get_mut(&TelnetOption::NAWS)
            .and_then(|h| h.as_any_mut().downcast_mut::<NawsOption>())
    }

    /// Bytes of clean data already received but not yet read
    pub fn buffered(&self) -> usize {
        self.data_buffer.len()
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// **Warning**: writing through this bypasses IAC escaping
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Unwrap the stream; buffered data is lost
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn send_sequence(&mut self, sequence: &TelnetSequence) -> io::Result<()> {
        tracing::trace!("Sending {:?}", sequence);
        self.inner.write_all(&sequence.to_bytes())?;
        self.inner.flush()
    }

    fn send_optional(&mut self, sequence: Option<TelnetSequence>) -> io::Result<()> {
        match sequence {
            Some(sequence) => self.send_sequence(&sequence),
            None => Ok(()),
        }
    }

    /// Parse raw bytes from the wire, answering any negotiation they carry
    fn process_incoming(&mut self, raw: &[u8]) -> io::Result<()> {
        let parsed = self.parser.parse(raw);
        self.data_buffer.extend(parsed.data);

        for sequence in parsed.sequences {
            self.handle_sequence(sequence)?;
        }
        Ok(())
    }

    fn handle_sequence(&mut self, sequence: TelnetSequence) -> io::Result<()> {
        match sequence {
            TelnetSequence::Negotiation { command, option } => {
                let (side, result) = match command {
                    TelnetCommand::WILL => (Side::Remote, self.negotiator.handle_will(option)),
                    TelnetCommand::WONT => (Side::Remote, self.negotiator.handle_wont(option)),
                    TelnetCommand::DO => (Side::Local, self.negotiator.handle_do(option)),
                    TelnetCommand::DONT => (Side::Local, self.negotiator.handle_dont(option)),
                    other => {
                        tracing::debug!("Ignoring {:?} used as negotiation", other);
                        return Ok(());
                    }
                };

                tracing::debug!(
                    "Received {:?} {:?}; now enabled={} (response: {:?})",
                    command,
                    option,
                    result.enabled,
                    result.response
                );
                if let Some(error) = &result.error {
                    tracing::warn!("Negotiation error for {:?}: {}", option, error);
                }

                self.send_optional(result.response)?;

                if side == Side::Local && result.changed {
                    self.local_option_changed(option, result.enabled)?;
                }
            }

            TelnetSequence::SubNegotiation { option, data } => {
                let reply = match self.handlers.get_mut(&option) {
                    Some(handler) => handler.handle_subnegotiation(&data),
                    None => {
                        tracing::debug!("No handler for sub-negotiation of {:?}", option);
                        return Ok(());
                    }
                };

                match reply {
                    Ok(Some(data)) => {
                        self.send_sequence(&TelnetSequence::SubNegotiation { option, data })?;
                    }
                    Ok(None) => {}
                    // Option errors never take the connection down
                    Err(e) => tracing::warn!("Sub-negotiation error for {:?}: {}", option, e),
                }
            }

            TelnetSequence::Command(command) => {
                tracing::trace!("Received command {:?}", command);
            }
        }

        Ok(())
    }

    fn local_option_changed(&mut self, option: TelnetOption, enabled: bool) -> io::Result<()> {
        let Some(handler) = self.handlers.get_mut(&option) else {
            return Ok(());
        };

        if !enabled {
            handler.reset();
            return Ok(());
        }

        match handler.on_enabled() {
            Some(data) => self.send_sequence(&TelnetSequence::SubNegotiation { option, data }),
            None => Ok(()),
        }
    }
}

/// Reads return only clean application data
impl<S: Read + Write> Read for TelnetStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        // A chunk may hold only telnet commands; keep reading until data shows up
        let mut chunk = vec![0u8; buf.len()];
        while self.data_buffer.is_empty() {
            let n = self.inner.read(&mut chunk)?;
            if n == 0 {
                return Ok(0);
            }
            self.process_incoming(&chunk[..n])?;
        }

        let count = buf.len().min(self.data_buffer.len());
        for (slot, byte) in buf.iter_mut().zip(self.data_buffer.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }
}

/// Writes escape IAC bytes (RFC 854)
impl<S: Read + Write> Write for TelnetStream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write_all(&escape_iac(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Scripted server bytes in, everything written by the client recorded
    struct MockSocket {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl MockSocket {
        fn new(input: &[u8]) -> Self {
            Self {
                input: Cursor::new(input.to_vec()),
                output: Vec::new(),
            }
        }
    }

    impl Read for MockSocket {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for MockSocket {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn read_all<S: Read + Write>(stream: &mut TelnetStream<S>) -> Vec<u8> {
        let mut data = Vec::new();
        stream.read_to_end(&mut data).unwrap();
        data
    }

    #[test]
    fn test_read_filters_commands() {
        let mut stream = TelnetStream::new(MockSocket::new(&[
            b'h', b'i', 255, 241, b'!', 255, 255, b'\r', b'\n',
        ]));

        assert_eq!(read_all(&mut stream), vec![b'h', b'i', b'!', 255, b'\r', b'\n']);
        assert!(stream.get_ref().output.is_empty());
    }

    #[test]
    fn test_read_size_follows_caller_buffer() {
        let input = vec![b'x'; 10_000];
        let mut stream = TelnetStream::new(MockSocket::new(&input));

        let mut buf = vec![0u8; 8194];
        assert_eq!(stream.read(&mut buf).unwrap(), 8194);

        let mut small = [0u8; 16];
        assert_eq!(stream.read(&mut small).unwrap(), 16);
        assert_eq!(stream.get_ref().input.position(), 8194 + 16);
    }

    #[test]
    fn test_server_echo_is_accepted() {
        // IAC WILL ECHO "Password: "
        let mut input = vec![255, 251, 1];
        input.extend_from_slice(b"Password: ");
        let mut stream = TelnetStream::new(MockSocket::new(&input));

        assert_eq!(read_all(&mut stream), b"Password: ");
        assert!(stream.server_echo());
        assert_eq!(stream.get_ref().output, vec![255, 253, 1]); // IAC DO ECHO
    }

    #[test]
    fn test_unknown_option_is_refused() {
        let mut stream = TelnetStream::new(MockSocket::new(&[255, 253, 99, b'x']));

        assert_eq!(read_all(&mut stream), b"x");
        assert_eq!(stream.get_ref().output, vec![255, 252, 99]); // IAC WONT 99
    }

    #[test]
    fn test_naws_reported_when_enabled() {
        let mut stream = TelnetStream::new(MockSocket::new(&[255, 253, 31]))
            .with_window_size(WindowSize::new(80, 24));

        assert!(read_all(&mut stream).is_empty());
        assert_eq!(
            stream.get_ref().output,
            vec![255, 251, 31, 255, 250, 31, 0, 80, 0, 24, 255, 240]
        );

        stream.set_window_size(WindowSize::new(255, 50)).unwrap();
        assert!(
            stream
                .get_ref()
                .output
                .ends_with(&[255, 250, 31, 0, 255, 255, 0, 50, 255, 240])
        );
    }

    #[test]
    fn test_terminal_type_exchange() {
        // IAC DO TTYPE, IAC SB TTYPE SEND IAC SE
        let input = [255, 253, 24, 255, 250, 24, 1, 255, 240];
        let mut stream =
            TelnetStream::new(MockSocket::new(&input)).with_terminal_types(["ansi"]);

        read_all(&mut stream);

        let mut expected = vec![255, 251, 24, 255, 250, 24, 0];
        expected.extend_from_slice(b"ANSI");
        expected.extend_from_slice(&[255, 240]);
        assert_eq!(stream.get_ref().output, expected);
    }

    #[test]
    fn test_write_escapes_iac() {
        let mut stream = TelnetStream::new(MockSocket::new(&[]));
        let written = stream.write(&[100, 255, 200]).unwrap();

        assert_eq!(written, 3);
        assert_eq!(stream.get_ref().output, vec![100, 255, 255, 200]);
    }

    #[test]
    fn test_send_command() {
        let mut stream = TelnetStream::new(MockSocket::new(&[]));
        stream.send_command(TelnetCommand::NOP).unwrap();
        assert_eq!(stream.into_inner().output, vec![255, 241]);
    }
}
