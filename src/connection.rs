use std::io::{self, ErrorKind, Read, Write};
use std::time::{Duration, Instant};
use telnet_negotiation::{TelnetStream, WindowSize};

use crate::ansi::strip_ansi;
use crate::config::ClientConfig;
use crate::errors::{MuckError, MuckResult};
use crate::line::LineBuffer;
use crate::transport::{NetTransport, Transport};

/// What Fuzzball says when `connect <user> <password>` fails
const LOGIN_FAILED: &str = "either that player does not exist";

/// Smallest timeout handed to the socket; zero means "block" to std
const MIN_TIMEOUT: Duration = Duration::from_millis(1);

/// Result of a timed read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming<T> {
    Data(T),
    /// Nothing arrived before the timeout
    Idle,
    /// The server closed the connection
    Closed,
}

impl<T> Incoming<T> {
    pub fn data(self) -> Option<T> {
        match self {
            Incoming::Data(data) => Some(data),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Incoming::Closed)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Incoming<U> {
        match self {
            Incoming::Data(data) => Incoming::Data(f(data)),
            Incoming::Idle => Incoming::Idle,
            Incoming::Closed => Incoming::Closed,
        }
    }
}

/// A line-oriented connection to a MUCK
///
/// Telnet negotiation is handled underneath; callers only see text. Raw and
/// line reads may be mixed freely since both are served from one buffer.
pub struct MuckConnection<T: Transport> {
    stream: Option<TelnetStream<T>>,
    lines: LineBuffer,
    eof: bool,
    strip_ansi: bool,
    read_chunk: usize,
    login_timeout: Duration,
}

impl MuckConnection<NetTransport> {
    pub fn connect(config: &ClientConfig) -> MuckResult<Self> {
        let transport = NetTransport::connect(&config.server, config.timeouts.connect())?;
        Ok(Self::from_transport(transport, config))
    }
}

impl<T: Transport> MuckConnection<T> {
    pub fn from_transport(transport: T, config: &ClientConfig) -> Self {
        let terminal = &config.terminal;
        let stream = TelnetStream::new(transport)
            .with_terminal_types(terminal.terminal_types.iter().cloned())
            .with_window_size(WindowSize::new(terminal.width, terminal.height));

        Self {
            stream: Some(stream),
            lines: LineBuffer::new(terminal.max_line_length),
            eof: false,
            strip_ansi: terminal.strip_ansi,
            read_chunk: terminal.read_chunk,
            login_timeout: config.timeouts.login(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some() && !self.eof
    }

    pub fn set_strip_ansi(&mut self, strip: bool) {
        self.strip_ansi = strip;
    }

    /// True while the server has turned local echo off, e.g. for a password
    pub fn server_echo(&self) -> bool {
        self.stream.as_ref().is_some_and(TelnetStream::server_echo)
    }

    pub fn set_window_size(&mut self, width: u16, height: u16) -> MuckResult<()> {
        self.stream_mut()?
            .set_window_size(WindowSize::new(width, height))?;
        Ok(())
    }

    /// Raw bytes, at most `max`; `Idle` if nothing arrives within `timeout`
    pub fn read(&mut self, max: usize, timeout: Option<Duration>) -> MuckResult<Incoming<Vec<u8>>> {
        if self.stream.is_none() {
            return Err(MuckError::NotConnected);
        }

        if self.lines.is_empty() && !self.eof {
            match self.fill(timeout)? {
                Incoming::Idle => return Ok(Incoming::Idle),
                Incoming::Closed | Incoming::Data(()) => {}
            }
        }

        if self.lines.is_empty() {
            return Ok(Incoming::Closed);
        }
        Ok(Incoming::Data(self.lines.take_bytes(max)))
    }

    /// Next line without its terminator, undecoded
    ///
    /// A trailing unterminated line is delivered once the server closes the
    /// connection, then `Closed`.
    pub fn read_raw_line(&mut self, timeout: Option<Duration>) -> MuckResult<Incoming<Vec<u8>>> {
        if self.stream.is_none() {
            return Err(MuckError::NotConnected);
        }

        let deadline = timeout.map(|t| Instant::now() + t);
        let mut polled = false;
        loop {
            if let Some(line) = self.lines.next_line() {
                return Ok(Incoming::Data(line));
            }

            if self.eof {
                return Ok(match self.lines.take_partial() {
                    Some(partial) => Incoming::Data(partial),
                    None => Incoming::Closed,
                });
            }

            // Always poll the transport once, even with a zero timeout
            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            if polled && remaining.is_some_and(|r| r.is_zero()) {
                return Ok(Incoming::Idle);
            }
            polled = true;
            if let Incoming::Idle = self.fill(remaining)? {
                return Ok(Incoming::Idle);
            }
        }
    }

    /// Next line decoded as UTF-8 (invalid bytes replaced), ANSI codes
    /// stripped if configured; blank lines come back as empty strings
    pub fn read_line(&mut self, timeout: Option<Duration>) -> MuckResult<Incoming<String>> {
        let strip = self.strip_ansi;
        Ok(self.read_raw_line(timeout)?.map(|raw| {
            let bytes = if strip { strip_ansi(&raw) } else { raw.as_slice().into() };
            String::from_utf8_lossy(&bytes).into_owned()
        }))
    }

    /// Push `line` back so the next read returns it first
    pub fn unread_line(&mut self, line: impl Into<String>) {
        self.lines.push_front(line.into().into_bytes());
    }

    /// Read lines until the server has been quiet for `quiet`
    pub fn drain(&mut self, quiet: Duration) -> MuckResult<Vec<String>> {
        let mut drained = Vec::new();
        while let Incoming::Data(line) = self.read_line(Some(quiet))? {
            drained.push(line);
        }
        Ok(drained)
    }

    pub fn write(&mut self, data: &[u8]) -> MuckResult<()> {
        let stream = self.stream_mut()?;
        stream.write_all(data)?;
        stream.flush()?;
        Ok(())
    }

    /// Send one line of input; CRLF is appended
    pub fn write_line(&mut self, line: &str) -> MuckResult<()> {
        if line.contains(['\r', '\n']) {
            return Err(MuckError::InvalidArgument(
                "a line cannot contain CR or LF".to_string(),
            ));
        }

        tracing::trace!("> {}", line);
        let mut data = Vec::with_capacity(line.len() + 2);
        data.extend_from_slice(line.as_bytes());
        data.extend_from_slice(b"\r\n");
        self.write(&data)
    }

    /// Log in as `user`; false if the server rejects the name or password
    ///
    /// On success the first line of the server's reply is kept for the next
    /// read.
    pub fn login(&mut self, user: &str, password: &str) -> MuckResult<bool> {
        if user.contains(char::is_whitespace) || user.is_empty() {
            return Err(MuckError::InvalidArgument(format!(
                "'{}' is not a valid character name",
                user
            )));
        }

        self.write_line(&format!("connect {} {}", user, password))?;

        let deadline = Instant::now() + self.login_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.read_line(Some(remaining.max(MIN_TIMEOUT)))? {
                Incoming::Data(line) if line.trim().is_empty() => {
                    if remaining.is_zero() {
                        return Err(MuckError::Timeout("login response".to_string()));
                    }
                }
                Incoming::Data(line) => {
                    if line.to_lowercase().contains(LOGIN_FAILED) {
                        tracing::info!("Login as {} rejected", user);
                        return Ok(false);
                    }
                    tracing::info!("Logged in as {}", user);
                    self.unread_line(line);
                    return Ok(true);
                }
                Incoming::Idle => return Err(MuckError::Timeout("login response".to_string())),
                Incoming::Closed => return Err(MuckError::Disconnected),
            }
        }
    }

    /// Say goodbye with `QUIT`, then close
    pub fn quit(&mut self) -> MuckResult<()> {
        if self.stream.is_some() && !self.eof {
            match self.write_line("QUIT") {
                Ok(()) | Err(MuckError::Disconnected) => {}
                Err(e) => {
                    self.close();
                    return Err(e);
                }
            }
        }
        self.close();
        Ok(())
    }

    /// Drop the connection without sending anything
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let mut transport = stream.into_inner();
            if let Err(e) = transport.shutdown() {
                tracing::debug!("Shutdown after close: {}", e);
            }
            tracing::info!("Connection closed");
        }
        self.lines.clear();
    }

    /// The transport underneath the telnet layer
    pub fn transport(&self) -> Option<&T> {
        self.stream.as_ref().map(TelnetStream::get_ref)
    }

    fn stream_mut(&mut self) -> MuckResult<&mut TelnetStream<T>> {
        self.stream.as_mut().ok_or(MuckError::NotConnected)
    }

    /// One read from the transport into the line buffer
    fn fill(&mut self, timeout: Option<Duration>) -> MuckResult<Incoming<()>> {
        let chunk = self.read_chunk;
        let stream = self.stream_mut()?;
        stream
            .get_ref()
            .set_read_timeout(timeout.map(|t| t.max(MIN_TIMEOUT)))?;

        let mut buf = vec![0u8; chunk];
        let result = loop {
            match stream.read(&mut buf) {
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                other => break other,
            }
        };

        match result {
            Ok(0) => {
                self.mark_eof();
                Ok(Incoming::Closed)
            }
            Ok(n) => {
                self.lines.push(&buf[..n]);
                Ok(Incoming::Data(()))
            }
            Err(e) if is_timeout(&e) => Ok(Incoming::Idle),
            Err(e) if is_disconnect(&e) => {
                tracing::debug!("Read failed, treating as close: {}", e);
                self.mark_eof();
                Ok(Incoming::Closed)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn mark_eof(&mut self) {
        if !self.eof {
            tracing::info!("Server closed the connection");
        }
        self.eof = true;
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
    )
}
