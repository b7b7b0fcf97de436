use indexmap::IndexMap;
use std::time::{Duration, Instant};

use super::assembler::MultilineAssembler;
use super::catalog::{Catalog, MCP_PACKAGE, PackageRequest};
use super::events::{EventHandlers, McpEvent, Processed};
use super::message::{McpArgs, McpMessage, McpValue, encode, generate_tag};
use super::parser::{McpLine, RawMessage, parse_line};
use super::version::{McpVersion, PROTOCOL_VERSION, VersionRange};
use crate::config::ClientConfig;
use crate::connection::{Incoming, MuckConnection};
use crate::errors::{MuckError, MuckResult};
use crate::transport::{NetTransport, Transport};

const NEGOTIATE_PACKAGE: &str = "mcp-negotiate";

/// An authenticated MCP 2.1 session on top of a MUCK connection
pub struct McpSession<T: Transport> {
    conn: MuckConnection<T>,
    auth_key: String,
    server_range: VersionRange,
    catalog: Catalog,
    /// `None` until `negotiate` has run
    negotiated: Option<IndexMap<String, VersionRange>>,
    assembler: MultilineAssembler,
    handlers: EventHandlers,
    welcome: Vec<String>,
    /// Lines read during the handshake that belong to `process`
    backlog: Vec<String>,
    idle_poll: Duration,
    multiline_timeout: Duration,
}

impl McpSession<NetTransport> {
    pub fn connect(config: &ClientConfig) -> MuckResult<Self> {
        let conn = MuckConnection::connect(config)?;
        Self::establish(conn, config)
    }
}

impl<T: Transport> McpSession<T> {
    /// Run the MCP handshake with a fresh random authentication key
    pub fn establish(conn: MuckConnection<T>, config: &ClientConfig) -> MuckResult<Self> {
        Self::establish_with_key(conn, config, generate_tag())
    }

    pub fn establish_with_key(
        mut conn: MuckConnection<T>,
        config: &ClientConfig,
        auth_key: impl Into<String>,
    ) -> MuckResult<Self> {
        let auth_key = auth_key.into();
        if auth_key.is_empty() || auth_key.contains(char::is_whitespace) {
            return Err(MuckError::InvalidArgument(
                "authentication key must be a single non-empty token".to_string(),
            ));
        }

        let mut welcome = Vec::new();
        let banner = read_banner(&mut conn, config, &mut welcome)?;
        let server_range = check_banner(&banner)?;
        tracing::info!("Server speaks MCP {}", server_range);

        let mut args = McpArgs::new();
        args.insert("authentication-key".to_string(), auth_key.clone().into());
        args.insert("version".to_string(), PROTOCOL_VERSION.to_string().into());
        args.insert("to".to_string(), PROTOCOL_VERSION.to_string().into());
        conn.write(encode(MCP_PACKAGE, None, &args, "")?.as_bytes())?;

        let mut session = Self {
            conn,
            auth_key,
            server_range,
            catalog: Catalog::new(),
            negotiated: None,
            assembler: MultilineAssembler::new(),
            handlers: EventHandlers::new(),
            welcome,
            backlog: Vec::new(),
            idle_poll: config.timeouts.idle_poll(),
            multiline_timeout: config.timeouts.multiline(),
        };
        session.read_catalog(config.timeouts.negotiate())?;
        tracing::info!(
            "MCP session ready; server offers {} package(s)",
            session.catalog.len()
        );

        Ok(session)
    }

    fn read_catalog(&mut self, timeout: Duration) -> MuckResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(MuckError::Timeout("MCP package negotiation".to_string()));
            }

            let line = match self.conn.read_line(Some(remaining))? {
                Incoming::Data(line) => line,
                Incoming::Idle => {
                    return Err(MuckError::Timeout("MCP package negotiation".to_string()));
                }
                Incoming::Closed => return Err(MuckError::Disconnected),
            };

            let message = match parse_line(&line) {
                Ok(McpLine::Message(message)) if self.key_matches(&message) => message,
                _ => {
                    self.backlog.push(line);
                    continue;
                }
            };

            match message.name.as_str() {
                "mcp-negotiate-can" => match negotiate_can_range(&message) {
                    Some((package, range)) => self.catalog.record(package, range),
                    None => {
                        tracing::warn!("Ignoring malformed package offer: {}", line);
                    }
                },
                "mcp-negotiate-end" => return Ok(()),
                _ => self.backlog.push(line),
            }
        }
    }

    fn key_matches(&self, message: &RawMessage) -> bool {
        message.auth_key.as_deref() == Some(self.auth_key.as_str())
    }

    pub fn auth_key(&self) -> &str {
        &self.auth_key
    }

    /// The MCP version range from the server's banner
    pub fn server_range(&self) -> VersionRange {
        self.server_range
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Text the server sent before its MCP banner
    pub fn welcome_text(&self) -> &[String] {
        &self.welcome
    }

    /// Packages negotiated so far, with the range announced for each
    pub fn negotiated(&self) -> Option<&IndexMap<String, VersionRange>> {
        self.negotiated.as_ref()
    }

    /// Tell the server which packages this client supports
    ///
    /// Entries are `name` or `name:min:max`. Can only be done once per
    /// session; `mcp-negotiate` is included whenever the server offers it.
    pub fn negotiate(&mut self, packages: &[&str]) -> MuckResult<()> {
        let requests = packages
            .iter()
            .map(|text| PackageRequest::parse(text))
            .collect::<Result<Vec<_>, _>>()?;
        self.negotiate_requests(requests)
    }

    pub fn negotiate_requests(&mut self, requests: Vec<PackageRequest>) -> MuckResult<()> {
        if self.negotiated.is_some() {
            return Err(MuckError::AlreadyNegotiated);
        }

        let mut requests = requests;
        if self.catalog.contains(NEGOTIATE_PACKAGE)
            && !requests.iter().any(|r| r.name == NEGOTIATE_PACKAGE)
        {
            requests.insert(0, PackageRequest::new(NEGOTIATE_PACKAGE));
        }

        let mut chosen = IndexMap::new();
        for request in &requests {
            let offered = self
                .catalog
                .get(&request.name)
                .filter(|_| request.name != MCP_PACKAGE)
                .ok_or_else(|| MuckError::PackageUnavailable(request.name.clone()))?;

            let range = match request.range {
                Some(wanted) => {
                    if wanted.intersect(&offered).is_none() {
                        return Err(MuckError::VersionMismatch {
                            package: request.name.clone(),
                            detail: format!("server offers {}, requested {}", offered, wanted),
                        });
                    }
                    wanted
                }
                None => offered,
            };
            chosen.insert(request.name.clone(), range);
        }

        let mut wire = String::new();
        for (package, range) in &chosen {
            let mut args = McpArgs::new();
            args.insert("package".to_string(), package.clone().into());
            args.insert("min-version".to_string(), range.min.to_string().into());
            args.insert("max-version".to_string(), range.max.to_string().into());
            wire.push_str(&encode("mcp-negotiate-can", Some(&self.auth_key), &args, "")?);
        }
        wire.push_str(&encode("mcp-negotiate-end", Some(&self.auth_key), &McpArgs::new(), "")?);
        self.conn.write(wire.as_bytes())?;

        tracing::info!(
            "Negotiated packages: {}",
            chosen.keys().map(String::as_str).collect::<Vec<_>>().join(", ")
        );
        self.negotiated = Some(chosen);
        Ok(())
    }

    /// Send `package-message` with `args`
    ///
    /// If nothing has been negotiated yet, `package` is negotiated on its
    /// own first.
    pub fn call<I, K, V>(&mut self, package: &str, message: &str, args: I) -> MuckResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<McpValue>,
    {
        self.call_with_versions(package, message, args, None, None)
    }

    /// Like `call`, with an explicit version range for the automatic
    /// negotiation; `min` and `max` go together
    pub fn call_with_versions<I, K, V>(
        &mut self,
        package: &str,
        message: &str,
        args: I,
        min: Option<McpVersion>,
        max: Option<McpVersion>,
    ) -> MuckResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<McpValue>,
    {
        let package = package.to_ascii_lowercase();
        let request = match (min, max) {
            (Some(min), Some(max)) => PackageRequest::with_range(package.clone(), min, max),
            (None, None) => PackageRequest::new(package.clone()),
            _ => {
                return Err(MuckError::InvalidArgument(
                    "min and max versions must be given together".to_string(),
                ));
            }
        };

        if package != MCP_PACKAGE {
            if self.negotiated.is_none() {
                self.negotiate_requests(vec![request])?;
            } else if !self
                .negotiated
                .as_ref()
                .is_some_and(|negotiated| negotiated.contains_key(&package))
            {
                return Err(MuckError::PackageNotNegotiated(package));
            }
        }

        let name = if message.is_empty() {
            package
        } else {
            format!("{}-{}", package, message)
        };
        let args: McpArgs = args
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();

        tracing::debug!("Calling {} with {} argument(s)", name, args.len());
        let wire = encode(&name, Some(&self.auth_key), &args, &generate_tag())?;
        self.conn.write(wire.as_bytes())
    }

    /// Register a handler for messages of one package
    pub fn on<F>(&mut self, package: &str, handler: F)
    where
        F: FnMut(&McpMessage) + Send + 'static,
    {
        self.handlers.on(package, handler);
    }

    pub fn on_any<F>(&mut self, handler: F)
    where
        F: FnMut(&McpMessage) + Send + 'static,
    {
        self.handlers.on_any(handler);
    }

    /// Read everything the server has sent until it goes quiet
    ///
    /// Handlers run as each message completes. An unfinished multi-line
    /// message extends the wait up to the multi-line timeout; if it still
    /// has not ended it is reported as unrecognized.
    pub fn process(&mut self) -> MuckResult<Processed> {
        let mut processed = Processed::default();

        for line in std::mem::take(&mut self.backlog) {
            self.handle_line(line, &mut processed);
        }

        // Set on the first quiet period with a multi-line message still open
        let mut multiline_deadline: Option<Instant> = None;
        let mut timed_out = false;
        loop {
            if !self.assembler.is_pending() {
                multiline_deadline = None;
            }
            let timeout = match multiline_deadline {
                Some(deadline) => deadline
                    .saturating_duration_since(Instant::now())
                    .min(self.idle_poll),
                None => self.idle_poll,
            };

            match self.conn.read_line(Some(timeout))? {
                Incoming::Data(line) => self.handle_line(line, &mut processed),
                Incoming::Closed => {
                    processed.mark_closed();
                    break;
                }
                Incoming::Idle => {
                    if !self.assembler.is_pending() {
                        break;
                    }
                    match multiline_deadline {
                        None => multiline_deadline = Some(Instant::now() + self.multiline_timeout),
                        Some(deadline) if Instant::now() >= deadline => {
                            timed_out = true;
                            break;
                        }
                        Some(_) => {}
                    }
                }
            }
        }

        if processed.is_closed() || timed_out {
            for (line, message) in self.assembler.abandon_all() {
                tracing::warn!("Multi-line message {} never finished", message.name());
                processed.push(McpEvent::Unrecognized {
                    line,
                    reason: "multi-line message never finished".to_string(),
                });
            }
        }

        Ok(processed)
    }

    fn handle_line(&mut self, line: String, processed: &mut Processed) {
        let unrecognized = |line: String, reason: String| {
            tracing::debug!("Unrecognized MCP line ({}): {}", reason, line);
            McpEvent::Unrecognized { line, reason }
        };

        let parsed = match parse_line(&line) {
            Ok(parsed) => parsed,
            Err(e) => {
                processed.push(unrecognized(line, e.to_string()));
                return;
            }
        };

        match parsed {
            McpLine::Text(text) => processed.push(McpEvent::Text(text)),

            McpLine::Continuation { tag, key, value } => {
                if let Err(e) = self.assembler.continuation(&tag, &key, value) {
                    processed.push(unrecognized(line, e.to_string()));
                }
            }

            McpLine::End { tag } => match self.assembler.end(&tag) {
                Ok(message) => self.deliver(message, processed),
                Err(e) => processed.push(unrecognized(line, e.to_string())),
            },

            McpLine::Message(raw) => {
                if !self.key_matches(&raw) {
                    let reason = match raw.auth_key {
                        Some(_) => "wrong authentication key",
                        None => "missing authentication key",
                    };
                    processed.push(unrecognized(line, reason.to_string()));
                    return;
                }

                let Some((package, message)) = self.catalog.resolve(&raw.name) else {
                    processed.push(unrecognized(line, "package not in catalog".to_string()));
                    return;
                };

                tracing::trace!("< {}", raw.name);
                let data_tag = raw.data_tag.clone();
                let is_multiline = raw.args.values().any(McpValue::is_multiline);
                let message = McpMessage::new(package, message, raw.args);

                match data_tag {
                    Some(tag) if is_multiline => self.assembler.start(&tag, line, message),
                    _ => self.deliver(message, processed),
                }
            }
        }
    }

    fn deliver(&mut self, message: McpMessage, processed: &mut Processed) {
        self.handlers.dispatch(&message);
        processed.push(McpEvent::Message(message));
    }

    pub fn login(&mut self, user: &str, password: &str) -> MuckResult<bool> {
        self.conn.login(user, password)
    }

    pub fn write_line(&mut self, line: &str) -> MuckResult<()> {
        self.conn.write_line(line)
    }

    pub fn quit(&mut self) -> MuckResult<()> {
        self.conn.quit()
    }

    pub fn close(&mut self) {
        self.conn.close();
    }

    pub fn connection(&self) -> &MuckConnection<T> {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut MuckConnection<T> {
        &mut self.conn
    }

    pub fn into_connection(self) -> MuckConnection<T> {
        self.conn
    }
}

/// Look for `#$#mcp version: ... to: ...` among the first few lines
fn read_banner<T: Transport>(
    conn: &mut MuckConnection<T>,
    config: &ClientConfig,
    welcome: &mut Vec<String>,
) -> MuckResult<RawMessage> {
    let attempts = config.mcp.banner_attempts;
    let mut saw_data = false;

    for _ in 0..attempts {
        let line = match conn.read_line(Some(config.timeouts.banner()))? {
            Incoming::Data(line) => line,
            Incoming::Idle => continue,
            Incoming::Closed => return Err(MuckError::Disconnected),
        };
        saw_data = true;

        match parse_line(&line) {
            Ok(McpLine::Message(message)) if message.name == MCP_PACKAGE => return Ok(message),
            Ok(McpLine::Text(text)) => welcome.push(text),
            _ => welcome.push(line),
        }
    }

    if saw_data {
        Err(MuckError::Handshake(format!(
            "no MCP banner in the first {} line(s)",
            attempts
        )))
    } else {
        Err(MuckError::Timeout("MCP banner".to_string()))
    }
}

fn check_banner(banner: &RawMessage) -> MuckResult<VersionRange> {
    let version = |key: &str| -> MuckResult<McpVersion> {
        let text = banner
            .text(key)
            .ok_or_else(|| MuckError::Handshake(format!("banner has no '{}' argument", key)))?;
        Ok(McpVersion::parse(text)?)
    };

    let server_min = version("version")?;
    let server_max = version("to")?;
    if server_min > PROTOCOL_VERSION || server_max < PROTOCOL_VERSION {
        return Err(MuckError::UnsupportedVersion {
            server_min,
            server_max,
            ours: PROTOCOL_VERSION,
        });
    }
    Ok(VersionRange::new(server_min, server_max))
}

fn negotiate_can_range(message: &RawMessage) -> Option<(String, VersionRange)> {
    let package = message.text("package")?;
    let min = McpVersion::parse(message.text("min-version")?).ok()?;
    let max = McpVersion::parse(message.text("max-version")?).ok()?;
    Some((package.to_string(), VersionRange::new(min, max)))
}
