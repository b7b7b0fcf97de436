use clap::Parser;
use crossterm::{
    QueueableCommand,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::io::{self, BufRead, Stdout, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;

use fuzzball::logging::init_logger;
use fuzzball::{
    ClientConfig, Incoming, McpEvent, McpSession, MuckConnection, MuckResult, NetTransport,
};

/// Interactive client for Fuzzball MUCK servers
#[derive(Parser, Debug)]
#[command(name = "fuzzball", version, about)]
struct Cli {
    /// Configuration file, created with defaults if missing
    #[arg(long, default_value = "fuzzball.toml")]
    config: PathBuf,

    #[arg(long, env = "MUCK_HOST")]
    host: Option<String>,

    #[arg(long, env = "MUCK_PORT")]
    port: Option<u16>,

    /// Connect with TLS
    #[arg(long)]
    tls: bool,

    /// Accept any TLS certificate
    #[arg(long)]
    insecure: bool,

    /// Character to connect as
    #[arg(long, env = "MUCK_USER", requires = "password")]
    user: Option<String>,

    #[arg(long, env = "MUCK_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Skip the MCP handshake and treat everything as plain text
    #[arg(long)]
    no_mcp: bool,

    /// MCP package to negotiate; repeatable
    #[arg(long = "package", value_name = "NAME[:MIN:MAX]")]
    packages: Vec<String>,

    /// Print one JSON object per event instead of coloured text
    #[arg(long)]
    json: bool,

    /// Remove ANSI colour codes from server output
    #[arg(long)]
    strip_ansi: bool,

    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply(&self, config: &mut ClientConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if self.tls {
            config.server.use_tls = true;
        }
        if self.insecure {
            config.server.ignore_tls_cert = true;
        }
        if self.no_mcp {
            config.mcp.enabled = false;
        }
        if self.strip_ansi {
            config.terminal.strip_ansi = true;
        }
        config.mcp.packages.extend(self.packages.iter().cloned());
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match ClientConfig::load_from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {}. Using defaults.", e);
            ClientConfig::default()
        }
    };
    cli.apply(&mut config);
    init_logger(&config.logging, cli.verbose);

    if let Err(e) = config.validate() {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match run(&cli, &config) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, config: &ClientConfig) -> MuckResult<ExitCode> {
    let mut printer = Printer::new(cli.json);

    let mut client = if config.mcp.enabled {
        let mut session = McpSession::connect(config)?;
        for line in session.welcome_text() {
            printer.event(&McpEvent::Text(line.clone()))?;
        }

        if !config.mcp.packages.is_empty() {
            let packages: Vec<&str> = config.mcp.packages.iter().map(String::as_str).collect();
            session.negotiate(&packages)?;
        }
        Client::Mcp(Box::new(session))
    } else {
        Client::Plain(MuckConnection::connect(config)?)
    };

    if let (Some(user), Some(password)) = (&cli.user, &cli.password) {
        if !client.login(user, password)? {
            printer.notice("Login rejected: no such character or wrong password", Color::Red)?;
            client.quit()?;
            return Ok(ExitCode::FAILURE);
        }
    }

    let input = spawn_stdin_reader();
    let idle = config.timeouts.idle_poll();

    loop {
        let (events, closed) = client.poll(idle)?;
        for event in &events {
            printer.event(event)?;
        }
        if closed {
            printer.notice("Connection closed by server", Color::Yellow)?;
            return Ok(ExitCode::SUCCESS);
        }

        if !forward_input(&input, &mut client)? {
            client.quit()?;
            printer.notice("Disconnected", Color::Yellow)?;
            return Ok(ExitCode::SUCCESS);
        }
    }
}

/// Send pending stdin lines; false once the user quits or stdin ends
fn forward_input(input: &Receiver<String>, client: &mut Client) -> MuckResult<bool> {
    loop {
        match input.try_recv() {
            Ok(line) if line.trim().eq_ignore_ascii_case("QUIT") => return Ok(false),
            Ok(line) => client.write_line(&line)?,
            Err(TryRecvError::Empty) => return Ok(true),
            Err(TryRecvError::Disconnected) => return Ok(false),
        }
    }
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("Stopped reading stdin: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

enum Client {
    Plain(MuckConnection<NetTransport>),
    Mcp(Box<McpSession<NetTransport>>),
}

impl Client {
    fn login(&mut self, user: &str, password: &str) -> MuckResult<bool> {
        match self {
            Client::Plain(conn) => conn.login(user, password),
            Client::Mcp(session) => session.login(user, password),
        }
    }

    fn write_line(&mut self, line: &str) -> MuckResult<()> {
        match self {
            Client::Plain(conn) => conn.write_line(line),
            Client::Mcp(session) => session.write_line(line),
        }
    }

    fn quit(&mut self) -> MuckResult<()> {
        match self {
            Client::Plain(conn) => conn.quit(),
            Client::Mcp(session) => session.quit(),
        }
    }

    /// Everything received until the server goes quiet, and whether it closed
    fn poll(&mut self, idle: Duration) -> MuckResult<(Vec<McpEvent>, bool)> {
        match self {
            Client::Mcp(session) => {
                let processed = session.process()?;
                let closed = processed.is_closed();
                Ok((processed.into_events(), closed))
            }
            Client::Plain(conn) => {
                let mut events = Vec::new();
                loop {
                    match conn.read_line(Some(idle))? {
                        Incoming::Data(line) => events.push(McpEvent::Text(line)),
                        Incoming::Idle => return Ok((events, false)),
                        Incoming::Closed => return Ok((events, true)),
                    }
                }
            }
        }
    }
}

struct Printer {
    json: bool,
    out: Stdout,
}

impl Printer {
    fn new(json: bool) -> Self {
        Self {
            json,
            out: io::stdout(),
        }
    }

    fn event(&mut self, event: &McpEvent) -> io::Result<()> {
        if self.json {
            let line = serde_json::to_string(event)?;
            writeln!(self.out, "{}", line)?;
            return self.out.flush();
        }

        match event {
            McpEvent::Text(text) => {
                self.out.queue(Print(text))?;
                self.out.queue(Print("\n"))?;
            }
            McpEvent::Message(message) => {
                self.out.queue(SetForegroundColor(Color::Cyan))?;
                self.out.queue(Print(format!("[mcp] {}", message.name())))?;
                for (key, value) in &message.args {
                    let rendered = serde_json::to_string(value)?;
                    self.out.queue(Print(format!(" {}={}", key, rendered)))?;
                }
                self.out.queue(Print("\n"))?;
                self.out.queue(ResetColor)?;
            }
            McpEvent::Unrecognized { line, reason } => {
                self.out.queue(SetForegroundColor(Color::DarkYellow))?;
                self.out.queue(Print(format!("[mcp?] {} ({})\n", line, reason)))?;
                self.out.queue(ResetColor)?;
            }
        }
        self.out.flush()
    }

    fn notice(&mut self, text: &str, color: Color) -> io::Result<()> {
        if self.json {
            let notice = serde_json::json!({ "type": "notice", "data": text });
            writeln!(self.out, "{}", notice)?;
            return self.out.flush();
        }

        self.out.queue(SetForegroundColor(color))?;
        self.out.queue(Print(format!("*** {}\n", text)))?;
        self.out.queue(ResetColor)?;
        self.out.flush()
    }
}
