//! # fuzzball
//!
//! A client library for Fuzzball-family MUCK servers.
//!
//! - [`MuckConnection`]: telnet-aware line stream with login, ANSI stripping
//!   and timed reads
//! - [`McpSession`]: MCP 2.1 handshake, package negotiation, calls and
//!   incoming message handling on top of a connection
//!
//! ```rust,no_run
//! use fuzzball::{ClientConfig, McpSession, MuckResult};
//!
//! fn main() -> MuckResult<()> {
//!     let config = ClientConfig::default();
//!     let mut session = McpSession::connect(&config)?;
//!     session.on("org-fuzzball-help", |message| println!("{:?}", message.args));
//!
//!     if session.login("Wizard", "potrzebie")? {
//!         session.call("org-fuzzball-help", "request", [("topic", "index")])?;
//!         let processed = session.process()?;
//!         for line in processed.text() {
//!             println!("{}", line);
//!         }
//!     }
//!     session.quit()
//! }
//! ```

pub mod ansi;
pub mod config;
pub mod connection;
pub mod errors;
pub mod line;
pub mod logging;
pub mod mcp;
pub mod transport;

pub use config::ClientConfig;
pub use connection::{Incoming, MuckConnection};
pub use errors::{MuckError, MuckResult};
pub use mcp::{McpEvent, McpMessage, McpSession, McpValue, Processed};
pub use transport::{NetTransport, Transport};
