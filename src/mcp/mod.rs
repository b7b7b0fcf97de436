//! MCP 2.1, the MUD Client Protocol
//!
//! Out-of-band messages travel on the same line stream as ordinary MUCK
//! text, marked with a `#$#` prefix:
//!
//! - `parser`/`message`: single lines to and from the wire
//! - `assembler`: joins multi-line messages back together
//! - `catalog`: packages the server offered, and message name resolution
//! - `events`: handler registry and the result of a `process` call
//! - `session`: handshake, negotiation, calls and processing

pub mod assembler;
pub mod catalog;
pub mod events;
pub mod message;
pub mod parser;
pub mod session;
pub mod version;

pub use assembler::{AssembleError, MultilineAssembler, normalize_tag};
pub use catalog::{Catalog, MCP_PACKAGE, PackageRequest};
pub use events::{EventHandlers, McpEvent, Processed};
pub use message::{McpArgs, McpMessage, McpValue, encode, escape, generate_tag, unescape};
pub use parser::{McpLine, McpParseError, RawMessage, parse_line};
pub use session::McpSession;
pub use version::{McpVersion, PROTOCOL_VERSION, VersionRange};
