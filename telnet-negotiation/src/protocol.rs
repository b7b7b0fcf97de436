//! # Telnet Protocol Constants and Types
//!
//! Byte-level vocabulary of **RFC 854** (Telnet Protocol Specification) and
//! **RFC 855** (Telnet Option Specifications), as seen from a client.
//!
//! ### IAC (Interpret As Command) - Byte 255
//! Every command starts with IAC. A data byte with value 255 travels as
//! `IAC IAC`, both in the plain data stream and inside sub-negotiation
//! payloads.
//!
//! ### Command Structure
//! - Simple commands: `IAC <command>` (NOP, GA, AYT, ...)
//! - Negotiation: `IAC WILL/WONT/DO/DONT <option>`
//! - Sub-negotiation: `IAC SB <option> <parameters...> IAC SE`

/// IAC - Interpret As Command (RFC 854, Section 4)
pub const IAC: u8 = 255;

/// Telnet Commands (RFC 854, Section 4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TelnetCommand {
    /// End of subnegotiation parameters
    SE = 240,
    /// No Operation, usable as a keepalive
    NOP = 241,
    /// Data Mark (Synch)
    DM = 242,
    /// Break
    BRK = 243,
    /// Interrupt Process
    IP = 244,
    /// Abort Output
    AO = 245,
    /// Are You There
    AYT = 246,
    /// Erase Character
    EC = 247,
    /// Erase Line
    EL = 248,
    /// Go Ahead. Many MUCKs send it after a prompt
    GA = 249,
    /// Subnegotiation Begin
    SB = 250,
    /// Sender wants to enable an option on its side
    WILL = 251,
    /// Sender refuses or disables an option on its side
    WONT = 252,
    /// Sender asks the receiver to enable an option
    DO = 253,
    /// Sender asks the receiver to disable an option
    DONT = 254,
}

impl TelnetCommand {
    /// Convert a byte to a TelnetCommand if it represents a valid command
    ///
    /// # Example
    /// ```
    /// use telnet_negotiation::protocol::TelnetCommand;
    ///
    /// assert_eq!(TelnetCommand::from_byte(251), Some(TelnetCommand::WILL));
    /// assert_eq!(TelnetCommand::from_byte(100), None);
    /// ```
    pub fn from_byte(byte: u8) -> Option<Self> {
        use TelnetCommand::*;
        let command = match byte {
            240 => SE,
            241 => NOP,
            242 => DM,
            243 => BRK,
            244 => IP,
            245 => AO,
            246 => AYT,
            247 => EC,
            248 => EL,
            249 => GA,
            250 => SB,
            251 => WILL,
            252 => WONT,
            253 => DO,
            254 => DONT,
            _ => return None,
        };
        Some(command)
    }

    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// WILL, WONT, DO and DONT
    pub fn is_negotiation_command(self) -> bool {
        matches!(
            self,
            TelnetCommand::WILL | TelnetCommand::WONT | TelnetCommand::DO | TelnetCommand::DONT
        )
    }

    /// Commands that must be followed by an option byte
    pub fn requires_option(self) -> bool {
        self.is_negotiation_command() || self == TelnetCommand::SB
    }
}

/// Telnet options a MUCK client is likely to meet
///
/// Every byte maps to an option: codes without a dedicated variant become
/// [`TelnetOption::Unknown`] so they can still be refused properly instead
/// of leaking into the data stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)] // Protocol constants traditionally use SCREAMING_SNAKE_CASE
pub enum TelnetOption {
    /// Binary Transmission (RFC 856)
    BINARY,
    /// Echo (RFC 857). When the server enables it, input should be hidden
    ECHO,
    /// Suppress Go Ahead (RFC 858)
    SUPPRESS_GO_AHEAD,
    /// Status (RFC 859)
    STATUS,
    /// Timing Mark (RFC 860)
    TIMING_MARK,
    /// Terminal Type (RFC 1091)
    TERMINAL_TYPE,
    /// End of Record (RFC 885)
    END_OF_RECORD,
    /// Negotiate About Window Size (RFC 1073)
    NAWS,
    /// Terminal Speed (RFC 1079)
    TERMINAL_SPEED,
    /// Linemode (RFC 1184)
    LINEMODE,
    /// New Environment (RFC 1572)
    NEW_ENVIRON,
    /// Charset (RFC 2066)
    CHARSET,
    /// MUD Server Data Protocol
    MSDP,
    /// MUD Server Status Protocol
    MSSP,
    /// MUD Client Compression Protocol v2
    MCCP2,
    /// MUD eXtension Protocol
    MXP,
    /// Generic MUD Communication Protocol
    GMCP,
    /// Any other option code
    Unknown(u8),
}

impl TelnetOption {
    pub fn from_byte(byte: u8) -> Self {
        use TelnetOption::*;
        match byte {
            0 => BINARY,
            1 => ECHO,
            3 => SUPPRESS_GO_AHEAD,
            5 => STATUS,
            6 => TIMING_MARK,
            24 => TERMINAL_TYPE,
            25 => END_OF_RECORD,
            31 => NAWS,
            32 => TERMINAL_SPEED,
            34 => LINEMODE,
            39 => NEW_ENVIRON,
            42 => CHARSET,
            69 => MSDP,
            70 => MSSP,
            86 => MCCP2,
            91 => MXP,
            201 => GMCP,
            other => Unknown(other),
        }
    }

    pub fn to_byte(self) -> u8 {
        use TelnetOption::*;
        match self {
            BINARY => 0,
            ECHO => 1,
            SUPPRESS_GO_AHEAD => 3,
            STATUS => 5,
            TIMING_MARK => 6,
            TERMINAL_TYPE => 24,
            END_OF_RECORD => 25,
            NAWS => 31,
            TERMINAL_SPEED => 32,
            LINEMODE => 34,
            NEW_ENVIRON => 39,
            CHARSET => 42,
            MSDP => 69,
            MSSP => 70,
            MCCP2 => 86,
            MXP => 91,
            GMCP => 201,
            Unknown(byte) => byte,
        }
    }

    /// Options defined outside the RFC series by the MUD community
    pub fn is_mud_extension(self) -> bool {
        matches!(
            self,
            TelnetOption::MSDP
                | TelnetOption::MSSP
                | TelnetOption::MCCP2
                | TelnetOption::MXP
                | TelnetOption::GMCP
        )
    }
}

/// A complete Telnet command sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelnetSequence {
    /// Simple command without parameters (e.g., IAC NOP)
    Command(TelnetCommand),

    /// Option negotiation command (e.g., IAC WILL ECHO)
    Negotiation {
        command: TelnetCommand,
        option: TelnetOption,
    },

    /// Sub-negotiation payload, unescaped
    SubNegotiation { option: TelnetOption, data: Vec<u8> },
}

impl TelnetSequence {
    pub fn negotiation(command: TelnetCommand, option: TelnetOption) -> Self {
        TelnetSequence::Negotiation { command, option }
    }

    /// Serialize this sequence for transmission
    ///
    /// IAC bytes inside a sub-negotiation payload are doubled.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            TelnetSequence::Command(cmd) => vec![IAC, cmd.to_byte()],
            TelnetSequence::Negotiation { command, option } => {
                vec![IAC, command.to_byte(), option.to_byte()]
            }
            TelnetSequence::SubNegotiation { option, data } => {
                let mut bytes = Vec::with_capacity(data.len() + 6);
                bytes.extend_from_slice(&[IAC, TelnetCommand::SB.to_byte(), option.to_byte()]);
                bytes.extend_from_slice(&escape_iac(data));
                bytes.extend_from_slice(&[IAC, TelnetCommand::SE.to_byte()]);
                bytes
            }
        }
    }
}

/// Double every IAC byte so `data` survives the trip as plain data
pub fn escape_iac(data: &[u8]) -> Vec<u8> {
    let extra = data.iter().filter(|&&b| b == IAC).count();
    let mut escaped = Vec::with_capacity(data.len() + extra);
    for &byte in data {
        escaped.push(byte);
        if byte == IAC {
            escaped.push(IAC);
        }
    }
    escaped
}
