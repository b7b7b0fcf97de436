//! # Telnet Option Negotiation (RFC 1143 Q Method)
//!
//! Implements **RFC 1143 - The Q Method of Implementing TELNET Option
//! Negotiation**, which replaces the loop-prone rules of RFC 854.
//!
//! Each option on each side is in one of four states:
//! - **NO** / **YES**: disabled / enabled
//! - **WANTNO** / **WANTYES**: we asked for a change and await the answer
//!
//! While a request is outstanding, a queue bit records whether the user
//! already wants the opposite once the answer arrives.
//!
//! ```text
//! NO      + request enable       -> WANTYES, send DO/WILL
//! WANTYES + receive WILL/DO      -> YES
//! YES     + request disable      -> WANTNO, send DONT/WONT
//! WANTNO  + receive WONT/DONT    -> NO
//! ```
//!
//! The RFC says "us" and "him"; this module says `Local` and `Remote`.
//! Which unsolicited requests we accept is decided by an [`OptionPolicy`].

use crate::protocol::{TelnetCommand, TelnetOption, TelnetSequence};

/// Option negotiation state as defined by RFC 1143
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionState {
    No,
    Yes,
    WantNo(QueueState),
    WantYes(QueueState),
}

/// Queue bit (RFC 1143 Section 7)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Empty,
    Opposite,
}

/// Side of the connection an option applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Our side: we send WILL/WONT, the server answers DO/DONT
    Local,
    /// The server's side: we send DO/DONT, the server answers WILL/WONT
    Remote,
}

impl Side {
    fn enable_command(self) -> TelnetCommand {
        match self {
            Side::Local => TelnetCommand::WILL,
            Side::Remote => TelnetCommand::DO,
        }
    }

    fn disable_command(self) -> TelnetCommand {
        match self {
            Side::Local => TelnetCommand::WONT,
            Side::Remote => TelnetCommand::DONT,
        }
    }
}

/// Result of processing a negotiation event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiationResult {
    /// Sequence to send back, if any
    pub response: Option<TelnetSequence>,
    /// Whether the option is enabled after this event
    pub enabled: bool,
    /// Whether the enabled flag flipped because of this event
    pub changed: bool,
    /// Protocol violation or refused request, for logging
    pub error: Option<String>,
}

/// Which options we agree to when the server asks
#[derive(Debug, Clone)]
pub struct OptionPolicy {
    local: [bool; 256],
    remote: [bool; 256],
}

impl Default for OptionPolicy {
    /// Accept the server echoing and suppressing go-ahead; offer nothing locally
    fn default() -> Self {
        let mut policy = Self::refuse_all();
        policy.allow(Side::Remote, TelnetOption::ECHO);
        policy.allow(Side::Remote, TelnetOption::SUPPRESS_GO_AHEAD);
        policy
    }
}

impl OptionPolicy {
    pub fn refuse_all() -> Self {
        Self {
            local: [false; 256],
            remote: [false; 256],
        }
    }

    pub fn allow(&mut self, side: Side, option: TelnetOption) {
        self.table_mut(side)[option.to_byte() as usize] = true;
    }

    pub fn deny(&mut self, side: Side, option: TelnetOption) {
        self.table_mut(side)[option.to_byte() as usize] = false;
    }

    pub fn allows(&self, side: Side, option: TelnetOption) -> bool {
        match side {
            Side::Local => self.local[option.to_byte() as usize],
            Side::Remote => self.remote[option.to_byte() as usize],
        }
    }

    fn table_mut(&mut self, side: Side) -> &mut [bool; 256] {
        match side {
            Side::Local => &mut self.local,
            Side::Remote => &mut self.remote,
        }
    }
}

/// RFC 1143 compliant telnet option negotiator
#[derive(Debug, Clone)]
pub struct OptionNegotiator {
    local: [OptionState; 256],
    remote: [OptionState; 256],
    policy: OptionPolicy,
    queue_enabled: bool,
}

impl Default for OptionNegotiator {
    fn default() -> Self {
        Self::new(OptionPolicy::default())
    }
}

impl OptionNegotiator {
    pub fn new(policy: OptionPolicy) -> Self {
        Self {
            local: [OptionState::No; 256],
            remote: [OptionState::No; 256],
            policy,
            queue_enabled: true, // RFC 1143: MUST default to enabled
        }
    }

    pub fn set_queue_enabled(&mut self, enabled: bool) {
        self.queue_enabled = enabled;
    }

    pub fn policy_mut(&mut self) -> &mut OptionPolicy {
        &mut self.policy
    }

    pub fn is_enabled(&self, side: Side, option: TelnetOption) -> bool {
        self.state(side, option) == OptionState::Yes
    }

    pub fn state(&self, side: Side, option: TelnetOption) -> OptionState {
        match side {
            Side::Local => self.local[option.to_byte() as usize],
            Side::Remote => self.remote[option.to_byte() as usize],
        }
    }

    fn set_state(&mut self, side: Side, option: TelnetOption, state: OptionState) {
        match side {
            Side::Local => self.local[option.to_byte() as usize] = state,
            Side::Remote => self.remote[option.to_byte() as usize] = state,
        }
    }

    /// Server sent WILL: it wants to enable the option on its side
    pub fn handle_will(&mut self, option: TelnetOption) -> NegotiationResult {
        self.receive_enable(Side::Remote, option)
    }

    /// Server sent WONT: the option is (or stays) disabled on its side
    pub fn handle_wont(&mut self, option: TelnetOption) -> NegotiationResult {
        self.receive_disable(Side::Remote, option)
    }

    /// Server sent DO: it wants us to enable the option
    pub fn handle_do(&mut self, option: TelnetOption) -> NegotiationResult {
        self.receive_enable(Side::Local, option)
    }

    /// Server sent DONT: the option is (or stays) disabled on our side
    pub fn handle_dont(&mut self, option: TelnetOption) -> NegotiationResult {
        self.receive_disable(Side::Local, option)
    }

    fn receive_enable(&mut self, side: Side, option: TelnetOption) -> NegotiationResult {
        let before = self.state(side, option);
        let mut response = None;
        let mut error = None;

        let after = match before {
            OptionState::No => {
                if self.policy.allows(side, option) {
                    response = Some(side.enable_command());
                    OptionState::Yes
                } else {
                    response = Some(side.disable_command());
                    OptionState::No
                }
            }
            OptionState::Yes => OptionState::Yes,
            OptionState::WantNo(QueueState::Empty) => {
                error = Some(format!("{:?} answered by enable", side.disable_command()));
                OptionState::No
            }
            OptionState::WantNo(QueueState::Opposite) => {
                error = Some(format!("{:?} answered by enable", side.disable_command()));
                OptionState::Yes
            }
            OptionState::WantYes(QueueState::Empty) => OptionState::Yes,
            OptionState::WantYes(QueueState::Opposite) => {
                response = Some(side.disable_command());
                OptionState::WantNo(QueueState::Empty)
            }
        };

        self.finish(side, option, before, after, response, error)
    }

    fn receive_disable(&mut self, side: Side, option: TelnetOption) -> NegotiationResult {
        let before = self.state(side, option);
        let mut response = None;

        let after = match before {
            OptionState::No => OptionState::No,
            OptionState::Yes => {
                response = Some(side.disable_command());
                OptionState::No
            }
            OptionState::WantNo(QueueState::Empty) => OptionState::No,
            OptionState::WantNo(QueueState::Opposite) => {
                response = Some(side.enable_command());
                OptionState::WantYes(QueueState::Empty)
            }
            OptionState::WantYes(_) => OptionState::No,
        };

        self.finish(side, option, before, after, response, None)
    }

    /// Ask for `option` to be enabled on `side`
    ///
    /// Returns the sequence to send, if the request needs one right now.
    pub fn request_enable(&mut self, side: Side, option: TelnetOption) -> NegotiationResult {
        let before = self.state(side, option);
        let mut response = None;
        let mut error = None;

        let after = match before {
            OptionState::No => {
                response = Some(side.enable_command());
                OptionState::WantYes(QueueState::Empty)
            }
            OptionState::Yes => {
                error = Some("already enabled".to_string());
                before
            }
            OptionState::WantNo(QueueState::Empty) if self.queue_enabled => {
                OptionState::WantNo(QueueState::Opposite)
            }
            OptionState::WantNo(QueueState::Empty) => {
                error = Some("cannot initiate new request in the middle of negotiation".to_string());
                before
            }
            OptionState::WantNo(QueueState::Opposite) => {
                error = Some("already queued an enable request".to_string());
                before
            }
            OptionState::WantYes(QueueState::Empty) => {
                error = Some("already negotiating for enable".to_string());
                before
            }
            OptionState::WantYes(QueueState::Opposite) => OptionState::WantYes(QueueState::Empty),
        };

        self.finish(side, option, before, after, response, error)
    }

    /// Ask for `option` to be disabled on `side`
    pub fn request_disable(&mut self, side: Side, option: TelnetOption) -> NegotiationResult {
        let before = self.state(side, option);
        let mut response = None;
        let mut error = None;

        let after = match before {
            OptionState::No => {
                error = Some("already disabled".to_string());
                before
            }
            OptionState::Yes => {
                response = Some(side.disable_command());
                OptionState::WantNo(QueueState::Empty)
            }
            OptionState::WantNo(QueueState::Empty) => {
                error = Some("already negotiating for disable".to_string());
                before
            }
            OptionState::WantNo(QueueState::Opposite) => OptionState::WantNo(QueueState::Empty),
            OptionState::WantYes(QueueState::Empty) if self.queue_enabled => {
                OptionState::WantYes(QueueState::Opposite)
            }
            OptionState::WantYes(QueueState::Empty) => {
                error = Some("cannot initiate new request in the middle of negotiation".to_string());
                before
            }
            OptionState::WantYes(QueueState::Opposite) => {
                error = Some("already queued a disable request".to_string());
                before
            }
        };

        self.finish(side, option, before, after, response, error)
    }

    fn finish(
        &mut self,
        side: Side,
        option: TelnetOption,
        before: OptionState,
        after: OptionState,
        response: Option<TelnetCommand>,
        error: Option<String>,
    ) -> NegotiationResult {
        self.set_state(side, option, after);
        NegotiationResult {
            response: response.map(|command| TelnetSequence::negotiation(command, option)),
            enabled: after == OptionState::Yes,
            changed: (before == OptionState::Yes) != (after == OptionState::Yes),
            error,
        }
    }
}
