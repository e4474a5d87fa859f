//! Connection session state.
//!
//! A single [`Session`] value exists per process run, exclusively owned by
//! the connection supervisor. It carries the state-machine position, the two
//! independent retry counters, the ban flag, and the identity fields loaded
//! once at startup. The router receives a mutable reference during dispatch;
//! nothing else ever constructs or owns one.

// Rust guideline compliant 2026-02

use crate::config::Config;

/// Position in the connection state machine.
///
/// ```text
/// Idle ──► Connecting ──► Open ──► Closed ──► Connecting ...
///              │            │
///              └────────────┴──► Banned (terminal)
/// ```
///
/// `Closed` transitions back to `Connecting` unless the session is banned;
/// `Banned` is reachable from any non-terminal state the instant a ban
/// command is routed, and is never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Before the first connection attempt.
    Idle,
    /// A connection attempt is in progress.
    Connecting,
    /// The connection is established and logged in.
    Open,
    /// The connection dropped; a reconnect may follow.
    Closed,
    /// The server banned this client. Terminal.
    Banned,
}

/// Immutable client identity, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Identity {
    /// Dispatch server WebSocket URL.
    pub server_url: String,
    /// Display name sent in the login frame (`<printer_id>.<printer_name>`).
    pub display_name: String,
    /// Printer identifier, passed through to capabilities.
    pub printer_id: String,
    /// Owning facility identifier, passed through to capabilities.
    pub facility_id: String,
}

impl Identity {
    /// Build the identity from the loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            server_url: config.server_url.clone(),
            display_name: config.display_name(),
            printer_id: config.printer_id.clone(),
            facility_id: config.facility_id.clone(),
        }
    }
}

/// Mutable per-run connection state.
#[derive(Debug)]
pub struct Session {
    /// Current state-machine position.
    pub state: ConnState,
    /// Consecutive failed transport attempts; reset on every successful open.
    pub reconnect_attempts: u32,
    /// Login rejections received; never reset (tracked separately from
    /// transport reconnects so a benign duplicate-login race is not mistaken
    /// for a transport outage).
    pub login_retry_attempts: u32,
    /// Once true, never reset within the process lifetime.
    pub banned: bool,
    /// Identity fields loaded at startup.
    pub identity: Identity,
}

impl Session {
    /// Fresh session in `Idle` with zeroed counters.
    #[must_use]
    pub fn new(identity: Identity) -> Self {
        Self {
            state: ConnState::Idle,
            reconnect_attempts: 0,
            login_retry_attempts: 0,
            banned: false,
            identity,
        }
    }

    /// Record a successful open: transport retry counter resets.
    pub fn record_open(&mut self) {
        self.state = ConnState::Open;
        self.reconnect_attempts = 0;
    }

    /// Record a server ban: terminal, suppresses all future reconnects.
    pub fn record_ban(&mut self) {
        self.banned = true;
        self.state = ConnState::Banned;
    }
}
