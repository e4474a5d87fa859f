//! DRIMS print agent - headless report printing driven by a dispatch server.
//!
//! This crate provides the core functionality for the drims-printer binary:
//! a long-lived WebSocket client that logs in to the facility's dispatch
//! server, executes the commands it receives (print a report, sample host
//! telemetry, answer liveness probes), and reports outcomes back over the
//! same connection.
//!
//! # Architecture
//!
//! - **Supervisor** ([`client`]) - owns the session, drives the connection
//!   state machine, classifies failures, reconnects with backoff
//! - **Router** ([`router`]) - dispatches decoded commands to capabilities
//!   and builds replies
//! - **Codec** ([`protocol`]) - `#//`-delimited frame parsing and reply
//!   templates
//! - **Capabilities** ([`mod@print`], [`monitor`]) - headless-browser report
//!   printing and host telemetry, consumed through narrow traits
//!
//! # Modules
//!
//! - [`client`] - connection supervisor and message loop
//! - [`router`] - command dispatch table
//! - [`protocol`] - frame codec, command decode, reply templates
//! - [`backoff`] - two-tier reconnect backoff policy
//! - [`session`] - connection state machine and retry counters
//! - [`config`] - configuration loading/validation
//! - [`mod@print`] / [`monitor`] - print and telemetry capabilities
//! - [`logging`] - daily log file sink

// Library modules
pub mod backoff;
pub mod client;
pub mod config;
pub mod constants;
pub mod logging;
pub mod monitor;
pub mod print;
pub mod protocol;
pub mod router;
pub mod session;

// Re-export commonly used types
pub use config::Config;
pub use monitor::{HostMonitor, Telemetry};
pub use print::{ChromePrinter, PrintCapability};
pub use router::Capabilities;
pub use session::{ConnState, Session};
