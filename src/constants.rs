//! Application-wide constants for drims-printer.
//!
//! This module centralizes the protocol and timing constants so the wire
//! format and retry behavior are discoverable in one place. Constants are
//! grouped by domain with documentation explaining their purpose.
//!
//! # Categories
//!
//! - **Reconnect**: backoff tiers and retry ceilings
//! - **Print**: page polling and settle timing
//! - **Supervisor**: event-loop housekeeping intervals

use std::time::Duration;

// ============================================================================
// Reconnect & backoff
// ============================================================================

/// Short backoff applied to early reconnect attempts.
///
/// The dispatch server usually comes back within seconds after a restart,
/// so the first attempts retry quickly.
pub const BACKOFF_SHORT: Duration = Duration::from_secs(2);

/// Long backoff applied once [`BACKOFF_TIER_THRESHOLD`] attempts have failed.
///
/// Past the first few attempts the outage is likely a real network or server
/// problem; retrying every 10 seconds keeps pressure off the server.
pub const BACKOFF_LONG: Duration = Duration::from_secs(10);

/// Attempt count at which backoff switches from short to long.
pub const BACKOFF_TIER_THRESHOLD: u32 = 5;

/// Maximum transport reconnect attempts before the agent gives up.
///
/// Effectively "retry forever" for any realistic outage, while still
/// guaranteeing termination if the server is gone for good.
pub const TRANSPORT_RETRY_CEILING: u32 = 65535;

/// Maximum login-rejection retries before the agent gives up.
///
/// Login rejections are usually a benign duplicate-session race on the
/// server, so they get their own counter - but a persistently rejected
/// client must eventually stop.
pub const LOGIN_RETRY_CEILING: u32 = 500;

// ============================================================================
// Print capability
// ============================================================================

/// Page/script timeout for the rendering browser.
pub const PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval between readiness polls on the report page.
pub const PRINT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Maximum readiness polls before a load is declared timed out.
///
/// 150 polls at 500ms is a 75 second budget, covering slow report queries
/// on the hospital intranet.
pub const PRINT_POLL_BUDGET: u32 = 150;

/// Settle delay after the print script fires, before the browser is closed.
///
/// The print spooler needs the page alive briefly after `printScale()`.
pub const PRINT_SETTLE_DELAY: Duration = Duration::from_secs(3);

/// Timeout for the pre-flight HTTP check of a report address.
pub const PREFLIGHT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Supervisor housekeeping
// ============================================================================

/// How often the message loop re-checks the shutdown flag while idle.
pub const SHUTDOWN_CHECK_INTERVAL: Duration = Duration::from_millis(500);

/// Granularity of the interruptible backoff wait.
///
/// Backoff sleeps are chopped into slices of this size so a shutdown
/// request cancels a pending reconnect promptly.
pub const BACKOFF_WAIT_SLICE: Duration = Duration::from_millis(250);
