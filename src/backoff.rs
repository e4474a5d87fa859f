//! Reconnect backoff policy.
//!
//! A two-tier step function, not an exponential curve: attempts below the
//! threshold wait the short tier, everything after it waits the long tier.
//! Two independent policy instances exist at runtime -
//! one for transport reconnects, one for login rejections - each with its own
//! ceiling; the attempt counters themselves live in the
//! [`Session`](crate::session::Session).

// Rust guideline compliant 2026-02

use std::time::Duration;

use crate::constants::{BACKOFF_LONG, BACKOFF_SHORT, BACKOFF_TIER_THRESHOLD};

/// Pure backoff policy: attempt count in, wait duration out, plus a hard
/// ceiling past which retrying stops.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    ceiling: u32,
}

impl BackoffPolicy {
    /// Create a policy with the given maximum-attempts ceiling.
    #[must_use]
    pub const fn new(ceiling: u32) -> Self {
        Self { ceiling }
    }

    /// Wait duration before the given (0-indexed) attempt.
    ///
    /// Attempts below [`BACKOFF_TIER_THRESHOLD`] wait [`BACKOFF_SHORT`];
    /// everything at or above it waits [`BACKOFF_LONG`].
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt < BACKOFF_TIER_THRESHOLD {
            BACKOFF_SHORT
        } else {
            BACKOFF_LONG
        }
    }

    /// Whether `attempt` has reached the ceiling.
    ///
    /// Reaching the ceiling is fatal: the supervisor stops retrying and the
    /// process exits.
    #[must_use]
    pub fn exceeded(&self, attempt: u32) -> bool {
        attempt >= self.ceiling
    }

    /// The configured ceiling, for log messages.
    #[must_use]
    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }
}
