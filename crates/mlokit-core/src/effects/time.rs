//! Clock effect trait definitions
//!
//! Shared-key signatures embed the request time (`x-ms-date`), so the transfer
//! executor reads the clock through this trait. Tests pin it with a fixed clock.
//! Chains that must wait on a server-side job (model export) sleep through
//! [`SleepEffects`] for the same reason.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Wall-clock access
pub trait ClockEffects: Send + Sync {
    /// Current UTC time
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Real system clock for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockEffects for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Suspension of the current call
#[async_trait]
pub trait SleepEffects: Send + Sync {
    /// Wait `ms` milliseconds before returning
    async fn sleep_ms(&self, ms: u64);
}

#[async_trait]
impl SleepEffects for SystemClock {
    async fn sleep_ms(&self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}
