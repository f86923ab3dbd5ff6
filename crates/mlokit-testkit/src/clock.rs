//! Pinned clock and instant sleeps

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use mlokit_core::{ClockEffects, SleepEffects};
use tokio::sync::Mutex;

/// Clock that always reports the same instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock {
    now: DateTime<Utc>,
}

impl FixedClock {
    /// Clock pinned at `now`
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    /// Clock pinned at 2020-01-01T00:00:00Z (`Wed, 01 Jan 2020 00:00:00 GMT`)
    pub fn new_year_2020() -> Self {
        Self::new(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap())
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::new_year_2020()
    }
}

impl ClockEffects for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.now
    }
}

/// Sleeper that returns at once and remembers every requested wait
#[derive(Debug, Default)]
pub struct InstantSleep {
    requested: Mutex<Vec<u64>>,
}

impl InstantSleep {
    /// Sleeper with no recorded waits
    pub fn new() -> Self {
        Self::default()
    }

    /// Requested waits in milliseconds, in call order
    pub async fn requested_ms(&self) -> Vec<u64> {
        self.requested.lock().await.clone()
    }
}

#[async_trait]
impl SleepEffects for InstantSleep {
    async fn sleep_ms(&self, ms: u64) {
        self.requested.lock().await.push(ms);
    }
}
