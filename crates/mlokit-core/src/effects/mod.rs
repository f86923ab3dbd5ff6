//! Effect interfaces
//!
//! Resolution chains and the transfer executor never touch the network or the
//! wall clock directly. They are handed an explicit handler value implementing
//! these traits: `mlokit-transport` provides the production HTTP handler and
//! `mlokit-testkit` provides scripted ones.

pub mod http;
pub mod time;

pub use http::{bearer, HttpEffects, HttpEffectsExt, HttpMethod, HttpRequest, HttpResponse};
pub use time::{ClockEffects, SleepEffects, SystemClock};
