//! A crate to run foreground NFC sessions and exchange APDUs with ISO-DEP cards.
//!
//! The hard work (discovering tags, driving the radio, framing ISO-DEP) belongs to the platform.
//! This crate binds it to the lifecycle of the host screen through the traits in [`platform`],
//! and wraps the blocking exchanges with the card into futures.

#![cfg_attr(not(feature = "tracing"), allow(unused_variables))]

#[macro_use]
mod log;

#[cfg(feature = "pcsc")]
pub mod pcsc;

pub mod discovery;
pub mod error;
pub mod platform;
pub mod session;
pub mod status;

#[cfg(test)]
mod mock;

pub use discovery::DiscoveryConfig;
pub use error::{Error, Result};
pub use session::{NfcSession, Options};
