//! # ESP-AT response router
//!
//! Driver for ESP8266 modems running the ESP-AT firmware, connected by a single serial link.
//!
//! The core is a line router: one reader task frames the incoming serial data into lines
//! ([framer]) and dispatches every line to the handlers whose match key it contains ([router]).
//! On top of it, [modem::Modem] offers "send command and wait for the keyed response" requests, and
//! supervised connection procedures for [wifi] and [mqtt].
#![cfg_attr(not(test), no_std)]
#![cfg_attr(feature = "strict", deny(warnings))]

extern crate alloc;

pub(crate) mod commands;
pub mod framer;
pub mod http;
pub mod modem;
pub mod mqtt;
pub(crate) mod registry;
pub mod router;
pub mod status;
pub mod wifi;

#[cfg(test)]
mod tests;
