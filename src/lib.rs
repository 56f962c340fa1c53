//! Field-unit firmware for a live bus tracking network.
//!
//! Two daemons share this library:
//! - `bus_tracker`: the onboard unit. Samples the bus position, publishes
//!   it to the fleet backend and the real-time store, looks up nearby
//!   stations, and broadcasts per-station ETA frames over a short-range
//!   serial link.
//! - `stop_receiver`: the roadside unit. Drains ETA frames from its
//!   serial link, keeps a freshness-windowed cache of announced buses,
//!   renders the arrivals display, and publishes the station's board to
//!   the same two sinks.
//!
//! Both units degrade instead of crashing: a missing GPS daemon yields
//! synthetic fixes, a missing transceiver yields a disconnected channel,
//! and per-sink publish failures are absorbed per cycle. Only a broken
//! configuration aborts a unit, and only at startup.

pub mod channel;
pub mod config;
pub mod counters;
pub mod display;
pub mod presence;
pub mod providers;
pub mod publish;
pub mod receiver;
pub mod tracker;

#[cfg(test)]
pub(crate) mod testutil;
