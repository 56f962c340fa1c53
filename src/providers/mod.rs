//! Clients for the external services the field units talk to: the GPS
//! daemon, the fleet backend API, and the real-time store.

pub mod backend;
pub mod gps;
pub mod realtime;
