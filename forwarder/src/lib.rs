//! Battery telemetry forwarder.
//!
//! Accepts producer connections over TCP, decodes the fixed-size records they
//! send, classifies each reading against the configured thresholds and hands
//! it to a downstream [`Sink`].

pub mod config;
pub mod connection;
pub mod error;
pub mod server;
pub mod sink;
pub mod stats;

pub use error::TransportError;
pub use server::Forwarder;
pub use sink::{Reading, Sink, SinkError};
