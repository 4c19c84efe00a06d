//! High-level helpers over the protocol layers.
//!
//! [`Controller`] owns the connection lifecycle (start, lazy authentication,
//! transparent reconnect, stop) and the device state mirror.
//! [`DiscoveryClient`] finds controllers on the local segment.
pub mod client;
pub mod discovery;

pub use client::{ClientError, Controller};
pub use discovery::{DiscoveredDevice, DiscoveryClient, DiscoveryError};
