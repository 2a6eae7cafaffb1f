//! Improv WiFi provisioning over serial.
//!
//! improvlink speaks the Improv serial protocol to WiFi-capable firmware:
//! frame the wire format, reassemble device responses, and drive the
//! provisioning flow (identify, scan, submit credentials).
//!
//! # Crate Structure
//!
//! - [`transport`] — Serial link abstraction (loopback, USB-serial behind `serial` feature)
//! - [`frame`] — Improv wire format: framing, reassembly, RPC payloads
//! - [`client`] — Sessions and protocol operations (behind `client` feature)

/// Re-export transport types.
pub mod transport {
    pub use improvlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use improvlink_frame::*;
}

/// Re-export client types (requires `client` feature).
#[cfg(feature = "client")]
pub mod client {
    pub use improvlink_client::*;
}
