//! Serial link abstraction for Improv WiFi provisioning.
//!
//! The protocol layers above only need a byte-granular bidirectional stream
//! with cloneable handles, read timeouts, and control-line access. This crate
//! defines that seam ([`SerialLink`]), an in-memory implementation for tests
//! ([`LoopbackLink`]), and a `serialport`-backed adapter behind the `serial`
//! feature ([`UsbSerialLink`]).

pub mod error;
pub mod link;
pub mod loopback;
#[cfg(feature = "serial")]
pub mod serial;

pub use error::{Result, TransportError};
pub use link::SerialLink;
pub use loopback::LoopbackLink;
#[cfg(feature = "serial")]
pub use serial::{PortInfo, UsbSerialLink, DEFAULT_BAUD_RATE};
