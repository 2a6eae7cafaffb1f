//! Improv serial provisioning client.
//!
//! This is the "just works" layer. [`Session`] owns an open serial link and
//! a background ingestion loop; [`ops`] builds the protocol verbs (identify,
//! scan, submit credentials) on top of it; [`Provisioner`] sequences them
//! into the end-to-end onboarding flow with retry policy.

pub mod error;
pub mod ops;
pub mod provision;
pub mod session;

pub use error::{ClientError, Result};
pub use ops::{identify, scan_networks, submit_credentials, OpsConfig, SubmitMode};
pub use provision::{LinkFactory, Provisioner, ProvisioningState};
pub use session::{Session, SessionConfig};
