use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// A connected serial link — implements Read + Write.
///
/// The client session clones one handle for its background ingestion loop
/// and keeps the other for writes; both handles refer to the same underlying
/// stream. Implementations must support that split.
pub trait SerialLink: Read + Write + Send {
    /// Clone this link into a second handle on the same stream.
    fn try_clone(&self) -> Result<Box<dyn SerialLink>>;

    /// Set DTR and RTS levels.
    ///
    /// Both lines are deasserted right after open: some USB-serial bridges
    /// wire DTR/RTS to the target's reset and boot-select pins, and leaving
    /// them asserted reboots the device mid-handshake.
    fn set_control_lines(&mut self, dtr: bool, rts: bool) -> Result<()>;

    /// Set the timeout after which a blocking read returns `TimedOut`.
    ///
    /// The ingestion loop relies on this to wake up and check whether it has
    /// been superseded.
    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()>;
}

impl std::fmt::Debug for dyn SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink").finish_non_exhaustive()
    }
}
