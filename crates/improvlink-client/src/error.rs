/// Errors that can occur in client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] improvlink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] improvlink_frame::FrameError),

    /// No matching frame arrived within the operation's window.
    #[error("no response within {0:?}")]
    Timeout(std::time::Duration),

    /// The device reported an error code; `reason` is the mapped message.
    #[error("device error {code}: {reason}")]
    Device { code: u8, reason: String },

    /// An operation was attempted without an open session.
    #[error("no open session")]
    NotConnected,
}

pub type Result<T> = std::result::Result<T, ClientError>;
