//! Improv serial packet framing, stream reassembly, and RPC payloads.
//!
//! Every packet on the wire is framed with:
//! - A 6-byte magic marker (`"IMPROV"`) for stream synchronization
//! - A 1-byte protocol version
//! - A 1-byte frame type and 1-byte payload length
//! - A trailing mod-256 checksum byte
//!
//! [`extract_frame`] turns an unbounded chunked byte stream into complete
//! frames, realigning on the magic marker after transport noise. The [`rpc`]
//! module layers command encoding and result parsing on top.

pub mod codec;
pub mod decoder;
pub mod error;
pub mod rpc;

pub use codec::{
    checksum, encode_frame, Frame, FrameConfig, FrameType, HEADER_SIZE, MAGIC, MAX_PAYLOAD,
    MIN_FRAME_SIZE, VERSION,
};
pub use decoder::extract_frame;
pub use error::{FrameError, Result};
pub use rpc::{
    describe_device_error, is_end_of_scan, DeviceInfo, DeviceState, NetworkEntry, RpcCommand,
    UNKNOWN_DEVICE_ID,
};
