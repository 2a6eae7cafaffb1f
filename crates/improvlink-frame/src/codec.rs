use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Magic marker preceding every frame: "IMPROV".
pub const MAGIC: [u8; 6] = [0x49, 0x4D, 0x50, 0x52, 0x4F, 0x56];

/// Protocol version byte.
pub const VERSION: u8 = 0x01;

/// Header size: magic (6) + version (1) + type (1) + length (1) = 9 bytes.
pub const HEADER_SIZE: usize = 9;

/// Smallest possible frame: header + checksum, empty payload.
pub const MIN_FRAME_SIZE: usize = HEADER_SIZE + 1;

/// The payload length field is a single byte.
pub const MAX_PAYLOAD: usize = 255;

/// Frame type discriminator (wire byte at offset 7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    /// Device state notification (single payload byte).
    State = 0x01,
    /// Device error notification (single payload byte).
    Error = 0x02,
    /// Command from client to device.
    RpcCommand = 0x03,
    /// Command result from device to client.
    RpcResult = 0x04,
}

impl FrameType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::State),
            0x02 => Some(Self::Error),
            0x03 => Some(Self::RpcCommand),
            0x04 => Some(Self::RpcResult),
            _ => None,
        }
    }
}

/// A decoded Improv frame.
#[derive(Debug, Clone)]
pub struct Frame {
    pub frame_type: FrameType,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(frame_type: FrameType, payload: impl Into<Bytes>) -> Self {
        Self {
            frame_type,
            payload: payload.into(),
        }
    }
}

/// Mod-256 sum of all bytes, the trailing checksum of every frame.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌─────────────┬─────────┬────────┬────────┬─────────────┬──────────┐
/// │ Magic (6B)  │ Version │ Type   │ Length │ Payload     │ Checksum │
/// │ "IMPROV"    │ 0x01    │ (1B)   │ N (1B) │ (N bytes)   │ (1B)     │
/// └─────────────┴─────────┴────────┴────────┴─────────────┴──────────┘
/// ```
pub fn encode_frame(frame_type: FrameType, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }
    let start = dst.len();
    dst.reserve(HEADER_SIZE + payload.len() + 1);
    dst.put_slice(&MAGIC);
    dst.put_u8(VERSION);
    dst.put_u8(frame_type as u8);
    dst.put_u8(payload.len() as u8);
    dst.put_slice(payload);
    let sum = checksum(&dst[start..]);
    dst.put_u8(sum);
    Ok(())
}

/// Configuration for frame decoding.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Verify the trailing checksum byte and reject mismatching frames.
    ///
    /// Defaults to `false`: deployed firmware computes the checksum but
    /// clients historically never check it, and rejecting would break
    /// devices that get it wrong. Enable for validate-and-reject behavior.
    pub verify_checksum: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            verify_checksum: false,
        }
    }
}
