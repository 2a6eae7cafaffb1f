use bytes::{Buf, BytesMut};
use tracing::debug;

use crate::codec::{checksum, Frame, FrameConfig, FrameType, HEADER_SIZE, MAGIC, MIN_FRAME_SIZE};
use crate::error::{FrameError, Result};

/// Extract the next complete frame from a chunked receive buffer.
///
/// Returns `Ok(None)` when more bytes are needed. Bytes preceding a magic
/// marker are treated as transport noise and discarded without error; when
/// no marker is present at all, the last 5 bytes are retained because a
/// later chunk could still complete a marker spanning the chunk boundary.
///
/// Frames whose type byte is not a known [`FrameType`] are consumed and
/// skipped so that a waiter never misinterprets them. The trailing checksum
/// is only verified when [`FrameConfig::verify_checksum`] is set; a mismatch
/// consumes the frame and returns [`FrameError::ChecksumMismatch`].
pub fn extract_frame(src: &mut BytesMut, config: &FrameConfig) -> Result<Option<Frame>> {
    loop {
        match find_magic(src) {
            None => {
                if src.len() >= MAGIC.len() {
                    let dropped = src.len() - (MAGIC.len() - 1);
                    debug!(dropped, "no magic marker in buffer, trimming noise");
                    src.advance(dropped);
                }
                return Ok(None);
            }
            Some(0) => {}
            Some(offset) => {
                debug!(offset, "realigning to magic marker");
                src.advance(offset);
            }
        }

        if src.len() < MIN_FRAME_SIZE {
            return Ok(None); // Need the length byte (and room for a checksum)
        }

        let payload_len = src[8] as usize;
        let total = HEADER_SIZE + payload_len + 1;
        if src.len() < total {
            return Ok(None); // Need more data
        }

        let frame = src.split_to(total).freeze();

        if config.verify_checksum {
            let expected = checksum(&frame[..total - 1]);
            let actual = frame[total - 1];
            if expected != actual {
                return Err(FrameError::ChecksumMismatch { expected, actual });
            }
        }

        match FrameType::from_byte(frame[7]) {
            Some(frame_type) => {
                let payload = frame.slice(HEADER_SIZE..HEADER_SIZE + payload_len);
                return Ok(Some(Frame {
                    frame_type,
                    payload,
                }));
            }
            None => {
                debug!(type_byte = frame[7], "skipping frame with unknown type");
                continue;
            }
        }
    }
}

fn find_magic(buf: &[u8]) -> Option<usize> {
    if buf.len() < MAGIC.len() {
        return None;
    }
    buf.windows(MAGIC.len()).position(|window| window == MAGIC)
}
