use std::io::ErrorKind;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use improvlink_frame::{
    encode_frame, extract_frame, Frame, FrameConfig, FrameError, FrameType, RpcCommand,
};
use improvlink_transport::SerialLink;
use tracing::{debug, trace, warn};

use crate::error::Result;

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;
const READ_CHUNK_SIZE: usize = 1024;

/// Configuration for a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Frame decoding options (checksum verification).
    pub frame: FrameConfig,
    /// How often `receive` re-checks the shared buffer for a frame.
    pub poll_interval: Duration,
    /// Read timeout of the ingestion loop; also bounds how long a stale
    /// loop lingers after being superseded.
    pub ingest_read_timeout: Duration,
    /// Pause after open before discarding boot noise from the buffer.
    pub open_settle: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            poll_interval: Duration::from_millis(50),
            ingest_read_timeout: Duration::from_millis(100),
            open_settle: Duration::from_secs(1),
        }
    }
}

/// Shared state between a session and its ingestion loop.
///
/// The loop is the only writer of `buf`; `receive` drains it. `generation`
/// identifies the currently valid loop — bumping it tells any older loop to
/// exit after its next read returns.
struct Ingest {
    buf: Mutex<BytesMut>,
    generation: AtomicU64,
}

/// An open provisioning session over a serial link.
///
/// Owns the write handle; a cloned read handle lives in a background
/// ingestion thread that appends incoming bytes to a shared buffer.
/// Dropping the session (or calling [`Session::close`]) invalidates and
/// joins that thread.
pub struct Session {
    writer: Box<dyn SerialLink>,
    ingest: Arc<Ingest>,
    reader_thread: Option<JoinHandle<()>>,
    config: SessionConfig,
}

impl Session {
    /// Open a session over an already-connected link.
    ///
    /// Deasserts DTR and RTS (asserted lines reset ESP32-class boards via
    /// their USB-serial bridge), splits off a read handle, and starts the
    /// ingestion loop. Any bytes the device emits during `open_settle`
    /// (boot chatter) are discarded.
    pub fn open(mut link: Box<dyn SerialLink>, config: SessionConfig) -> Result<Self> {
        link.set_control_lines(false, false)?;

        let mut reader = link.try_clone()?;
        reader.set_read_timeout(config.ingest_read_timeout)?;

        let ingest = Arc::new(Ingest {
            buf: Mutex::new(BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY)),
            generation: AtomicU64::new(0),
        });
        let handle = spawn_ingest(Arc::clone(&ingest), reader);

        let session = Self {
            writer: link,
            ingest,
            reader_thread: Some(handle),
            config,
        };

        if !session.config.open_settle.is_zero() {
            std::thread::sleep(session.config.open_settle);
            session.clear_buffer();
        }
        Ok(session)
    }

    /// Encode and write one frame. May run concurrently with the ingestion
    /// loop; the two use separate handles on the same link.
    pub fn send(&mut self, frame_type: FrameType, payload: &[u8]) -> Result<()> {
        let mut buf = BytesMut::new();
        encode_frame(frame_type, payload, &mut buf)?;
        trace!(?frame_type, len = buf.len(), "sending frame");

        let mut offset = 0usize;
        while offset < buf.len() {
            match self.writer.write(&buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed.into()),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err).into()),
            }
        }
        loop {
            match self.writer.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err).into()),
            }
        }
    }

    /// Encode and send an RPC command frame.
    pub fn send_command(&mut self, command: &RpcCommand) -> Result<()> {
        let payload = command.encode()?;
        debug!(code = command.code(), "sending RPC command");
        self.send(FrameType::RpcCommand, &payload)
    }

    /// Wait up to `timeout` for the next complete frame.
    ///
    /// Polls the shared buffer at `poll_interval`. Returns `Ok(None)` on
    /// expiry — at this layer a timeout is an outcome, not an error.
    pub fn receive(&mut self, timeout: Duration) -> Result<Option<Frame>> {
        let deadline = Instant::now() + timeout;
        loop {
            {
                let mut buf = self.ingest.buf.lock().unwrap_or_else(|e| e.into_inner());
                if let Some(frame) = extract_frame(&mut buf, &self.config.frame)? {
                    trace!(frame_type = ?frame.frame_type, "received frame");
                    return Ok(Some(frame));
                }
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            std::thread::sleep(self.config.poll_interval.min(remaining));
        }
    }

    /// Discard all buffered bytes. Operations call this before command
    /// exchanges that must not see stale notifications.
    pub fn clear_buffer(&self) {
        self.ingest
            .buf
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Stop the ingestion loop and release the handles.
    ///
    /// Safe to call repeatedly. The loop exits after its current read
    /// returns (bounded by `ingest_read_timeout`); the read handle must be
    /// fully released before a new session opens the same device.
    pub fn close(&mut self) {
        self.ingest.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = self.reader_thread.take() {
            if handle.join().is_err() {
                warn!("ingestion thread panicked");
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

/// Start an ingestion loop tagged with a fresh generation id.
///
/// The loop appends every chunk it reads to the shared buffer until EOF, a
/// transport error, or a generation mismatch. The mismatch check runs after
/// each read returns, so a superseded loop never appends stale bytes.
fn spawn_ingest(ingest: Arc<Ingest>, mut reader: Box<dyn SerialLink>) -> JoinHandle<()> {
    let my_generation = ingest.generation.fetch_add(1, Ordering::SeqCst) + 1;
    std::thread::spawn(move || {
        debug!(generation = my_generation, "ingestion loop started");
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            let read = match reader.read(&mut chunk) {
                Ok(0) => {
                    debug!(generation = my_generation, "link closed, ingestion loop exiting");
                    break;
                }
                Ok(n) => n,
                Err(err)
                    if matches!(
                        err.kind(),
                        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) =>
                {
                    0
                }
                Err(err) => {
                    debug!(generation = my_generation, error = %err, "ingestion read failed");
                    break;
                }
            };

            if ingest.generation.load(Ordering::SeqCst) != my_generation {
                debug!(generation = my_generation, "superseded, ingestion loop exiting");
                break;
            }
            if read > 0 {
                ingest
                    .buf
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .extend_from_slice(&chunk[..read]);
            }
        }
    })
}
