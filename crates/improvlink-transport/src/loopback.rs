use std::io::{ErrorKind, Read, Write};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::link::SerialLink;

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// One direction of a loopback pair: a byte queue with blocking reads.
#[derive(Default)]
struct Pipe {
    state: Mutex<PipeState>,
    readable: Condvar,
}

#[derive(Default)]
struct PipeState {
    data: Vec<u8>,
    closed: bool,
}

impl Pipe {
    fn write(&self, buf: &[u8]) -> std::io::Result<usize> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.closed {
            return Err(std::io::Error::from(ErrorKind::BrokenPipe));
        }
        state.data.extend_from_slice(buf);
        self.readable.notify_all();
        Ok(buf.len())
    }

    fn read(&self, buf: &mut [u8], timeout: Duration) -> std::io::Result<usize> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if !state.data.is_empty() {
                let n = state.data.len().min(buf.len());
                buf[..n].copy_from_slice(&state.data[..n]);
                state.data.drain(..n);
                return Ok(n);
            }
            if state.closed {
                return Ok(0);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(std::io::Error::from(ErrorKind::TimedOut));
            }
            let (guard, _) = self
                .readable
                .wait_timeout(state, remaining)
                .unwrap_or_else(|e| e.into_inner());
            state = guard;
        }
    }

    fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.closed = true;
        self.readable.notify_all();
    }
}

/// In-memory serial link for tests.
///
/// [`LoopbackLink::pair`] returns two connected ends; bytes written to one
/// end are read from the other. Clones share the underlying pipes, matching
/// the reader/writer handle split a real serial port supports.
#[derive(Clone)]
pub struct LoopbackLink {
    rx: Arc<Pipe>,
    tx: Arc<Pipe>,
    control: Arc<Mutex<Option<(bool, bool)>>>,
    read_timeout: Duration,
}

impl LoopbackLink {
    /// Create a connected pair of links.
    pub fn pair() -> (LoopbackLink, LoopbackLink) {
        let a_to_b = Arc::new(Pipe::default());
        let b_to_a = Arc::new(Pipe::default());
        let a = LoopbackLink {
            rx: Arc::clone(&b_to_a),
            tx: Arc::clone(&a_to_b),
            control: Arc::new(Mutex::new(None)),
            read_timeout: DEFAULT_READ_TIMEOUT,
        };
        let b = LoopbackLink {
            rx: a_to_b,
            tx: b_to_a,
            control: Arc::new(Mutex::new(None)),
            read_timeout: DEFAULT_READ_TIMEOUT,
        };
        (a, b)
    }

    /// Close both directions. Readers on either end see EOF.
    pub fn close(&self) {
        self.rx.close();
        self.tx.close();
    }

    /// The last DTR/RTS levels set on this end, if any.
    pub fn control_lines(&self) -> Option<(bool, bool)> {
        *self.control.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Read for LoopbackLink {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.rx.read(buf, self.read_timeout)
    }
}

impl Write for LoopbackLink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.tx.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl SerialLink for LoopbackLink {
    fn try_clone(&self) -> Result<Box<dyn SerialLink>> {
        Ok(Box::new(self.clone()))
    }

    fn set_control_lines(&mut self, dtr: bool, rts: bool) -> Result<()> {
        *self.control.lock().unwrap_or_else(|e| e.into_inner()) = Some((dtr, rts));
        Ok(())
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.read_timeout = timeout;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_carries_bytes_both_ways() {
        let (mut a, mut b) = LoopbackLink::pair();

        a.write_all(b"ping").unwrap();
        let mut buf = [0u8; 4];
        b.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");

        b.write_all(b"pong").unwrap();
        a.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[test]
    fn read_times_out_when_empty() {
        let (mut a, _b) = LoopbackLink::pair();
        a.set_read_timeout(Duration::from_millis(10)).unwrap();

        let mut buf = [0u8; 1];
        let err = a.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TimedOut);
    }

    #[test]
    fn read_returns_zero_after_close() {
        let (mut a, b) = LoopbackLink::pair();
        b.close();

        let mut buf = [0u8; 1];
        assert_eq!(a.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn write_fails_after_close() {
        let (mut a, b) = LoopbackLink::pair();
        b.close();

        let err = a.write(b"x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BrokenPipe);
    }

    #[test]
    fn clones_share_the_stream() {
        let (a, mut b) = LoopbackLink::pair();
        let mut a2 = a.try_clone().unwrap();

        a2.write_all(b"via-clone").unwrap();
        let mut buf = [0u8; 9];
        b.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"via-clone");
    }

    #[test]
    fn control_lines_recorded() {
        let (mut a, _b) = LoopbackLink::pair();
        assert_eq!(a.control_lines(), None);

        a.set_control_lines(false, false).unwrap();
        assert_eq!(a.control_lines(), Some((false, false)));
    }

    #[test]
    fn blocked_read_wakes_on_write() {
        let (mut a, mut b) = LoopbackLink::pair();
        a.set_read_timeout(Duration::from_secs(5)).unwrap();

        let writer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            b.write_all(b"late").unwrap();
        });

        let mut buf = [0u8; 4];
        a.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"late");
        writer.join().unwrap();
    }
}
