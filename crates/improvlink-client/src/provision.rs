//! End-to-end provisioning flow.
//!
//! [`Provisioner`] sequences the protocol operations into the onboarding
//! wizard: connect, identify, scan, submit. It is the only layer that
//! decides retry versus terminal failure; operations below it just report.

use improvlink_frame::{NetworkEntry, UNKNOWN_DEVICE_ID};
use improvlink_transport::SerialLink;
use tracing::{info, warn};

use crate::error::ClientError;
use crate::ops::{identify, scan_networks, submit_credentials, OpsConfig, SubmitMode};
use crate::session::{Session, SessionConfig};

/// Produces a fresh link for each connection attempt.
pub type LinkFactory =
    Box<dyn Fn() -> improvlink_transport::Result<Box<dyn SerialLink>> + Send>;

/// Where the onboarding flow currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningState {
    Idle,
    Connecting,
    Connected,
    Scanning,
    /// A scan finished (possibly empty) and the operator picks or types an
    /// ssid. Zero results never block the flow.
    NetworkSelected,
    Submitting,
    Provisioned,
    Failed,
}

/// Drives the provisioning flow over one device.
pub struct Provisioner {
    factory: LinkFactory,
    session_config: SessionConfig,
    ops_config: OpsConfig,
    session: Option<Session>,
    state: ProvisioningState,
    last_error: Option<String>,
}

impl Provisioner {
    pub fn new(factory: LinkFactory, session_config: SessionConfig, ops_config: OpsConfig) -> Self {
        Self {
            factory,
            session_config,
            ops_config,
            session: None,
            state: ProvisioningState::Idle,
            last_error: None,
        }
    }

    pub fn state(&self) -> ProvisioningState {
        self.state
    }

    /// The message of the most recent failure, for display.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Open the transport and start a session. On failure the flow returns
    /// to `Idle`.
    pub fn connect(&mut self) -> bool {
        self.state = ProvisioningState::Connecting;
        let opened = (self.factory)()
            .map_err(ClientError::from)
            .and_then(|link| Session::open(link, self.session_config.clone()));
        match opened {
            Ok(session) => {
                info!("session open");
                self.session = Some(session);
                self.state = ProvisioningState::Connected;
                true
            }
            Err(err) => {
                warn!(error = %err, "connect failed");
                self.last_error = Some(err.to_string());
                self.state = ProvisioningState::Idle;
                false
            }
        }
    }

    /// Query the device identifier; failures degrade to `"unknown"`.
    pub fn identify(&mut self) -> String {
        let result = match self.session.as_mut() {
            Some(session) => identify(session, &self.ops_config),
            None => return UNKNOWN_DEVICE_ID.to_string(),
        };
        match result {
            Ok(id) => id,
            Err(err) => {
                warn!(error = %err, "identify failed");
                self.last_error = Some(err.to_string());
                UNKNOWN_DEVICE_ID.to_string()
            }
        }
    }

    /// Scan for networks. Always lands in `NetworkSelected` — a failed or
    /// empty scan still lets the operator type an ssid manually.
    pub fn scan(&mut self) -> Vec<NetworkEntry> {
        self.state = ProvisioningState::Scanning;
        let result = match self.session.as_mut() {
            Some(session) => scan_networks(session, &self.ops_config),
            None => Ok(Vec::new()),
        };
        let networks = match result {
            Ok(networks) => networks,
            Err(err) => {
                warn!(error = %err, "scan failed, falling back to manual entry");
                self.last_error = Some(err.to_string());
                Vec::new()
            }
        };
        self.state = ProvisioningState::NetworkSelected;
        networks
    }

    /// Save credentials without awaiting confirmation.
    pub fn save(&mut self, ssid: &str, password: &str) -> bool {
        self.submit(ssid, password, SubmitMode::Save)
    }

    /// Submit credentials and wait for the device to join the network.
    pub fn test(&mut self, ssid: &str, password: &str) -> bool {
        self.submit(ssid, password, SubmitMode::Test)
    }

    fn submit(&mut self, ssid: &str, password: &str, mode: SubmitMode) -> bool {
        let Some(session) = self.session.as_mut() else {
            self.last_error = Some(ClientError::NotConnected.to_string());
            self.state = ProvisioningState::Failed;
            return false;
        };
        self.state = ProvisioningState::Submitting;
        match submit_credentials(session, ssid, password, mode, &self.ops_config) {
            Ok(()) => {
                self.state = ProvisioningState::Provisioned;
                true
            }
            Err(err) => {
                warn!(error = %err, "submit failed");
                self.last_error = Some(err.to_string());
                self.state = ProvisioningState::Failed;
                false
            }
        }
    }

    /// Tear the session down. Safe from any state.
    pub fn disconnect(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
        self.state = ProvisioningState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::time::Duration;

    use bytes::BytesMut;
    use improvlink_frame::{encode_frame, extract_frame, FrameConfig, FrameType};
    use improvlink_transport::{LoopbackLink, TransportError};

    use super::*;

    fn fast_session() -> SessionConfig {
        SessionConfig {
            poll_interval: Duration::from_millis(5),
            ingest_read_timeout: Duration::from_millis(10),
            open_settle: Duration::ZERO,
            ..SessionConfig::default()
        }
    }

    fn fast_ops() -> OpsConfig {
        OpsConfig {
            identify_attempts: 1,
            identify_timeout: Duration::from_millis(100),
            identify_retry_pause: Duration::from_millis(10),
            scan_settle: Duration::from_millis(10),
            scan_first_result_timeout: Duration::from_millis(100),
            scan_next_result_timeout: Duration::from_millis(50),
            scan_total_timeout: Duration::from_millis(300),
            submit_attempts: 1,
            submit_timeout: Duration::from_millis(150),
            submit_settle: Duration::from_millis(10),
            save_settle: Duration::from_millis(10),
        }
    }

    /// A scripted device: answers every command per `respond`. Runs until
    /// the loopback is closed.
    fn device_thread(
        mut link: LoopbackLink,
        respond: impl Fn(&mut LoopbackLink, &improvlink_frame::Frame) + Send + 'static,
    ) -> std::thread::JoinHandle<()> {
        link.set_read_timeout(Duration::from_millis(10)).unwrap();
        std::thread::spawn(move || {
            let mut wire = BytesMut::new();
            let mut chunk = [0u8; 256];
            loop {
                match link.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => wire.extend_from_slice(&chunk[..n]),
                    Err(err) if err.kind() == std::io::ErrorKind::TimedOut => {}
                    Err(_) => break,
                }
                while let Some(frame) = extract_frame(&mut wire, &FrameConfig::default()).unwrap() {
                    respond(&mut link, &frame);
                }
            }
        })
    }

    fn send_frame(link: &mut LoopbackLink, frame_type: FrameType, payload: &[u8]) {
        let mut buf = BytesMut::new();
        encode_frame(frame_type, payload, &mut buf).unwrap();
        link.write_all(&buf).unwrap();
    }

    fn result_fields(code: u8, fields: &[&[u8]]) -> Vec<u8> {
        let mut body = Vec::new();
        for field in fields {
            body.push(field.len() as u8);
            body.extend_from_slice(field);
        }
        let mut payload = vec![code, body.len() as u8];
        payload.extend_from_slice(&body);
        payload
    }

    fn provisioner_for(link: LoopbackLink) -> Provisioner {
        let factory: LinkFactory =
            Box::new(move || Ok(Box::new(link.clone()) as Box<dyn SerialLink>));
        Provisioner::new(factory, fast_session(), fast_ops())
    }

    #[test]
    fn connect_failure_returns_to_idle() {
        let factory: LinkFactory = Box::new(|| Err(TransportError::Closed));
        let mut provisioner = Provisioner::new(factory, fast_session(), fast_ops());

        assert!(!provisioner.connect());
        assert_eq!(provisioner.state(), ProvisioningState::Idle);
        assert!(provisioner.last_error().is_some());
    }

    #[test]
    fn happy_path_reaches_provisioned() {
        let (client_end, device_end) = LoopbackLink::pair();
        let device = device_thread(device_end, |link, frame| {
            match frame.payload.first().copied().unwrap_or_default() {
                0x03 => {
                    let payload = result_fields(0x03, &[b"fw", b"1.0", b"esp32", b"dev-42"]);
                    send_frame(link, FrameType::RpcResult, &payload);
                }
                0x04 => {
                    let entry = result_fields(0x04, &[b"HomeNet", b"-50", b"YES"]);
                    send_frame(link, FrameType::RpcResult, &entry);
                    send_frame(link, FrameType::RpcResult, &[0x04, 0x00]);
                }
                0x01 => {
                    send_frame(link, FrameType::State, &[0x03]);
                    send_frame(link, FrameType::State, &[0x04]);
                    let ok = result_fields(0x01, &[b"http://device.local"]);
                    send_frame(link, FrameType::RpcResult, &ok);
                }
                other => panic!("unexpected command {other}"),
            }
        });

        let closer = client_end.clone();
        let mut provisioner = provisioner_for(client_end);

        assert!(provisioner.connect());
        assert_eq!(provisioner.state(), ProvisioningState::Connected);

        assert_eq!(provisioner.identify(), "dev-42");

        let networks = provisioner.scan();
        assert_eq!(provisioner.state(), ProvisioningState::NetworkSelected);
        assert_eq!(networks.len(), 1);
        assert_eq!(networks[0].ssid, "HomeNet");

        assert!(provisioner.test("HomeNet", "hunter2"));
        assert_eq!(provisioner.state(), ProvisioningState::Provisioned);

        provisioner.disconnect();
        assert_eq!(provisioner.state(), ProvisioningState::Idle);
        closer.close();
        device.join().unwrap();
    }

    #[test]
    fn failed_scan_still_allows_manual_entry() {
        let (client_end, device_end) = LoopbackLink::pair();
        let device = device_thread(device_end, |link, frame| {
            match frame.payload.first().copied().unwrap_or_default() {
                0x04 => send_frame(link, FrameType::Error, &[0x01]),
                0x01 => {
                    let ok = result_fields(0x01, &[b"ok"]);
                    send_frame(link, FrameType::RpcResult, &ok);
                }
                _ => {}
            }
        });

        let closer = client_end.clone();
        let mut provisioner = provisioner_for(client_end);
        assert!(provisioner.connect());

        let networks = provisioner.scan();
        assert!(networks.is_empty());
        assert_eq!(provisioner.state(), ProvisioningState::NetworkSelected);
        assert!(provisioner.last_error().unwrap().contains("invalid RPC"));

        // Manual ssid entry still provisions.
        assert!(provisioner.test("Hidden", "secret"));
        assert_eq!(provisioner.state(), ProvisioningState::Provisioned);
        provisioner.disconnect();
        closer.close();
        device.join().unwrap();
    }

    #[test]
    fn failed_submit_can_be_retried_with_corrected_input() {
        let (client_end, device_end) = LoopbackLink::pair();
        let device = device_thread(device_end, |link, frame| {
            if frame.payload.first().copied().unwrap_or_default() == 0x01 {
                // Password length 3 is "bad"; anything else succeeds.
                let wrong = frame.payload.get(2).copied() == Some(4)
                    && frame.payload.ends_with(b"\x03bad");
                if wrong {
                    send_frame(link, FrameType::Error, &[0x03]);
                } else {
                    let ok = result_fields(0x01, &[b"ok"]);
                    send_frame(link, FrameType::RpcResult, &ok);
                }
            }
        });

        let closer = client_end.clone();
        let mut provisioner = provisioner_for(client_end);
        assert!(provisioner.connect());

        assert!(!provisioner.test("home", "bad"));
        assert_eq!(provisioner.state(), ProvisioningState::Failed);
        assert!(provisioner.last_error().unwrap().contains("password"));

        assert!(provisioner.test("home", "correct"));
        assert_eq!(provisioner.state(), ProvisioningState::Provisioned);
        provisioner.disconnect();
        closer.close();
        device.join().unwrap();
    }

    #[test]
    fn submit_without_session_fails() {
        let factory: LinkFactory = Box::new(|| Err(TransportError::Closed));
        let mut provisioner = Provisioner::new(factory, fast_session(), fast_ops());

        assert!(!provisioner.save("net", "pw"));
        assert_eq!(provisioner.state(), ProvisioningState::Failed);
    }

    #[test]
    fn disconnect_is_safe_from_any_state() {
        let factory: LinkFactory = Box::new(|| Err(TransportError::Closed));
        let mut provisioner = Provisioner::new(factory, fast_session(), fast_ops());

        provisioner.disconnect(); // Idle
        provisioner.connect();
        provisioner.disconnect(); // after failed connect
        assert_eq!(provisioner.state(), ProvisioningState::Idle);
    }
}
