//! Protocol operations: identify, scan, submit credentials.
//!
//! The Improv protocol has no request IDs; each operation sends a command
//! and then matches incoming frames against the types it expects, ignoring
//! unrelated chatter rather than misreading it. All timings live in
//! [`OpsConfig`] so tests can shrink them.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use improvlink_frame::{
    describe_device_error, is_end_of_scan, DeviceInfo, DeviceState, FrameType, NetworkEntry,
    RpcCommand, UNKNOWN_DEVICE_ID,
};
use tracing::{debug, info, warn};

use crate::error::{ClientError, Result};
use crate::session::Session;

/// Timeout and retry policy for protocol operations.
///
/// Defaults match deployed firmware behavior; tests override with short
/// windows.
#[derive(Debug, Clone)]
pub struct OpsConfig {
    /// Total identify attempts on no-response.
    pub identify_attempts: u32,
    /// Per-attempt wait for the device-info result.
    pub identify_timeout: Duration,
    /// Pause before each identify retry.
    pub identify_retry_pause: Duration,
    /// Settle before starting a scan (command is dropped if the device is
    /// still busy booting).
    pub scan_settle: Duration,
    /// Wait for the first scan result.
    pub scan_first_result_timeout: Duration,
    /// Wait for each subsequent result once one has arrived.
    pub scan_next_result_timeout: Duration,
    /// Hard ceiling on the whole scan regardless of partial progress.
    pub scan_total_timeout: Duration,
    /// Credential-test attempts (the whole submit is retried once on
    /// timeout).
    pub submit_attempts: u32,
    /// Per-attempt wait for a terminal frame in test mode.
    pub submit_timeout: Duration,
    /// Settle after clearing the buffer before sending credentials.
    pub submit_settle: Duration,
    /// Fire-and-forget settle in save mode.
    pub save_settle: Duration,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            identify_attempts: 3,
            identify_timeout: Duration::from_secs(3),
            identify_retry_pause: Duration::from_secs(1),
            scan_settle: Duration::from_millis(500),
            scan_first_result_timeout: Duration::from_secs(10),
            scan_next_result_timeout: Duration::from_secs(2),
            scan_total_timeout: Duration::from_secs(15),
            submit_attempts: 2,
            submit_timeout: Duration::from_secs(25),
            submit_settle: Duration::from_millis(300),
            save_settle: Duration::from_millis(500),
        }
    }
}

/// How `submit_credentials` treats confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
    /// Fire-and-forget: send, settle, report success unconditionally.
    Save,
    /// Wait for the device to confirm it joined the network; one automatic
    /// retry of the whole submit on timeout.
    Test,
}

/// Query the device identifier.
///
/// Sends a device-info command and waits for an RPC result; STATE and ERROR
/// frames seen while waiting are ignored. Returns [`UNKNOWN_DEVICE_ID`] when
/// the answer carries fewer than 4 strings or every attempt times out.
pub fn identify(session: &mut Session, config: &OpsConfig) -> Result<String> {
    for attempt in 0..config.identify_attempts {
        if attempt > 0 {
            debug!(attempt, "retrying device info request");
            std::thread::sleep(config.identify_retry_pause);
        }
        session.send_command(&RpcCommand::DeviceInfo)?;

        let deadline = Instant::now() + config.identify_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match session.receive(remaining)? {
                Some(frame) if frame.frame_type == FrameType::RpcResult => {
                    let info = DeviceInfo::parse(&frame.payload);
                    let id = info.device_id().unwrap_or(UNKNOWN_DEVICE_ID);
                    info!(device_id = id, "device identified");
                    return Ok(id.to_string());
                }
                Some(_) => continue,
                None => break,
            }
        }
    }
    warn!("device never answered device info request");
    Ok(UNKNOWN_DEVICE_ID.to_string())
}

/// Scan for WiFi networks visible to the device.
///
/// Aggregates RPC results until the device signals end-of-scan, an error
/// arrives, results stop coming, or the hard ceiling trips. The list is
/// deduplicated by ssid keeping the strongest signal, strongest first.
pub fn scan_networks(session: &mut Session, config: &OpsConfig) -> Result<Vec<NetworkEntry>> {
    std::thread::sleep(config.scan_settle);
    session.clear_buffer();
    session.send_command(&RpcCommand::ScanNetworks)?;

    let started = Instant::now();
    let mut networks: Vec<NetworkEntry> = Vec::new();
    let mut got_results = false;

    loop {
        let elapsed = started.elapsed();
        if elapsed >= config.scan_total_timeout {
            debug!("scan hit total ceiling");
            break;
        }
        let window = if got_results {
            config.scan_next_result_timeout
        } else {
            config.scan_first_result_timeout
        };
        let window = window.min(config.scan_total_timeout - elapsed);

        let frame = match session.receive(window)? {
            Some(frame) => frame,
            None if got_results => break,
            None => continue,
        };

        match frame.frame_type {
            FrameType::RpcResult => {
                got_results = true;
                if is_end_of_scan(&frame.payload) {
                    debug!("device signaled end of scan");
                    break;
                }
                match NetworkEntry::parse(&frame.payload) {
                    Some(entry) => networks.push(entry),
                    None => debug!("skipping malformed scan entry"),
                }
            }
            FrameType::Error => {
                let code = frame.payload.first().copied().unwrap_or_default();
                return Err(ClientError::Device {
                    code,
                    reason: describe_device_error(code),
                });
            }
            _ => {} // STATE chatter during a scan is informational
        }
    }

    // Strongest signal wins per ssid.
    networks.sort_by(|a, b| b.rssi.cmp(&a.rssi));
    let mut seen = HashSet::new();
    networks.retain(|n| seen.insert(n.ssid.clone()));
    info!(count = networks.len(), "scan complete");
    Ok(networks)
}

/// Submit WiFi credentials to the device.
///
/// In [`SubmitMode::Test`] the attempt loop is explicit and bounded: on a
/// timed-out attempt the whole submit is retried once; a device-reported
/// error is terminal and never retried.
pub fn submit_credentials(
    session: &mut Session,
    ssid: &str,
    password: &str,
    mode: SubmitMode,
    config: &OpsConfig,
) -> Result<()> {
    let command = RpcCommand::SendCredentials {
        ssid: ssid.to_string(),
        password: password.to_string(),
    };

    if mode == SubmitMode::Save {
        info!(ssid, "saving credentials");
        session.send_command(&command)?;
        std::thread::sleep(config.save_settle);
        return Ok(());
    }

    for attempt in 1..=config.submit_attempts {
        if attempt > 1 {
            info!(attempt, "credential test timed out, retrying");
        }
        session.clear_buffer();
        std::thread::sleep(config.submit_settle);
        info!(ssid, "testing credentials");
        session.send_command(&command)?;

        let deadline = Instant::now() + config.submit_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let Some(frame) = session.receive(remaining)? else {
                break;
            };
            match frame.frame_type {
                FrameType::State => {
                    let state = frame.payload.first().copied().unwrap_or_default();
                    match DeviceState::from_byte(state) {
                        DeviceState::Connecting => info!("device connecting"),
                        DeviceState::Connected => info!("device connected, awaiting confirmation"),
                        other => debug!(?other, "device state"),
                    }
                }
                FrameType::RpcResult => {
                    info!(ssid, "credentials accepted");
                    return Ok(());
                }
                FrameType::Error => {
                    let code = frame.payload.first().copied().unwrap_or_default();
                    if code == 0 {
                        continue;
                    }
                    return Err(ClientError::Device {
                        code,
                        reason: describe_device_error(code),
                    });
                }
                FrameType::RpcCommand => {} // Not a device-to-client frame
            }
        }
    }
    Err(ClientError::Timeout(config.submit_timeout))
}
