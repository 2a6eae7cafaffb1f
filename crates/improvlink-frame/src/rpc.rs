//! RPC payload layer: command encoding and result parsing.
//!
//! RPC_COMMAND payloads are `[sub_command, arg_len, args...]`. RPC_RESULT
//! payloads echo the command byte and a remaining-length byte, then carry
//! length-prefixed strings from offset 2. Firmware is not uniform about the
//! preamble contents, so parsers here only trust the string lengths.

use crate::error::{FrameError, Result};

/// Identifier reported when the device never answers or answers short.
pub const UNKNOWN_DEVICE_ID: &str = "unknown";

/// Offset of the first length-prefixed string in an RPC_RESULT payload.
const RESULT_STRINGS_OFFSET: usize = 2;

/// Auth-required marker in a scan result entry.
const AUTH_REQUIRED: &str = "YES";

/// A command sent to the device inside an RPC_COMMAND frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcCommand {
    /// Submit WiFi credentials (0x01).
    SendCredentials { ssid: String, password: String },
    /// Request device information (0x03); the 4th returned string is the
    /// device identifier.
    DeviceInfo,
    /// Start a WiFi scan (0x04).
    ScanNetworks,
}

impl RpcCommand {
    /// Sub-command byte on the wire.
    pub fn code(&self) -> u8 {
        match self {
            Self::SendCredentials { .. } => 0x01,
            Self::DeviceInfo => 0x03,
            Self::ScanNetworks => 0x04,
        }
    }

    /// Encode the RPC_COMMAND frame payload: `[code, arg_len, args...]`.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let args = match self {
            Self::SendCredentials { ssid, password } => {
                let ssid = ssid.as_bytes();
                let password = password.as_bytes();
                if ssid.len() > u8::MAX as usize || password.len() > u8::MAX as usize {
                    return Err(FrameError::PayloadTooLarge {
                        size: ssid.len().max(password.len()),
                        max: u8::MAX as usize,
                    });
                }
                let mut args = Vec::with_capacity(2 + ssid.len() + password.len());
                args.push(ssid.len() as u8);
                args.extend_from_slice(ssid);
                args.push(password.len() as u8);
                args.extend_from_slice(password);
                args
            }
            Self::DeviceInfo | Self::ScanNetworks => Vec::new(),
        };

        if args.len() > u8::MAX as usize {
            return Err(FrameError::PayloadTooLarge {
                size: args.len(),
                max: u8::MAX as usize,
            });
        }

        let mut payload = Vec::with_capacity(2 + args.len());
        payload.push(self.code());
        payload.push(args.len() as u8);
        payload.extend_from_slice(&args);
        Ok(payload)
    }
}

/// Device state carried in a STATE frame's single payload byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    AuthorizationRequired,
    Authorized,
    Connecting,
    Connected,
    Unknown(u8),
}

impl DeviceState {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x01 => Self::AuthorizationRequired,
            0x02 => Self::Authorized,
            0x03 => Self::Connecting,
            0x04 => Self::Connected,
            other => Self::Unknown(other),
        }
    }
}

/// Human-readable reason for a device-reported error code.
///
/// Unknown codes keep the raw value visible; callers never see a bare
/// number without context.
pub fn describe_device_error(code: u8) -> String {
    match code {
        1 => "invalid RPC packet".to_string(),
        2 => "unknown RPC command".to_string(),
        3 => "invalid password or network unreachable".to_string(),
        4 => "not authorized".to_string(),
        other => format!("device error {other}"),
    }
}

/// Parsed device-information result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Length-prefixed strings in payload order (firmware name, version,
    /// chip, device identifier, ...).
    pub strings: Vec<String>,
}

impl DeviceInfo {
    /// Parse up to 4 strings from an RPC_RESULT payload.
    pub fn parse(payload: &[u8]) -> Self {
        Self {
            strings: parse_strings(payload, 4),
        }
    }

    /// The device identifier: the 4th string, absent on short answers.
    pub fn device_id(&self) -> Option<&str> {
        self.strings.get(3).map(String::as_str)
    }
}

/// One WiFi network from a scan result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkEntry {
    pub ssid: String,
    /// Signal strength in dBm (negative; closer to zero is stronger).
    pub rssi: i16,
    pub requires_auth: bool,
}

impl NetworkEntry {
    /// Parse a scan-result entry payload: ssid, rssi, auth flag as three
    /// length-prefixed fields after the preamble.
    ///
    /// The rssi field is either a single signed byte or an ASCII decimal
    /// string, depending on firmware. Returns `None` for truncated entries
    /// or an empty ssid.
    pub fn parse(payload: &[u8]) -> Option<Self> {
        let mut fields = FieldWalker::new(payload);
        let ssid_bytes = fields.next()?;
        if ssid_bytes.is_empty() {
            return None;
        }
        let ssid = String::from_utf8_lossy(ssid_bytes).into_owned();

        let rssi_bytes = fields.next()?;
        let rssi = if rssi_bytes.len() == 1 {
            rssi_bytes[0] as i8 as i16
        } else {
            String::from_utf8_lossy(rssi_bytes)
                .trim()
                .parse()
                .unwrap_or(0)
        };

        let auth_bytes = fields.next()?;
        let requires_auth = auth_bytes == AUTH_REQUIRED.as_bytes();

        Some(Self {
            ssid,
            rssi,
            requires_auth,
        })
    }
}

/// True when an RPC_RESULT payload signals the end of a scan.
pub fn is_end_of_scan(payload: &[u8]) -> bool {
    payload.len() <= RESULT_STRINGS_OFFSET || payload[1] == 0
}

/// Walk length-prefixed fields starting after the result preamble.
struct FieldWalker<'a> {
    payload: &'a [u8],
    pos: usize,
}

impl<'a> FieldWalker<'a> {
    fn new(payload: &'a [u8]) -> Self {
        Self {
            payload,
            pos: RESULT_STRINGS_OFFSET,
        }
    }

    fn next(&mut self) -> Option<&'a [u8]> {
        let len = *self.payload.get(self.pos)? as usize;
        let start = self.pos + 1;
        let end = start.checked_add(len)?;
        if end > self.payload.len() {
            return None;
        }
        self.pos = end;
        Some(&self.payload[start..end])
    }
}

fn parse_strings(payload: &[u8], max: usize) -> Vec<String> {
    let mut walker = FieldWalker::new(payload);
    let mut strings = Vec::new();
    while strings.len() < max {
        match walker.next() {
            Some(field) => strings.push(String::from_utf8_lossy(field).into_owned()),
            None => break,
        }
    }
    strings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_payload(code: u8, fields: &[&[u8]]) -> Vec<u8> {
        let mut body = Vec::new();
        for field in fields {
            body.push(field.len() as u8);
            body.extend_from_slice(field);
        }
        let mut payload = vec![code, body.len() as u8];
        payload.extend_from_slice(&body);
        payload
    }

    #[test]
    fn scan_command_encoding() {
        assert_eq!(RpcCommand::ScanNetworks.encode().unwrap(), vec![0x04, 0x00]);
    }

    #[test]
    fn device_info_command_encoding() {
        assert_eq!(RpcCommand::DeviceInfo.encode().unwrap(), vec![0x03, 0x00]);
    }

    #[test]
    fn credentials_command_encoding_is_byte_exact() {
        let cmd = RpcCommand::SendCredentials {
            ssid: "ab".to_string(),
            password: "xyz".to_string(),
        };
        assert_eq!(
            cmd.encode().unwrap(),
            vec![0x01, 0x07, 0x02, b'a', b'b', 0x03, b'x', b'y', b'z']
        );
    }

    #[test]
    fn oversized_credentials_rejected() {
        let cmd = RpcCommand::SendCredentials {
            ssid: "s".repeat(300),
            password: String::new(),
        };
        assert!(matches!(
            cmd.encode().unwrap_err(),
            FrameError::PayloadTooLarge { .. }
        ));
    }

    #[test]
    fn device_info_fourth_string_is_identifier() {
        let payload = result_payload(0x03, &[b"a", b"b", b"c", b"dev-123"]);
        let info = DeviceInfo::parse(&payload);
        assert_eq!(info.device_id(), Some("dev-123"));
    }

    #[test]
    fn short_device_info_has_no_identifier() {
        let payload = result_payload(0x03, &[b"firmware", b"1.0"]);
        let info = DeviceInfo::parse(&payload);
        assert_eq!(info.strings.len(), 2);
        assert_eq!(info.device_id(), None);
    }

    #[test]
    fn truncated_string_stops_parsing() {
        let mut payload = result_payload(0x03, &[b"a", b"b"]);
        payload.push(0x20); // Claims 32 more bytes that never arrive
        let info = DeviceInfo::parse(&payload);
        assert_eq!(info.strings, vec!["a", "b"]);
    }

    #[test]
    fn network_entry_signed_byte_rssi() {
        // 0xBD as i8 is -67
        let payload = result_payload(0x04, &[b"HomeNet", &[0xBD], b"YES"]);
        let entry = NetworkEntry::parse(&payload).unwrap();
        assert_eq!(entry.ssid, "HomeNet");
        assert_eq!(entry.rssi, -67);
        assert!(entry.requires_auth);
    }

    #[test]
    fn network_entry_ascii_rssi() {
        let payload = result_payload(0x04, &[b"Cafe", b"-40", b"NO"]);
        let entry = NetworkEntry::parse(&payload).unwrap();
        assert_eq!(entry.rssi, -40);
        assert!(!entry.requires_auth);
    }

    #[test]
    fn network_entry_rejects_truncated_or_empty() {
        let truncated = result_payload(0x04, &[b"OnlySsid"]);
        assert!(NetworkEntry::parse(&truncated).is_none());

        let empty_ssid = result_payload(0x04, &[b"", &[0xBD], b"YES"]);
        assert!(NetworkEntry::parse(&empty_ssid).is_none());
    }

    #[test]
    fn end_of_scan_detection() {
        assert!(is_end_of_scan(&[]));
        assert!(is_end_of_scan(&[0x04]));
        assert!(is_end_of_scan(&[0x04, 0x05]));
        assert!(is_end_of_scan(&[0x04, 0x00, 0x01, b'x']));
        assert!(!is_end_of_scan(&result_payload(
            0x04,
            &[b"Net", &[0xBD], b"YES"]
        )));
    }

    #[test]
    fn device_state_bytes() {
        assert_eq!(DeviceState::from_byte(0x03), DeviceState::Connecting);
        assert_eq!(DeviceState::from_byte(0x04), DeviceState::Connected);
        assert_eq!(DeviceState::from_byte(0x7E), DeviceState::Unknown(0x7E));
    }

    #[test]
    fn error_code_mapping() {
        assert!(describe_device_error(3).contains("password"));
        assert_eq!(describe_device_error(4), "not authorized");
        assert!(describe_device_error(9).contains('9'));
    }
}
