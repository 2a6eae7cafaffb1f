use std::io::{Read, Write};
use std::time::Duration;

use serialport::SerialPort;
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::link::SerialLink;

/// Baud rate expected by Improv-capable firmware.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

const OPEN_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// A serial device present on this machine.
#[derive(Debug, Clone)]
pub struct PortInfo {
    pub name: String,
    /// Human-readable bus description ("usb 303a:1001", "bluetooth", ...).
    pub kind: String,
}

/// `serialport`-backed [`SerialLink`] for real USB-serial devices.
pub struct UsbSerialLink {
    port: Box<dyn SerialPort>,
}

impl UsbSerialLink {
    /// Open a serial device at the given baud rate.
    pub fn open(port: &str, baud: u32) -> Result<Self> {
        let inner = serialport::new(port, baud)
            .timeout(OPEN_READ_TIMEOUT)
            .open()
            .map_err(|err| TransportError::Open {
                port: port.to_string(),
                source: err.into(),
            })?;
        info!(port, baud, "opened serial port");
        Ok(Self { port: inner })
    }

    /// Serial devices present on this machine.
    pub fn available_ports() -> Result<Vec<PortInfo>> {
        let ports = serialport::available_ports()
            .map_err(|err| TransportError::Io(err.into()))?
            .into_iter()
            .map(|info| PortInfo {
                name: info.port_name,
                kind: describe_port_type(&info.port_type),
            })
            .collect();
        Ok(ports)
    }
}

fn describe_port_type(port_type: &serialport::SerialPortType) -> String {
    match port_type {
        serialport::SerialPortType::UsbPort(usb) => {
            format!("usb {:04x}:{:04x}", usb.vid, usb.pid)
        }
        serialport::SerialPortType::BluetoothPort => "bluetooth".to_string(),
        serialport::SerialPortType::PciPort => "pci".to_string(),
        serialport::SerialPortType::Unknown => "unknown".to_string(),
    }
}

impl Read for UsbSerialLink {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for UsbSerialLink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.port.flush()
    }
}

impl SerialLink for UsbSerialLink {
    fn try_clone(&self) -> Result<Box<dyn SerialLink>> {
        let port = self
            .port
            .try_clone()
            .map_err(|err| TransportError::Io(err.into()))?;
        Ok(Box::new(Self { port }))
    }

    fn set_control_lines(&mut self, dtr: bool, rts: bool) -> Result<()> {
        debug!(dtr, rts, "setting control lines");
        self.port
            .write_data_terminal_ready(dtr)
            .map_err(|err| TransportError::ControlLines(err.into()))?;
        self.port
            .write_request_to_send(rts)
            .map_err(|err| TransportError::ControlLines(err.into()))?;
        Ok(())
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.port
            .set_timeout(timeout)
            .map_err(|err| TransportError::Io(err.into()))?;
        Ok(())
    }
}
