use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use serialport::{DataBits, FlowControl, Parity, StopBits};
use tracing::{debug, info};

use crate::error::{serialport_to_io, Result, TransportError};
use crate::traits::{PortConfig, PortHandle};

/// A serial device opened through the operating system.
pub struct SerialLink {
    port: Box<dyn serialport::SerialPort>,
    path: PathBuf,
}

impl SerialLink {
    /// Open the device described by `config` (8N1, no flow control).
    pub fn open(config: &PortConfig) -> Result<Self> {
        let path = config.path.clone();
        info!(?path, baud = config.baud_rate, "opening serial port");

        let port = serialport::new(path.to_string_lossy(), config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.read_timeout)
            .open()
            .map_err(|e| TransportError::Open {
                path: path.clone(),
                source: serialport_to_io(e),
            })?;

        info!(?path, "serial port open");
        Ok(Self { port, path })
    }

    /// Line rate currently applied to the device.
    pub fn baud_rate(&self) -> Result<u32> {
        self.port
            .baud_rate()
            .map_err(|e| TransportError::Io(serialport_to_io(e)))
    }
}

impl PortHandle for SerialLink {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(err) if err.kind() == ErrorKind::TimedOut => Ok(0),
            Err(err) if err.kind() == ErrorKind::Interrupted => Ok(0),
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let mut offset = 0usize;
        while offset < buf.len() {
            match self.port.write(&buf[offset..]) {
                Ok(0) => break,
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::TimedOut => break,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        self.port.flush()?;
        Ok(offset)
    }

    fn device_path(&self) -> &Path {
        &self.path
    }

    fn try_clone(&self) -> Result<Self> {
        let port = self.port.try_clone().map_err(|e| TransportError::Clone {
            path: self.path.clone(),
            source: serialport_to_io(e),
        })?;
        debug!(path = ?self.path, "cloned serial port handle");
        Ok(Self {
            port,
            path: self.path.clone(),
        })
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        debug!(path = ?self.path, "serial port handle released");
    }
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("path", &self.path)
            .finish()
    }
}

/// A serial port visible to the operating system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Device name or path.
    pub name: String,
    /// Short description of the port type.
    pub kind: String,
}

/// Enumerate serial ports present on this machine.
pub fn available_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports().map_err(|e| TransportError::Io(serialport_to_io(e)))?;
    Ok(ports
        .into_iter()
        .map(|p| PortInfo {
            name: p.port_name,
            kind: describe_port_type(&p.port_type),
        })
        .collect())
}

fn describe_port_type(port_type: &serialport::SerialPortType) -> String {
    match port_type {
        serialport::SerialPortType::UsbPort(usb) => {
            let product = usb.product.as_deref().unwrap_or("usb");
            format!("{product} ({:04x}:{:04x})", usb.vid, usb.pid)
        }
        serialport::SerialPortType::PciPort => "pci".to_string(),
        serialport::SerialPortType::BluetoothPort => "bluetooth".to_string(),
        serialport::SerialPortType::Unknown => "unknown".to_string(),
    }
}
