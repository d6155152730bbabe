#[cfg(target_os = "linux")]
mod linux;
#[cfg(test)]
pub(crate) mod mock;
#[cfg(not(target_os = "linux"))]
mod other;

#[cfg(target_os = "linux")]
use linux::{is_port_open, open_i2c};
#[cfg(not(target_os = "linux"))]
use other::{is_port_open, open_i2c};

pub use serialport::SerialPort;

use anyhow::Result;
use core::time::Duration;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serialport::{self, ClearBuffer, SerialPortType};
use std::{
    fmt::Display,
    io::{self, Read, Write},
    str::FromStr,
};
use thiserror::Error;

/// Default I2C address configured on the camera.
pub const DEFAULT_I2C_ADDRESS: u16 = 0x54;
pub const DEFAULT_BAUDRATE: u32 = 19200;

/// Register addressed byte channel to the camera.
///
/// `read` returns fewer bytes than requested, possibly none, when the device
/// does not answer in time. Only genuine I/O failures are errors.
pub trait Transport {
    fn write(&mut self, register: u8, data: &[u8]) -> io::Result<()>;
    fn read(&mut self, register: u8, length: usize) -> io::Result<Vec<u8>>;
}

#[derive(Error, Debug)]
pub enum OpenPortError {
    #[error("no pixy2 compatible ports found")]
    NoCompatiblePort,
    #[error("{port_name:?} busy")]
    PortBusy { port_name: String },
    #[error("i2c is not supported on this platform")]
    I2cUnsupported,
}

#[derive(Error, Debug)]
pub enum TransportSpecError {
    #[error("invalid transport '{0}'")]
    BadTransport(String),
}

/// Where to find the camera: a UART device (`auto` to detect one) or an I2C
/// bus and address, written as `i2c:<bus>[:<address>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportSpec {
    Serial(String),
    I2c { bus: u8, address: u16 },
}

impl FromStr for TransportSpec {
    type Err = TransportSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lazy_static! {
            static ref RE: Regex =
                Regex::new(r"^i2c:(\d+)(?::(?:0x([0-9a-fA-F]+)|(\d+)))?$").unwrap();
        }

        let bad = || TransportSpecError::BadTransport(s.to_string());

        if let Some(c) = RE.captures(s) {
            let bus = c.get(1).unwrap().as_str().parse().map_err(|_| bad())?;
            let address = match (c.get(2), c.get(3)) {
                (Some(hex), _) => u16::from_str_radix(hex.as_str(), 16).map_err(|_| bad())?,
                (None, Some(dec)) => dec.as_str().parse().map_err(|_| bad())?,
                (None, None) => DEFAULT_I2C_ADDRESS,
            };
            if address > 0x7F {
                return Err(bad());
            }
            Ok(TransportSpec::I2c { bus, address })
        } else if s.is_empty() || s.starts_with("i2c:") {
            Err(bad())
        } else {
            Ok(TransportSpec::Serial(s.to_string()))
        }
    }
}

impl Display for TransportSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportSpec::Serial(name) => name.fmt(f),
            TransportSpec::I2c { bus, address } => write!(f, "i2c:{}:{:#04x}", bus, address),
        }
    }
}

/// Camera connected over UART. There are no registers on a serial link, so
/// the register argument is ignored.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, _register: u8, data: &[u8]) -> io::Result<()> {
        // Late bytes of an earlier response must not be taken for a header
        self.port.clear(ClearBuffer::Input)?;
        self.port.write_all(data)
    }

    fn read(&mut self, _register: u8, length: usize) -> io::Result<Vec<u8>> {
        let mut buffer = vec![0u8; length];
        let mut received = 0;

        while received < length {
            match self.port.read(&mut buffer[received..]) {
                Ok(0) => break,
                Ok(n) => received += n,
                Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
                Err(e) => return Err(e),
            }
        }

        buffer.truncate(received);
        Ok(buffer)
    }
}

#[derive(PartialEq)]
struct UsbId(u16, u16);

static COMPATIBLE_IDS: &[UsbId] = &[
    UsbId(0x0403, 0x6001), // FTDI FT232R USB UART
    UsbId(0x0403, 0x6014), // FTDI FT232H Single HS USB-UART/FIFO IC
    UsbId(0x1a86, 0x7523), // QinHeng Electronics HL-340 USB-Serial adapter
    UsbId(0x10c4, 0xea60), // Silicon Labs CP210x UART Bridge
];

pub fn open_port(port_name: &str, baudrate: u32, force: bool) -> Result<Box<dyn SerialPort>> {
    let true_name: String = if port_name == "auto" {
        guess_port()?
    } else {
        port_name.to_string()
    };

    if !force && is_port_open(&true_name) {
        return Err(OpenPortError::PortBusy {
            port_name: true_name,
        }
        .into());
    }

    let port = serialport::new(&true_name, baudrate)
        .timeout(Duration::from_millis(100))
        .open()?;

    debug!("open_port OK: {} @ {} baud", &true_name, baudrate);
    Ok(port)
}

pub fn open_transport(
    spec: &TransportSpec,
    baudrate: u32,
    force: bool,
) -> Result<Box<dyn Transport>> {
    match spec {
        TransportSpec::Serial(name) => Ok(Box::new(SerialTransport::new(open_port(
            name, baudrate, force,
        )?))),
        TransportSpec::I2c { bus, address } => open_i2c(*bus, *address, force),
    }
}

fn guess_port() -> Result<String> {
    serialport::available_ports()?
        .into_iter()
        .filter(|info| match &info.port_type {
            SerialPortType::UsbPort(usb_info) => {
                COMPATIBLE_IDS.contains(&UsbId(usb_info.vid, usb_info.pid))
                    && !is_port_open(&info.port_name)
            }
            _ => false,
        })
        .map(|info| info.port_name)
        .next()
        .ok_or_else(|| OpenPortError::NoCompatiblePort.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_i2c_spec() {
        assert_eq!(
            "i2c:1".parse::<TransportSpec>().unwrap(),
            TransportSpec::I2c {
                bus: 1,
                address: DEFAULT_I2C_ADDRESS
            }
        );
        assert_eq!(
            "i2c:3:0x55".parse::<TransportSpec>().unwrap(),
            TransportSpec::I2c {
                bus: 3,
                address: 0x55
            }
        );
        assert_eq!(
            "i2c:0:84".parse::<TransportSpec>().unwrap(),
            TransportSpec::I2c {
                bus: 0,
                address: 0x54
            }
        );
    }

    #[test]
    fn parse_serial_spec() {
        assert_eq!(
            "auto".parse::<TransportSpec>().unwrap(),
            TransportSpec::Serial("auto".to_string())
        );
        assert_eq!(
            "/dev/ttyUSB0".parse::<TransportSpec>().unwrap(),
            TransportSpec::Serial("/dev/ttyUSB0".to_string())
        );
    }

    #[test]
    fn parse_bad_spec() {
        assert!("".parse::<TransportSpec>().is_err());
        assert!("i2c:".parse::<TransportSpec>().is_err());
        assert!("i2c:1:0x80".parse::<TransportSpec>().is_err());
        assert!("i2c:300".parse::<TransportSpec>().is_err());
    }

    #[test]
    fn display_spec() {
        let spec = TransportSpec::I2c {
            bus: 1,
            address: 0x54,
        };
        assert_eq!(spec.to_string(), "i2c:1:0x54");
        assert_eq!(spec.to_string().parse::<TransportSpec>().unwrap(), spec);
    }
}
