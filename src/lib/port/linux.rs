use super::{OpenPortError, Transport};

use anyhow::Result;
use glob::glob;
use log::debug;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;

pub fn is_port_open(port_name: &str) -> bool {
    let paths = match glob("/proc/[0-9]*/fd/*") {
        Ok(paths) => paths,
        Err(_) => return false,
    };

    paths
        .filter_map(|p| match p {
            Ok(path) => Some(path),
            Err(_) => None,
        })
        .filter_map(|path| match fs::read_link(path) {
            Ok(link) => Some(link),
            Err(_) => None,
        })
        .any(|link| link.to_str() == Some(port_name))
}

/// Camera on a Linux i2c-dev bus. Every transfer starts with the register
/// byte, reads are a register write followed by a plain read.
pub struct I2cTransport {
    file: File,
}

impl I2cTransport {
    pub fn open(bus: u8, address: u16) -> Result<Self> {
        let path = format!("/dev/i2c-{}", bus);
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        unsafe { ioctl::i2c_set_slave(file.as_raw_fd(), address as i32) }
            .map_err(|e| io::Error::from_raw_os_error(e as i32))?;

        debug!("open_i2c OK: {} @ {:#04x}", path, address);
        Ok(Self { file })
    }
}

impl Transport for I2cTransport {
    fn write(&mut self, register: u8, data: &[u8]) -> io::Result<()> {
        let mut buffer = Vec::with_capacity(data.len() + 1);
        buffer.push(register);
        buffer.extend_from_slice(data);
        self.file.write_all(&buffer)
    }

    fn read(&mut self, register: u8, length: usize) -> io::Result<Vec<u8>> {
        self.file.write_all(&[register])?;

        let mut buffer = vec![0u8; length];
        let received = self.file.read(&mut buffer)?;
        buffer.truncate(received);
        Ok(buffer)
    }
}

pub fn open_i2c(bus: u8, address: u16, force: bool) -> Result<Box<dyn Transport>> {
    let path = format!("/dev/i2c-{}", bus);
    if !force && is_port_open(&path) {
        return Err(OpenPortError::PortBusy { port_name: path }.into());
    }

    Ok(Box::new(I2cTransport::open(bus, address)?))
}

mod ioctl {
    use nix::ioctl_write_int_bad;

    const I2C_SLAVE: u32 = 0x0703;

    ioctl_write_int_bad!(i2c_set_slave, I2C_SLAVE);
}
