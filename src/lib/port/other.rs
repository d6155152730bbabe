use super::{OpenPortError, Transport};
use anyhow::Result;

// TODO: implement proper check
pub fn is_port_open(_port_name: &str) -> bool {
    false
}

pub fn open_i2c(_bus: u8, _address: u16, _force: bool) -> Result<Box<dyn Transport>> {
    Err(OpenPortError::I2cUnsupported.into())
}
