use std::{convert::TryInto, fmt::Display};

use super::{ProtocolError, Result};

pub const VERSION_SIZE: usize = 16;
pub const RESOLUTION_SIZE: usize = 4;

// hardware(2) + major(1) + minor(1) + build(2)
const VERSION_FIXED_SIZE: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub hardware: u16,
    pub firmware_major: u8,
    pub firmware_minor: u8,
    pub firmware_build: u16,
    pub firmware_type: String,
}

impl Version {
    /// Decodes a version payload. The last byte is a terminator and is not
    /// part of the firmware type string.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() != VERSION_SIZE {
            return Err(ProtocolError::BadPayloadLength {
                what: "version",
                expected: VERSION_SIZE,
                actual: payload.len(),
            }
            .into());
        }

        let text = &payload[VERSION_FIXED_SIZE..payload.len() - 1];
        let firmware_type = std::str::from_utf8(text)
            .map_err(|_| ProtocolError::InvalidFirmwareType)?
            .trim_end_matches('\0')
            .to_string();

        Ok(Version {
            hardware: u16::from_le_bytes(payload[0..2].try_into().unwrap()),
            firmware_major: payload[2],
            firmware_minor: payload[3],
            firmware_build: u16::from_le_bytes(payload[4..6].try_into().unwrap()),
            firmware_type,
        })
    }

    pub fn firmware(&self) -> String {
        format!(
            "{}.{}.{}",
            self.firmware_major, self.firmware_minor, self.firmware_build
        )
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Hardware version: {}", self.hardware)?;
        write!(
            f,
            "Firmware version: {} {}",
            self.firmware(),
            self.firmware_type
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u16,
    pub height: u16,
}

impl Resolution {
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() != RESOLUTION_SIZE {
            return Err(ProtocolError::BadPayloadLength {
                what: "resolution",
                expected: RESOLUTION_SIZE,
                actual: payload.len(),
            }
            .into());
        }

        Ok(Resolution {
            width: u16::from_le_bytes(payload[0..2].try_into().unwrap()),
            height: u16::from_le_bytes(payload[2..4].try_into().unwrap()),
        })
    }
}

impl Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "width={} height={}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Error;

    #[test]
    fn decode_version() {
        let payload = [
            0x22, 0x00, 3, 0, 0x0B, 0x00, b'g', b'e', b'n', b'e', b'r', b'a', b'l', 0, 0, 0,
        ];
        let version = Version::decode(&payload).unwrap();

        assert_eq!(version.hardware, 0x22);
        assert_eq!(version.firmware(), "3.0.11");
        assert_eq!(version.firmware_type, "general");
        assert_eq!(
            version.to_string(),
            "Hardware version: 34\nFirmware version: 3.0.11 general"
        );
    }

    #[test]
    fn decode_version_bad_text() {
        let payload = [0, 0, 1, 2, 3, 0, 0xFF, 0xFE, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(matches!(
            Version::decode(&payload),
            Err(Error::Protocol(ProtocolError::InvalidFirmwareType))
        ));
    }

    #[test]
    fn decode_version_too_short() {
        assert!(matches!(
            Version::decode(&[0, 0, 1, 2]),
            Err(Error::Protocol(ProtocolError::BadPayloadLength { actual: 4, .. }))
        ));
        assert!(matches!(
            Version::decode(&[0x22, 0, 3, 0, 11, 0, b'g', 0]),
            Err(Error::Protocol(ProtocolError::BadPayloadLength {
                expected: VERSION_SIZE,
                actual: 8,
                ..
            }))
        ));
    }

    #[test]
    fn decode_resolution() {
        let res = Resolution::decode(&[0x3C, 0x01, 0xD0, 0x00]).unwrap();
        assert_eq!(
            res,
            Resolution {
                width: 316,
                height: 208
            }
        );
        assert!(Resolution::decode(&[1, 2, 3]).is_err());
    }
}
