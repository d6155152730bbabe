use std::convert::TryInto;

use super::{ConnectionError, PacketType, ProtocolError, Result};

/// Request preamble, `0xC1AE` little-endian.
pub const SYNC_REQUEST: [u8; 2] = [0xAE, 0xC1];
/// Response sync for checksummed packets, `0xC1AF` little-endian.
pub const SYNC_CHECKSUM: u16 = 0xC1AF;
pub const HEADER_SIZE: usize = 6;

/// Response header. Only the type code and payload length drive decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub sync: u16,
    pub packet_type: u8,
    pub length: u8,
    /// Bytes 4-5. Payload checksum when `sync == SYNC_CHECKSUM`, otherwise reserved.
    pub checksum: u16,
}

impl Header {
    pub fn payload_len(&self) -> usize {
        self.length as usize
    }

    pub fn has_checksum(&self) -> bool {
        self.sync == SYNC_CHECKSUM
    }
}

pub fn encode_request(packet_type: PacketType, payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > u8::MAX as usize {
        return Err(ProtocolError::PayloadTooLong(payload.len()).into());
    }

    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&SYNC_REQUEST);
    frame.push(packet_type as u8);
    frame.push(payload.len() as u8);
    frame.extend_from_slice(payload);
    Ok(frame)
}

pub fn decode_header(buffer: &[u8]) -> Result<Header> {
    if buffer.is_empty() {
        return Err(ConnectionError::NoResponse.into());
    }

    if buffer.len() < HEADER_SIZE {
        return Err(ProtocolError::MalformedHeader(buffer.len()).into());
    }

    Ok(Header {
        sync: u16::from_le_bytes(buffer[0..2].try_into().unwrap()),
        packet_type: buffer[2],
        length: buffer[3],
        checksum: u16::from_le_bytes(buffer[4..6].try_into().unwrap()),
    })
}

pub fn validate(header: &Header, expected: PacketType) -> Result<()> {
    if header.packet_type == 0 {
        return Err(ConnectionError::NoData.into());
    }

    if header.packet_type != expected as u8 {
        return Err(ProtocolError::UnexpectedPacket {
            expected: expected as u8,
            actual: header.packet_type,
        }
        .into());
    }

    Ok(())
}

pub fn checksum(payload: &[u8]) -> u16 {
    payload
        .iter()
        .fold(0u16, |sum, &b| sum.wrapping_add(b as u16))
}
