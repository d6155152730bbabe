use std::{convert::TryInto, fmt::Display};

use super::{ProtocolError, Result};

pub const BLOCK_SIZE: usize = 14;

/// All seven color signatures.
pub const SIGMAP_ALL: u8 = 0xFF;

/// Color connected component detected by the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Block {
    pub signature: u16,
    pub x_center: u16,
    pub y_center: u16,
    pub width: u16,
    pub height: u16,
    pub angle: u16,
    pub tracking_index: u8,
    pub age: u8,
}

impl Block {
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() != BLOCK_SIZE {
            return Err(ProtocolError::BadPayloadLength {
                what: "block",
                expected: BLOCK_SIZE,
                actual: data.len(),
            }
            .into());
        }

        let le16 = |i: usize| u16::from_le_bytes(data[i..i + 2].try_into().unwrap());

        Ok(Block {
            signature: le16(0),
            x_center: le16(2),
            y_center: le16(4),
            width: le16(6),
            height: le16(8),
            angle: le16(10),
            tracking_index: data[12],
            age: data[13],
        })
    }
}

impl Display for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "sig={} x={} y={} width={} height={} angle={} index={} age={}",
            self.signature,
            self.x_center,
            self.y_center,
            self.width,
            self.height,
            self.angle,
            self.tracking_index,
            self.age
        )
    }
}

/// Number of block records in a payload of `length` bytes.
pub fn block_count(length: usize) -> Result<usize> {
    if length % BLOCK_SIZE != 0 {
        return Err(ProtocolError::BlockLengthMismatch(length).into());
    }
    Ok(length / BLOCK_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Error;

    #[test]
    fn decode_block() {
        let data = [1, 0, 158, 0, 150, 0, 20, 0, 20, 0, 0, 0, 0, 5];
        let block = Block::decode(&data).unwrap();

        assert_eq!(
            block,
            Block {
                signature: 1,
                x_center: 158,
                y_center: 150,
                width: 20,
                height: 20,
                angle: 0,
                tracking_index: 0,
                age: 5,
            }
        );
    }

    #[test]
    fn decode_block_wide_fields() {
        let data = [7, 0, 0x3B, 0x01, 0xCF, 0x00, 0x00, 0x01, 2, 0, 0x68, 0x01, 9, 255];
        let block = Block::decode(&data).unwrap();

        assert_eq!(block.signature, 7);
        assert_eq!(block.x_center, 315);
        assert_eq!(block.y_center, 207);
        assert_eq!(block.width, 256);
        assert_eq!(block.angle, 360);
        assert_eq!(block.tracking_index, 9);
        assert_eq!(block.age, 255);
    }

    #[test]
    fn count_from_length() {
        assert_eq!(block_count(0).unwrap(), 0);
        assert_eq!(block_count(42).unwrap(), 3);
        assert!(matches!(
            block_count(43),
            Err(Error::Protocol(ProtocolError::BlockLengthMismatch(43)))
        ));
    }
}
