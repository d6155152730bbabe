use std::{convert::TryInto, fmt::Display, ops::BitOr};

use log::{debug, warn};

use super::blocks::{block_count, Block, BLOCK_SIZE};
use super::features::{parse_feature_stream, LineFeatures, FEATURES_ALL};
use super::frame::{self, Header, HEADER_SIZE};
use super::info::{Resolution, Version};
use super::{Error, PacketType, ProtocolError, Result};
use crate::port::Transport;

/// Line tracking mode flags for [`Pixy2::set_mode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineMode(pub u8);

impl LineMode {
    pub const DEFAULT: LineMode = LineMode(0x00);
    pub const TURN_DELAYED: LineMode = LineMode(0x01);
    pub const MANUAL_SELECT_VECTOR: LineMode = LineMode(0x02);
    pub const WHITE_LINE: LineMode = LineMode(0x80);

    pub fn contains(self, other: LineMode) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for LineMode {
    type Output = LineMode;

    fn bitor(self, rhs: LineMode) -> LineMode {
        LineMode(self.0 | rhs.0)
    }
}

impl Display for LineMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pixy2Config {
    /// Register address passed to every transport read and write.
    pub register: u8,
    /// Check payload sums of responses sent with the checksum sync.
    pub verify_checksum: bool,
}

impl Default for Pixy2Config {
    fn default() -> Self {
        Self {
            register: 0x00,
            verify_checksum: false,
        }
    }
}

// Line request types
const LINE_MAIN_FEATURES: u8 = 0;

// Resolution request type
const RESOLUTION_DEFAULT: u8 = 0;

/// Pixy2 protocol client. Every call is one complete transaction on the
/// transport; nothing is carried over between calls.
///
/// A response that fails with a [`ProtocolError`] is still consumed up to its
/// declared length, so the next call starts on a frame boundary.
pub struct Pixy2<'a> {
    transport: &'a mut dyn Transport,
    config: Pixy2Config,
    // Payload bytes of the current response not read yet
    pending: usize,
}

impl<'a> Pixy2<'a> {
    pub fn new(transport: &'a mut dyn Transport, config: Pixy2Config) -> Self {
        Self {
            transport,
            config,
            pending: 0,
        }
    }

    pub fn get_version(&mut self) -> Result<Version> {
        let header = self.transact(PacketType::GetVersion, &[], PacketType::Version)?;
        let result = self.read_payload(&header);
        self.settle(result.and_then(|payload| Version::decode(&payload)))
    }

    pub fn get_resolution(&mut self) -> Result<Resolution> {
        let header = self.transact(
            PacketType::GetResolution,
            &[RESOLUTION_DEFAULT],
            PacketType::Resolution,
        )?;
        let result = self.read_payload(&header);
        self.settle(result.and_then(|payload| Resolution::decode(&payload)))
    }

    pub fn set_lamp(&mut self, upper: bool, lower: bool) -> Result<()> {
        self.command(PacketType::SetLamp, &[upper as u8, lower as u8])
    }

    pub fn set_mode(&mut self, mode: LineMode) -> Result<()> {
        self.command(PacketType::SetMode, &[mode.0])
    }

    /// Returns the blocks matching `sigmap` in the order the camera sent them.
    pub fn get_blocks(&mut self, sigmap: u8, max_blocks: u8) -> Result<(usize, Vec<Block>)> {
        let header = self.transact(
            PacketType::GetBlocks,
            &[sigmap, max_blocks],
            PacketType::Blocks,
        )?;
        let result = self.read_blocks(&header);
        self.settle(result)
    }

    fn read_blocks(&mut self, header: &Header) -> Result<(usize, Vec<Block>)> {
        let count = block_count(header.payload_len())?;

        let mut sum = 0;
        let mut blocks = Vec::with_capacity(count);
        for _ in 0..count {
            let data = self.read_exact(BLOCK_SIZE, &mut sum)?;
            blocks.push(Block::decode(&data)?);
        }
        self.check_sum(header, sum)?;

        Ok((count, blocks))
    }

    pub fn get_line_features(&mut self) -> Result<LineFeatures> {
        let header = self.transact(
            PacketType::GetLineFeatures,
            &[LINE_MAIN_FEATURES, FEATURES_ALL],
            PacketType::LineFeatures,
        )?;

        let mut sum = 0;
        let result =
            parse_feature_stream(header.payload_len(), |n| self.read_exact(n, &mut sum))
                .and_then(|features| self.check_sum(&header, sum).map(|_| features));
        self.settle(result)
    }

    /// Sets the turn angle (degrees, left positive) for the next intersection.
    pub fn set_next_turn(&mut self, angle: i16) -> Result<()> {
        self.command(PacketType::SetNextTurn, &angle.to_le_bytes())
    }

    pub fn set_default_turn(&mut self, angle: i16) -> Result<()> {
        self.command(PacketType::SetDefaultTurn, &angle.to_le_bytes())
    }

    /// Selects the vector to follow, for [`LineMode::MANUAL_SELECT_VECTOR`].
    pub fn set_vector(&mut self, index: u8) -> Result<()> {
        self.command(PacketType::SetVector, &[index])
    }

    fn transact(
        &mut self,
        request: PacketType,
        payload: &[u8],
        expected: PacketType,
    ) -> Result<Header> {
        let packet = frame::encode_request(request, payload)?;

        debug!("send {:02X?}", packet);
        self.transport.write(self.config.register, &packet)?;

        let buffer = self.transport.read(self.config.register, HEADER_SIZE)?;
        debug!("recv {:02X?}", buffer);

        let header = frame::decode_header(&buffer)?;
        self.pending = header.payload_len();

        if let Err(e) = frame::validate(&header, expected) {
            debug!(
                "{} answered with {}",
                request,
                PacketType::describe(header.packet_type)
            );
            return self.settle(Err(e));
        }

        Ok(header)
    }

    /// Ends the current response. After a protocol error whatever is left of
    /// the declared payload is read and dropped.
    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(Error::Protocol(_)) = result {
            if self.pending > 0 {
                match self.transport.read(self.config.register, self.pending) {
                    Ok(data) => debug!("discard {:02X?}", data),
                    Err(e) => debug!("discard failed: {}", e),
                }
            }
        }
        self.pending = 0;
        result
    }

    fn read_payload(&mut self, header: &Header) -> Result<Vec<u8>> {
        let mut sum = 0;
        let payload = self.read_exact(header.payload_len(), &mut sum)?;
        self.check_sum(header, sum)?;
        Ok(payload)
    }

    fn command(&mut self, request: PacketType, payload: &[u8]) -> Result<()> {
        let header = self.transact(request, payload, PacketType::Ack)?;
        let result = self.read_payload(&header);
        let data = self.settle(result)?;

        if let Ok(bytes) = data.as_slice().try_into() {
            let result = i32::from_le_bytes(bytes);
            if result < 0 {
                warn!("{} rejected with result {}", request, result);
            }
        }

        Ok(())
    }

    fn read_exact(&mut self, count: usize, sum: &mut u16) -> Result<Vec<u8>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let data = self.transport.read(self.config.register, count)?;
        debug!("recv {:02X?}", data);
        self.pending = self.pending.saturating_sub(data.len());

        if data.len() != count {
            return Err(ProtocolError::ShortRead {
                expected: count,
                actual: data.len(),
            }
            .into());
        }

        *sum = sum.wrapping_add(frame::checksum(&data));
        Ok(data)
    }

    fn check_sum(&self, header: &Header, sum: u16) -> Result<()> {
        if self.config.verify_checksum && header.has_checksum() && header.checksum != sum {
            return Err(ProtocolError::ChecksumMismatch {
                expected: header.checksum,
                actual: sum,
            }
            .into());
        }
        Ok(())
    }
}
