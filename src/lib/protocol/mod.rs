pub mod blocks;
pub mod client;
pub mod features;
pub mod frame;
pub mod info;

use std::{fmt::Display, io};

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use thiserror::Error;

pub use blocks::Block;
pub use client::{LineMode, Pixy2, Pixy2Config};
pub use features::{Barcode, Branch, Feature, FeatureAnomaly, Intersection, LineFeatures, Vector};
pub use frame::{Header, HEADER_SIZE};
pub use info::{Resolution, Version};

#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum PacketType {
    Ack = 1,
    GetResolution = 12,
    Resolution = 13,
    GetVersion = 14,
    Version = 15,
    SetLamp = 22,
    GetBlocks = 32,
    Blocks = 33,
    GetLineFeatures = 48,
    LineFeatures = 49,
    SetMode = 54,
    SetVector = 56,
    SetNextTurn = 58,
    SetDefaultTurn = 60,
}

impl PacketType {
    pub fn describe(code: u8) -> String {
        match PacketType::from_u8(code) {
            Some(t) => format!("{:?} ({})", t, code),
            None => format!("unknown ({})", code),
        }
    }
}

impl Display for PacketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} ({})", self, *self as u8)
    }
}

/// Classification tag carried by every [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    Protocol,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Connection => "ConnectionError".fmt(f),
            ErrorKind::Protocol => "ProtocolError".fmt(f),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("empty data packet, check if Pixy2 is properly connected")]
    NoData,
    #[error("no response from Pixy2")]
    NoResponse,
    #[error("transport failure: {0}")]
    Transport(#[from] io::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("read wrong type of packet: {actual} instead of {expected}")]
    UnexpectedPacket { expected: u8, actual: u8 },
    #[error("malformed response header ({0} of 6 bytes)")]
    MalformedHeader(usize),
    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },
    #[error("request payload too long ({0} bytes)")]
    PayloadTooLong(usize),
    #[error("block payload length {0} is not a multiple of {size}", size = blocks::BLOCK_SIZE)]
    BlockLengthMismatch(usize),
    #[error("feature stream truncated: record needs {needed} bytes, {remaining} left")]
    TruncatedFeatureStream { needed: usize, remaining: usize },
    #[error("malformed feature record type {feature_type} ({length} bytes)")]
    MalformedFeature { feature_type: u8, length: usize },
    #[error("unexpected payload length {actual} for {what}, need {expected}")]
    BadPayloadLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("firmware type is not valid text")]
    InvalidFirmwareType,
    #[error("checksum mismatch: header {expected:#06X}, payload {actual:#06X}")]
    ChecksumMismatch { expected: u16, actual: u16 },
}

/// Either the device is gone ([`ErrorKind::Connection`], stop polling) or the
/// current transaction is unusable ([`ErrorKind::Protocol`], retry next cycle).
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Connection(#[from] ConnectionError),
    #[error("{0}")]
    Protocol(#[from] ProtocolError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Connection(_) => ErrorKind::Connection,
            Error::Protocol(_) => ErrorKind::Protocol,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Connection
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Connection(ConnectionError::Transport(e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
