use std::collections::VecDeque;
use std::io;

use super::Transport;
use crate::protocol::frame::{checksum, SYNC_CHECKSUM};

/// In-memory transport serving queued response bytes. Reads past the end of
/// the queue come back short, like a camera that stopped answering.
#[derive(Default)]
pub struct ScriptedTransport {
    pub writes: Vec<(u8, Vec<u8>)>,
    pub reads: Vec<usize>,
    rx: VecDeque<u8>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter());
    }

    pub fn remaining(&self) -> usize {
        self.rx.len()
    }
}

impl Transport for ScriptedTransport {
    fn write(&mut self, register: u8, data: &[u8]) -> io::Result<()> {
        self.writes.push((register, data.to_vec()));
        Ok(())
    }

    fn read(&mut self, _register: u8, length: usize) -> io::Result<Vec<u8>> {
        self.reads.push(length);
        let n = length.min(self.rx.len());
        Ok(self.rx.drain(..n).collect())
    }
}

/// Checksummed response frame carrying `payload`.
pub fn response(packet_type: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(6 + payload.len());
    frame.extend_from_slice(&SYNC_CHECKSUM.to_le_bytes());
    frame.push(packet_type);
    frame.push(payload.len() as u8);
    frame.extend_from_slice(&checksum(payload).to_le_bytes());
    frame.extend_from_slice(payload);
    frame
}
