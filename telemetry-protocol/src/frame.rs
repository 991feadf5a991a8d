use crate::protocol::{FramingError, RECORD_SIZE, TelemetryRecord};
use crc_any::CRCu16;
use log::debug;

/*
 * Sync | Record | CRC
 * 0xA5 0x5A | 16B | 2B (CRC-16/CCITT-FALSE over the record, big-endian)
 */

pub const SYNC: [u8; 2] = [0xA5, 0x5A];
pub const FRAME_SIZE: usize = SYNC.len() + RECORD_SIZE + 2;

fn checksum(record: &[u8]) -> u16 {
    let mut crc = CRCu16::crc16ccitt_false();
    crc.digest(record);
    crc.get_crc()
}

/// Wraps a record in a sync marker and a checksum.
pub fn encode_synced(record: &TelemetryRecord) -> [u8; FRAME_SIZE] {
    let payload = record.encode();
    let mut frame = [0u8; FRAME_SIZE];

    frame[..2].copy_from_slice(&SYNC);
    frame[2..2 + RECORD_SIZE].copy_from_slice(&payload);
    frame[2 + RECORD_SIZE..].copy_from_slice(&checksum(&payload).to_be_bytes());

    frame
}

/// Decodes a single synced frame of exactly [`FRAME_SIZE`] bytes.
pub fn decode_synced(bytes: &[u8]) -> Result<TelemetryRecord, FramingError> {
    if bytes.len() != FRAME_SIZE {
        return Err(FramingError::InvalidLength {
            expected: FRAME_SIZE,
            actual: bytes.len(),
        });
    }

    if bytes[..2] != SYNC {
        return Err(FramingError::MissingSync);
    }

    let payload = &bytes[2..2 + RECORD_SIZE];
    let expected = u16::from_be_bytes([bytes[FRAME_SIZE - 2], bytes[FRAME_SIZE - 1]]);
    let actual = checksum(payload);

    if expected != actual {
        return Err(FramingError::ChecksumMismatch { expected, actual });
    }

    TelemetryRecord::decode(payload)
}

/// Recovers synced frames from an arbitrarily chunked byte stream.
///
/// Bytes that precede a sync marker are dropped, and so is the marker of a
/// frame whose checksum does not match, after which the scan resumes one byte
/// further. An incomplete trailing frame stays buffered until more bytes
/// arrive.
#[derive(Debug, Default)]
pub struct Resynchronizer {
    buffer: Vec<u8>,
    discarded: usize,
}

impl Resynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Returns the next complete frame, if the buffer holds one.
    pub fn next_record(&mut self) -> Option<TelemetryRecord> {
        loop {
            match find_sync(&self.buffer) {
                Some(pos) => self.discard(pos),
                None => {
                    // A lone first sync byte may be completed by the next chunk.
                    let keep = usize::from(self.buffer.last() == Some(&SYNC[0]));
                    self.discard(self.buffer.len() - keep);
                    return None;
                }
            }

            if self.buffer.len() < FRAME_SIZE {
                return None;
            }

            match decode_synced(&self.buffer[..FRAME_SIZE]) {
                Ok(record) => {
                    self.buffer.drain(..FRAME_SIZE);
                    return Some(record);
                }
                Err(err) => {
                    debug!("Skipping sync marker: {}", err);
                    self.discard(1);
                }
            }
        }
    }

    /// Called once the input has ended. A held sync byte with nothing after it
    /// counts as discarded; returns the bytes of a frame that was cut short.
    pub fn finish(&mut self) -> usize {
        if self.buffer.len() < SYNC.len() {
            self.discard(self.buffer.len());
        }
        self.buffer.len()
    }

    /// Bytes currently held back waiting for the rest of a frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Total bytes dropped while searching for frames.
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    fn discard(&mut self, count: usize) {
        if count > 0 {
            self.buffer.drain(..count);
            self.discarded += count;
        }
    }
}

fn find_sync(buffer: &[u8]) -> Option<usize> {
    buffer.windows(SYNC.len()).position(|window| window == SYNC)
}
