//! Wire format for battery pack telemetry.
//!
//! A record is four little-endian `f32` fields (timestamp, pack voltage, pack
//! current, cell temperature) for 16 bytes in total. On a raw stream records
//! are simply concatenated; the optional synced framing adds a sync marker and
//! a CRC so a reader can recover from lost bytes.

pub mod frame;
pub mod protocol;
pub mod stream;

pub use frame::{FRAME_SIZE, Resynchronizer, decode_synced, encode_synced};
pub use protocol::{FramingError, RECORD_SIZE, TelemetryRecord};
pub use stream::{Framing, ReadOutcome, RecordReader, RecordWriter};
