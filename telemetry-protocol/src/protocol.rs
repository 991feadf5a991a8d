use thiserror::Error;

/// Size in bytes of one encoded [`TelemetryRecord`].
pub const RECORD_SIZE: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    #[error("expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("frame does not start with a sync marker")]
    MissingSync,
    #[error("checksum mismatch: frame carries {expected:#06x}, computed {actual:#06x}")]
    ChecksumMismatch { expected: u16, actual: u16 },
}

// TelemetryRecord (16 bytes, little-endian f32 fields)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TelemetryRecord {
    pub timestamp: f32,        // seconds
    pub pack_voltage: f32,     // volts
    pub pack_current: f32,     // amperes
    pub cell_temperature: f32, // degrees Celsius
}

impl TelemetryRecord {
    pub fn new(
        timestamp: f32,
        pack_voltage: f32,
        pack_current: f32,
        cell_temperature: f32,
    ) -> TelemetryRecord {
        TelemetryRecord {
            timestamp,
            pack_voltage,
            pack_current,
            cell_temperature,
        }
    }

    /// Encodes the record as four little-endian IEEE-754 floats in field order.
    ///
    /// NaN and infinities are carried bit-for-bit.
    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        buf[0..4].copy_from_slice(&self.timestamp.to_le_bytes());
        buf[4..8].copy_from_slice(&self.pack_voltage.to_le_bytes());
        buf[8..12].copy_from_slice(&self.pack_current.to_le_bytes());
        buf[12..16].copy_from_slice(&self.cell_temperature.to_le_bytes());

        buf
    }

    /// Decodes exactly [`RECORD_SIZE`] bytes.
    ///
    /// Any other length is rejected without looking at the content; field
    /// ranges are not validated here.
    pub fn decode(bytes: &[u8]) -> Result<Self, FramingError> {
        let bytes: &[u8; RECORD_SIZE] =
            bytes.try_into().map_err(|_| FramingError::InvalidLength {
                expected: RECORD_SIZE,
                actual: bytes.len(),
            })?;

        Ok(Self::from_bytes(bytes))
    }

    pub fn from_bytes(bytes: &[u8; RECORD_SIZE]) -> Self {
        TelemetryRecord {
            timestamp: field(bytes, 0),
            pack_voltage: field(bytes, 1),
            pack_current: field(bytes, 2),
            cell_temperature: field(bytes, 3),
        }
    }
}

impl TryFrom<&[u8]> for TelemetryRecord {
    type Error = FramingError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::decode(bytes)
    }
}

fn field(bytes: &[u8; RECORD_SIZE], idx: usize) -> f32 {
    let start = idx * 4;
    f32::from_le_bytes([
        bytes[start],
        bytes[start + 1],
        bytes[start + 2],
        bytes[start + 3],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_to_bytes_and_from_bytes() {
        let record = TelemetryRecord::new(12.0, 355.2, 25.0, 25.5);
        let bytes = record.encode();
        let decoded = TelemetryRecord::decode(&bytes).unwrap();

        assert_eq!(record, decoded);
    }

    #[test]
    fn test_fields_are_little_endian_in_order() {
        let record = TelemetryRecord::new(1.0, 2.0, -1.0, 0.5);
        let bytes = record.encode();

        assert_eq!(&bytes[0..4], &[0x00, 0x00, 0x80, 0x3F]);
        assert_eq!(&bytes[4..8], &[0x00, 0x00, 0x00, 0x40]);
        assert_eq!(&bytes[8..12], &[0x00, 0x00, 0x80, 0xBF]);
        assert_eq!(&bytes[12..16], &[0x00, 0x00, 0x00, 0x3F]);
    }

    #[test]
    fn test_non_finite_values_round_trip_bit_for_bit() {
        let nan = f32::from_bits(0x7FC0_1234);
        let record = TelemetryRecord::new(nan, f32::INFINITY, f32::NEG_INFINITY, -0.0);
        let decoded = TelemetryRecord::decode(&record.encode()).unwrap();

        assert_eq!(decoded.timestamp.to_bits(), nan.to_bits());
        assert_eq!(decoded.pack_voltage, f32::INFINITY);
        assert_eq!(decoded.pack_current, f32::NEG_INFINITY);
        assert_eq!(decoded.cell_temperature.to_bits(), (-0.0f32).to_bits());
    }

    #[test]
    fn test_decode_rejects_wrong_lengths() {
        for len in [0usize, 1, 8, 15, 17, 32] {
            let bytes = vec![0u8; len];
            assert_eq!(
                TelemetryRecord::decode(&bytes),
                Err(FramingError::InvalidLength {
                    expected: RECORD_SIZE,
                    actual: len
                })
            );
        }
    }

    #[test]
    fn test_try_from_slice() {
        let record = TelemetryRecord::new(3.0, 400.0, 10.0, 30.0);
        let bytes = record.encode();

        assert_eq!(TelemetryRecord::try_from(&bytes[..]), Ok(record));
        assert!(TelemetryRecord::try_from(&bytes[..12]).is_err());
    }
}
