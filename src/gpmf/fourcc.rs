//! GPMF FourCC, i.e. the 4-byte key of a KLV record.
//!
//! Only the FourCC reserved for GPMF structure get their own variant,
//! since the parser inspects these (scale, units, complex type descriptors).
//! Everything else - sensor data keys, undocumented keys, keys that are not
//! printable ASCII - is carried verbatim as `FourCC::Other`.
//! `FourCC::Invalid` flags zero padding, which would otherwise be parsed
//! as a valid record key.

use std::fmt;

/// FourCC enum. Descriptions lifted from official GPMF documentation
/// (<https://github.com/gopro/gpmf-parser>).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FourCC {
    /// Unique device source for metadata
    DEVC,
    /// Device/track ID
    DVID,
    /// Device name, e.g. "Karma 1.0"
    DVNM,
    /// Nested signal stream of metadata/telemetry
    STRM,
    /// Stream name, e.g. "GPS (Lat., Long., Alt., 2D speed, 3D speed)"
    STNM,
    /// Comments for any stream
    RMRK,
    /// Scaling factor (divisor) for sensor data
    SCAL,
    /// Standard units (like SI), e.g. "m/s²"
    SIUN,
    /// Display units, e.g. "RPM", where standard units communicate poorly
    UNIT,
    /// Typedefs for complex structures, one type tag per element
    TYPE,
    /// Total samples delivered since record start
    TSMP,
    /// Time offset. Rare, indicates the data is delayed by 'x' seconds
    TIMO,
    /// Empty payload count
    EMPT,
    /// All-zero key, i.e. zero padding. Used to terminate a parse loop.
    Invalid,
    /// Any other key, kept byte for byte (keys need not be printable ASCII).
    Other([u8; 4]),
}

impl Default for FourCC {
    fn default() -> Self {
        FourCC::Invalid
    }
}

impl FourCC {
    /// Generate FourCC enum from raw key bytes, normalizing the
    /// reserved structural keys to their own variant.
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        match &bytes {
            b"DEVC" => FourCC::DEVC,
            b"DVID" => FourCC::DVID,
            b"DVNM" => FourCC::DVNM,
            b"STRM" => FourCC::STRM,
            b"STNM" => FourCC::STNM,
            b"RMRK" => FourCC::RMRK,
            b"SCAL" => FourCC::SCAL,
            b"SIUN" => FourCC::SIUN,
            b"UNIT" => FourCC::UNIT,
            b"TYPE" => FourCC::TYPE,
            b"TSMP" => FourCC::TSMP,
            b"TIMO" => FourCC::TIMO,
            b"EMPT" => FourCC::EMPT,
            // Zero padding, e.g. in MP4 udta atom GPMF streams
            [0, 0, 0, 0] => FourCC::Invalid,
            _ => FourCC::Other(bytes),
        }
    }

    /// Generate FourCC enum from `&str`, e.g. a user-specified
    /// key filter such as "GPS5".
    ///
    /// # Panics
    /// Panics if `fourcc` is not 4 bytes long.
    pub fn from_str(fourcc: &str) -> Self {
        let bytes: [u8; 4] = fourcc
            .as_bytes()
            .try_into()
            .expect("FourCC must be exactly 4 bytes");
        Self::from_bytes(bytes)
    }

    /// Returns the raw key bytes.
    pub fn as_bytes(&self) -> [u8; 4] {
        match self {
            FourCC::DEVC => *b"DEVC",
            FourCC::DVID => *b"DVID",
            FourCC::DVNM => *b"DVNM",
            FourCC::STRM => *b"STRM",
            FourCC::STNM => *b"STNM",
            FourCC::RMRK => *b"RMRK",
            FourCC::SCAL => *b"SCAL",
            FourCC::SIUN => *b"SIUN",
            FourCC::UNIT => *b"UNIT",
            FourCC::TYPE => *b"TYPE",
            FourCC::TSMP => *b"TSMP",
            FourCC::TIMO => *b"TIMO",
            FourCC::EMPT => *b"EMPT",
            FourCC::Invalid => [0, 0, 0, 0],
            FourCC::Other(bytes) => *bytes,
        }
    }

    /// `true` for the all-zero padding key.
    pub fn is_invalid(&self) -> bool {
        self == &FourCC::Invalid
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalid() {
            return write!(f, "INVALID_FOURCC");
        }
        for byte in self.as_bytes() {
            // Non-printable key bytes as escapes rather than mojibake
            write!(f, "{}", std::ascii::escape_default(byte))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_keys_normalize() {
        assert_eq!(FourCC::from_bytes(*b"SCAL"), FourCC::SCAL);
        assert_eq!(FourCC::from_str("DEVC"), FourCC::DEVC);
        assert_eq!(FourCC::from_bytes([0; 4]), FourCC::Invalid);
    }

    #[test]
    fn data_keys_round_trip() {
        let accl = FourCC::from_bytes(*b"ACCL");
        assert_eq!(accl, FourCC::Other(*b"ACCL"));
        assert_eq!(accl.as_bytes(), *b"ACCL");
        assert_eq!(accl.to_string(), "ACCL");
    }

    #[test]
    fn non_printable_keys_survive() {
        let key = FourCC::from_bytes([0x47, 0x00, 0xff, 0x31]);
        assert_eq!(key.as_bytes(), [0x47, 0x00, 0xff, 0x31]);
    }
}
