//! GPMF type system and typed value decode.
//!
//! Each record declares its element type as a single-character tag.
//! `ValueType` is the closed set of supported tags with their on-wire
//! widths, `Value` is the owned, decoded content of one record.
//! All multi-byte values are big-endian on the wire.

use std::io::Cursor;

use binrw::BinReaderExt;

use crate::GpmfError;

/// Element type of a GPMF record, mapped from its single-byte type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// `b`: signed 8-bit integer
    Sint8,
    /// `B`: unsigned 8-bit integer
    Uint8,
    /// `s`: signed 16-bit integer
    Sint16,
    /// `S`: unsigned 16-bit integer
    Uint16,
    /// `l`: signed 32-bit integer
    Sint32,
    /// `L`: unsigned 32-bit integer
    Uint32,
    /// `j`: signed 64-bit integer
    Sint64,
    /// `J`: unsigned 64-bit integer
    Uint64,
    /// `f`: 32-bit IEEE float
    Float32,
    /// `d`: 64-bit IEEE float
    Float64,
    /// `q`: 32-bit Q15.16 fixed point (16 fractional bits)
    Qint32,
    /// `Q`: 64-bit Q31.32 fixed point (32 fractional bits)
    Qint64,
    /// `c`: single byte ASCII character
    Ascii,
    /// `F`: 4-byte FourCC key
    FourCC,
    /// `G`: 128-bit identifier/opaque blob
    Uuid,
    /// `U`: UTC datetime string, 16 bytes, e.g. `yymmddhhmmss.sss`
    DateTime,
    /// `?`: complex structure, element types described by a `TYPE` record
    Complex,
    /// `0x0`: nested container, body is a sequence of records
    Nested,
}

impl ValueType {
    /// Maps a raw type tag to its `ValueType`.
    /// Unrecognized tags raise `UnknownType`, which callers may
    /// tolerate (skip) or propagate.
    pub fn from_tag(tag: u8) -> Result<Self, GpmfError> {
        match tag {
            b'b' => Ok(Self::Sint8),
            b'B' => Ok(Self::Uint8),
            b's' => Ok(Self::Sint16),
            b'S' => Ok(Self::Uint16),
            b'l' => Ok(Self::Sint32),
            b'L' => Ok(Self::Uint32),
            b'j' => Ok(Self::Sint64),
            b'J' => Ok(Self::Uint64),
            b'f' => Ok(Self::Float32),
            b'd' => Ok(Self::Float64),
            b'q' => Ok(Self::Qint32),
            b'Q' => Ok(Self::Qint64),
            b'c' => Ok(Self::Ascii),
            b'F' => Ok(Self::FourCC),
            b'G' => Ok(Self::Uuid),
            b'U' => Ok(Self::DateTime),
            b'?' => Ok(Self::Complex),
            0 => Ok(Self::Nested),
            t => Err(GpmfError::UnknownType(t)),
        }
    }

    /// Returns the raw type tag.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Sint8 => b'b',
            Self::Uint8 => b'B',
            Self::Sint16 => b's',
            Self::Uint16 => b'S',
            Self::Sint32 => b'l',
            Self::Uint32 => b'L',
            Self::Sint64 => b'j',
            Self::Uint64 => b'J',
            Self::Float32 => b'f',
            Self::Float64 => b'd',
            Self::Qint32 => b'q',
            Self::Qint64 => b'Q',
            Self::Ascii => b'c',
            Self::FourCC => b'F',
            Self::Uuid => b'G',
            Self::DateTime => b'U',
            Self::Complex => b'?',
            Self::Nested => 0,
        }
    }

    /// Byte width of one element of this type.
    /// 0 for nested containers and complex structures, whose width
    /// derives from the record header and `TYPE` descriptor instead.
    pub fn size(&self) -> usize {
        match self {
            Self::Sint8 | Self::Uint8 | Self::Ascii => 1,
            Self::Sint16 | Self::Uint16 => 2,
            Self::Sint32 | Self::Uint32 | Self::Float32 | Self::Qint32 | Self::FourCC => 4,
            Self::Sint64 | Self::Uint64 | Self::Float64 | Self::Qint64 => 8,
            Self::Uuid | Self::DateTime => 16,
            Self::Complex | Self::Nested => 0,
        }
    }

    /// `true` for types that decode to a number. ASCII, FourCC, UUID and
    /// datetime elements are exposed as raw bytes, never coerced.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Sint8
                | Self::Uint8
                | Self::Sint16
                | Self::Uint16
                | Self::Sint32
                | Self::Uint32
                | Self::Sint64
                | Self::Uint64
                | Self::Float32
                | Self::Float64
                | Self::Qint32
                | Self::Qint64
        )
    }

    /// Decodes one big-endian element to double precision.
    /// `bytes` must hold exactly `self.size()` bytes.
    /// Integer and fixed-point types promote without loss of their
    /// documented range; non-numeric types raise `UnknownType`.
    pub fn decode_f64(&self, bytes: &[u8]) -> Result<f64, GpmfError> {
        let mut cursor = Cursor::new(bytes);
        let value = match self {
            Self::Sint8 => cursor.read_be::<i8>()? as f64,
            Self::Uint8 => cursor.read_be::<u8>()? as f64,
            Self::Sint16 => cursor.read_be::<i16>()? as f64,
            Self::Uint16 => cursor.read_be::<u16>()? as f64,
            Self::Sint32 => cursor.read_be::<i32>()? as f64,
            Self::Uint32 => cursor.read_be::<u32>()? as f64,
            Self::Sint64 => cursor.read_be::<i64>()? as f64,
            Self::Uint64 => cursor.read_be::<u64>()? as f64,
            Self::Float32 => cursor.read_be::<f32>()? as f64,
            Self::Float64 => cursor.read_be::<f64>()?,
            // Q-number formats: explicit fractional bit counts
            Self::Qint32 => cursor.read_be::<i32>()? as f64 / (1u32 << 16) as f64,
            Self::Qint64 => cursor.read_be::<i64>()? as f64 / (1u64 << 32) as f64,
            other => return Err(GpmfError::UnknownType(other.tag())),
        };
        Ok(value)
    }
}

/// Owned, decoded content of one record.
/// Numeric variants hold every element of every repeated structure
/// in on-wire order.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Sint8(Vec<i8>),
    Uint8(Vec<u8>),
    Sint16(Vec<i16>),
    Uint16(Vec<u16>),
    Sint32(Vec<i32>),
    Uint32(Vec<u32>),
    Sint64(Vec<i64>),
    Uint64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    /// Q15.16 fixed point, decoded to double precision.
    Qint32(Vec<f64>),
    /// Q31.32 fixed point, decoded to double precision.
    Qint64(Vec<f64>),
    /// `c`: full record content as a NUL-trimmed string.
    Ascii(String),
    /// `F`: one 4-character key per element.
    FourCC(Vec<String>),
    /// `G`: raw 16-byte identifiers.
    Uuid(Vec<u8>),
    /// `U`: datetime string, e.g. `220101120000.000`.
    DateTime(String),
    /// `?`: raw bytes; decoding requires the sibling `TYPE` descriptor,
    /// see `StreamCursor::scaled_data`.
    Complex(Vec<u8>),
    /// Nested container, content is child records.
    Nested,
}

fn read_all<T>(raw: &[u8], width: usize) -> Result<Vec<T>, GpmfError>
where
    T: for<'a> binrw::BinRead<Args<'a> = ()>,
{
    let mut cursor = Cursor::new(raw);
    (0..raw.len() / width)
        .map(|_| cursor.read_be::<T>().map_err(GpmfError::from))
        .collect()
}

fn trim_nul(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches('\0')
        .to_owned()
}

impl Value {
    /// Decodes a record's raw bytes according to its declared type.
    pub fn from_raw(value_type: ValueType, raw: &[u8]) -> Result<Self, GpmfError> {
        let value = match value_type {
            ValueType::Sint8 => Self::Sint8(raw.iter().map(|&b| b as i8).collect()),
            ValueType::Uint8 => Self::Uint8(raw.to_vec()),
            ValueType::Sint16 => Self::Sint16(read_all(raw, 2)?),
            ValueType::Uint16 => Self::Uint16(read_all(raw, 2)?),
            ValueType::Sint32 => Self::Sint32(read_all(raw, 4)?),
            ValueType::Uint32 => Self::Uint32(read_all(raw, 4)?),
            ValueType::Sint64 => Self::Sint64(read_all(raw, 8)?),
            ValueType::Uint64 => Self::Uint64(read_all(raw, 8)?),
            ValueType::Float32 => Self::Float32(read_all(raw, 4)?),
            ValueType::Float64 => Self::Float64(read_all(raw, 8)?),
            ValueType::Qint32 => Self::Qint32(
                raw.chunks_exact(4)
                    .map(|c| value_type.decode_f64(c))
                    .collect::<Result<_, _>>()?,
            ),
            ValueType::Qint64 => Self::Qint64(
                raw.chunks_exact(8)
                    .map(|c| value_type.decode_f64(c))
                    .collect::<Result<_, _>>()?,
            ),
            ValueType::Ascii => Self::Ascii(trim_nul(raw)),
            ValueType::FourCC => Self::FourCC(
                raw.chunks_exact(4)
                    .map(|c| String::from_utf8_lossy(c).to_string())
                    .collect(),
            ),
            ValueType::Uuid => Self::Uuid(raw.to_vec()),
            ValueType::DateTime => Self::DateTime(trim_nul(raw)),
            ValueType::Complex => Self::Complex(raw.to_vec()),
            ValueType::Nested => Self::Nested,
        };
        Ok(value)
    }

    /// Flat `f64` view of numeric content, unscaled.
    /// `None` for strings, keys, identifiers and nested containers.
    pub fn to_f64(&self) -> Option<Vec<f64>> {
        let values = match self {
            Self::Sint8(v) => v.iter().map(|&n| n as f64).collect(),
            Self::Uint8(v) => v.iter().map(|&n| n as f64).collect(),
            Self::Sint16(v) => v.iter().map(|&n| n as f64).collect(),
            Self::Uint16(v) => v.iter().map(|&n| n as f64).collect(),
            Self::Sint32(v) => v.iter().map(|&n| n as f64).collect(),
            Self::Uint32(v) => v.iter().map(|&n| n as f64).collect(),
            Self::Sint64(v) => v.iter().map(|&n| n as f64).collect(),
            Self::Uint64(v) => v.iter().map(|&n| n as f64).collect(),
            Self::Float32(v) => v.iter().map(|&n| n as f64).collect(),
            Self::Float64(v) => v.to_owned(),
            Self::Qint32(v) | Self::Qint64(v) => v.to_owned(),
            _ => return None,
        };
        Some(values)
    }

    /// String content for ASCII and datetime records.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::Ascii(s) | Self::DateTime(s) => Some(s),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_round_trip() {
        for tag in [
            b'b', b'B', b's', b'S', b'l', b'L', b'j', b'J', b'f', b'd', b'q', b'Q', b'c', b'F',
            b'G', b'U', b'?', 0,
        ] {
            assert_eq!(ValueType::from_tag(tag).unwrap().tag(), tag);
        }
    }

    #[test]
    fn unknown_tag() {
        assert!(matches!(
            ValueType::from_tag(b'Z'),
            Err(GpmfError::UnknownType(b'Z'))
        ));
    }

    #[test]
    fn widths() {
        assert_eq!(ValueType::Sint16.size(), 2);
        assert_eq!(ValueType::Qint32.size(), 4);
        assert_eq!(ValueType::Qint64.size(), 8);
        assert_eq!(ValueType::Uuid.size(), 16);
        assert_eq!(ValueType::Nested.size(), 0);
    }

    #[test]
    fn decode_integers() {
        assert_eq!(ValueType::Sint16.decode_f64(&[0xff, 0x9c]).unwrap(), -100.0);
        assert_eq!(ValueType::Uint16.decode_f64(&[0x01, 0x00]).unwrap(), 256.0);
        assert_eq!(
            ValueType::Sint32
                .decode_f64(&[0xff, 0xff, 0xff, 0xff])
                .unwrap(),
            -1.0
        );
    }

    #[test]
    fn decode_fixed_point() {
        // Q15.16: 1.5 == 0x00018000
        assert_eq!(
            ValueType::Qint32
                .decode_f64(&[0x00, 0x01, 0x80, 0x00])
                .unwrap(),
            1.5
        );
        // Q31.32: -2.25 == 0xFFFFFFFD_C0000000
        assert_eq!(
            ValueType::Qint64
                .decode_f64(&[0xff, 0xff, 0xff, 0xfd, 0xc0, 0x00, 0x00, 0x00])
                .unwrap(),
            -2.25
        );
    }

    #[test]
    fn decode_floats() {
        assert_eq!(
            ValueType::Float32
                .decode_f64(&2.5_f32.to_be_bytes())
                .unwrap(),
            2.5
        );
        assert_eq!(
            ValueType::Float64
                .decode_f64(&(-0.125_f64).to_be_bytes())
                .unwrap(),
            -0.125
        );
    }

    #[test]
    fn strings_not_coerced() {
        assert!(ValueType::Ascii.decode_f64(&[b'm']).is_err());
        assert!(ValueType::FourCC.decode_f64(b"GPS5").is_err());
    }

    #[test]
    fn ascii_value_trims_padding() {
        let value = Value::from_raw(ValueType::Ascii, b"m/s\0\0").unwrap();
        assert_eq!(value.as_string(), Some("m/s"));
    }

    #[test]
    fn numeric_value_to_f64() {
        let value = Value::from_raw(ValueType::Sint16, &[0x00, 0x64, 0xff, 0x38]).unwrap();
        assert_eq!(value.to_f64(), Some(vec![100.0, -200.0]));
    }
}
