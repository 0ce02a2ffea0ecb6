//! Parse GoPro GPMF telemetry payloads.
//!
//! GPMF is a self-describing, hierarchical KLV format: 4-byte keys,
//! single-character type tags, repeated structures and nested
//! containers, annotated by sibling scale/units/type records. This
//! crate is the in-memory parser and typed-value extraction engine:
//! given a raw payload buffer it walks the record tree with cheap,
//! cloneable cursors, resolves the annotations describing a data
//! record, and decodes its raw bytes into scaled double-precision
//! samples. Parsing is defensive throughout: declared lengths are
//! validated against buffer bounds at every step, and tolerant search
//! modes skip malformed records instead of aborting.
//!
//! Container demuxing is out of scope; payloads reach the parser
//! through the `PayloadSource` boundary (a raw GPMF-file source is
//! included) or directly as byte slices.
//!
//! ```rs
//! use gpmf_parse::{FourCC, Gpmf, SearchMode};
//!
//! fn main() -> Result<(), gpmf_parse::GpmfError> {
//!     let gpmf = Gpmf::open(std::path::Path::new("telemetry.gpmf"))?;
//!     for payload in gpmf.iter() {
//!         let mut cursor = payload.cursor()?;
//!         while cursor
//!             .find_next(FourCC::from_str("ACCL"), SearchMode::RECURSE.tolerant())
//!             .is_ok()
//!         {
//!             let data = cursor.scaled_data()?;
//!             println!("accelerometer: {:?} {:?}", data.sample(0), cursor.units()?);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod constants;
pub mod gpmf;
pub mod source;
mod errors;

pub use constants::{MAX_RAW_FILE_SIZE, MAX_TYPE_ELEMENTS, RECORD_HEADER_LEN};
pub use errors::GpmfError;
pub use gpmf::{
    FourCC, Gpmf, Payload, PayloadFailure, Record, RunReport, ScaledData, SearchMode, SearchScope,
    StreamCursor, Timestamp, Value, ValueType,
};
pub use source::{PayloadSource, RawGpmfSource};

#[cfg(test)]
pub(crate) mod test_support {
    use crate::constants::RECORD_HEADER_LEN;

    /// Builds one on-wire KLV record: header, data, pad to the 4-byte
    /// boundary. `data` must hold exactly `struct_size * repeat` bytes.
    pub fn klv(key: &[u8; 4], type_tag: u8, struct_size: u8, repeat: u16, data: &[u8]) -> Vec<u8> {
        assert_eq!(
            data.len(),
            struct_size as usize * repeat as usize,
            "record data must be struct_size * repeat bytes"
        );
        let mut out = Vec::with_capacity(RECORD_HEADER_LEN + data.len() + 3);
        out.extend_from_slice(key);
        out.push(type_tag);
        out.push(struct_size);
        out.extend_from_slice(&repeat.to_be_bytes());
        out.extend_from_slice(data);
        while out.len() % 4 != 0 {
            out.push(0);
        }
        out
    }
}
