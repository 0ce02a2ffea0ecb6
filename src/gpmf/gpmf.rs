//! Core GPMF struct and methods: a run over every timed payload a
//! source supplies.
//!
//! Input:
//! - raw GPMF "files" extracted via e.g. FFmpeg
//! - byte slices
//! - anything else implementing `PayloadSource`
//!
//! Each payload is validated independently: a failure on one payload is
//! recorded in the run report and that payload is skipped, so
//! extraction continues with the rest. The report distinguishes a
//! source with no GPMF data at all from one whose data is present but
//! malformed.
//!
//! ```rs
//! use gpmf_parse::{FourCC, Gpmf, SearchMode};
//!
//! fn main() -> Result<(), gpmf_parse::GpmfError> {
//!     let gpmf = Gpmf::open(std::path::Path::new("telemetry.gpmf"))?;
//!     for payload in gpmf.iter() {
//!         let mut cursor = payload.cursor()?;
//!         while let Ok(_strm) = cursor.find_next(FourCC::STRM, SearchMode::RECURSE.tolerant()) {
//!             if let Ok(data) = cursor.seek_to_samples() {
//!                 println!("{}: {} samples", data.fourcc(), data.repeat());
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```

use std::path::Path;

use log::warn;
use rayon::prelude::{IntoParallelRefIterator, ParallelIterator};

use crate::source::{PayloadSource, RawGpmfSource};
use crate::{FourCC, GpmfError, SearchMode, StreamCursor, Timestamp, Value};

/// One timed chunk of GPMF bytes, owned, with the time span it covers
/// in the source recording (when the source carries timing).
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    index: usize,
    bytes: Vec<u8>,
    time: Option<Timestamp>,
}

impl Payload {
    pub fn new(index: usize, bytes: Vec<u8>, time: Option<Timestamp>) -> Self {
        Self { index, bytes, time }
    }

    /// Index of the payload within its source.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The raw payload bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Time span of the payload in the source recording.
    pub fn time(&self) -> Option<&Timestamp> {
        self.time.as_ref()
    }

    /// New traversal cursor over the payload. Any number of cursors
    /// may be created; each owns its own position.
    pub fn cursor(&self) -> Result<StreamCursor<'_>, GpmfError> {
        StreamCursor::new(&self.bytes)
    }

    /// Walks the entire payload, checking every record's structure.
    /// Unknown type tags are data-level rather than structural and are
    /// hopped over. Returns the number of records visited.
    fn validate(&self) -> Result<usize, GpmfError> {
        let mut cursor = self.cursor()?;
        let mut records = 0;
        loop {
            match cursor.next(SearchMode::RECURSE) {
                Ok(_) => records += 1,
                Err(GpmfError::NotFound) => return Ok(records),
                Err(GpmfError::UnknownType(_)) => {
                    match cursor.next(SearchMode::RECURSE.tolerant()) {
                        Ok(_) => records += 1,
                        Err(GpmfError::NotFound) => return Ok(records),
                        Err(err) => return Err(err),
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Outcome of one payload that could not be parsed.
#[derive(Debug)]
pub struct PayloadFailure {
    /// Index of the payload within its source.
    pub index: usize,
    pub error: GpmfError,
}

/// Summary of a run over a payload source: how many payloads were
/// attempted and which of them failed.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Number of payloads the source supplied.
    pub attempted: usize,
    /// Payloads that failed to parse, with the failure each hit.
    pub failures: Vec<PayloadFailure>,
}

impl RunReport {
    /// Number of payloads that parsed.
    pub fn parsed(&self) -> usize {
        self.attempted - self.failures.len()
    }

    /// `true` when the source supplied payloads but none parsed,
    /// i.e. GPMF data is present but corrupt. A source with no
    /// payloads at all has no GPMF data instead.
    pub fn all_failed(&self) -> bool {
        self.attempted > 0 && self.failures.len() == self.attempted
    }
}

/// Core GPMF struct: the payloads of one source that parsed, plus the
/// run report covering those that did not.
#[derive(Debug, Default)]
pub struct Gpmf {
    /// GPMF payloads in source order.
    payloads: Vec<Payload>,
    report: RunReport,
}

impl Gpmf {
    /// Runs over every payload of `source`. Per-payload failures never
    /// abort the run; they are recorded in the report and the payload
    /// is skipped.
    pub fn new(source: &mut impl PayloadSource) -> Result<Self, GpmfError> {
        let count = source.payload_count()?;

        let mut payloads = Vec::with_capacity(count as usize);
        let mut failures = Vec::new();
        for index in 0..count {
            let bytes = match source.payload_bytes(index) {
                Ok(bytes) => bytes.to_vec(),
                Err(error) => {
                    failures.push(PayloadFailure {
                        index: index as usize,
                        error,
                    });
                    continue;
                }
            };
            let time = match source.payload_time(index) {
                Ok(time) => time,
                Err(error) => {
                    failures.push(PayloadFailure {
                        index: index as usize,
                        error,
                    });
                    continue;
                }
            };
            payloads.push(Payload::new(index as usize, bytes, time));
        }

        // Payload buffers are independent: validate them in parallel.
        let outcomes: Vec<Option<GpmfError>> = payloads
            .par_iter()
            .map(|payload| payload.validate().err())
            .collect();
        let mut valid = Vec::with_capacity(payloads.len());
        for (payload, outcome) in payloads.into_iter().zip(outcomes) {
            match outcome {
                None => valid.push(payload),
                Some(error) => {
                    warn!("skipping payload {}: {error}", payload.index());
                    failures.push(PayloadFailure {
                        index: payload.index(),
                        error,
                    });
                }
            }
        }
        failures.sort_by_key(|f| f.index);

        Ok(Self {
            payloads: valid,
            report: RunReport {
                attempted: count as usize,
                failures,
            },
        })
    }

    /// GPMF from a raw GPMF-file, e.g. the `GoPro MET` track extracted
    /// from a GoPro MP4 with FFmpeg.
    pub fn open(path: &Path) -> Result<Self, GpmfError> {
        let mut source = RawGpmfSource::open(path)?;
        Self::new(&mut source)
    }

    /// GPMF from a byte slice holding concatenated top-level records.
    pub fn from_slice(slice: &[u8]) -> Result<Self, GpmfError> {
        let mut source = RawGpmfSource::from_slice(slice);
        Self::new(&mut source)
    }

    /// The run report: payloads attempted and which failed.
    pub fn report(&self) -> &RunReport {
        &self.report
    }

    /// `true` when at least one payload parsed and holds records.
    pub fn has_data(&self) -> bool {
        self.payloads.iter().any(|payload| {
            payload
                .cursor()
                .and_then(|mut c| c.next(SearchMode::RECURSE.tolerant()))
                .is_ok()
        })
    }

    /// Returns the number of parsed payloads.
    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Payload> {
        self.payloads.iter()
    }

    /// Returns the first payload.
    pub fn first(&self) -> Option<&Payload> {
        self.payloads.first()
    }

    /// Returns the last payload.
    pub fn last(&self) -> Option<&Payload> {
        self.payloads.last()
    }

    /// Device name (`DVNM`), e.g. "HERO11 Black", from the first
    /// payload carrying one.
    pub fn device_name(&self) -> Option<String> {
        self.find_first(FourCC::DVNM)?.as_string().map(String::from)
    }

    /// Device ID (`DVID`) from the first payload carrying one.
    /// Typically a 32-bit integer, FourCC on some devices.
    pub fn device_id(&self) -> Option<Value> {
        self.find_first(FourCC::DVID)
    }

    fn find_first(&self, fourcc: FourCC) -> Option<Value> {
        self.payloads.iter().find_map(|payload| {
            let mut cursor = payload.cursor().ok()?;
            cursor
                .find_next(fourcc, SearchMode::RECURSE.tolerant())
                .ok()?
                .value()
                .ok()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::klv;

    fn devc_with(strm_body: &[u8]) -> Vec<u8> {
        let strm = klv(b"STRM", 0, 1, strm_body.len() as u16, strm_body);
        klv(b"DEVC", 0, 1, strm.len() as u16, &strm)
    }

    fn accl_stream() -> Vec<u8> {
        let mut body = klv(b"SCAL", b's', 2, 1, &[0, 100]);
        body.extend(klv(b"ACCL", b's', 2, 2, &[0, 100, 0, 200]));
        body
    }

    #[test]
    fn run_parses_all_payloads() {
        let mut bytes = devc_with(&accl_stream());
        bytes.extend(devc_with(&accl_stream()));

        let gpmf = Gpmf::from_slice(&bytes).unwrap();
        assert_eq!(gpmf.len(), 2);
        assert!(gpmf.has_data());
        assert_eq!(gpmf.report().attempted, 2);
        assert!(gpmf.report().failures.is_empty());
    }

    #[test]
    fn corrupt_payload_is_skipped_and_reported() {
        let mut bytes = devc_with(&accl_stream());
        let good = devc_with(&accl_stream());
        // child record declares more data than the DEVC holds
        let mut broken_body = klv(b"ACCL", b's', 2, 1, &[0, 1]);
        broken_body[6] = 0xff;
        broken_body[7] = 0xff;
        bytes.extend(devc_with(&broken_body));
        bytes.extend(good);

        let gpmf = Gpmf::from_slice(&bytes).unwrap();
        assert_eq!(gpmf.report().attempted, 3);
        assert_eq!(gpmf.len(), 2);
        assert_eq!(gpmf.report().failures.len(), 1);
        assert_eq!(gpmf.report().failures[0].index, 1);
        assert!(matches!(
            gpmf.report().failures[0].error,
            GpmfError::Corrupt { .. }
        ));
        assert!(!gpmf.report().all_failed());
    }

    #[test]
    fn no_data_differs_from_corrupt_data() {
        let empty = Gpmf::from_slice(&[]).unwrap();
        assert_eq!(empty.report().attempted, 0);
        assert!(!empty.has_data());
        assert!(!empty.report().all_failed());

        // present but malformed: a lone truncated header
        let corrupt = Gpmf::from_slice(&[0x41; 6]).unwrap();
        assert_eq!(corrupt.report().attempted, 1);
        assert!(!corrupt.has_data());
        assert!(corrupt.report().all_failed());
    }

    #[test]
    fn device_lookup() {
        let mut body = klv(b"DVID", b'L', 4, 1, &[0, 0, 0, 1]);
        body.extend(klv(b"DVNM", b'c', 6, 1, b"Hero11"));
        body.extend(&accl_stream());
        let bytes = devc_with(&body);

        let gpmf = Gpmf::from_slice(&bytes).unwrap();
        assert_eq!(gpmf.device_name().as_deref(), Some("Hero11"));
        assert_eq!(gpmf.device_id(), Some(Value::Uint32(vec![1])));
    }

    #[test]
    fn payload_time_is_attached_by_sources_that_carry_it() {
        struct TimedSource(Vec<u8>);
        impl PayloadSource for TimedSource {
            fn payload_count(&mut self) -> Result<u32, GpmfError> {
                Ok(1)
            }
            fn payload_size(&mut self, _index: u32) -> Result<u32, GpmfError> {
                Ok(self.0.len() as u32)
            }
            fn payload_bytes(&mut self, _index: u32) -> Result<&[u8], GpmfError> {
                Ok(&self.0)
            }
            fn payload_time(&mut self, _index: u32) -> Result<Option<Timestamp>, GpmfError> {
                Ok(Some(Timestamp::new(1000, 500)))
            }
        }

        let mut source = TimedSource(devc_with(&accl_stream()));
        let gpmf = Gpmf::new(&mut source).unwrap();
        let time = gpmf.first().unwrap().time().unwrap();
        assert_eq!(time.start_seconds(), 1.0);
        assert_eq!(time.end_seconds(), 1.5);
    }
}
