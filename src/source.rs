//! Boundary with the media-container demuxer that supplies timed GPMF
//! payloads. Container demuxing itself (MP4 and friends) is out of
//! scope; any demuxer can feed the parser by implementing
//! `PayloadSource`. The one implementation provided here reads "raw"
//! GPMF-files, e.g. the `GoPro MET` track extracted from a GoPro MP4
//! with FFmpeg.

use std::path::Path;

use crate::constants::{MAX_RAW_FILE_SIZE, RECORD_HEADER_LEN};
use crate::{GpmfError, SearchMode, StreamCursor, Timestamp};

/// Supplier of timed GPMF payload buffers, one per logged span of the
/// source recording.
pub trait PayloadSource {
    /// Number of payloads in the source.
    fn payload_count(&mut self) -> Result<u32, GpmfError>;

    /// Size in bytes of the payload at `index`.
    fn payload_size(&mut self, index: u32) -> Result<u32, GpmfError>;

    /// Raw bytes of the payload at `index`. The view is borrowed from
    /// the source and only guaranteed until the next call; the parser
    /// never reads past `payload_size(index)`.
    fn payload_bytes(&mut self, index: u32) -> Result<&[u8], GpmfError>;

    /// Time span of the payload at `index`. `None` when the source
    /// carries no timing, e.g. raw GPMF-files stripped of their MP4
    /// container timing.
    fn payload_time(&mut self, index: u32) -> Result<Option<Timestamp>, GpmfError>;
}

/// Payload source over a raw GPMF stream: top-level records
/// (conventionally one `DEVC` per logged span) concatenated back to
/// back with no container around them. Each top-level record is
/// served as one payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawGpmfSource {
    bytes: Vec<u8>,
    /// Byte range of each top-level record.
    spans: Vec<(usize, usize)>,
}

impl RawGpmfSource {
    /// Opens a raw GPMF-file, e.g. extracted via FFmpeg.
    pub fn open(path: &Path) -> Result<Self, GpmfError> {
        let size = path.metadata()?.len();
        if size > MAX_RAW_FILE_SIZE {
            return Err(GpmfError::MaxFileSizeExceeded {
                max: MAX_RAW_FILE_SIZE,
                got: size,
                path: path.to_owned(),
            });
        }
        Ok(Self::from_bytes(std::fs::read(path)?))
    }

    /// Raw GPMF source from a byte slice.
    pub fn from_slice(slice: &[u8]) -> Self {
        Self::from_bytes(slice.to_vec())
    }

    fn from_bytes(bytes: Vec<u8>) -> Self {
        let spans = scan_spans(&bytes);
        Self { bytes, spans }
    }
}

/// Splits a raw stream at its top-level record boundaries. A corrupt
/// record makes the remaining tail a final span of its own, so a run
/// over the source can report it instead of dropping it silently.
fn scan_spans(bytes: &[u8]) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut scanned = 0usize;
    let mut cursor = match StreamCursor::new(bytes) {
        Ok(c) => c,
        Err(_) => {
            if !bytes.is_empty() {
                spans.push((0, bytes.len()));
            }
            return spans;
        }
    };
    loop {
        match cursor.next(SearchMode::CURRENT_LEVEL) {
            Ok(record) => {
                let aligned = (record.raw_bytes().len() + 3) & !3;
                let end = record.offset() + RECORD_HEADER_LEN + aligned;
                spans.push((record.offset(), end));
                scanned = end;
            }
            Err(GpmfError::NotFound) => break,
            Err(_) => {
                spans.push((scanned, bytes.len()));
                break;
            }
        }
    }
    spans
}

impl PayloadSource for RawGpmfSource {
    fn payload_count(&mut self) -> Result<u32, GpmfError> {
        Ok(self.spans.len() as u32)
    }

    fn payload_size(&mut self, index: u32) -> Result<u32, GpmfError> {
        let (start, end) = self
            .spans
            .get(index as usize)
            .ok_or(GpmfError::NotFound)?;
        Ok((end - start) as u32)
    }

    fn payload_bytes(&mut self, index: u32) -> Result<&[u8], GpmfError> {
        let (start, end) = self
            .spans
            .get(index as usize)
            .ok_or(GpmfError::NotFound)?;
        Ok(&self.bytes[*start..*end])
    }

    fn payload_time(&mut self, _index: u32) -> Result<Option<Timestamp>, GpmfError> {
        // raw GPMF-files carry no container timing
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::klv;

    fn two_devc() -> Vec<u8> {
        let accl = klv(b"ACCL", b's', 2, 1, &[0, 1]);
        let strm = klv(b"STRM", 0, 1, accl.len() as u16, &accl);
        let mut bytes = klv(b"DEVC", 0, 1, strm.len() as u16, &strm);
        bytes.extend(klv(b"DEVC", 0, 1, strm.len() as u16, &strm));
        bytes
    }

    #[test]
    fn splits_top_level_records() {
        let mut source = RawGpmfSource::from_slice(&two_devc());
        assert_eq!(source.payload_count().unwrap(), 2);
        let size = source.payload_size(0).unwrap();
        assert_eq!(source.payload_bytes(0).unwrap().len(), size as usize);
        assert!(source.payload_time(0).unwrap().is_none());
        assert!(matches!(
            source.payload_bytes(2),
            Err(GpmfError::NotFound)
        ));
    }

    #[test]
    fn corrupt_tail_becomes_its_own_payload() {
        let mut bytes = two_devc();
        let good = bytes.len();
        // declared length far beyond the buffer
        bytes.extend(b"DEVC");
        bytes.extend([0, 4, 0xff, 0xff]);
        bytes.extend([0u8; 8]);

        let mut source = RawGpmfSource::from_slice(&bytes);
        assert_eq!(source.payload_count().unwrap(), 3);
        assert_eq!(source.payload_bytes(2).unwrap(), &bytes[good..]);
    }

    #[test]
    fn open_reads_raw_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.gpmf");
        std::fs::write(&path, two_devc()).unwrap();

        let mut source = RawGpmfSource::open(&path).unwrap();
        assert_eq!(source.payload_count().unwrap(), 2);
    }
}
