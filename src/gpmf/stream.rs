//! Cursor-based traversal over one raw GPMF payload buffer.
//!
//! A `StreamCursor` is a cheap, cloneable view into a borrowed, immutable
//! byte buffer. Cloning yields an independent cursor over the same bytes,
//! so "search ahead without losing your place" is ordinary value copying.
//! All searches validate declared record lengths against the enclosing
//! container before touching data; under `SearchMode::tolerant` a
//! malformed record is skipped by resynchronizing at its declared length
//! boundary instead of aborting the whole traversal.

use std::io::Cursor;

use binrw::{BinRead, BinReaderExt};
use log::debug;

use crate::constants::RECORD_HEADER_LEN;
use crate::{FourCC, GpmfError, Value, ValueType};

/// On-wire KLV record header: 4-byte key, 1-byte type tag,
/// 1-byte structure size, 2-byte big-endian repeat count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[br(big)]
pub(crate) struct RecordHeader {
    key: [u8; 4],
    type_tag: u8,
    struct_size: u8,
    repeat: u16,
}

impl RecordHeader {
    fn parse(buf: &[u8]) -> Result<Self, GpmfError> {
        Cursor::new(buf).read_be::<Self>().map_err(GpmfError::from)
    }

    fn fourcc(&self) -> FourCC {
        FourCC::from_bytes(self.key)
    }

    fn is_nested(&self) -> bool {
        self.type_tag == 0
    }

    /// Actual data length in bytes, excluding pad.
    fn data_len(&self) -> usize {
        self.struct_size as usize * self.repeat as usize
    }

    /// Data length padded to the 4-byte boundary records are written on.
    fn aligned_len(&self) -> usize {
        (self.data_len() + 3) & !3
    }

    /// Full record span including the header. At least
    /// `RECORD_HEADER_LEN`, so every step advances the offset.
    fn record_len(&self) -> usize {
        RECORD_HEADER_LEN + self.aligned_len()
    }
}

/// One KLV node: key, type, element size, repeat count and a view of its
/// data bytes. For nested containers the data bytes are child records.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record<'a> {
    fourcc: FourCC,
    type_tag: u8,
    struct_size: u8,
    repeat: u16,
    offset: usize,
    raw: &'a [u8],
}

impl<'a> Record<'a> {
    /// Record key.
    pub fn fourcc(&self) -> FourCC {
        self.fourcc
    }

    /// Raw single-byte type tag. `0` for nested containers.
    pub fn type_tag(&self) -> u8 {
        self.type_tag
    }

    /// Type tag resolved against the type system.
    /// `UnknownType` for unrecognized tags.
    pub fn value_type(&self) -> Result<ValueType, GpmfError> {
        ValueType::from_tag(self.type_tag)
    }

    /// Byte width of one repeated structure. 0 only for degenerate
    /// records; nested containers conventionally use 1.
    pub fn struct_size(&self) -> usize {
        self.struct_size as usize
    }

    /// Number of repeated structures/samples in the record data.
    pub fn repeat(&self) -> u32 {
        self.repeat as u32
    }

    /// Number of elements in one structure for records with a uniform
    /// element type: `struct_size / size_of(type)`. Complex records
    /// derive their element count from the sibling `TYPE` descriptor,
    /// see `StreamCursor::elements_in_struct`.
    pub fn elements(&self) -> Result<u32, GpmfError> {
        let value_type = self.value_type()?;
        match value_type.size() {
            0 => Ok(0),
            size => Ok((self.struct_size as usize / size) as u32),
        }
    }

    /// View of the record's data bytes, `struct_size * repeat` long
    /// (the on-wire pad bytes are excluded).
    pub fn raw_bytes(&self) -> &'a [u8] {
        self.raw
    }

    /// Byte offset of the record header within the payload buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// `true` when the record body is itself a sequence of records.
    pub fn is_nested(&self) -> bool {
        self.type_tag == 0
    }

    /// `true` for records carrying an actual sample payload.
    pub fn has_samples(&self) -> bool {
        !self.is_nested() && self.repeat > 0 && self.struct_size > 0
    }

    /// Decodes the record content into an owned, typed `Value`.
    pub fn value(&self) -> Result<Value, GpmfError> {
        Value::from_raw(self.value_type()?, self.raw)
    }

    /// Flat, unscaled `f64` view of numeric record content.
    /// `None` for strings, keys, nested containers and unknown types.
    pub fn to_f64(&self) -> Option<Vec<f64>> {
        self.value().ok().and_then(|v| v.to_f64())
    }

    /// Record content as a NUL-trimmed string, for `c`/`U` records
    /// such as `STNM` or `SIUN`.
    pub fn as_string(&self) -> Option<String> {
        self.value()
            .ok()
            .and_then(|v| v.as_string().map(|s| s.to_owned()))
    }
}

/// Search scope for cursor traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// Match sibling records at the current nesting level only.
    CurrentLevel,
    /// Descend into nested containers, continuing past the end of each
    /// container into its following siblings.
    Recurse,
}

/// Search scope plus tolerance. Tolerant searches skip structurally
/// invalid records (bad size, truncated data, unknown type tag) instead
/// of aborting the traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchMode {
    pub scope: SearchScope,
    pub tolerant: bool,
}

impl SearchMode {
    pub const CURRENT_LEVEL: Self = Self {
        scope: SearchScope::CurrentLevel,
        tolerant: false,
    };
    pub const RECURSE: Self = Self {
        scope: SearchScope::Recurse,
        tolerant: false,
    };

    /// Same scope, but skip malformed records instead of failing.
    pub fn tolerant(self) -> Self {
        Self {
            tolerant: true,
            ..self
        }
    }
}

/// Byte range of one open container's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Nest {
    start: usize,
    end: usize,
}

/// Traversal state over one payload buffer: current offset plus the
/// stack of open containers (innermost last). The buffer itself is
/// shared and read-only; any number of cursors may view it, each owned
/// by one logical traversal at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamCursor<'a> {
    buf: &'a [u8],
    /// Byte offset of the current record header.
    pos: usize,
    /// One frame per open container.
    nest: Vec<Nest>,
    /// Set after `new`/`reset` so the first search considers the record
    /// under the cursor rather than skipping it.
    at_start: bool,
}

impl<'a> StreamCursor<'a> {
    /// New cursor over a raw GPMF payload, positioned at the first
    /// record. Fails with `Corrupt` if the buffer cannot hold even one
    /// record header.
    pub fn new(buf: &'a [u8]) -> Result<Self, GpmfError> {
        if buf.len() < RECORD_HEADER_LEN {
            return Err(GpmfError::Corrupt {
                offset: 0,
                reason: format!(
                    "payload is {} bytes, minimum record header is {RECORD_HEADER_LEN}",
                    buf.len()
                ),
            });
        }
        Ok(Self {
            buf,
            pos: 0,
            nest: Vec::new(),
            at_start: true,
        })
    }

    /// Returns the cursor to the buffer root. Other cursors cloned from
    /// this one keep their positions.
    pub fn reset(&mut self) {
        self.pos = 0;
        self.nest.clear();
        self.at_start = true;
    }

    /// Current nesting depth. 0 at the buffer root.
    pub fn level(&self) -> usize {
        self.nest.len()
    }

    /// Payload byte range of the innermost open container,
    /// or the whole buffer at the root.
    fn bounds(&self) -> (usize, usize) {
        match self.nest.last() {
            Some(nest) => (nest.start, nest.end),
            None => (0, self.buf.len()),
        }
    }

    /// Parses and bounds-checks the record at `pos` within the current
    /// container. `NotFound` flags zero padding (end of level).
    fn record_at(&self, pos: usize) -> Result<Record<'a>, GpmfError> {
        let (_, end) = self.bounds();
        let remaining = end.saturating_sub(pos);
        if remaining < RECORD_HEADER_LEN {
            return Err(GpmfError::Corrupt {
                offset: pos,
                reason: format!("truncated record header, {remaining} bytes remain"),
            });
        }
        let header = RecordHeader::parse(&self.buf[pos..pos + RECORD_HEADER_LEN])?;
        if header.fourcc().is_invalid() {
            return Err(GpmfError::NotFound);
        }
        if header.record_len() > remaining {
            return Err(GpmfError::overrun(pos, header.record_len(), remaining));
        }
        let data_start = pos + RECORD_HEADER_LEN;
        Ok(Record {
            fourcc: header.fourcc(),
            type_tag: header.type_tag,
            struct_size: header.struct_size,
            repeat: header.repeat,
            offset: pos,
            raw: &self.buf[data_start..data_start + header.data_len()],
        })
    }

    /// The record under the cursor.
    pub fn current(&self) -> Result<Record<'a>, GpmfError> {
        self.record_at(self.pos)
    }

    /// Skips past the record at the current position using its declared
    /// length, clamped to the container end. Best-effort
    /// resynchronization for tolerant traversal.
    fn resync(&mut self, end: usize) {
        let remaining = end - self.pos;
        if remaining >= RECORD_HEADER_LEN {
            if let Ok(header) = RecordHeader::parse(&self.buf[self.pos..self.pos + RECORD_HEADER_LEN])
            {
                self.pos = (self.pos + header.record_len()).min(end);
                return;
            }
        }
        self.pos = end;
    }

    /// Moves off the current record: descends into it when recursing
    /// into a container, otherwise steps over its declared span.
    fn leave_current(&mut self, mode: SearchMode) -> Result<(), GpmfError> {
        let (_, end) = self.bounds();
        if self.pos >= end {
            return Ok(());
        }
        let remaining = end - self.pos;
        if remaining < RECORD_HEADER_LEN {
            if mode.tolerant {
                self.pos = end;
                return Ok(());
            }
            return Err(GpmfError::Corrupt {
                offset: self.pos,
                reason: format!("truncated record header, {remaining} bytes remain"),
            });
        }
        let header = RecordHeader::parse(&self.buf[self.pos..self.pos + RECORD_HEADER_LEN])?;
        if header.fourcc().is_invalid() {
            self.pos = end;
            return Ok(());
        }
        if header.record_len() > remaining {
            if mode.tolerant {
                debug!(
                    "skipping corrupt record {} at offset {}: needs {} bytes, {} remain",
                    header.fourcc(),
                    self.pos,
                    header.record_len(),
                    remaining
                );
                self.pos = end;
                return Ok(());
            }
            return Err(GpmfError::overrun(self.pos, header.record_len(), remaining));
        }
        if mode.scope == SearchScope::Recurse
            && header.is_nested()
            && header.data_len() >= RECORD_HEADER_LEN
        {
            let start = self.pos + RECORD_HEADER_LEN;
            self.nest.push(Nest {
                start,
                end: start + header.aligned_len(),
            });
            self.pos = start;
        } else {
            self.pos += header.record_len();
        }
        Ok(())
    }

    /// One traversal step: leaves the current record and lands on the
    /// next structurally valid one, popping out of exhausted containers
    /// when recursing. Used by `next`; state is assumed disposable on
    /// error (public entry points search on a clone and commit on
    /// success).
    fn step(&mut self, mode: SearchMode) -> Result<Record<'a>, GpmfError> {
        if self.at_start {
            self.at_start = false;
        } else {
            self.leave_current(mode)?;
        }
        loop {
            let (_, end) = self.bounds();
            if self.pos >= end {
                // level exhausted
                if mode.scope == SearchScope::CurrentLevel {
                    return Err(GpmfError::NotFound);
                }
                match self.nest.pop() {
                    Some(nest) => {
                        self.pos = nest.end;
                        continue;
                    }
                    None => return Err(GpmfError::NotFound),
                }
            }
            match self.record_at(self.pos) {
                Ok(record) => match record.value_type() {
                    Ok(_) => return Ok(record),
                    Err(err) if mode.tolerant => {
                        debug!(
                            "skipping record {} at offset {}: {err}",
                            record.fourcc(),
                            self.pos
                        );
                        self.resync(end);
                    }
                    Err(err) => return Err(err),
                },
                // Zero padding terminates the level
                Err(GpmfError::NotFound) => self.pos = end,
                Err(err) if mode.tolerant => {
                    debug!("skipping corrupt record at offset {}: {err}", self.pos);
                    self.resync(end);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Advances to the next record per `mode`. The cursor is untouched
    /// on error, so traversal can continue tolerantly after a strict
    /// failure.
    pub fn next(&mut self, mode: SearchMode) -> Result<Record<'a>, GpmfError> {
        let mut probe = self.clone();
        let record = probe.step(mode)?;
        *self = probe;
        Ok(record)
    }

    /// Scans forward from the current position for a record with the
    /// given key. On a match the cursor commits to it; on `NotFound`
    /// (or a strict-mode failure) the cursor keeps its position.
    ///
    /// A fresh or reset cursor also considers the record it is
    /// positioned on, so one `find_next` pass from the root visits
    /// every matching top-level record exactly once.
    pub fn find_next(&mut self, fourcc: FourCC, mode: SearchMode) -> Result<Record<'a>, GpmfError> {
        let mut probe = self.clone();
        loop {
            let record = probe.step(mode)?;
            if record.fourcc() == fourcc {
                *self = probe;
                return Ok(record);
            }
        }
    }

    /// Scans backward among previously-visited siblings at the current
    /// nesting level for the nearest preceding record with the given
    /// key. Records nested inside sibling containers do not match.
    /// Used to locate annotation records (`SCAL`, `SIUN`, `TYPE`) that
    /// precede a data record.
    pub fn find_prev(&mut self, fourcc: FourCC, mode: SearchMode) -> Result<Record<'a>, GpmfError> {
        let (start, _) = self.bounds();
        let limit = self.pos;
        let scan_mode = SearchMode {
            scope: SearchScope::CurrentLevel,
            tolerant: mode.tolerant,
        };
        let mut scan = self.clone();
        scan.pos = start;
        scan.at_start = true;
        let mut nearest: Option<StreamCursor<'a>> = None;
        loop {
            match scan.step(scan_mode) {
                Ok(record) => {
                    if scan.pos >= limit {
                        break;
                    }
                    if record.fourcc() == fourcc {
                        nearest = Some(scan.clone());
                    }
                }
                Err(GpmfError::NotFound) => break,
                Err(err) => return Err(err),
            }
        }
        match nearest {
            Some(found) => {
                *self = found;
                self.current()
            }
            None => Err(GpmfError::NotFound),
        }
    }

    /// Positions the cursor on the record holding the current node's
    /// sample payload, without knowing its key in advance: the final
    /// record at the current level (descending one level first when the
    /// cursor sits on a container) with `repeat > 0` and a non-zero
    /// element size. Annotation records preceding the data are passed
    /// over. `NotFound` when the node holds no flat sample data, which
    /// includes nodes whose children are themselves containers.
    pub fn seek_to_samples(&mut self) -> Result<Record<'a>, GpmfError> {
        let mut probe = self.clone();
        let current = probe.current()?;
        if current.is_nested() {
            if current.raw_bytes().len() < RECORD_HEADER_LEN {
                return Err(GpmfError::NotFound);
            }
            let start = probe.pos + RECORD_HEADER_LEN;
            probe.nest.push(Nest {
                start,
                end: start + ((current.raw_bytes().len() + 3) & !3),
            });
            probe.pos = start;
            probe.at_start = true;
        }
        let mut found: Option<StreamCursor<'a>> = None;
        loop {
            // Unknown element types are data-level, not structural: such
            // records hold no extractable samples, so pass them over
            let stepped = match probe.step(SearchMode::CURRENT_LEVEL) {
                Err(GpmfError::UnknownType(_)) => {
                    probe.step(SearchMode::CURRENT_LEVEL.tolerant())
                }
                other => other,
            };
            match stepped {
                Ok(record) => {
                    // A nest within the node means no flat samples here
                    if record.is_nested() {
                        return Err(GpmfError::NotFound);
                    }
                    if record.has_samples() {
                        found = Some(probe.clone());
                    }
                }
                Err(GpmfError::NotFound) => break,
                Err(err) => return Err(err),
            }
        }
        match found {
            Some(cursor) => {
                *self = cursor;
                self.current()
            }
            None => Err(GpmfError::NotFound),
        }
    }
}
