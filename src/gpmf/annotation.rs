//! Resolution of the annotation records that describe a data record:
//! units (`SIUN`/`UNIT`), complex type descriptors (`TYPE`) and scale
//! divisors (`SCAL`).
//!
//! Annotations are ordinary records distinguished only by their reserved
//! keys, written before the data record they describe at the same nesting
//! level. Each lookup here searches backward on an internal clone, so the
//! caller's cursor position is never disturbed, and only the nearest
//! preceding match at the current level counts - an annotation nested
//! inside an unrelated sibling container does not apply.
//!
//! Absence of an annotation is not an error: no units means no label,
//! no `TYPE` means the record is homogeneous in its own declared type,
//! no `SCAL` means unit scale.

use crate::constants::MAX_TYPE_ELEMENTS;
use crate::{FourCC, GpmfError, Record, SearchMode, StreamCursor, ValueType};

impl<'a> StreamCursor<'a> {
    /// Nearest preceding annotation with the given key at the current
    /// level, tolerant of malformed siblings in between.
    fn annotation(&self, fourcc: FourCC) -> Option<Record<'a>> {
        let mut probe = self.clone();
        probe
            .find_prev(fourcc, SearchMode::CURRENT_LEVEL.tolerant())
            .ok()
    }

    /// Unit strings for the current data record, from the nearest
    /// preceding `SIUN` (standard units) record, falling back to `UNIT`
    /// (display units). One string per unit sample; when a single unit
    /// is present it applies to every element (consumers index modulo
    /// the returned length). Empty if the stream carries no units.
    pub fn units(&self) -> Result<Vec<String>, GpmfError> {
        let record = match self
            .annotation(FourCC::SIUN)
            .or_else(|| self.annotation(FourCC::UNIT))
        {
            Some(r) => r,
            None => return Ok(Vec::new()),
        };
        let width = record.struct_size();
        let count = record.repeat() as usize;
        if count > MAX_TYPE_ELEMENTS {
            return Err(GpmfError::TypeDescriptorExceeded {
                got: count,
                max: MAX_TYPE_ELEMENTS,
            });
        }
        if width == 0 {
            return Ok(Vec::new());
        }
        Ok(record
            .raw_bytes()
            .chunks(width)
            .take(count)
            .map(|chunk| {
                String::from_utf8_lossy(chunk)
                    .trim_end_matches('\0')
                    .to_owned()
            })
            .collect())
    }

    /// Per-element type tags from the nearest preceding `TYPE` record,
    /// NUL-trimmed, for records declared as complex (`?`). Empty if no
    /// descriptor is present, meaning the record is homogeneous in its
    /// own declared type. Descriptors longer than `MAX_TYPE_ELEMENTS`
    /// raise `TypeDescriptorExceeded` rather than being truncated.
    pub fn type_descriptor(&self) -> Result<Vec<u8>, GpmfError> {
        let record = match self.annotation(FourCC::TYPE) {
            Some(r) => r,
            None => return Ok(Vec::new()),
        };
        let mut tags = record.raw_bytes().to_vec();
        while tags.last() == Some(&0) {
            tags.pop();
        }
        if tags.len() > MAX_TYPE_ELEMENTS {
            return Err(GpmfError::TypeDescriptorExceeded {
                got: tags.len(),
                max: MAX_TYPE_ELEMENTS,
            });
        }
        Ok(tags)
    }

    /// Scale divisors from the nearest preceding `SCAL` record, decoded
    /// to `f64`. One divisor per element, or a single divisor shared by
    /// all elements (consumers index modulo the returned length).
    /// Empty if the stream carries no scale, i.e. unit divisors.
    pub fn scale(&self) -> Result<Vec<f64>, GpmfError> {
        let record = match self.annotation(FourCC::SCAL) {
            Some(r) => r,
            None => return Ok(Vec::new()),
        };
        record.to_f64().ok_or_else(|| GpmfError::Corrupt {
            offset: record.offset(),
            reason: format!(
                "SCAL record with non-numeric type 0x{:02x}",
                record.type_tag()
            ),
        })
    }

    /// Number of logical elements per structure for the current record:
    /// the `TYPE` descriptor length for complex records, otherwise
    /// `struct_size / size_of(type)`.
    pub fn elements_in_struct(&self) -> Result<u32, GpmfError> {
        let record = self.current()?;
        match record.value_type()? {
            ValueType::Complex => {
                let descriptor = self.type_descriptor()?;
                if descriptor.is_empty() {
                    return Err(GpmfError::Corrupt {
                        offset: record.offset(),
                        reason: "complex record without a preceding TYPE descriptor".to_owned(),
                    });
                }
                Ok(descriptor.len() as u32)
            }
            ValueType::Nested => Ok(0),
            _ => record.elements(),
        }
    }
}
