//! Scaled sample extraction: decoding a data record's raw bytes into
//! double-precision samples, applying the resolved `TYPE` and `SCAL`
//! annotations.
//!
//! Output is row-major: one row per sample structure, one `f64` per
//! element within it. Numeric elements are decoded per the type system
//! and divided by their scale divisor. String, FourCC and identifier
//! elements keep their place in the row as a `0.0` slot so the block
//! stays rectangular; their bytes are exposed verbatim through
//! `Record::raw_bytes` at the element's byte offset within each sample
//! structure. All output is copied - nothing borrows from the payload
//! buffer after the call returns.

use std::ops::Range;

use crate::{GpmfError, Record, StreamCursor, ValueType};

/// One extraction column: byte offset within a sample structure plus
/// the element type. `value_type` is `None` past an unknown tag in a
/// tolerantly-resolved descriptor, where offsets can no longer be
/// derived: such columns are zero-filled.
#[derive(Debug, Clone, Copy)]
struct Column {
    offset: usize,
    value_type: Option<ValueType>,
}

/// Scaled samples extracted from one record, row-major.
/// Exclusively owned by the caller; dropped like any other value.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledData {
    values: Vec<f64>,
    samples: usize,
    elements: usize,
}

impl ScaledData {
    /// All values, sample-major.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of extracted sample structures (rows).
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Number of elements per sample structure (columns).
    pub fn elements(&self) -> usize {
        self.elements
    }

    /// One sample row.
    pub fn sample(&self, index: usize) -> Option<&[f64]> {
        if index >= self.samples || self.elements == 0 {
            return None;
        }
        self.values
            .get(index * self.elements..(index + 1) * self.elements)
    }

    /// Iterates over sample rows.
    pub fn iter(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks_exact(self.elements.max(1))
    }

    /// Consumes the block, returning the flat value vector.
    pub fn into_values(self) -> Vec<f64> {
        self.values
    }
}

impl<'a> StreamCursor<'a> {
    /// Extracts every sample of the current record as scaled doubles.
    /// Shorthand for `scaled_data_range(0..repeat, false)`.
    pub fn scaled_data(&self) -> Result<ScaledData, GpmfError> {
        let repeat = self.current()?.repeat();
        self.scaled_data_range(0..repeat, false)
    }

    /// Extracts the requested sample range of the current record as
    /// scaled doubles.
    ///
    /// With `tolerant` unset, an undecodable element type fails the
    /// whole call with `UnknownType`. With `tolerant` set, the unknown
    /// element and the remainder of its sample are written as `0.0`
    /// (their byte offsets cannot be derived past the unknown width)
    /// and every sample still starts at its own stride boundary, so
    /// prior elements and subsequent samples decode correctly.
    pub fn scaled_data_range(
        &self,
        sample_range: Range<u32>,
        tolerant: bool,
    ) -> Result<ScaledData, GpmfError> {
        let record = self.current()?;
        let columns = self.columns(&record, tolerant)?;
        let samples = validate_range(&sample_range, record.repeat())?;
        let mut values = vec![0.0; samples * columns.len()];
        self.fill(&record, &columns, &sample_range, &mut values)?;
        Ok(ScaledData {
            values,
            samples,
            elements: columns.len(),
        })
    }

    /// As `scaled_data_range`, writing into a caller-supplied buffer
    /// instead of allocating. Returns `(samples, elements)` written;
    /// fails with `BufferTooSmall` if `out` cannot hold
    /// `samples * elements` doubles.
    pub fn scaled_data_into(
        &self,
        out: &mut [f64],
        sample_range: Range<u32>,
        tolerant: bool,
    ) -> Result<(usize, usize), GpmfError> {
        let record = self.current()?;
        let columns = self.columns(&record, tolerant)?;
        let samples = validate_range(&sample_range, record.repeat())?;
        let needed = samples * columns.len();
        if out.len() < needed {
            return Err(GpmfError::BufferTooSmall {
                needed,
                got: out.len(),
            });
        }
        out[..needed].fill(0.0);
        self.fill(&record, &columns, &sample_range, &mut out[..needed])?;
        Ok((samples, columns.len()))
    }

    /// Derives the per-element byte offsets and types for one sample
    /// structure: the record's own type repeated across the structure,
    /// or the `TYPE` descriptor for complex records.
    fn columns(&self, record: &Record<'a>, tolerant: bool) -> Result<Vec<Column>, GpmfError> {
        if record.is_nested() {
            // containers hold child records, not flat samples
            return Err(GpmfError::NotFound);
        }
        let value_type = record.value_type()?;
        if value_type != ValueType::Complex {
            let width = value_type.size();
            return Ok((0..record.elements()? as usize)
                .map(|index| Column {
                    offset: index * width,
                    value_type: Some(value_type),
                })
                .collect());
        }

        let descriptor = self.type_descriptor()?;
        if descriptor.is_empty() {
            return Err(GpmfError::Corrupt {
                offset: record.offset(),
                reason: "complex record without a preceding TYPE descriptor".to_owned(),
            });
        }
        let mut columns = Vec::with_capacity(descriptor.len());
        let mut offset = Some(0usize);
        for &tag in &descriptor {
            let element = match ValueType::from_tag(tag) {
                // a nested/complex tag cannot size an element either
                Ok(t) if t.size() == 0 => Err(GpmfError::UnknownType(tag)),
                other => other,
            };
            match element {
                Ok(element_type) => {
                    columns.push(Column {
                        offset: offset.unwrap_or(usize::MAX),
                        value_type: offset.map(|_| element_type),
                    });
                    offset = offset.map(|o| o + element_type.size());
                }
                Err(_) if tolerant => {
                    // width unknown: this and following columns zero-fill
                    columns.push(Column {
                        offset: usize::MAX,
                        value_type: None,
                    });
                    offset = None;
                }
                Err(err) => return Err(err),
            }
        }
        // with every width known the descriptor must span the structure
        if let Some(total) = offset {
            if total != record.struct_size() {
                return Err(GpmfError::Corrupt {
                    offset: record.offset(),
                    reason: format!(
                        "TYPE descriptor spans {total} bytes, record structure is {} bytes",
                        record.struct_size()
                    ),
                });
            }
        }
        Ok(columns)
    }

    fn fill(
        &self,
        record: &Record<'a>,
        columns: &[Column],
        sample_range: &Range<u32>,
        out: &mut [f64],
    ) -> Result<(), GpmfError> {
        let scale = self.scale()?;
        let raw = record.raw_bytes();
        let stride = record.struct_size();
        for (row, sample) in (sample_range.start..sample_range.end).enumerate() {
            let base = sample as usize * stride;
            for (index, column) in columns.iter().enumerate() {
                let element_type = match column.value_type {
                    Some(t) if t.is_numeric() => t,
                    // strings, keys, identifiers and unknown-width
                    // elements keep a 0.0 slot; bytes stay in raw_bytes
                    _ => continue,
                };
                let start = base + column.offset;
                let bytes = match raw.get(start..start + element_type.size()) {
                    Some(b) => b,
                    None => {
                        return Err(GpmfError::overrun(
                            record.offset(),
                            start + element_type.size(),
                            raw.len(),
                        ))
                    }
                };
                let mut value = element_type.decode_f64(bytes)?;
                if let Some(&divisor) = scale.get(index % scale.len().max(1)) {
                    // zero divisors are treated as unit scale
                    if divisor != 0.0 {
                        value /= divisor;
                    }
                }
                out[row * columns.len() + index] = value;
            }
        }
        Ok(())
    }
}

fn validate_range(sample_range: &Range<u32>, repeat: u32) -> Result<usize, GpmfError> {
    if sample_range.start > sample_range.end || sample_range.end > repeat {
        return Err(GpmfError::InvalidRange {
            start: sample_range.start,
            end: sample_range.end,
            repeat,
        });
    }
    Ok((sample_range.end - sample_range.start) as usize)
}
