/// Byte length of one KLV record header:
/// 4-byte big-endian key, 1-byte type, 1-byte structure size,
/// 2-byte big-endian repeat count.
pub const RECORD_HEADER_LEN: usize = 8;
/// Cap on the number of entries read from a `TYPE` descriptor or a
/// `SIUN`/`UNIT` table. Exceeding it raises
/// `GpmfError::TypeDescriptorExceeded` rather than silently truncating.
pub const MAX_TYPE_ELEMENTS: usize = 64;
/// Max in-memory size for raw GPMF-files. Larger files are rejected.
pub const MAX_RAW_FILE_SIZE: u64 = 50_000_000;
