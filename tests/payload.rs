//! End-to-end extraction over synthetic payloads laid out the way
//! cameras write them: `DEVC` devices holding `STRM` streams, each
//! stream annotated with name, units, scale and type descriptors
//! before its sample data.

mod common;

use common::{devc, klv};
use gpmf_parse::{FourCC, Gpmf, GpmfError, SearchMode, StreamCursor};

/// Accelerometer stream: name, total samples, single-divisor scale,
/// SI units, s16 x/y/z samples.
fn accl_stream() -> Vec<u8> {
    let mut body = klv(b"STNM", b'c', 13, 1, b"Accelerometer");
    body.extend(klv(b"TSMP", b'L', 4, 1, &[0, 0, 0, 2]));
    body.extend(klv(b"SIUN", b'c', 5, 1, "m/s\u{b2}".as_bytes()));
    body.extend(klv(b"SCAL", b's', 2, 1, &[0, 100]));
    body.extend(klv(
        b"ACCL",
        b's',
        6,
        2,
        &[0, 100, 0, 200, 0, 50, 1, 0, 0, 10, 0, 20],
    ));
    body
}

/// GPS stream: per-element scale divisors over l32 samples.
fn gps_stream() -> Vec<u8> {
    let mut body = klv(b"STNM", b'c', 3, 1, b"GPS");
    body.extend(klv(
        b"SCAL",
        b'l',
        4,
        2,
        &[0, 0, 0, 10, 0, 0, 0, 100],
    ));
    body.extend(klv(
        b"GPS5",
        b'l',
        8,
        1,
        &[0, 0, 0, 50, 0, 0, 1, 0],
    ));
    body
}

#[test]
fn walk_streams_and_extract() {
    let payload = devc(&[accl_stream(), gps_stream()]);
    let mut cursor = StreamCursor::new(&payload).unwrap();

    // first stream: accelerometer
    cursor
        .find_next(FourCC::STRM, SearchMode::RECURSE.tolerant())
        .unwrap();
    let data = cursor.seek_to_samples().unwrap();
    assert_eq!(data.fourcc(), FourCC::from_str("ACCL"));
    assert_eq!(cursor.units().unwrap(), vec!["m/s\u{b2}".to_owned()]);

    let scaled = cursor.scaled_data().unwrap();
    assert_eq!(scaled.sample(0).unwrap(), &[1.00, 2.00, 0.50]);
    assert_eq!(scaled.sample(1).unwrap(), &[2.56, 0.10, 0.20]);

    // second stream: GPS with per-element divisors
    cursor
        .find_next(FourCC::STRM, SearchMode::RECURSE.tolerant())
        .unwrap();
    let data = cursor.seek_to_samples().unwrap();
    assert_eq!(data.fourcc(), FourCC::from_str("GPS5"));
    let scaled = cursor.scaled_data().unwrap();
    assert_eq!(scaled.sample(0).unwrap(), &[5.0, 2.56]);

    // no further streams
    assert!(cursor
        .find_next(FourCC::STRM, SearchMode::RECURSE.tolerant())
        .is_err());
}

#[test]
fn key_filter_across_payloads() {
    let mut bytes = devc(&[accl_stream()]);
    bytes.extend(devc(&[gps_stream()]));
    bytes.extend(devc(&[accl_stream()]));

    let gpmf = Gpmf::from_slice(&bytes).unwrap();
    assert_eq!(gpmf.len(), 3);

    let mut matches = 0;
    for payload in gpmf.iter() {
        let mut cursor = payload.cursor().unwrap();
        while cursor
            .find_next(FourCC::from_str("ACCL"), SearchMode::RECURSE.tolerant())
            .is_ok()
        {
            matches += 1;
        }
    }
    assert_eq!(matches, 2);
}

#[test]
fn corrupt_stream_does_not_block_siblings() {
    // corrupt ACCL record inside the first stream, valid GPS after it
    let mut broken = accl_stream();
    let len = broken.len();
    // overwrite the ACCL repeat count with a huge value
    // (the ACCL record is the final 20 bytes; repeat sits at offset 6)
    broken[len - 14] = 0xff;
    broken[len - 13] = 0xff;

    let payload = devc(&[broken, gps_stream()]);
    let mut cursor = StreamCursor::new(&payload).unwrap();

    // strict search aborts on the corrupt record..
    assert!(matches!(
        cursor.find_next(FourCC::from_str("GPS5"), SearchMode::RECURSE),
        Err(GpmfError::Corrupt { .. })
    ));
    // ..tolerant search resynchronizes and reaches the sibling stream
    let record = cursor
        .find_next(FourCC::from_str("GPS5"), SearchMode::RECURSE.tolerant())
        .unwrap();
    assert_eq!(record.repeat(), 1);
}

#[test]
fn run_report_over_mixed_payloads() {
    let mut bytes = devc(&[accl_stream()]);
    // a DEVC whose nested STRM declares data beyond its container
    let mut broken_strm = klv(b"ACCL", b's', 2, 1, &[0, 1]);
    broken_strm[6] = 0xff;
    broken_strm[7] = 0xff;
    bytes.extend(devc(&[broken_strm]));

    let gpmf = Gpmf::from_slice(&bytes).unwrap();
    assert_eq!(gpmf.report().attempted, 2);
    assert_eq!(gpmf.report().parsed(), 1);
    assert_eq!(gpmf.report().failures.len(), 1);
    assert!(gpmf.has_data());
}

#[test]
fn raw_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("telemetry.gpmf");
    let mut bytes = devc(&[accl_stream()]);
    bytes.extend(devc(&[gps_stream()]));
    std::fs::write(&path, &bytes).unwrap();

    let gpmf = Gpmf::open(&path).unwrap();
    assert_eq!(gpmf.len(), 2);
    assert!(gpmf.first().unwrap().time().is_none());

    let mut cursor = gpmf.last().unwrap().cursor().unwrap();
    let record = cursor
        .find_next(FourCC::from_str("GPS5"), SearchMode::RECURSE.tolerant())
        .unwrap();
    assert_eq!(record.elements().unwrap(), 2);
}
