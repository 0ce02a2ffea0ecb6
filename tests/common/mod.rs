/// Builds one on-wire KLV record: 8-byte header, data, pad to the
/// 4-byte boundary records are written on.
pub fn klv(key: &[u8; 4], type_tag: u8, struct_size: u8, repeat: u16, data: &[u8]) -> Vec<u8> {
    assert_eq!(
        data.len(),
        struct_size as usize * repeat as usize,
        "record data must be struct_size * repeat bytes"
    );
    let mut out = Vec::new();
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

/// Wraps a stream body in `STRM` and that in `DEVC`, the way cameras
/// lay out one device's telemetry.
pub fn devc(strm_bodies: &[Vec<u8>]) -> Vec<u8> {
    let mut body = Vec::new();
    for strm_body in strm_bodies {
        body.extend(klv(b"STRM", 0, 1, strm_body.len() as u16, strm_body));
    }
    klv(b"DEVC", 0, 1, body.len() as u16, &body)
}
