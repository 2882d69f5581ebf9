//! Reversible padding envelope: `payload ++ "[PADDING]" ++ zero filler`.
//!
//! Grows an accepted artifact to an exact size when `pad_to_limit` is set;
//! it never makes an artifact smaller. The envelope carries no length
//! field, so detection relies on the marker. `unpad` anchors the search
//! at the tail (skip the zero filler, then require the marker) instead of
//! taking the first marker in the file, which keeps a payload that happens
//! to contain the marker intact. A payload that
//! naturally ends in the marker followed only by zeros is still
//! misread; the marker is chosen so that is improbable, not impossible.

use std::io::{self, Read, Seek, SeekFrom, Write};

/// Literal marker separating the real payload from the filler.
pub const MARKER: &[u8; 9] = b"[PADDING]";

const SCAN_CHUNK: usize = 64 * 1024;

/// Filler bytes needed to grow `payload_len` to exactly `target_size`.
///
/// `None` when the payload plus marker already exceeds the target.
pub fn filler_len(payload_len: u64, target_size: u64) -> Option<u64> {
    target_size.checked_sub(payload_len)?.checked_sub(MARKER.len() as u64)
}

/// Wrap `payload` so the result is exactly `target_size` bytes.
pub fn pad(payload: &[u8], target_size: u64) -> Option<Vec<u8>> {
    let filler = filler_len(payload.len() as u64, target_size)?;
    let mut out = Vec::with_capacity(target_size as usize);
    out.extend_from_slice(payload);
    out.extend_from_slice(MARKER);
    out.resize(target_size as usize, 0);
    debug_assert_eq!(out.len() as u64, payload.len() as u64 + MARKER.len() as u64 + filler);
    Some(out)
}

/// Append the marker and `filler` zero bytes to a stream already holding the payload.
pub fn write_tail<W: Write + ?Sized>(out: &mut W, filler: u64) -> io::Result<()> {
    out.write_all(MARKER)?;
    io::copy(&mut io::repeat(0).take(filler), out)?;
    Ok(())
}

/// Strip a padding envelope, or return `bytes` unchanged if none is present.
pub fn unpad(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
    match bytes[..end].strip_suffix(MARKER.as_slice()) {
        Some(payload) => payload,
        None => bytes,
    }
}

pub fn is_padded(bytes: &[u8]) -> bool {
    unpad(bytes).len() != bytes.len()
}

/// Length of the real payload in a seekable artifact, or `None` if the
/// artifact carries no padding envelope. Leaves the cursor at the start.
pub fn payload_len<R: Read + Seek + ?Sized>(reader: &mut R) -> io::Result<Option<u64>> {
    let total = reader.seek(SeekFrom::End(0))?;
    let mut end = total;
    let mut buf = vec![0u8; SCAN_CHUNK];

    // Walk backwards over the zero filler to the last non-zero byte.
    'scan: while end > 0 {
        let take = end.min(SCAN_CHUNK as u64) as usize;
        let start = end - take as u64;
        reader.seek(SeekFrom::Start(start))?;
        reader.read_exact(&mut buf[..take])?;
        match buf[..take].iter().rposition(|&b| b != 0) {
            Some(p) => {
                end = start + p as u64 + 1;
                break 'scan;
            }
            None => end = start,
        }
    }

    let marker_len = MARKER.len() as u64;
    let found = if end >= marker_len {
        let mut tail = [0u8; 9];
        reader.seek(SeekFrom::Start(end - marker_len))?;
        reader.read_exact(&mut tail)?;
        (&tail == MARKER).then_some(end - marker_len)
    } else {
        None
    };

    reader.seek(SeekFrom::Start(0))?;
    Ok(found)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_pad_reaches_target_exactly() {
        let padded = pad(b"abc", 40).unwrap();
        assert_eq!(padded.len(), 40);
        assert_eq!(&padded[..3], b"abc");
        assert_eq!(&padded[3..12], MARKER);
        assert!(padded[12..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_pad_with_zero_filler() {
        let padded = pad(b"abc", 12).unwrap();
        assert_eq!(padded, b"abc[PADDING]");
        assert_eq!(unpad(&padded), b"abc");
    }

    #[test]
    fn test_pad_rejects_undersized_target() {
        assert!(pad(b"abc", 11).is_none());
        assert_eq!(filler_len(100, 50), None);
    }

    #[test]
    fn test_unpad_without_marker_is_identity() {
        let bytes = b"plain bytes\0\0\0";
        assert_eq!(unpad(bytes), bytes);
        assert!(!is_padded(bytes));
        assert_eq!(unpad(&[]), &[] as &[u8]);
    }

    #[test]
    fn test_unpad_keeps_payload_containing_marker() {
        let payload = b"head[PADDING]tail\0\0";
        let padded = pad(payload, 64).unwrap();
        assert_eq!(unpad(&padded), payload);
    }

    #[test]
    fn test_payload_len_on_stream() {
        let padded = pad(b"0123456789", 200_000).unwrap();
        let mut cursor = Cursor::new(padded);
        assert_eq!(payload_len(&mut cursor).unwrap(), Some(10));
        assert_eq!(cursor.position(), 0);

        let mut plain = Cursor::new(vec![0u8; 1000]);
        assert_eq!(payload_len(&mut plain).unwrap(), None);
    }

    #[test]
    fn test_write_tail_matches_pad() {
        let mut out = b"xyz".to_vec();
        write_tail(&mut out, 5).unwrap();
        assert_eq!(out, pad(b"xyz", 17).unwrap());
    }

    proptest! {
        #[test]
        fn unpad_inverts_pad(payload in proptest::collection::vec(any::<u8>(), 0..512), extra in 0u64..4096) {
            let target = payload.len() as u64 + MARKER.len() as u64 + extra;
            let padded = pad(&payload, target).unwrap();
            prop_assert_eq!(padded.len() as u64, target);
            prop_assert_eq!(unpad(&padded), payload.as_slice());

            let mut cursor = Cursor::new(padded);
            prop_assert_eq!(payload_len(&mut cursor).unwrap(), Some(payload.len() as u64));
        }
    }
}
