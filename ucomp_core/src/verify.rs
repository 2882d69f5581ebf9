use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use tracing::debug;
use xxhash_rust::xxh3::{xxh3_64, Xxh3};

use crate::codec::Codec;
use crate::error::{Error, Result};

/// Length plus xxhash3-64 of a byte stream.
///
/// Computed over the original input before compression and over the
/// decompressed artifact during verification; comparing both catches
/// corruption that a size check alone misses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub len: u64,
    pub hash: u64,
}

impl Fingerprint {
    pub fn of(bytes: &[u8]) -> Self {
        Self {
            len: bytes.len() as u64,
            hash: xxh3_64(bytes),
        }
    }

    pub fn of_reader<R: Read + ?Sized>(reader: &mut R) -> io::Result<Self> {
        let mut sink = FingerprintWriter::default();
        io::copy(reader, &mut sink)?;
        Ok(sink.finish())
    }

    pub fn of_file(path: &Path, buffer_size: usize) -> io::Result<Self> {
        let mut reader = BufReader::with_capacity(buffer_size, File::open(path)?);
        Self::of_reader(&mut reader)
    }
}

/// `Write` sink that fingerprints everything written to it.
#[derive(Default)]
pub struct FingerprintWriter {
    hasher: Xxh3,
    len: u64,
}

impl FingerprintWriter {
    pub fn finish(&self) -> Fingerprint {
        Fingerprint {
            len: self.len,
            hash: self.hasher.digest(),
        }
    }
}

impl Write for FingerprintWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.hasher.update(buf);
        self.len += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Decompress `artifact` with exactly `codec` and compare against `expected`.
///
/// `artifact` must not include a padding envelope. Every failure, including
/// codec and I/O errors, is reported as `VerificationFailed`.
pub fn verify(codec: &dyn Codec, artifact: &mut dyn Read, expected: &Fingerprint) -> Result<()> {
    let mut sink = FingerprintWriter::default();
    codec
        .decompress(artifact, &mut sink)
        .map_err(|e| failed(codec, format!("decompression error: {e}")))?;
    let actual = sink.finish();

    if actual.len != expected.len {
        return Err(failed(
            codec,
            format!("decompressed to {} bytes, expected {}", actual.len, expected.len),
        ));
    }
    if actual.hash != expected.hash {
        return Err(failed(
            codec,
            format!(
                "content fingerprint {:016x} does not match original {:016x}",
                actual.hash, expected.hash
            ),
        ));
    }
    debug!(codec = %codec.id(), len = actual.len, "round-trip verified");
    Ok(())
}

/// Verify an in-memory artifact against the original bytes.
pub fn verify_bytes(codec: &dyn Codec, artifact: &[u8], original: &[u8]) -> Result<()> {
    verify(codec, &mut &artifact[..], &Fingerprint::of(original))
}

/// Verify the first `payload_len` bytes of the artifact at `path`.
///
/// The caller knows where its own padding starts, so anything past
/// `payload_len` is ignored without inspecting it.
pub fn verify_file(
    codec: &dyn Codec,
    path: &Path,
    payload_len: u64,
    expected: &Fingerprint,
    buffer_size: usize,
) -> Result<()> {
    let file = File::open(path).map_err(|e| failed(codec, format!("reading artifact: {e}")))?;
    let mut reader = BufReader::with_capacity(buffer_size, file).take(payload_len);
    verify(codec, &mut reader, expected)
}

fn failed(codec: &dyn Codec, reason: String) -> Error {
    Error::VerificationFailed {
        codec: codec.id(),
        reason,
    }
}
