use std::io::{self, Read, Seek, SeekFrom, Write};

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::debug;
use ucomp_core::codec::{effective_level, Codec, CodecDescriptor, QualityRange};
use ucomp_core::format::{CodecId, ContainerHeader, CONTAINER_HEADER_SIZE, CONTAINER_MAGIC};
use ucomp_core::{Error, Result};

/// Compressed payloads up to this size stay in memory while the header is
/// pending; larger ones spill to an anonymous temp file.
const SPOOL_LIMIT: usize = 8 * 1024 * 1024;

const DESCRIPTOR: CodecDescriptor = CodecDescriptor {
    id: CodecId::Container,
    extension: "uc",
    aliases: &[],
    magic: Some(CONTAINER_MAGIC),
    quality: Some(QualityRange::new(1, 6, 9)),
    capabilities: &[],
};

/// Default codec: a gzip payload behind a 20-byte size header.
///
/// ```text
/// "FILE" | compressed_size: u64 BE | original_size: u64 BE | gzip payload
/// ```
///
/// Both sizes are checked on decode, so truncation and trailing garbage are
/// reported instead of silently producing short output. Bytes without the
/// `FILE` magic are decoded as a bare gzip stream.
///
/// Best for: general input where nothing else is known.
pub struct ContainerCodec;

impl Codec for ContainerCodec {
    fn descriptor(&self) -> &CodecDescriptor {
        &DESCRIPTOR
    }

    fn compress(&self, input: &mut dyn Read, output: &mut dyn Write, level: Option<i32>) -> Result<()> {
        let level = effective_level(&DESCRIPTOR, level).unwrap_or(6) as u32;
        encode(input, output, level).map_err(|e| Error::codec(CodecId::Container, e))
    }

    fn decompress(&self, input: &mut dyn Read, output: &mut dyn Write) -> Result<()> {
        let mut head = [0u8; CONTAINER_HEADER_SIZE];
        let n = read_full(input, &mut head).map_err(|e| Error::codec(CodecId::Container, e))?;

        if n < CONTAINER_MAGIC.len() || &head[..CONTAINER_MAGIC.len()] != CONTAINER_MAGIC {
            debug!("no container magic; decoding as a bare gzip stream");
            let mut raw = (&head[..n]).chain(input);
            return gunzip(&mut raw, output)
                .map(|_| ())
                .map_err(|e| Error::codec(CodecId::Container, e));
        }

        let header = match ContainerHeader::from_bytes(&head) {
            Some(h) if n == CONTAINER_HEADER_SIZE => h,
            _ => return Err(Error::corrupt(CodecId::Container, "truncated container header")),
        };
        decode_payload(&header, input, output)
    }
}

fn encode(input: &mut dyn Read, output: &mut dyn Write, level: u32) -> io::Result<()> {
    let mut spool = tempfile::spooled_tempfile(SPOOL_LIMIT);
    let mut encoder = GzEncoder::new(&mut spool, Compression::new(level));
    let original_size = io::copy(input, &mut encoder)?;
    encoder.finish()?;

    if original_size == 0 {
        let header = ContainerHeader {
            compressed_size: 0,
            original_size: 0,
        };
        return output.write_all(&header.to_bytes());
    }

    let compressed_size = spool.seek(SeekFrom::End(0))?;
    spool.seek(SeekFrom::Start(0))?;
    let header = ContainerHeader {
        compressed_size,
        original_size,
    };
    output.write_all(&header.to_bytes())?;
    io::copy(&mut spool, output)?;
    Ok(())
}

fn decode_payload(header: &ContainerHeader, input: &mut dyn Read, output: &mut dyn Write) -> Result<()> {
    let corrupt = |msg: String| Error::corrupt(CodecId::Container, msg);

    if header.compressed_size == 0 {
        if header.original_size != 0 {
            return Err(corrupt(format!(
                "header claims {} original bytes but carries no payload",
                header.original_size
            )));
        }
        return reject_trailing(input);
    }

    let mut payload = (&mut *input).take(header.compressed_size);
    let written = gunzip(&mut payload, output).map_err(|e| Error::codec(CodecId::Container, e))?;
    io::copy(&mut payload, &mut io::sink()).map_err(|e| Error::codec(CodecId::Container, e))?;

    if payload.limit() != 0 {
        return Err(corrupt(format!(
            "payload truncated: {} of {} bytes present",
            header.compressed_size - payload.limit(),
            header.compressed_size
        )));
    }
    if written != header.original_size {
        return Err(corrupt(format!(
            "decoded {written} bytes, header claims {}",
            header.original_size
        )));
    }
    reject_trailing(input)
}

/// The header's `compressed_size` covers the rest of the artifact.
fn reject_trailing(input: &mut dyn Read) -> Result<()> {
    let extra = read_full(input, &mut [0u8; 1]).map_err(|e| Error::codec(CodecId::Container, e))?;
    if extra != 0 {
        return Err(Error::corrupt(CodecId::Container, "trailing bytes after payload"));
    }
    Ok(())
}

fn gunzip(input: &mut dyn Read, output: &mut dyn Write) -> io::Result<u64> {
    let mut decoder = MultiGzDecoder::new(input);
    io::copy(&mut decoder, output)
}

/// Fill `buf` as far as the stream allows; returns the byte count read.
fn read_full(input: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        ContainerCodec.compress(&mut &data[..], &mut out, None).unwrap();
        out
    }

    fn unpack(artifact: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        ContainerCodec.decompress(&mut &artifact[..], &mut out)?;
        Ok(out)
    }

    #[test]
    fn test_header_records_both_sizes() {
        let data = b"container payload ".repeat(500);
        let artifact = pack(&data);
        let mut head = [0u8; CONTAINER_HEADER_SIZE];
        head.copy_from_slice(&artifact[..CONTAINER_HEADER_SIZE]);
        let header = ContainerHeader::from_bytes(&head).unwrap();
        assert_eq!(header.original_size, data.len() as u64);
        assert_eq!(header.compressed_size, (artifact.len() - CONTAINER_HEADER_SIZE) as u64);
        assert_eq!(unpack(&artifact).unwrap(), data);
    }

    #[test]
    fn test_empty_input_is_header_only() {
        let artifact = pack(b"");
        assert_eq!(artifact.len(), CONTAINER_HEADER_SIZE);
        assert_eq!(&artifact[..4], b"FILE");
        assert!(unpack(&artifact).unwrap().is_empty());
    }

    #[test]
    fn test_bare_gzip_is_accepted() {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"no header here").unwrap();
        let gz = enc.finish().unwrap();
        assert_eq!(unpack(&gz).unwrap(), b"no header here");
    }

    #[test]
    fn test_truncated_payload_is_a_codec_error() {
        let artifact = pack(&b"abcdefgh".repeat(1000));
        let cut = &artifact[..artifact.len() - 5];
        let err = unpack(cut).unwrap_err();
        assert!(matches!(err, Error::Codec { codec: CodecId::Container, .. }));
    }

    #[test]
    fn test_truncated_header_is_a_codec_error() {
        let artifact = pack(b"hello");
        let err = unpack(&artifact[..12]).unwrap_err();
        assert!(err.is_codec());
    }

    #[test]
    fn test_size_mismatch_is_detected() {
        let mut artifact = pack(b"exactly these bytes");
        // Bump original_size (last header byte) by one.
        artifact[CONTAINER_HEADER_SIZE - 1] ^= 0x01;
        assert!(unpack(&artifact).unwrap_err().is_codec());
    }

    #[test]
    fn test_trailing_bytes_are_rejected() {
        let mut artifact = pack(b"hello hello hello");
        artifact.extend_from_slice(b"JUNKJUNK");
        let err = unpack(&artifact).unwrap_err();
        assert!(err.to_string().contains("trailing bytes"), "{err}");

        let mut empty = pack(b"");
        empty.push(0);
        assert!(unpack(&empty).unwrap_err().is_codec());
    }
}
