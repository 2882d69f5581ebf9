use std::io::{self, Read, Write};

use ucomp_core::codec::{effective_level, Capability, Codec, CodecDescriptor, QualityRange};
use ucomp_core::format::CodecId;
use ucomp_core::{Error, Result};
use zstd::stream::{read::Decoder as ZstdDecoder, write::Encoder as ZstdEncoder};

/// Match window used for every frame: 128 MiB.
const WINDOW_LOG: u32 = 27;

/// Largest window the decoder will allocate for: 1 GiB.
const MAX_DECODE_WINDOW_LOG: u32 = 30;

const DESCRIPTOR: CodecDescriptor = CodecDescriptor {
    id: CodecId::Zstd,
    extension: "zst",
    aliases: &["zstd"],
    magic: Some(&[0x28, 0xb5, 0x2f, 0xfd]),
    quality: Some(QualityRange::new(1, 3, 19)),
    capabilities: &[Capability::LongWindow],
};

/// Zstandard frame with long-distance matching.
///
/// Frames carry a content checksum, so a corrupted artifact fails to decode
/// rather than producing wrong bytes.
///
/// Best for: very large inputs with repeats far apart (logs, dumps, VM images).
pub struct ZstdCodec;

impl Codec for ZstdCodec {
    fn descriptor(&self) -> &CodecDescriptor {
        &DESCRIPTOR
    }

    fn compress(&self, input: &mut dyn Read, output: &mut dyn Write, level: Option<i32>) -> Result<()> {
        let level = effective_level(&DESCRIPTOR, level).unwrap_or(3);
        encode(input, output, level).map_err(|e| Error::codec(CodecId::Zstd, e))
    }

    fn decompress(&self, input: &mut dyn Read, output: &mut dyn Write) -> Result<()> {
        decode(input, output).map_err(|e| Error::codec(CodecId::Zstd, e))
    }
}

fn encode(input: &mut dyn Read, output: &mut dyn Write, level: i32) -> io::Result<()> {
    let mut encoder = ZstdEncoder::new(output, level)?;
    encoder.long_distance_matching(true)?;
    encoder.window_log(WINDOW_LOG)?;
    encoder.include_checksum(true)?;
    io::copy(input, &mut encoder)?;
    encoder.finish()?;
    Ok(())
}

fn decode(input: &mut dyn Read, output: &mut dyn Write) -> io::Result<()> {
    let mut decoder = ZstdDecoder::new(input)?;
    decoder.window_log_max(MAX_DECODE_WINDOW_LOG)?;
    io::copy(&mut decoder, output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_decode_with_stock_decoder() {
        let data = b"zstd long window frame ".repeat(2000);
        let mut artifact = Vec::new();
        ZstdCodec.compress(&mut &data[..], &mut artifact, None).unwrap();
        assert!(artifact.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]));
        assert!(artifact.len() < data.len() / 10);

        // 2^27 is the stock decoder's default window limit.
        let decoded = zstd::decode_all(&artifact[..]).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_flipped_byte_is_rejected() {
        let data = b"checksummed content ".repeat(100);
        let mut artifact = Vec::new();
        ZstdCodec.compress(&mut &data[..], &mut artifact, Some(1)).unwrap();
        let last = artifact.len() - 1;
        artifact[last] ^= 0xff;

        let mut out = Vec::new();
        let err = ZstdCodec.decompress(&mut &artifact[..], &mut out).unwrap_err();
        assert!(matches!(err, Error::Codec { codec: CodecId::Zstd, .. }));
    }
}
