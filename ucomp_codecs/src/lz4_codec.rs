use std::io::{self, Read, Write};

use lz4_flex::frame::{BlockMode, BlockSize, FrameDecoder, FrameEncoder, FrameInfo};
use ucomp_core::codec::{Codec, CodecDescriptor};
use ucomp_core::format::CodecId;
use ucomp_core::{Error, Result};

const DESCRIPTOR: CodecDescriptor = CodecDescriptor {
    id: CodecId::Lz4,
    extension: "lz4",
    aliases: &[],
    magic: Some(&[0x04, 0x22, 0x4d, 0x18]),
    // lz4_flex has a single compression mode.
    quality: None,
    capabilities: &[],
};

/// LZ4 frame format.
///
/// Fastest decompression of all bundled codecs, typically 3-5 GB/s on
/// modern hardware, at the cost of ratio. Tried last by default.
///
/// Best for: inputs that other codecs barely shrink anyway.
pub struct Lz4Codec;

impl Codec for Lz4Codec {
    fn descriptor(&self) -> &CodecDescriptor {
        &DESCRIPTOR
    }

    fn compress(&self, input: &mut dyn Read, output: &mut dyn Write, _level: Option<i32>) -> Result<()> {
        encode(input, output).map_err(|e| Error::codec(CodecId::Lz4, e))
    }

    fn decompress(&self, input: &mut dyn Read, output: &mut dyn Write) -> Result<()> {
        let mut decoder = FrameDecoder::new(input);
        io::copy(&mut decoder, output)
            .map(|_| ())
            .map_err(|e| Error::codec(CodecId::Lz4, e))
    }
}

fn encode(input: &mut dyn Read, output: &mut dyn Write) -> io::Result<()> {
    let mut info = FrameInfo::default();
    info.block_mode = BlockMode::Linked;
    info.block_size = BlockSize::Max4MB;
    info.content_checksum = true;
    let mut encoder = FrameEncoder::with_frame_info(info, output);
    io::copy(input, &mut encoder)?;
    encoder.finish().map_err(io::Error::other)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_magic_and_roundtrip() {
        let data = b"lz4 frame ".repeat(10_000);
        let mut artifact = Vec::new();
        Lz4Codec.compress(&mut &data[..], &mut artifact, Some(99)).unwrap();
        assert!(artifact.starts_with(&[0x04, 0x22, 0x4d, 0x18]));

        let mut out = Vec::new();
        Lz4Codec.decompress(&mut &artifact[..], &mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_bad_magic_is_a_codec_error() {
        let mut out = Vec::new();
        let err = Lz4Codec.decompress(&mut &b"\x00\x00\x00\x00junk"[..], &mut out).unwrap_err();
        assert!(matches!(err, Error::Codec { codec: CodecId::Lz4, .. }));
    }
}
