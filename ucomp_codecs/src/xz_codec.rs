use std::io::{self, Read, Write};

use ucomp_core::codec::{effective_level, Capability, Codec, CodecDescriptor, QualityRange};
use ucomp_core::format::CodecId;
use ucomp_core::{Error, Result};
use xz2::read::XzDecoder;
use xz2::write::XzEncoder;

const DESCRIPTOR: CodecDescriptor = CodecDescriptor {
    id: CodecId::Xz,
    extension: "xz",
    aliases: &[],
    magic: Some(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]),
    quality: Some(QualityRange::new(0, 6, 9)),
    capabilities: &[Capability::HighContext],
};

/// LZMA2 in the `.xz` container (CRC64 check).
///
/// Best for: text and structured data where ratio matters more than speed.
pub struct XzCodec;

impl Codec for XzCodec {
    fn descriptor(&self) -> &CodecDescriptor {
        &DESCRIPTOR
    }

    fn compress(&self, input: &mut dyn Read, output: &mut dyn Write, level: Option<i32>) -> Result<()> {
        let preset = effective_level(&DESCRIPTOR, level).unwrap_or(6) as u32;
        encode(input, output, preset).map_err(|e| Error::codec(CodecId::Xz, e))
    }

    fn decompress(&self, input: &mut dyn Read, output: &mut dyn Write) -> Result<()> {
        let mut decoder = XzDecoder::new(input);
        io::copy(&mut decoder, output)
            .map(|_| ())
            .map_err(|e| Error::codec(CodecId::Xz, e))
    }
}

fn encode(input: &mut dyn Read, output: &mut dyn Write, preset: u32) -> io::Result<()> {
    let mut encoder = XzEncoder::new(output, preset);
    io::copy(input, &mut encoder)?;
    encoder.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_has_xz_signature() {
        let mut artifact = Vec::new();
        XzCodec.compress(&mut &b"lzma2 payload"[..], &mut artifact, Some(0)).unwrap();
        assert!(artifact.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]));

        let mut out = Vec::new();
        XzCodec.decompress(&mut &artifact[..], &mut out).unwrap();
        assert_eq!(out, b"lzma2 payload");
    }

    #[test]
    fn test_garbage_is_a_codec_error() {
        let mut out = Vec::new();
        let err = XzCodec.decompress(&mut &b"definitely not xz"[..], &mut out).unwrap_err();
        assert!(matches!(err, Error::Codec { codec: CodecId::Xz, .. }));
    }
}
