use std::io::{self, Read, Write};

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use ucomp_core::codec::{effective_level, Codec, CodecDescriptor, QualityRange};
use ucomp_core::format::CodecId;
use ucomp_core::{Error, Result};

const DESCRIPTOR: CodecDescriptor = CodecDescriptor {
    id: CodecId::Gzip,
    extension: "gz",
    aliases: &["gzip"],
    magic: Some(&[0x1f, 0x8b]),
    quality: Some(QualityRange::new(1, 6, 9)),
    capabilities: &[],
};

/// Plain RFC 1952 gzip stream.
///
/// Decoding accepts concatenated members, as `gzip -d` does.
///
/// Best for: artifacts that must open with stock tools.
pub struct GzipCodec;

impl Codec for GzipCodec {
    fn descriptor(&self) -> &CodecDescriptor {
        &DESCRIPTOR
    }

    fn compress(&self, input: &mut dyn Read, output: &mut dyn Write, level: Option<i32>) -> Result<()> {
        let level = effective_level(&DESCRIPTOR, level).unwrap_or(6) as u32;
        let mut encoder = GzEncoder::new(output, Compression::new(level));
        io::copy(input, &mut encoder)
            .and_then(|_| encoder.finish())
            .map(|_| ())
            .map_err(|e| Error::codec(CodecId::Gzip, e))
    }

    fn decompress(&self, input: &mut dyn Read, output: &mut dyn Write) -> Result<()> {
        let mut decoder = MultiGzDecoder::new(input);
        io::copy(&mut decoder, output)
            .map(|_| ())
            .map_err(|e| Error::codec(CodecId::Gzip, e))
    }
}
