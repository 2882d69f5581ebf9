use std::io::{self, Read, Write};

use brotli::{CompressorReader, Decompressor};
use ucomp_core::codec::{effective_level, Capability, Codec, CodecDescriptor, QualityRange};
use ucomp_core::format::CodecId;
use ucomp_core::{Error, Result};

/// log2 of the sliding window: 16 MiB, the format's largest standard window.
const LGWIN: u32 = 24;

const BUFFER_SIZE: usize = 4096;

const DESCRIPTOR: CodecDescriptor = CodecDescriptor {
    id: CodecId::Brotli,
    extension: "br",
    aliases: &[],
    // Brotli streams have no fixed signature.
    magic: None,
    quality: Some(QualityRange::new(0, 9, 11)),
    capabilities: &[Capability::HighContext],
};

/// Brotli stream. Identified only by extension or trial decoding.
///
/// Best for: text, markup and JSON.
pub struct BrotliCodec;

impl Codec for BrotliCodec {
    fn descriptor(&self) -> &CodecDescriptor {
        &DESCRIPTOR
    }

    fn compress(&self, input: &mut dyn Read, output: &mut dyn Write, level: Option<i32>) -> Result<()> {
        let quality = effective_level(&DESCRIPTOR, level).unwrap_or(9) as u32;
        let mut reader = CompressorReader::new(input, BUFFER_SIZE, quality, LGWIN);
        io::copy(&mut reader, output)
            .map(|_| ())
            .map_err(|e| Error::codec(CodecId::Brotli, e))
    }

    fn decompress(&self, input: &mut dyn Read, output: &mut dyn Write) -> Result<()> {
        let mut reader = Decompressor::new(input, BUFFER_SIZE);
        io::copy(&mut reader, output)
            .map(|_| ())
            .map_err(|e| Error::codec(CodecId::Brotli, e))
    }
}
