use std::io::{self, Read, Write};

use bzip2::read::MultiBzDecoder;
use bzip2::write::BzEncoder;
use bzip2::Compression;
use ucomp_core::codec::{effective_level, Codec, CodecDescriptor, QualityRange};
use ucomp_core::format::CodecId;
use ucomp_core::{Error, Result};

const DESCRIPTOR: CodecDescriptor = CodecDescriptor {
    id: CodecId::Bzip2,
    extension: "bz2",
    aliases: &["bzip2"],
    magic: Some(b"BZh"),
    quality: Some(QualityRange::new(1, 6, 9)),
    capabilities: &[],
};

/// Burrows-Wheeler block sorting; level selects the block size (100k × level).
pub struct Bzip2Codec;

impl Codec for Bzip2Codec {
    fn descriptor(&self) -> &CodecDescriptor {
        &DESCRIPTOR
    }

    fn compress(&self, input: &mut dyn Read, output: &mut dyn Write, level: Option<i32>) -> Result<()> {
        let level = effective_level(&DESCRIPTOR, level).unwrap_or(6) as u32;
        encode(input, output, level).map_err(|e| Error::codec(CodecId::Bzip2, e))
    }

    fn decompress(&self, input: &mut dyn Read, output: &mut dyn Write) -> Result<()> {
        let mut decoder = MultiBzDecoder::new(input);
        io::copy(&mut decoder, output)
            .map(|_| ())
            .map_err(|e| Error::codec(CodecId::Bzip2, e))
    }
}

fn encode(input: &mut dyn Read, output: &mut dyn Write, level: u32) -> io::Result<()> {
    let mut encoder = BzEncoder::new(output, Compression::new(level));
    io::copy(input, &mut encoder)?;
    encoder.finish()?;
    Ok(())
}
