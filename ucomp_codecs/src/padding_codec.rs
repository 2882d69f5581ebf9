use std::io::{self, Read, Write};

use ucomp_core::codec::{Capability, Codec, CodecDescriptor};
use ucomp_core::format::CodecId;
use ucomp_core::padding;
use ucomp_core::{Error, Result};

const DESCRIPTOR: CodecDescriptor = CodecDescriptor {
    id: CodecId::Padding,
    extension: "",
    aliases: &[],
    magic: None,
    quality: None,
    capabilities: &[Capability::Pseudo],
};

/// Pseudo codec for the padding envelope.
///
/// The orchestrator pads artifacts itself, so `compress` only passes bytes
/// through; `decompress` strips a trailing envelope if one is present. It is
/// registered so the envelope is listed alongside the real codecs, but it is
/// never tried, sniffed or resolved by extension.
pub struct PaddingCodec;

impl Codec for PaddingCodec {
    fn descriptor(&self) -> &CodecDescriptor {
        &DESCRIPTOR
    }

    fn compress(&self, input: &mut dyn Read, output: &mut dyn Write, _level: Option<i32>) -> Result<()> {
        io::copy(input, output)
            .map(|_| ())
            .map_err(|e| Error::codec(CodecId::Padding, e))
    }

    fn decompress(&self, input: &mut dyn Read, output: &mut dyn Write) -> Result<()> {
        let mut buf = Vec::new();
        input
            .read_to_end(&mut buf)
            .and_then(|_| output.write_all(padding::unpad(&buf)))
            .map_err(|e| Error::codec(CodecId::Padding, e))
    }
}
