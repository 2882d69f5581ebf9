use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::format::{CodecId, SNIFF_HEADER_LEN};
use crate::fsio;
use crate::padding;
use crate::registry::CodecRegistry;

/// How the sniffer settled on a codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionStage {
    Extension,
    Magic,
    Trial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Detection {
    pub codec: CodecId,
    pub stage: DetectionStage,
    /// The artifact ends in a padding envelope that was stripped before sniffing.
    pub padded: bool,
}

/// Identifies which registered codec produced an artifact.
///
/// Resolution order:
/// 1. file extension, unless the codec declares magic bytes the header lacks;
/// 2. magic bytes over the first [`SNIFF_HEADER_LEN`] bytes of the payload;
/// 3. trial decoding with every real codec in registration order.
///
/// A stage 1 or 2 hit is only a candidate: it is accepted once the artifact
/// decodes with it, otherwise resolution moves on. Short signatures such as
/// gzip's two bytes also occur at the start of other codecs' streams.
///
/// A trailing padding envelope is stripped before any stage looks at the
/// bytes. If the stripped payload decodes with no codec, the artifact is
/// resolved again whole, since an unpadded stream may end in the marker.
pub struct FormatSniffer {
    registry: Arc<CodecRegistry>,
    buffer_size: usize,
}

impl FormatSniffer {
    pub fn new(registry: Arc<CodecRegistry>, buffer_size: usize) -> Self {
        Self {
            registry,
            buffer_size: buffer_size.max(1),
        }
    }

    /// Identify an in-memory artifact. `name` supplies the extension, if any.
    pub fn identify_bytes(&self, name: &str, bytes: &[u8]) -> Result<Detection> {
        if bytes.is_empty() {
            return Err(Error::InputEmpty { path: name.into() });
        }
        let payload = padding::unpad(bytes);
        if payload.len() != bytes.len() {
            match self.resolve_bytes(name, payload, true) {
                Err(Error::UnrecognizedFormat { .. }) => {
                    debug!(name, "stripped payload does not decode; sniffing whole artifact");
                }
                other => return other,
            }
        }
        self.resolve_bytes(name, bytes, false)
    }

    /// Identify an artifact on disk without loading it.
    pub fn identify(&self, path: &Path) -> Result<Detection> {
        let total = fsio::input_size(path)?;
        if total == 0 {
            return Err(Error::InputEmpty {
                path: path.to_path_buf(),
            });
        }

        let payload_len = padding::payload_len(&mut File::open(path)?)?;
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        if let Some(len) = payload_len {
            match self.resolve_file(path, &name, len, true) {
                Err(Error::UnrecognizedFormat { .. }) => {
                    debug!(name = %name, "stripped payload does not decode; sniffing whole artifact");
                }
                other => return other,
            }
        }
        self.resolve_file(path, &name, total, false)
    }

    fn resolve_bytes(&self, name: &str, payload: &[u8], padded: bool) -> Result<Detection> {
        let header = &payload[..payload.len().min(SNIFF_HEADER_LEN)];
        self.resolve(name, header, padded, |codec| {
            let mut counter = ByteCounter::default();
            codec.decompress(&mut &payload[..], &mut counter)?;
            Ok(counter.0)
        })
    }

    /// Resolve the first `len` bytes of the file at `path`.
    fn resolve_file(&self, path: &Path, name: &str, len: u64, padded: bool) -> Result<Detection> {
        let mut header = Vec::with_capacity(SNIFF_HEADER_LEN);
        File::open(path)?
            .take(len.min(SNIFF_HEADER_LEN as u64))
            .read_to_end(&mut header)?;

        self.resolve(name, &header, padded, |codec| {
            let file = File::open(path)?;
            let mut reader = BufReader::with_capacity(self.buffer_size, file).take(len);
            let mut counter = ByteCounter::default();
            codec.decompress(&mut reader, &mut counter)?;
            Ok(counter.0)
        })
    }

    fn resolve<F>(&self, name: &str, header: &[u8], padded: bool, mut trial: F) -> Result<Detection>
    where
        F: FnMut(&dyn Codec) -> Result<u64>,
    {
        let found = |codec: CodecId, stage: DetectionStage| -> Result<Detection> {
            info!(name, codec = %codec, ?stage, padded, "format identified");
            Ok(Detection { codec, stage, padded })
        };
        let mut rejected: Vec<CodecId> = Vec::new();

        if let Some(ext) = Path::new(name).extension().and_then(|e| e.to_str()) {
            if let Ok(codec) = self.registry.by_extension(ext) {
                let contradicted = codec.descriptor().magic.is_some_and(|m| !header.starts_with(m));
                if contradicted {
                    debug!(name, codec = %codec.id(), "extension contradicts magic bytes; ignoring it");
                } else if decodes(name, codec.as_ref(), &mut trial) {
                    return found(codec.id(), DetectionStage::Extension);
                } else {
                    rejected.push(codec.id());
                }
            }
        }

        if let Ok(codec) = self.registry.by_magic(header) {
            if !rejected.contains(&codec.id()) {
                if decodes(name, codec.as_ref(), &mut trial) {
                    return found(codec.id(), DetectionStage::Magic);
                }
                rejected.push(codec.id());
            }
        }

        // Brute force. An artifact of empty input decodes to nothing, so an
        // empty decode is only taken when no codec yields any output.
        let mut empty_match = None;
        for codec in self.registry.real_codecs() {
            if rejected.contains(&codec.id()) {
                continue;
            }
            match trial(codec.as_ref()) {
                Ok(0) => {
                    empty_match.get_or_insert(codec.id());
                }
                Ok(n) => {
                    debug!(name, codec = %codec.id(), decoded = n, "trial decode succeeded");
                    return found(codec.id(), DetectionStage::Trial);
                }
                Err(e) => debug!(name, codec = %codec.id(), error = %e, "trial decode failed"),
            }
        }
        if let Some(codec) = empty_match {
            return found(codec, DetectionStage::Trial);
        }

        Err(Error::UnrecognizedFormat { name: name.to_string() })
    }
}

/// Run a full decode of a stage 1 or 2 candidate.
fn decodes<F>(name: &str, codec: &dyn Codec, trial: &mut F) -> bool
where
    F: FnMut(&dyn Codec) -> Result<u64>,
{
    match trial(codec) {
        Ok(_) => true,
        Err(e) => {
            debug!(name, codec = %codec.id(), error = %e, "candidate does not decode");
            false
        }
    }
}

#[derive(Default)]
struct ByteCounter(u64);

impl Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{CodecDescriptor, QualityRange};

    /// Toy codec: artifacts are `tag ++ payload`.
    struct Tagged {
        desc: CodecDescriptor,
        tag: &'static [u8],
    }

    impl Codec for Tagged {
        fn descriptor(&self) -> &CodecDescriptor {
            &self.desc
        }

        fn compress(&self, input: &mut dyn Read, output: &mut dyn Write, _: Option<i32>) -> Result<()> {
            output.write_all(self.tag)?;
            io::copy(input, output)?;
            Ok(())
        }

        fn decompress(&self, input: &mut dyn Read, output: &mut dyn Write) -> Result<()> {
            let mut tag = vec![0u8; self.tag.len()];
            input
                .read_exact(&mut tag)
                .map_err(|e| Error::codec(self.desc.id, e))?;
            if tag != self.tag {
                return Err(Error::corrupt(self.desc.id, "bad tag"));
            }
            io::copy(input, output)?;
            Ok(())
        }
    }

    /// Toy codec: `"LN" ++ len: u32 BE ++ payload`, rejecting any length mismatch.
    struct Framed;

    const FRAMED: CodecDescriptor = CodecDescriptor {
        id: CodecId::Lz4,
        extension: "lz4",
        aliases: &[],
        magic: Some(b"LN"),
        quality: None,
        capabilities: &[],
    };

    impl Codec for Framed {
        fn descriptor(&self) -> &CodecDescriptor {
            &FRAMED
        }

        fn compress(&self, input: &mut dyn Read, output: &mut dyn Write, _: Option<i32>) -> Result<()> {
            let mut body = Vec::new();
            input.read_to_end(&mut body)?;
            output.write_all(b"LN")?;
            output.write_all(&(body.len() as u32).to_be_bytes())?;
            output.write_all(&body)?;
            Ok(())
        }

        fn decompress(&self, input: &mut dyn Read, output: &mut dyn Write) -> Result<()> {
            let mut bytes = Vec::new();
            input.read_to_end(&mut bytes)?;
            match bytes.get(2..6).map(|l| u32::from_be_bytes([l[0], l[1], l[2], l[3]])) {
                Some(len) if bytes.starts_with(b"LN") && bytes.len() == 6 + len as usize => {
                    output.write_all(&bytes[6..])?;
                    Ok(())
                }
                _ => Err(Error::corrupt(CodecId::Lz4, "frame length mismatch")),
            }
        }
    }

    fn tagged(id: CodecId, ext: &'static str, tag: &'static [u8], magic: Option<&'static [u8]>) -> Arc<dyn Codec> {
        Arc::new(Tagged {
            desc: CodecDescriptor {
                id,
                extension: ext,
                aliases: &[],
                magic,
                quality: Some(QualityRange::new(1, 1, 1)),
                capabilities: &[],
            },
            tag,
        })
    }

    fn sniffer() -> FormatSniffer {
        let registry = CodecRegistry::new()
            .with(tagged(CodecId::Gzip, "gz", b"GZ", Some(b"GZ")))
            .unwrap()
            .with(tagged(CodecId::Brotli, "br", b"BR", None))
            .unwrap();
        FormatSniffer::new(Arc::new(registry), 4096)
    }

    /// Gzip declares the one-byte magic `G`, which brotli's `GB` tag also starts with.
    fn sniffer_with_short_magic() -> FormatSniffer {
        let registry = CodecRegistry::new()
            .with(tagged(CodecId::Gzip, "gz", b"GZ", Some(b"G")))
            .unwrap()
            .with(tagged(CodecId::Brotli, "br", b"GB", None))
            .unwrap();
        FormatSniffer::new(Arc::new(registry), 4096)
    }

    fn framed(body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        Framed.compress(&mut &body[..], &mut out, None).unwrap();
        out
    }

    #[test]
    fn test_extension_wins_when_consistent() {
        let d = sniffer().identify_bytes("a.gz", b"GZhello").unwrap();
        assert_eq!((d.codec, d.stage), (CodecId::Gzip, DetectionStage::Extension));
    }

    #[test]
    fn test_contradicted_extension_falls_through() {
        // .gz name, but no GZ magic: only the brotli trial decode fits.
        let d = sniffer().identify_bytes("a.gz", b"BRhello").unwrap();
        assert_eq!((d.codec, d.stage), (CodecId::Brotli, DetectionStage::Trial));
    }

    #[test]
    fn test_magic_without_extension() {
        let d = sniffer().identify_bytes("blob", b"GZhello").unwrap();
        assert_eq!((d.codec, d.stage), (CodecId::Gzip, DetectionStage::Magic));
    }

    #[test]
    fn test_magic_hit_that_fails_to_decode_falls_through() {
        let d = sniffer_with_short_magic().identify_bytes("blob", b"GBhello").unwrap();
        assert_eq!((d.codec, d.stage), (CodecId::Brotli, DetectionStage::Trial));
    }

    #[test]
    fn test_extension_hit_that_fails_to_decode_falls_through() {
        let d = sniffer_with_short_magic().identify_bytes("a.gz", b"GBhello").unwrap();
        assert_eq!((d.codec, d.stage), (CodecId::Brotli, DetectionStage::Trial));
    }

    #[test]
    fn test_padding_is_stripped_before_sniffing() {
        let padded = padding::pad(b"BRhello", 64).unwrap();
        let d = sniffer().identify_bytes("blob", &padded).unwrap();
        assert_eq!(d.codec, CodecId::Brotli);
        assert!(d.padded);
    }

    #[test]
    fn test_stream_ending_in_marker_is_not_unpadded() {
        let sniffer = FormatSniffer::new(Arc::new(CodecRegistry::new().with(Arc::new(Framed)).unwrap()), 4096);
        let artifact = framed(b"data[PADDING]\0\0\0");
        assert!(padding::is_padded(&artifact));

        let d = sniffer.identify_bytes("blob", &artifact).unwrap();
        assert_eq!((d.codec, d.stage, d.padded), (CodecId::Lz4, DetectionStage::Magic, false));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob");
        std::fs::write(&path, &artifact).unwrap();
        let d = sniffer.identify(&path).unwrap();
        assert!(!d.padded);

        let padded = padding::pad(&framed(b"data"), 64).unwrap();
        assert!(sniffer.identify_bytes("blob", &padded).unwrap().padded);
    }

    #[test]
    fn test_unrecognized_bytes() {
        let err = sniffer().identify_bytes("blob.bin", b"????").unwrap_err();
        assert!(matches!(err, Error::UnrecognizedFormat { name } if name == "blob.bin"));
    }

    #[test]
    fn test_identify_file_streams_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact");
        std::fs::write(&path, padding::pad(b"BRpayload", 100).unwrap()).unwrap();
        let d = sniffer().identify(&path).unwrap();
        assert_eq!((d.codec, d.stage, d.padded), (CodecId::Brotli, DetectionStage::Trial, true));
    }

    #[test]
    fn test_identify_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.gz");
        std::fs::write(&path, b"").unwrap();
        assert!(matches!(sniffer().identify(&path), Err(Error::InputEmpty { .. })));
    }
}
