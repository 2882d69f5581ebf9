use std::sync::Arc;

use tracing::debug;

use crate::codec::{Codec, CodecDescriptor};
use crate::error::{Error, Result};
use crate::format::CodecId;

/// Ordered set of codec capabilities, populated once at startup.
///
/// Registration order is meaningful: it is the default trial order for the
/// orchestrator and the brute-force order for the sniffer.
#[derive(Default, Clone)]
pub struct CodecRegistry {
    codecs: Vec<Arc<dyn Codec>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a codec. Fails if a codec with the same id is already present.
    pub fn register(&mut self, codec: Arc<dyn Codec>) -> Result<()> {
        let id = codec.id();
        if self.codecs.iter().any(|c| c.id() == id) {
            return Err(Error::DuplicateCodec(id));
        }
        debug!(codec = %id, "registered codec");
        self.codecs.push(codec);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, codec: Arc<dyn Codec>) -> Result<Self> {
        self.register(codec)?;
        Ok(self)
    }

    pub fn lookup(&self, id: CodecId) -> Result<Arc<dyn Codec>> {
        self.codecs
            .iter()
            .find(|c| c.id() == id)
            .cloned()
            .ok_or_else(|| Error::UnknownCodec(id.to_string()))
    }

    /// Resolve a file extension (case-insensitive, leading dot optional).
    pub fn by_extension(&self, ext: &str) -> Result<Arc<dyn Codec>> {
        self.codecs
            .iter()
            .find(|c| c.descriptor().is_real() && c.descriptor().matches_extension(ext))
            .cloned()
            .ok_or_else(|| Error::UnknownCodec(format!(".{}", ext.trim_start_matches('.'))))
    }

    /// Resolve the codec whose magic bytes prefix `header`.
    ///
    /// The longest matching magic wins. If two different codecs tie at the
    /// longest length the match is ambiguous and nothing is returned.
    pub fn by_magic(&self, header: &[u8]) -> Result<Arc<dyn Codec>> {
        let mut best: Option<(usize, &Arc<dyn Codec>)> = None;
        let mut ambiguous = false;

        for codec in self.real() {
            let Some(magic) = codec.descriptor().magic else {
                continue;
            };
            if magic.is_empty() || !header.starts_with(magic) {
                continue;
            }
            match best {
                Some((len, _)) if len > magic.len() => {}
                Some((len, _)) if len == magic.len() => ambiguous = true,
                _ => {
                    best = Some((magic.len(), codec));
                    ambiguous = false;
                }
            }
        }

        match best {
            Some((_, codec)) if !ambiguous => Ok(codec.clone()),
            _ => Err(Error::UnknownCodec(format!("magic {}", hex_prefix(header)))),
        }
    }

    /// Real codecs in registration order (pseudo codecs skipped).
    pub fn real_codecs(&self) -> Vec<Arc<dyn Codec>> {
        self.real().cloned().collect()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &CodecDescriptor> {
        self.codecs.iter().map(|c| c.descriptor())
    }

    pub fn contains(&self, id: CodecId) -> bool {
        self.codecs.iter().any(|c| c.id() == id)
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    fn real(&self) -> impl Iterator<Item = &Arc<dyn Codec>> {
        self.codecs.iter().filter(|c| c.descriptor().is_real())
    }
}

fn hex_prefix(bytes: &[u8]) -> String {
    bytes
        .iter()
        .take(8)
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use super::*;
    use crate::codec::{Capability, QualityRange};

    struct Fake(CodecDescriptor);

    impl Codec for Fake {
        fn descriptor(&self) -> &CodecDescriptor {
            &self.0
        }

        fn compress(&self, _: &mut dyn Read, _: &mut dyn Write, _: Option<i32>) -> Result<()> {
            Ok(())
        }

        fn decompress(&self, _: &mut dyn Read, _: &mut dyn Write) -> Result<()> {
            Ok(())
        }
    }

    fn fake(id: CodecId, ext: &'static str, magic: Option<&'static [u8]>) -> Arc<dyn Codec> {
        Arc::new(Fake(CodecDescriptor {
            id,
            extension: ext,
            aliases: &[],
            magic,
            quality: Some(QualityRange::new(1, 3, 9)),
            capabilities: &[],
        }))
    }

    fn pseudo() -> Arc<dyn Codec> {
        Arc::new(Fake(CodecDescriptor {
            id: CodecId::Padding,
            extension: "",
            aliases: &[],
            magic: None,
            quality: None,
            capabilities: &[Capability::Pseudo],
        }))
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut reg = CodecRegistry::new();
        reg.register(fake(CodecId::Gzip, "gz", None)).unwrap();
        let err = reg.register(fake(CodecId::Gzip, "gzip", None)).unwrap_err();
        assert!(matches!(err, Error::DuplicateCodec(CodecId::Gzip)));
    }

    #[test]
    fn test_lookup_unknown_id() {
        let reg = CodecRegistry::new().with(fake(CodecId::Gzip, "gz", None)).unwrap();
        assert!(reg.lookup(CodecId::Gzip).is_ok());
        assert!(matches!(reg.lookup(CodecId::Xz), Err(Error::UnknownCodec(_))));
    }

    #[test]
    fn test_extension_lookup_is_case_insensitive() {
        let reg = CodecRegistry::new().with(fake(CodecId::Xz, "xz", None)).unwrap();
        assert_eq!(reg.by_extension(".XZ").unwrap().id(), CodecId::Xz);
        assert!(reg.by_extension("7z").is_err());
    }

    #[test]
    fn test_longest_magic_wins() {
        let reg = CodecRegistry::new()
            .with(fake(CodecId::Gzip, "gz", Some(b"AB")))
            .unwrap()
            .with(fake(CodecId::Zstd, "zst", Some(b"ABCD")))
            .unwrap();
        assert_eq!(reg.by_magic(b"ABCDxxxx").unwrap().id(), CodecId::Zstd);
        assert_eq!(reg.by_magic(b"ABxxxxxx").unwrap().id(), CodecId::Gzip);
        assert!(reg.by_magic(b"xxxxxxxx").is_err());
    }

    #[test]
    fn test_tied_magic_is_ambiguous() {
        let reg = CodecRegistry::new()
            .with(fake(CodecId::Gzip, "gz", Some(b"AB")))
            .unwrap()
            .with(fake(CodecId::Bzip2, "bz2", Some(b"AB")))
            .unwrap();
        assert!(reg.by_magic(b"ABxxxxxx").is_err());
    }

    #[test]
    fn test_pseudo_codec_is_never_matched() {
        let reg = CodecRegistry::new()
            .with(pseudo())
            .unwrap()
            .with(fake(CodecId::Gzip, "gz", None))
            .unwrap();
        assert_eq!(reg.len(), 2);
        assert!(reg.contains(CodecId::Padding));
        let real: Vec<_> = reg.real_codecs().iter().map(|c| c.id()).collect();
        assert_eq!(real, vec![CodecId::Gzip]);
    }
}
