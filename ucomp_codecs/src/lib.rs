mod brotli_codec;
mod bzip2_codec;
mod container;
mod gzip_codec;
mod lz4_codec;
mod padding_codec;
mod xz_codec;
mod zstd_codec;

pub use brotli_codec::BrotliCodec;
pub use bzip2_codec::Bzip2Codec;
pub use container::ContainerCodec;
pub use gzip_codec::GzipCodec;
pub use lz4_codec::Lz4Codec;
pub use padding_codec::PaddingCodec;
pub use xz_codec::XzCodec;
pub use zstd_codec::ZstdCodec;

use std::sync::Arc;

use ucomp_core::{Codec, CodecId, CodecRegistry, Result};

/// Bundled implementation for a codec id.
pub fn codec_by_id(id: CodecId) -> Arc<dyn Codec> {
    match id {
        CodecId::Container => Arc::new(ContainerCodec),
        CodecId::Gzip => Arc::new(GzipCodec),
        CodecId::Zstd => Arc::new(ZstdCodec),
        CodecId::Brotli => Arc::new(BrotliCodec),
        CodecId::Xz => Arc::new(XzCodec),
        CodecId::Bzip2 => Arc::new(Bzip2Codec),
        CodecId::Lz4 => Arc::new(Lz4Codec),
        CodecId::Padding => Arc::new(PaddingCodec),
    }
}

/// Registry holding every bundled codec, in [`CodecId::ALL`] order.
///
/// That order is also the sniffer's trial-decode order, so the container
/// codec gets the first attempt at unlabelled input.
pub fn default_registry() -> Result<CodecRegistry> {
    let mut registry = CodecRegistry::new();
    for id in CodecId::ALL {
        registry.register(codec_by_id(id))?;
    }
    Ok(registry)
}

/// Registry restricted to `ids`, in the order given.
pub fn registry_with(ids: &[CodecId]) -> Result<CodecRegistry> {
    let mut registry = CodecRegistry::new();
    for &id in ids {
        registry.register(codec_by_id(id))?;
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_holds_every_codec() {
        let registry = default_registry().unwrap();
        assert_eq!(registry.len(), CodecId::ALL.len());
        for id in CodecId::ALL {
            assert_eq!(registry.lookup(id).unwrap().id(), id);
        }
        assert_eq!(registry.real_codecs().len(), CodecId::ALL.len() - 1);
    }

    #[test]
    fn test_bundled_magic_is_unambiguous() {
        let registry = default_registry().unwrap();
        for codec in registry.real_codecs() {
            let Some(magic) = codec.descriptor().magic else {
                continue;
            };
            let mut header = magic.to_vec();
            header.resize(16, 0);
            assert_eq!(registry.by_magic(&header).unwrap().id(), codec.id());
        }
    }

    #[test]
    fn test_extensions_resolve() {
        let registry = default_registry().unwrap();
        for (ext, id) in [
            ("uc", CodecId::Container),
            ("gz", CodecId::Gzip),
            ("zst", CodecId::Zstd),
            ("br", CodecId::Brotli),
            ("xz", CodecId::Xz),
            ("bz2", CodecId::Bzip2),
            ("lz4", CodecId::Lz4),
        ] {
            assert_eq!(registry.by_extension(ext).unwrap().id(), id);
        }
    }

    #[test]
    fn test_registry_with_rejects_duplicates() {
        assert!(registry_with(&[CodecId::Gzip, CodecId::Gzip]).is_err());
        assert_eq!(registry_with(&[CodecId::Zstd]).unwrap().len(), 1);
    }
}
