use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Magic bytes opening a header-wrapped container artifact.
pub const CONTAINER_MAGIC: &[u8; 4] = b"FILE";

/// Fixed size of the container header in bytes.
///   magic[4] + compressed_size:u64 + original_size:u64
///   = 4 + 8 + 8 = 20
pub const CONTAINER_HEADER_SIZE: usize = 20;

/// Bytes read from the front of an artifact for magic-byte matching.
pub const SNIFF_HEADER_LEN: usize = 16;

// ── Codec IDs ──────────────────────────────────────────────────────────────

/// Stable identifier of every codec the pipeline knows about.
///
/// The set is closed: trial decoding iterates registered codecs rather than
/// discovering them, so a new codec means a new variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecId {
    Container,
    Gzip,
    Zstd,
    Brotli,
    Xz,
    Bzip2,
    Lz4,
    Padding,
}

impl CodecId {
    pub const ALL: [CodecId; 8] = [
        CodecId::Container,
        CodecId::Gzip,
        CodecId::Zstd,
        CodecId::Brotli,
        CodecId::Xz,
        CodecId::Bzip2,
        CodecId::Lz4,
        CodecId::Padding,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CodecId::Container => "container",
            CodecId::Gzip => "gzip",
            CodecId::Zstd => "zstd",
            CodecId::Brotli => "brotli",
            CodecId::Xz => "xz",
            CodecId::Bzip2 => "bzip2",
            CodecId::Lz4 => "lz4",
            CodecId::Padding => "padding",
        }
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CodecId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        CodecId::ALL
            .into_iter()
            .find(|id| id.as_str() == wanted)
            .ok_or_else(|| Error::UnknownCodec(s.to_string()))
    }
}

// ── Container header ───────────────────────────────────────────────────────

/// Decoded representation of the 20-byte container header.
///
/// Sizes are stored big-endian, matching artifacts written by earlier
/// releases of the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    /// Length of the payload that follows the header.
    pub compressed_size: u64,
    /// Length of the original input; checked after decoding.
    pub original_size: u64,
}

impl ContainerHeader {
    /// Serialize to exactly `CONTAINER_HEADER_SIZE` bytes.
    pub fn to_bytes(&self) -> [u8; CONTAINER_HEADER_SIZE] {
        let mut buf = [0u8; CONTAINER_HEADER_SIZE];
        buf[..4].copy_from_slice(CONTAINER_MAGIC);
        buf[4..12].copy_from_slice(&self.compressed_size.to_be_bytes());
        buf[12..20].copy_from_slice(&self.original_size.to_be_bytes());
        buf
    }

    /// Deserialize from `CONTAINER_HEADER_SIZE` bytes, checking the magic.
    ///
    /// Returns `None` when the magic is absent so callers can fall back to
    /// treating the bytes as a raw stream.
    pub fn from_bytes(buf: &[u8; CONTAINER_HEADER_SIZE]) -> Option<Self> {
        if &buf[..4] != CONTAINER_MAGIC {
            return None;
        }
        let mut compressed = [0u8; 8];
        let mut original = [0u8; 8];
        compressed.copy_from_slice(&buf[4..12]);
        original.copy_from_slice(&buf[12..20]);
        Some(Self {
            compressed_size: u64::from_be_bytes(compressed),
            original_size: u64::from_be_bytes(original),
        })
    }
}
