use std::io::{Read, Write};

use serde::Serialize;

use crate::error::Result;
use crate::format::CodecId;

/// Inclusive range of effort levels a codec accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QualityRange {
    pub min: i32,
    pub default: i32,
    pub max: i32,
}

impl QualityRange {
    pub const fn new(min: i32, default: i32, max: i32) -> Self {
        Self { min, default, max }
    }

    pub fn clamp(&self, level: i32) -> i32 {
        level.clamp(self.min, self.max)
    }
}

/// Capability tags used to reorder trials by content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    /// Large match context; preferred for text-like inputs.
    HighContext,
    /// Long match window; preferred for very large inputs.
    LongWindow,
    /// Synthesized by the orchestrator only; never sniffed or tried.
    Pseudo,
}

/// Static description of a codec, registered once at startup.
#[derive(Debug, Clone, Serialize)]
pub struct CodecDescriptor {
    pub id: CodecId,
    /// Primary file extension, without the leading dot. Empty for pseudo codecs.
    pub extension: &'static str,
    /// Additional extensions accepted when resolving by file name.
    pub aliases: &'static [&'static str],
    /// Fixed prefix every artifact of this codec starts with, if any.
    pub magic: Option<&'static [u8]>,
    pub quality: Option<QualityRange>,
    pub capabilities: &'static [Capability],
}

impl CodecDescriptor {
    pub fn supports_quality_levels(&self) -> bool {
        self.quality.is_some()
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Real codecs take part in trials and sniffing; pseudo codecs do not.
    pub fn is_real(&self) -> bool {
        !self.has(Capability::Pseudo)
    }

    /// True when `ext` (with or without a leading dot) names this codec.
    pub fn matches_extension(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.');
        if ext.is_empty() || self.extension.is_empty() {
            return false;
        }
        self.extension.eq_ignore_ascii_case(ext)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(ext))
    }
}

/// Core compression abstraction.
///
/// Each `Codec` implementation:
/// - Is identified by a stable [`CodecId`] carried in its descriptor.
/// - Compresses a whole stream into one self-describing artifact; the
///   artifact alone is enough to decompress it again.
/// - Maps every underlying stream failure to [`crate::Error::Codec`].
///
/// Calls are blocking and run to completion. A codec may use worker threads
/// internally; callers cannot observe that.
pub trait Codec: Send + Sync {
    fn descriptor(&self) -> &CodecDescriptor;

    fn id(&self) -> CodecId {
        self.descriptor().id
    }

    /// Human-readable codec name for CLI display.
    fn name(&self) -> &'static str {
        self.descriptor().id.as_str()
    }

    /// Compress all of `input` into `output`.
    ///
    /// `level` is clamped to the codec's quality range; `None` selects the
    /// default. Codecs without quality levels ignore it.
    fn compress(&self, input: &mut dyn Read, output: &mut dyn Write, level: Option<i32>)
        -> Result<()>;

    /// Decompress one complete artifact from `input` into `output`.
    fn decompress(&self, input: &mut dyn Read, output: &mut dyn Write) -> Result<()>;
}

/// Resolve the level a codec should run at, honouring its range.
pub fn effective_level(descriptor: &CodecDescriptor, level: Option<i32>) -> Option<i32> {
    descriptor
        .quality
        .map(|q| level.map_or(q.default, |l| q.clamp(l)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESC: CodecDescriptor = CodecDescriptor {
        id: CodecId::Gzip,
        extension: "gz",
        aliases: &["gzip"],
        magic: Some(&[0x1f, 0x8b]),
        quality: Some(QualityRange::new(1, 6, 9)),
        capabilities: &[],
    };

    #[test]
    fn test_extension_match_ignores_case_and_dot() {
        assert!(DESC.matches_extension("GZ"));
        assert!(DESC.matches_extension(".gzip"));
        assert!(!DESC.matches_extension("zst"));
        assert!(!DESC.matches_extension(""));
    }

    #[test]
    fn test_effective_level_clamps_to_range() {
        assert_eq!(effective_level(&DESC, None), Some(6));
        assert_eq!(effective_level(&DESC, Some(42)), Some(9));
        assert_eq!(effective_level(&DESC, Some(-3)), Some(1));

        let levelless = CodecDescriptor {
            quality: None,
            ..DESC
        };
        assert_eq!(effective_level(&levelless, Some(5)), None);
        assert!(!levelless.supports_quality_levels());
    }
}
