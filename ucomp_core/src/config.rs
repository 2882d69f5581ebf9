use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::format::CodecId;
use crate::registry::CodecRegistry;

/// Minimum fractional size reduction applied when the caller gives none.
pub const DEFAULT_TARGET_RATIO: f64 = 0.16;

/// Read/write buffer for streamed inputs: 8 MB.
pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024 * 1024;

/// Inputs larger than this stream from disk instead of being buffered: 100 MB.
pub const DEFAULT_STREAM_THRESHOLD: u64 = 100 * 1024 * 1024;

/// Inputs larger than this try long-window codecs first: 50 MB.
pub const DEFAULT_LARGE_INPUT_THRESHOLD: u64 = 50 * 1024 * 1024;

/// Pipeline settings, passed to the orchestrator at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub target_ratio: f64,
    pub buffer_size: usize,
    pub stream_threshold: u64,
    pub large_input_threshold: u64,
    /// Trial order; the first entry is the default codec.
    pub codec_priority: Vec<CodecId>,
    /// Extensions (no dot) that mark an input as text-like.
    pub text_extensions: Vec<String>,
    /// Grow every accepted artifact to exactly the size limit.
    pub pad_to_limit: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_ratio: DEFAULT_TARGET_RATIO,
            buffer_size: DEFAULT_BUFFER_SIZE,
            stream_threshold: DEFAULT_STREAM_THRESHOLD,
            large_input_threshold: DEFAULT_LARGE_INPUT_THRESHOLD,
            codec_priority: vec![
                CodecId::Container,
                CodecId::Gzip,
                CodecId::Zstd,
                CodecId::Brotli,
                CodecId::Xz,
                CodecId::Bzip2,
                CodecId::Lz4,
            ],
            text_extensions: ["txt", "json", "xml", "html", "csv", "md", "log"]
                .into_iter()
                .map(String::from)
                .collect(),
            pad_to_limit: false,
        }
    }
}

impl PipelineConfig {
    /// Check the settings against the codecs actually registered.
    pub fn validate(&self, registry: &CodecRegistry) -> Result<()> {
        check_target_ratio(self.target_ratio)?;
        if self.buffer_size == 0 {
            return Err(Error::Config("buffer_size must be non-zero".into()));
        }
        if self.codec_priority.is_empty() {
            return Err(Error::Config("codec_priority lists no codecs".into()));
        }
        for (i, id) in self.codec_priority.iter().enumerate() {
            let codec = registry
                .lookup(*id)
                .map_err(|_| Error::Config(format!("codec {id} in codec_priority is not registered")))?;
            if !codec.descriptor().is_real() {
                return Err(Error::Config(format!("codec {id} cannot be tried directly")));
            }
            if self.codec_priority[..i].contains(id) {
                return Err(Error::Config(format!("codec {id} listed twice in codec_priority")));
            }
        }
        Ok(())
    }

    pub fn is_text_extension(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.');
        self.text_extensions.iter().any(|t| t.eq_ignore_ascii_case(ext))
    }
}

pub fn check_target_ratio(ratio: f64) -> Result<()> {
    if ratio.is_finite() && (0.0..1.0).contains(&ratio) {
        Ok(())
    } else {
        Err(Error::InvalidTargetRatio(ratio))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_ratio_bounds() {
        assert!(check_target_ratio(0.0).is_ok());
        assert!(check_target_ratio(0.999).is_ok());
        assert!(check_target_ratio(1.0).is_err());
        assert!(check_target_ratio(-0.1).is_err());
        assert!(check_target_ratio(f64::NAN).is_err());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let cfg: PipelineConfig =
            serde_json::from_str(r#"{ "target_ratio": 0.3, "codec_priority": ["zstd", "gzip"] }"#)
                .unwrap();
        assert_eq!(cfg.target_ratio, 0.3);
        assert_eq!(cfg.codec_priority, vec![CodecId::Zstd, CodecId::Gzip]);
        assert_eq!(cfg.buffer_size, DEFAULT_BUFFER_SIZE);
        assert!(cfg.is_text_extension(".JSON"));
    }

    #[test]
    fn test_validate_rejects_unregistered_priority() {
        let registry = CodecRegistry::new();
        let err = PipelineConfig::default().validate(&registry).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
