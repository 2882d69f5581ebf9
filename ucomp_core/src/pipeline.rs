use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::format::CodecId;
use crate::fsio;
use crate::orchestrator::{CompressionResult, Orchestrator};
use crate::padding;
use crate::registry::CodecRegistry;
use crate::sniff::{Detection, DetectionStage, FormatSniffer};

/// Summary of an auto-detected decompression.
#[derive(Debug, Clone, Serialize)]
pub struct Decompressed {
    pub codec: CodecId,
    pub stage: DetectionStage,
    pub padded: bool,
    pub output_size: u64,
}

/// File-level entry point: ratio-guaranteed compression and auto-detecting
/// decompression over one shared registry.
pub struct Pipeline {
    orchestrator: Orchestrator,
    sniffer: FormatSniffer,
}

impl Pipeline {
    pub fn new(registry: Arc<CodecRegistry>, config: PipelineConfig) -> Result<Self> {
        let sniffer = FormatSniffer::new(registry.clone(), config.buffer_size);
        let orchestrator = Orchestrator::new(registry, config)?;
        Ok(Self { orchestrator, sniffer })
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn sniffer(&self) -> &FormatSniffer {
        &self.sniffer
    }

    /// Compress at the configured target ratio.
    pub fn compress(&self, input: &Path, output: &Path) -> Result<CompressionResult> {
        self.compress_with_ratio(input, output, self.orchestrator.config().target_ratio)
    }

    pub fn compress_with_ratio(&self, input: &Path, output: &Path, target_ratio: f64) -> Result<CompressionResult> {
        self.orchestrator.compress_file(input, output, target_ratio)
    }

    /// Identify the codec behind `input` and decode it into `output`.
    ///
    /// The decoded bytes are staged beside `output` and only renamed into
    /// place once the codec has consumed the whole payload.
    pub fn decompress_auto_detect(&self, input: &Path, output: &Path) -> Result<Decompressed> {
        let Detection { codec, stage, padded } = self.sniffer.identify(input)?;
        let buffer_size = self.orchestrator.config().buffer_size;
        let codec_impl = self.orchestrator.registry().lookup(codec)?;

        let mut file = File::open(input)?;
        let total = file.metadata()?.len();
        let len = if padded {
            padding::payload_len(&mut file)?.unwrap_or(total)
        } else {
            total
        };

        let mut staged = fsio::staging_file(&fsio::staging_dir(output))?;
        {
            let mut src = BufReader::with_capacity(buffer_size, file).take(len);
            let mut out = BufWriter::with_capacity(buffer_size, staged.as_file_mut());
            codec_impl.decompress(&mut src, &mut out)?;
            out.flush()?;
        }
        let output_size = staged.as_file().metadata()?.len();
        fsio::commit(staged, output)?;

        info!(
            input = %input.display(),
            output = %output.display(),
            codec = %codec,
            output_size,
            "decompressed"
        );
        Ok(Decompressed {
            codec,
            stage,
            padded,
            output_size,
        })
    }

    /// Decode an in-memory artifact; `name` supplies the extension hint.
    pub fn decompress_bytes(&self, name: &str, bytes: &[u8]) -> Result<Vec<u8>> {
        let detection = self.sniffer.identify_bytes(name, bytes)?;
        let codec = self.orchestrator.registry().lookup(detection.codec)?;
        let mut out = Vec::new();
        let payload = if detection.padded { padding::unpad(bytes) } else { bytes };
        codec.decompress(&mut &payload[..], &mut out)?;
        Ok(out)
    }
}
