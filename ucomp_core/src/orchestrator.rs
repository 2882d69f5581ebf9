use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::codec::{Capability, Codec, CodecDescriptor};
use crate::config::{check_target_ratio, PipelineConfig};
use crate::error::{Error, Result};
use crate::format::CodecId;
use crate::fsio;
use crate::padding;
use crate::registry::CodecRegistry;
use crate::verify::{self, Fingerprint};

/// Ratios are resolved to this many parts per unit: nine decimal places.
const RATIO_SCALE: u128 = 1_000_000_000;

/// Largest artifact, in bytes, that still meets `target_ratio`.
///
/// Computed in integers as `floor(original × (1 − ratio))`. A ratio with at
/// most nine decimal places (`0.16`, `0.875`) is taken at its decimal value,
/// so `1_000_000` at `0.16` gives exactly `840_000`. A longer ratio is
/// rounded up to the next nine-place step, which can only lower the limit.
pub fn size_limit(original_size: u64, target_ratio: f64) -> u64 {
    let scaled = target_ratio.clamp(0.0, 1.0) * RATIO_SCALE as f64;
    let nearest = scaled.round();
    let parts = if (scaled - nearest).abs() < 1e-6 {
        nearest
    } else {
        scaled.ceil()
    };
    let keep = RATIO_SCALE - (parts as u128).min(RATIO_SCALE);
    (original_size as u128 * keep / RATIO_SCALE) as u64
}

// ── Trial bookkeeping ──────────────────────────────────────────────────────

/// What the caller knows about the input besides its bytes.
#[derive(Debug, Clone, Default)]
pub struct ContentHint {
    /// File extension of the original input, without the dot.
    pub extension: Option<String>,
}

impl ContentHint {
    pub fn from_path(path: &Path) -> Self {
        Self {
            extension: path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase),
        }
    }

    pub fn with_extension(ext: &str) -> Self {
        Self {
            extension: Some(ext.trim_start_matches('.').to_ascii_lowercase()),
        }
    }
}

/// One rung of the escalation ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedTrial {
    pub codec: CodecId,
    pub level: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptOutcome {
    Accepted,
    MissedTarget,
    /// The codec raised an error; the trial produced no artifact.
    Failed,
}

/// Record of a single compression trial.
#[derive(Debug, Clone, Serialize)]
pub struct CompressionAttempt {
    pub codec: CodecId,
    pub level: Option<i32>,
    pub size: u64,
    pub elapsed: Duration,
    pub outcome: AttemptOutcome,
}

/// Outcome of a successful compression, owned by the caller.
#[derive(Debug, Clone, Serialize)]
pub struct CompressionResult {
    pub original_size: u64,
    pub compressed_size: u64,
    /// Real codec that produced the payload.
    pub codec: CodecId,
    pub level: Option<i32>,
    /// True when the payload was wrapped in a padding envelope.
    pub padded: bool,
    /// Every trial run, in order; the last one is the accepted trial.
    pub attempts: Vec<CompressionAttempt>,
    pub elapsed: Duration,
}

impl CompressionResult {
    /// Fractional size reduction, `1 − compressed / original`.
    pub fn ratio(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        1.0 - self.compressed_size as f64 / self.original_size as f64
    }

    pub fn reduction_percentage(&self) -> f64 {
        self.ratio() * 100.0
    }
}

/// In-memory artifact together with its result.
#[derive(Debug, Clone)]
pub struct Compressed {
    pub bytes: Vec<u8>,
    pub result: CompressionResult,
}

// ── Orchestrator ───────────────────────────────────────────────────────────

/// Drives escalating trials until an artifact meets the target ratio.
///
/// # Escalation
/// 1. Codecs are ordered by `codec_priority`, with high-context codecs moved
///    first for text-like inputs and long-window codecs moved first for
///    inputs above `large_input_threshold`.
/// 2. Each codec runs at its default level, then at its maximum level.
///    A codec never drops back to a weaker level.
/// 3. The first artifact within the size limit wins; no later trials run.
/// 4. If nothing qualifies, `RatioUnattainable` reports the smallest size
///    reached. Appending padding can only grow an artifact, so it never
///    rescues a failed escalation.
///
/// With `pad_to_limit` set, an accepted artifact is grown to exactly the size
/// limit with a padding envelope, so every output of one ratio has the same
/// size. Artifacts within marker length of the limit are left as they are.
///
/// Every accepted artifact is round-trip verified with the codec that
/// produced it before it is returned.
pub struct Orchestrator {
    registry: Arc<CodecRegistry>,
    config: PipelineConfig,
}

impl Orchestrator {
    pub fn new(registry: Arc<CodecRegistry>, config: PipelineConfig) -> Result<Self> {
        config.validate(&registry)?;
        Ok(Self { registry, config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<CodecRegistry> {
        &self.registry
    }

    /// Compress an in-memory input.
    pub fn compress(&self, input: &[u8], target_ratio: f64) -> Result<Compressed> {
        self.compress_with_hint(input, target_ratio, &ContentHint::default())
    }

    pub fn compress_with_hint(
        &self,
        input: &[u8],
        target_ratio: f64,
        hint: &ContentHint,
    ) -> Result<Compressed> {
        let mut ws = MemoryWorkspace {
            input,
            fingerprint: Fingerprint::of(input),
        };
        let (bytes, result) = self.escalate(&mut ws, input.len() as u64, target_ratio, hint)?;
        Ok(Compressed { bytes, result })
    }

    /// Compress `input` into `output`.
    ///
    /// Inputs above `stream_threshold` are streamed from disk on every trial
    /// instead of being loaded. Trials are staged beside `output`; only the
    /// accepted artifact is renamed into place.
    pub fn compress_file(&self, input: &Path, output: &Path, target_ratio: f64) -> Result<CompressionResult> {
        let original_size = fsio::input_size(input)?;
        let hint = ContentHint::from_path(input);
        let mut ws = FileWorkspace::open(input, fsio::staging_dir(output), &self.config, original_size)?;
        let (staged, result) = self.escalate(&mut ws, original_size, target_ratio, &hint)?;
        fsio::commit(staged, output)?;
        Ok(result)
    }

    /// Codec order for an input of `original_size` bytes described by `hint`.
    pub fn codec_order(&self, hint: &ContentHint, original_size: u64) -> Vec<CodecId> {
        let mut order = self.config.codec_priority.clone();
        let text_like = hint
            .extension
            .as_deref()
            .is_some_and(|ext| self.config.is_text_extension(ext));
        if text_like {
            self.promote(&mut order, Capability::HighContext);
        }
        if original_size > self.config.large_input_threshold {
            self.promote(&mut order, Capability::LongWindow);
        }
        order
    }

    /// The full trial ladder, in the order trials would run.
    pub fn plan(&self, hint: &ContentHint, original_size: u64) -> Vec<PlannedTrial> {
        self.codec_order(hint, original_size)
            .into_iter()
            .filter_map(|id| self.registry.lookup(id).ok())
            .flat_map(|codec| {
                let id = codec.id();
                ladder(codec.descriptor())
                    .into_iter()
                    .map(move |level| PlannedTrial { codec: id, level })
            })
            .collect()
    }

    fn promote(&self, order: &mut Vec<CodecId>, capability: Capability) {
        let (mut front, back): (Vec<CodecId>, Vec<CodecId>) = order.drain(..).partition(|id| {
            self.registry
                .lookup(*id)
                .map(|c| c.descriptor().has(capability))
                .unwrap_or(false)
        });
        front.extend(back);
        *order = front;
    }

    fn escalate<W: Workspace>(
        &self,
        ws: &mut W,
        original_size: u64,
        target_ratio: f64,
        hint: &ContentHint,
    ) -> Result<(W::Artifact, CompressionResult)> {
        check_target_ratio(target_ratio)?;
        let started = Instant::now();
        let limit = size_limit(original_size, target_ratio);
        let accept_any = original_size == 0 || target_ratio <= 0.0;

        let mut attempts = Vec::new();
        let mut best_size: Option<u64> = None;
        let mut last_error = None;

        for step in self.plan(hint, original_size) {
            let codec = self.registry.lookup(step.codec)?;

            let t0 = Instant::now();
            let artifact = match ws.attempt(codec.as_ref(), step.level) {
                Ok(artifact) => artifact,
                Err(e) if e.is_codec() => {
                    warn!(codec = %step.codec, level = ?step.level, error = %e, "trial rejected");
                    attempts.push(CompressionAttempt {
                        codec: step.codec,
                        level: step.level,
                        size: 0,
                        elapsed: t0.elapsed(),
                        outcome: AttemptOutcome::Failed,
                    });
                    last_error = Some(e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            let size = ws.size(&artifact)?;
            let elapsed = t0.elapsed();
            debug!(
                codec = %step.codec,
                level = ?step.level,
                size,
                limit,
                elapsed_ms = elapsed.as_millis() as u64,
                "trial finished"
            );

            if !accept_any && size > limit {
                attempts.push(CompressionAttempt {
                    codec: step.codec,
                    level: step.level,
                    size,
                    elapsed,
                    outcome: AttemptOutcome::MissedTarget,
                });
                best_size = Some(best_size.map_or(size, |b| b.min(size)));
                continue;
            }

            attempts.push(CompressionAttempt {
                codec: step.codec,
                level: step.level,
                size,
                elapsed,
                outcome: AttemptOutcome::Accepted,
            });
            info!(codec = %step.codec, level = ?step.level, size, original_size, "accepted");

            let (artifact, padded) = match padding::filler_len(size, limit) {
                Some(filler) if self.config.pad_to_limit => {
                    debug!(payload = size, limit, filler, "padding artifact to the size limit");
                    (ws.pad(artifact, filler)?, true)
                }
                _ => (artifact, false),
            };
            ws.verify(codec.as_ref(), &artifact, size)?;

            let result = CompressionResult {
                original_size,
                compressed_size: ws.size(&artifact)?,
                codec: step.codec,
                level: step.level,
                padded,
                attempts,
                elapsed: started.elapsed(),
            };
            return Ok((artifact, result));
        }

        match (best_size, last_error) {
            (Some(best_size), _) => Err(Error::RatioUnattainable {
                target: target_ratio,
                best_size,
                limit,
            }),
            (None, Some(e)) => Err(e),
            (None, None) => Err(Error::Config("no codec could be tried".into())),
        }
    }
}

fn ladder(descriptor: &CodecDescriptor) -> Vec<Option<i32>> {
    match descriptor.quality {
        Some(q) if q.max > q.default => vec![Some(q.default), Some(q.max)],
        Some(q) => vec![Some(q.default)],
        None => vec![None],
    }
}

// ── Workspaces ─────────────────────────────────────────────────────────────

/// Where trial artifacts live while the orchestrator decides.
trait Workspace {
    type Artifact;

    fn attempt(&mut self, codec: &dyn Codec, level: Option<i32>) -> Result<Self::Artifact>;

    fn size(&self, artifact: &Self::Artifact) -> Result<u64>;

    /// Append the padding tail (marker + `filler` zero bytes).
    fn pad(&mut self, artifact: Self::Artifact, filler: u64) -> Result<Self::Artifact>;

    /// Round-trip the first `payload_len` bytes, which exclude any padding tail.
    fn verify(&self, codec: &dyn Codec, artifact: &Self::Artifact, payload_len: u64) -> Result<()>;
}

struct MemoryWorkspace<'a> {
    input: &'a [u8],
    fingerprint: Fingerprint,
}

impl Workspace for MemoryWorkspace<'_> {
    type Artifact = Vec<u8>;

    fn attempt(&mut self, codec: &dyn Codec, level: Option<i32>) -> Result<Vec<u8>> {
        let mut src = self.input;
        let mut out = Vec::new();
        codec.compress(&mut src, &mut out, level)?;
        Ok(out)
    }

    fn size(&self, artifact: &Vec<u8>) -> Result<u64> {
        Ok(artifact.len() as u64)
    }

    fn pad(&mut self, mut artifact: Vec<u8>, filler: u64) -> Result<Vec<u8>> {
        padding::write_tail(&mut artifact, filler)?;
        Ok(artifact)
    }

    fn verify(&self, codec: &dyn Codec, artifact: &Vec<u8>, payload_len: u64) -> Result<()> {
        let payload = &artifact[..artifact.len().min(payload_len as usize)];
        verify::verify(codec, &mut &payload[..], &self.fingerprint)
    }
}

struct FileWorkspace<'a> {
    input: &'a Path,
    staging: PathBuf,
    buffer_size: usize,
    /// Whole input, when it is small enough to hold in memory.
    buffered: Option<Vec<u8>>,
    fingerprint: Fingerprint,
}

impl<'a> FileWorkspace<'a> {
    fn open(input: &'a Path, staging: PathBuf, config: &PipelineConfig, size: u64) -> Result<Self> {
        let (buffered, fingerprint) = if size > config.stream_threshold {
            debug!(path = %input.display(), size, "input above stream threshold; streaming trials");
            (None, Fingerprint::of_file(input, config.buffer_size)?)
        } else {
            let bytes = fs::read(input)?;
            let fingerprint = Fingerprint::of(&bytes);
            (Some(bytes), fingerprint)
        };
        Ok(Self {
            input,
            staging,
            buffer_size: config.buffer_size,
            buffered,
            fingerprint,
        })
    }
}

impl Workspace for FileWorkspace<'_> {
    type Artifact = NamedTempFile;

    fn attempt(&mut self, codec: &dyn Codec, level: Option<i32>) -> Result<NamedTempFile> {
        let mut staged = fsio::staging_file(&self.staging)?;
        {
            let mut out = BufWriter::with_capacity(self.buffer_size, staged.as_file_mut());
            match &self.buffered {
                Some(bytes) => codec.compress(&mut bytes.as_slice(), &mut out, level)?,
                None => {
                    let mut src = BufReader::with_capacity(self.buffer_size, File::open(self.input)?);
                    codec.compress(&mut src, &mut out, level)?;
                }
            }
            out.flush()?;
        }
        Ok(staged)
    }

    fn size(&self, artifact: &NamedTempFile) -> Result<u64> {
        Ok(artifact.as_file().metadata()?.len())
    }

    fn pad(&mut self, mut artifact: NamedTempFile, filler: u64) -> Result<NamedTempFile> {
        {
            let file = artifact.as_file_mut();
            file.seek(SeekFrom::End(0))?;
            let mut out = BufWriter::with_capacity(self.buffer_size, file);
            padding::write_tail(&mut out, filler)?;
            out.flush()?;
        }
        Ok(artifact)
    }

    fn verify(&self, codec: &dyn Codec, artifact: &NamedTempFile, payload_len: u64) -> Result<()> {
        verify::verify_file(codec, artifact.path(), payload_len, &self.fingerprint, self.buffer_size)
    }
}
