pub mod codec;
pub mod config;
pub mod error;
pub mod format;
pub mod fsio;
pub mod orchestrator;
pub mod padding;
pub mod pipeline;
pub mod registry;
pub mod sniff;
pub mod verify;

pub use codec::{Capability, Codec, CodecDescriptor, QualityRange};
pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use format::{CodecId, ContainerHeader, CONTAINER_HEADER_SIZE, CONTAINER_MAGIC};
pub use orchestrator::{
    AttemptOutcome, CompressionAttempt, CompressionResult, Compressed, ContentHint, Orchestrator, PlannedTrial,
};
pub use pipeline::{Decompressed, Pipeline};
pub use registry::CodecRegistry;
pub use sniff::{Detection, DetectionStage, FormatSniffer};
