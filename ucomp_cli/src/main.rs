use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ucomp_codecs::default_registry;
use ucomp_core::{CodecDescriptor, CodecRegistry, CompressionResult, Pipeline, PipelineConfig};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "ucomp",
    about = "Adaptive compression with a guaranteed minimum size reduction",
    version
)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// JSON file with pipeline settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file, guaranteeing the requested size reduction
    Compress {
        /// Source file
        input: PathBuf,
        /// Destination artifact (default: <input>.uc)
        output: Option<PathBuf>,
        /// Minimum fractional reduction in [0, 1), e.g. 0.16 for 16%
        #[arg(short, long)]
        ratio: Option<f64>,
        /// Print the result as JSON on stdout
        #[arg(long)]
        json: bool,
    },
    /// Decompress an artifact, detecting its codec automatically
    Decompress {
        /// Compressed artifact
        input: PathBuf,
        /// Destination file (default: input minus its codec extension)
        output: Option<PathBuf>,
        /// Print the result as JSON on stdout
        #[arg(long)]
        json: bool,
    },
    /// Report which codec produced an artifact and how it was recognised
    Identify {
        file: PathBuf,
    },
    /// List registered codecs
    Codecs,
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let text = fs::read_to_string(path).with_context(|| format!("reading config {:?}", path))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config {:?}", path))
}

/// `<input>.uc`, keeping any existing extension.
fn default_compressed_path(input: &Path) -> PathBuf {
    let mut name = OsString::from(input.as_os_str());
    name.push(".uc");
    PathBuf::from(name)
}

/// Strip a registered codec extension, or append `.decompressed`.
fn default_decompressed_path(input: &Path, registry: &CodecRegistry) -> PathBuf {
    let known = input
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| registry.by_extension(ext).is_ok());
    if known {
        input.with_extension("")
    } else {
        let mut name = OsString::from(input.as_os_str());
        name.push(".decompressed");
        PathBuf::from(name)
    }
}

fn ensure_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating directory {:?}", dir))?;
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn describe_level(level: Option<i32>) -> String {
    level.map_or_else(|| "n/a".to_string(), |l| l.to_string())
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_compress(
    pipeline: &Pipeline,
    input: PathBuf,
    output: Option<PathBuf>,
    ratio: Option<f64>,
    json: bool,
) -> anyhow::Result<()> {
    let output = output.unwrap_or_else(|| default_compressed_path(&input));
    ensure_parent(&output)?;
    let ratio = ratio.unwrap_or(pipeline.orchestrator().config().target_ratio);

    let result = pipeline
        .compress_with_ratio(&input, &output, ratio)
        .with_context(|| format!("compressing {:?}", input))?;

    if json {
        return print_json(&result);
    }
    report_compression(&output, ratio, &result);
    Ok(())
}

fn report_compression(output: &Path, ratio: f64, r: &CompressionResult) {
    eprintln!("  output      : {}", output.display());
    eprintln!("  codec       : {} (level {})", r.codec, describe_level(r.level));
    eprintln!("  padded      : {}", if r.padded { "yes" } else { "no" });
    eprintln!("  original    : {}", human_bytes(r.original_size));
    eprintln!("  compressed  : {}", human_bytes(r.compressed_size));
    eprintln!(
        "  reduction   : {:.2}% (target {:.2}%)",
        r.reduction_percentage(),
        ratio * 100.0
    );
    eprintln!("  trials      : {}", r.attempts.len());
    eprintln!("  elapsed     : {:.3}s", r.elapsed.as_secs_f64());
}

fn run_decompress(pipeline: &Pipeline, input: PathBuf, output: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let registry = pipeline.orchestrator().registry();
    let output = output.unwrap_or_else(|| default_decompressed_path(&input, registry));
    ensure_parent(&output)?;

    let done = pipeline
        .decompress_auto_detect(&input, &output)
        .with_context(|| format!("decompressing {:?}", input))?;

    if json {
        return print_json(&done);
    }
    eprintln!("  output      : {}", output.display());
    eprintln!("  codec       : {} (by {:?})", done.codec, done.stage);
    eprintln!("  padded      : {}", if done.padded { "yes" } else { "no" });
    eprintln!("  size        : {}", human_bytes(done.output_size));
    Ok(())
}

fn run_identify(pipeline: &Pipeline, file: PathBuf) -> anyhow::Result<()> {
    let detection = pipeline
        .sniffer()
        .identify(&file)
        .with_context(|| format!("identifying {:?}", file))?;
    println!("=== {} ===", file.display());
    println!("  codec  : {}", detection.codec);
    println!("  stage  : {:?}", detection.stage);
    println!("  padded : {}", detection.padded);
    Ok(())
}

fn run_codecs(registry: &CodecRegistry) {
    println!(
        "  {:<10}  {:<14}  {:<20}  {:<10}  {}",
        "codec", "extensions", "magic", "quality", "tags"
    );
    println!("  {}", "-".repeat(72));
    for d in registry.descriptors() {
        println!(
            "  {:<10}  {:<14}  {:<20}  {:<10}  {}",
            d.id.as_str(),
            extensions(d),
            d.magic.map_or_else(|| "-".to_string(), hex),
            d.quality
                .map_or_else(|| "-".to_string(), |q| format!("{}/{}/{}", q.min, q.default, q.max)),
            d.capabilities
                .iter()
                .map(|c| format!("{:?}", c))
                .collect::<Vec<_>>()
                .join(",")
        );
    }
}

fn extensions(d: &CodecDescriptor) -> String {
    if d.extension.is_empty() {
        return "-".to_string();
    }
    std::iter::once(d.extension)
        .chain(d.aliases.iter().copied())
        .map(|e| format!(".{}", e))
        .collect::<Vec<_>>()
        .join(" ")
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect::<Vec<_>>().join(" ")
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    let registry = Arc::new(default_registry()?);
    let pipeline = Pipeline::new(registry.clone(), config).context("invalid pipeline configuration")?;

    match cli.command {
        Commands::Compress {
            input,
            output,
            ratio,
            json,
        } => run_compress(&pipeline, input, output, ratio, json),
        Commands::Decompress { input, output, json } => run_decompress(&pipeline, input, output, json),
        Commands::Identify { file } => run_identify(&pipeline, file),
        Commands::Codecs => {
            run_codecs(&registry);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(1536), "1.50 KB");
        assert_eq!(human_bytes(10 * 1024 * 1024), "10.00 MB");
    }

    #[test]
    fn test_default_paths() {
        let registry = default_registry().unwrap();
        assert_eq!(default_compressed_path(Path::new("a/report.txt")), PathBuf::from("a/report.txt.uc"));
        assert_eq!(
            default_decompressed_path(Path::new("a/report.txt.uc"), &registry),
            PathBuf::from("a/report.txt")
        );
        assert_eq!(
            default_decompressed_path(Path::new("dump.ZST"), &registry),
            PathBuf::from("dump")
        );
        assert_eq!(
            default_decompressed_path(Path::new("blob.bin"), &registry),
            PathBuf::from("blob.bin.decompressed")
        );
    }

    #[test]
    fn test_cli_parses_compress_flags() {
        let cli = Cli::try_parse_from(["ucomp", "-vv", "compress", "in.log", "--ratio", "0.3", "--json"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Compress { input, output, ratio, json } => {
                assert_eq!(input, PathBuf::from("in.log"));
                assert!(output.is_none());
                assert_eq!(ratio, Some(0.3));
                assert!(json);
            }
            _ => panic!("expected compress"),
        }
    }
}
