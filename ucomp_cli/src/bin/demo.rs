//! ucomp demo
//!
//! Generates a few synthetic inputs (structured access logs, JSON records,
//! high-entropy noise and an empty file), runs each through the
//! ratio-guaranteed pipeline, decompresses the artifact with codec
//! auto-detection and checks the bytes come back unchanged.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{ensure, Context, Result};
use tracing_subscriber::EnvFilter;

use ucomp_codecs::default_registry;
use ucomp_core::{Pipeline, PipelineConfig};

// ── constants ──────────────────────────────────────────────────────────────

const LOG_BYTES: u64 = 16 * 1024 * 1024;
const JSON_BYTES: u64 = 2 * 1024 * 1024;
const NOISE_BYTES: u64 = 1_000_000;

const IPS: &[&str] = &[
    "203.0.113.42", "198.51.100.77", "192.0.2.15", "10.10.10.88",
    "172.16.254.1", "203.0.113.99", "198.51.100.3", "192.0.2.200",
];
const METHODS: &[&str] = &["GET", "GET", "GET", "POST", "PUT", "DELETE"];
const PATHS: &[&str] = &[
    "/api/v1/catalog/items?page={page}",
    "/api/v1/orders/{id}/status",
    "/api/v1/users/{id}/profile",
    "/api/v1/search?q=laptop&page={page}",
    "/static/assets/bundle.js",
    "/health",
];
const STATUSES: &[(u16, u32)] = &[(200, 4821), (200, 1204), (201, 312), (404, 95), (304, 0), (500, 512)];

// ── data generators ─────────────────────────────────────────────────────────

/// Deterministic access-log line for entry `i`.
fn generate_log_line(i: u64) -> Vec<u8> {
    let ip = IPS[(i as usize * 7 + 3) % IPS.len()];
    let method = METHODS[(i as usize * 3 + 1) % METHODS.len()];
    let path = PATHS[(i as usize * 11 + 5) % PATHS.len()]
        .replace("{page}", &((i % 200) + 1).to_string())
        .replace("{id}", &(i * 13 % 9_999_999).to_string());
    let (status, size) = STATUSES[(i as usize * 5 + 2) % STATUSES.len()];
    let ts = 1_740_268_800u64 + (i * 7) % (86400 * 30);
    let (h, m, s) = ((ts / 3600) % 24, (ts / 60) % 60, ts % 60);
    let day = (ts / 86400) % 28 + 1;

    format!("{ip} - - [{day:02}/Oct/2026:{h:02}:{m:02}:{s:02} +0000] \"{method} {path} HTTP/1.1\" {status} {size}\n")
        .into_bytes()
}

fn generate_json_record(i: u64) -> Vec<u8> {
    format!(
        "{{\"id\":{i},\"sku\":\"SKU-{:06}\",\"price\":{}.{:02},\"tags\":[\"{}\",\"{}\"],\"in_stock\":{}}}\n",
        i * 7919 % 1_000_000,
        i % 500,
        i % 100,
        ["electronics", "books", "garden", "toys"][(i % 4) as usize],
        ["sale", "new", "clearance"][(i % 3) as usize],
        i % 5 != 0
    )
    .into_bytes()
}

fn write_lines(path: &Path, target: u64, line: impl Fn(u64) -> Vec<u8>) -> Result<u64> {
    let mut out = BufWriter::new(File::create(path)?);
    let (mut i, mut total) = (0u64, 0u64);
    while total < target {
        let l = line(i);
        total += l.len() as u64;
        out.write_all(&l)?;
        i += 1;
    }
    out.flush()?;
    Ok(total)
}

fn write_noise(path: &Path, len: u64) -> Result<u64> {
    let mut rng = 0x1234_5678_9ABC_DEF0u64;
    let data: Vec<u8> = (0..len)
        .map(|_| {
            rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (rng >> 56) as u8
        })
        .collect();
    std::fs::write(path, &data)?;
    Ok(len)
}

// ── formatting ──────────────────────────────────────────────────────────────

fn human_bytes(n: u64) -> String {
    const U: &[&str] = &["B", "KB", "MB", "GB"];
    let mut v = n as f64;
    let mut u = 0;
    while v >= 1024.0 && u < U.len() - 1 { v /= 1024.0; u += 1; }
    if u == 0 { format!("{n} B") } else { format!("{v:.2} {}", U[u]) }
}

fn fmt_duration(d: Duration) -> String {
    let ms = d.as_secs_f64() * 1000.0;
    if ms < 1000.0 {
        format!("{ms:.1} ms")
    } else {
        format!("{:.2} s", d.as_secs_f64())
    }
}

fn section(title: &str) {
    println!("━━━ {title} {}", "━".repeat(70usize.saturating_sub(title.len() + 5)));
}

// ── demo runner ─────────────────────────────────────────────────────────────

/// Compress, auto-detect decompress and compare one input.
fn run_scenario(pipeline: &Pipeline, dir: &Path, label: &str, input: &Path, ratio: f64) -> Result<()> {
    let artifact = dir.join(format!("{label}.uc"));
    let restored = dir.join(format!("{label}.restored"));

    let t0 = Instant::now();
    let result = match pipeline.compress_with_ratio(input, &artifact, ratio) {
        Ok(result) => result,
        Err(e @ ucomp_core::Error::RatioUnattainable { .. }) => {
            println!("  {:<10} {:>6.0}%  ✗ {e}", label, ratio * 100.0);
            ensure!(!artifact.exists(), "{label}: failed compression left an artifact behind");
            return Ok(());
        }
        Err(e) => return Err(e).with_context(|| format!("compressing {label}")),
    };
    let compress_time = t0.elapsed();

    pipeline.decompress_auto_detect(&artifact, &restored)?;
    ensure!(
        std::fs::read(input)? == std::fs::read(&restored)?,
        "{label}: restored bytes differ from input"
    );

    println!(
        "  {:<10} {:>6.0}%  {:>11}  {:>11}  {:>8.2}%  {:<12} {:<6} {:>9}  ✓",
        label,
        ratio * 100.0,
        human_bytes(result.original_size),
        human_bytes(result.compressed_size),
        result.reduction_percentage(),
        format!("{}/{}", result.codec, result.level.map_or("-".into(), |l| l.to_string())),
        if result.padded { "yes" } else { "no" },
        fmt_duration(compress_time),
    );
    Ok(())
}

fn run() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let registry = Arc::new(default_registry()?);
    let pipeline = Pipeline::new(registry, PipelineConfig::default())?;

    println!();
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║          ucomp · ratio-guaranteed adaptive compression           ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    section("0 · INPUTS");
    let logs = dir.path().join("access.log");
    let json = dir.path().join("catalog.json");
    let noise = dir.path().join("noise.bin");
    let empty = dir.path().join("empty.dat");
    println!("  access.log   : {}", human_bytes(write_lines(&logs, LOG_BYTES, generate_log_line)?));
    println!("  catalog.json : {}", human_bytes(write_lines(&json, JSON_BYTES, generate_json_record)?));
    println!("  noise.bin    : {}", human_bytes(write_noise(&noise, NOISE_BYTES)?));
    std::fs::write(&empty, b"")?;
    println!("  empty.dat    : 0 B");
    println!();

    section("1 · DEFAULT GUARANTEE");
    println!(
        "  {:<10} {:>7}  {:>11}  {:>11}  {:>9}  {:<12} {:<6} {:>9}",
        "Input", "Target", "Raw", "Artifact", "Reduced", "Codec", "Padded", "Time"
    );
    println!("  {}", "─".repeat(86));
    let target = pipeline.orchestrator().config().target_ratio;
    run_scenario(&pipeline, dir.path(), "logs", &logs, target)?;
    run_scenario(&pipeline, dir.path(), "json", &json, target)?;
    run_scenario(&pipeline, dir.path(), "noise", &noise, target)?;
    run_scenario(&pipeline, dir.path(), "empty", &empty, target)?;
    println!();
    println!("  Noise cannot shrink, and padding only ever adds bytes, so the");
    println!("  guarantee is refused rather than broken. No output is written.");
    println!();

    section("2 · ESCALATION");
    for ratio in [0.5, 0.9, 0.97] {
        run_scenario(&pipeline, dir.path(), &format!("logs-{:.0}", ratio * 100.0), &logs, ratio)?;
    }
    println!();

    section("3 · FIXED-SIZE OUTPUT (pad_to_limit)");
    let config = PipelineConfig {
        pad_to_limit: true,
        ..PipelineConfig::default()
    };
    let padded = Pipeline::new(pipeline.orchestrator().registry().clone(), config)?;
    run_scenario(&padded, dir.path(), "logs-pad", &logs, target)?;
    run_scenario(&padded, dir.path(), "json-pad", &json, 0.5)?;
    println!();
    println!("  Each artifact is exactly floor(original × (1 − target)) bytes; the");
    println!("  padding envelope is stripped again during decompression.");
    println!();

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("demo failed: {e:#}");
        std::process::exit(1);
    }
}
