use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

pub fn now_utc_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))
}

/// Hex SHA-256 of content already in memory, so the recorded checksum
/// matches exactly what was parsed.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_directory(parent)?;
        }
    }

    let file = File::create(path)
        .with_context(|| format!("failed to create json file: {}", path.display()))?;
    write_json_to(BufWriter::new(file), value)
        .with_context(|| format!("failed to write json file: {}", path.display()))
}

pub fn write_json_stdout<T: Serialize>(value: &T) -> Result<()> {
    write_json_to(BufWriter::new(io::stdout().lock()), value)
        .context("failed to write json output")
}

fn write_json_to<W: Write, T: Serialize>(mut output: W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut output, value).context("failed to serialize json")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}
