//! Enriched-record output - writes batch results to file
//!
//! Records are written in JSONL format (one JSON object per line)
//! to the file given on the command line.

use crate::domain::types::EnrichedRecord;
use anyhow::Context;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Write enriched records as JSONL. Parent directories are created if
/// they do not exist; an existing file is appended to.
pub fn write_jsonl<P: AsRef<Path>>(path: P, records: &[EnrichedRecord]) -> anyhow::Result<usize> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open output file {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    for record in records {
        let line = serde_json::to_string(record)?;
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;

    info!(path = %path.display(), records = records.len(), "output_written");
    Ok(records.len())
}
