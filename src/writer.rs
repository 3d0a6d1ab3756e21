// SPDX-License-Identifier: MIT
//! Image writer
//!
//! Streams records into any [`Write`] sink one entry at a time. Only the record
//! currently being encoded is held in memory; the sink decides whether the image
//! ends up in a buffer, a file or stdout.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::compression_strategy::{CompressionConfig, CompressionEngine};
use crate::config::PackConfig;
use crate::error::{PackError, PackResult};
use crate::record::{encode_record, encode_trailer, record_length};
use crate::selector::{relative_path, select, SelectionConfig};

/// Progress of an image build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    /// Selecting files, nothing written yet
    Scanning,
    /// Entry records are being written
    Emitting { emitted: usize },
    /// Writing the trailer record
    Trailer,
    /// Image complete
    Done,
}

/// What was written for one entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntrySummary {
    pub path: String,
    pub uncompressed_size: u64,
    pub encoded_size: u64,
    pub compressed: bool,
    pub record_length: u64,
}

/// Result of a finished build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub entries: Vec<EntrySummary>,
    /// Bytes written to the sink, trailer included
    pub total_bytes: u64,
}

impl BuildReport {
    pub fn compressed_count(&self) -> usize {
        self.entries.iter().filter(|e| e.compressed).count()
    }
}

/// Counts bytes the inner sink actually accepted
struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Writes an image record by record
pub struct ImageWriter<W: Write> {
    sink: CountingWriter<W>,
    engine: CompressionEngine,
    state: BuildState,
    expected_bytes: u64,
    entries: Vec<EntrySummary>,
}

impl<W: Write> ImageWriter<W> {
    pub fn new(sink: W, compression: CompressionConfig) -> Self {
        Self {
            sink: CountingWriter {
                inner: sink,
                written: 0,
            },
            engine: CompressionEngine::new(compression),
            state: BuildState::Scanning,
            expected_bytes: 0,
            entries: Vec::new(),
        }
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    /// Bytes written to the sink so far
    pub fn bytes_written(&self) -> u64 {
        self.sink.written
    }

    /// Select every file under `root`, write it, then write the trailer
    pub fn build(mut self, root: &Path, selection: &SelectionConfig) -> PackResult<(W, BuildReport)> {
        debug!(root = %root.display(), "scanning");
        let files = select(root, selection)?;

        for path in &files {
            self.add_file(root, path)?;
        }

        self.finish()
    }

    /// Read `path` and append it under its root-relative name
    pub fn add_file(&mut self, root: &Path, path: &Path) -> PackResult<EntrySummary> {
        let name = relative_path(root, path)?;
        let raw = fs::read(path).map_err(|source| PackError::UnreadableFile {
            path: path.to_path_buf(),
            source,
        })?;

        info!(
            "Processing {} -> {}[{}], {} bytes",
            path.display(),
            name,
            name.len(),
            raw.len()
        );
        self.add_entry(&name, raw)
    }

    /// Compress, encode and write one entry
    pub fn add_entry(&mut self, relative_path: &str, raw: Vec<u8>) -> PackResult<EntrySummary> {
        // `finish` consumes the writer, so no entry can follow the trailer
        let emitted = self.entries.len();
        self.state = BuildState::Emitting { emitted };

        let uncompressed_size = raw.len();
        let payload = self.engine.encode(raw)?;
        let record = encode_record(relative_path, &payload, uncompressed_size)?;

        self.sink.write_all(&record)?;
        self.expected_bytes += record_length(relative_path.len(), payload.len()) as u64;
        self.check_written()?;

        debug!(
            path = relative_path,
            uncompressed = uncompressed_size,
            encoded = payload.len(),
            gzip = payload.compressed,
            "record written"
        );

        let summary = EntrySummary {
            path: relative_path.to_string(),
            uncompressed_size: uncompressed_size as u64,
            encoded_size: payload.len() as u64,
            compressed: payload.compressed,
            record_length: record.len() as u64,
        };
        self.entries.push(summary.clone());
        self.state = BuildState::Emitting {
            emitted: self.entries.len(),
        };
        Ok(summary)
    }

    /// Write the trailer, flush, and hand the sink back
    pub fn finish(mut self) -> PackResult<(W, BuildReport)> {
        self.state = BuildState::Trailer;

        let trailer = encode_trailer();
        self.sink.write_all(&trailer)?;
        self.expected_bytes += trailer.len() as u64;
        self.sink.flush()?;
        self.check_written()?;

        self.state = BuildState::Done;
        let report = BuildReport {
            entries: self.entries,
            total_bytes: self.sink.written,
        };
        info!(
            "DONE: {} entries ({} gzip), {} bytes",
            report.entries.len(),
            report.compressed_count(),
            report.total_bytes
        );

        Ok((self.sink.inner, report))
    }

    fn check_written(&self) -> PackResult<()> {
        if self.expected_bytes != self.sink.written {
            return Err(PackError::InvariantViolation {
                expected: self.expected_bytes,
                actual: self.sink.written,
            });
        }
        Ok(())
    }
}

/// Pack `root` into `sink`
pub fn pack_to_writer<W: Write>(root: &Path, config: &PackConfig, sink: W) -> PackResult<BuildReport> {
    config.validate()?;
    let (_, report) = ImageWriter::new(sink, config.compression).build(root, &config.selection)?;
    Ok(report)
}

/// Pack `root` into a new buffer
pub fn pack_to_vec(root: &Path, config: &PackConfig) -> PackResult<(Vec<u8>, BuildReport)> {
    config.validate()?;
    ImageWriter::new(Vec::new(), config.compression).build(root, &config.selection)
}
