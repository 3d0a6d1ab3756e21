// SPDX-License-Identifier: MIT
//! Payload compression policy
//!
//! The embedded reader can serve gzip payloads as-is, so the packer only keeps
//! the gzip form when it actually saves space. Data that grows under gzip
//! (PNG, already-compressed assets, tiny files) is stored raw.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use flate2::write::GzEncoder;
use flate2::Compression;

/// When to store the gzip form of a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionPolicy {
    /// Gzip only when the result is strictly smaller than the raw bytes
    #[default]
    SmallerOf,
    /// Gzip every payload, even when it grows
    Always,
    /// Store every payload raw
    Never,
}

impl CompressionPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            CompressionPolicy::SmallerOf => "smaller-of",
            CompressionPolicy::Always => "always",
            CompressionPolicy::Never => "never",
        }
    }
}

impl fmt::Display for CompressionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CompressionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "smaller-of" | "smaller" | "auto" => Ok(CompressionPolicy::SmallerOf),
            "always" | "gzip" => Ok(CompressionPolicy::Always),
            "never" | "none" | "raw" => Ok(CompressionPolicy::Never),
            other => Err(format!(
                "unknown compression policy '{}' (expected smaller-of, always or never)",
                other
            )),
        }
    }
}

/// Compression configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionConfig {
    pub policy: CompressionPolicy,
    /// gzip level, 0-9
    pub level: u32,
}

impl CompressionConfig {
    /// Highest gzip level accepted
    pub const MAX_LEVEL: u32 = 9;

    pub fn new(policy: CompressionPolicy, level: u32) -> Self {
        Self { policy, level }
    }
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            policy: CompressionPolicy::SmallerOf,
            level: Self::MAX_LEVEL,
        }
    }
}

/// A payload as it will be stored in the image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    pub bytes: Vec<u8>,
    pub compressed: bool,
}

impl EncodedPayload {
    pub fn raw(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            compressed: false,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Applies a [`CompressionConfig`] to payloads
#[derive(Debug, Clone)]
pub struct CompressionEngine {
    config: CompressionConfig,
}

impl CompressionEngine {
    pub fn new(config: CompressionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    /// Choose between the raw and gzip form of `raw`
    pub fn encode(&self, raw: Vec<u8>) -> std::io::Result<EncodedPayload> {
        if self.config.policy == CompressionPolicy::Never {
            return Ok(EncodedPayload::raw(raw));
        }

        let gzipped = self.gzip(&raw)?;
        let keep_gzip = match self.config.policy {
            CompressionPolicy::Always => true,
            _ => gzipped.len() < raw.len(),
        };

        if keep_gzip {
            Ok(EncodedPayload {
                bytes: gzipped,
                compressed: true,
            })
        } else {
            Ok(EncodedPayload::raw(raw))
        }
    }

    /// Gzip `data` at the configured level.
    ///
    /// The gzip header carries mtime 0 so identical inputs give identical images.
    pub fn gzip(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        let level = Compression::new(self.config.level.min(CompressionConfig::MAX_LEVEL));
        let estimated_size = data.len() / 2 + 32;

        let mut encoder = GzEncoder::new(Vec::with_capacity(estimated_size), level);
        encoder.write_all(data)?;
        encoder.finish()
    }
}

impl Default for CompressionEngine {
    fn default() -> Self {
        Self::new(CompressionConfig::default())
    }
}

/// Size-aware compression with the default level
pub fn compress(raw: &[u8]) -> std::io::Result<EncodedPayload> {
    CompressionEngine::default().encode(raw.to_vec())
}
