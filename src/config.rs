// SPDX-License-Identifier: MIT
use crate::compression_strategy::{CompressionConfig, CompressionPolicy};
use crate::error::{PackError, PackResult};
use crate::selector::{default_extension_groups, EntryOrder, SelectionConfig, SelectionMode};

/// Everything that shapes an image build
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackConfig {
    pub selection: SelectionConfig,
    pub compression: CompressionConfig,
}

impl PackConfig {
    /// Defaults overridden by `ESPFS_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`PackConfig::from_env`] with a custom variable source.
    ///
    /// Unset or unparseable values fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let groups = lookup("ESPFS_EXTENSIONS")
            .map(|s| parse_extension_groups(&s))
            .filter(|groups| !groups.is_empty())
            .unwrap_or_else(default_extension_groups);

        let mode = match lookup("ESPFS_SELECTION").as_deref().map(str::trim) {
            Some("all") => SelectionMode::All,
            _ => SelectionMode::Extensions(groups),
        };

        let order = match lookup("ESPFS_ORDER").as_deref().map(str::trim) {
            Some("walk") => EntryOrder::WalkOrder,
            _ => EntryOrder::Sorted,
        };

        let policy = lookup("ESPFS_COMPRESSION")
            .and_then(|s| s.parse::<CompressionPolicy>().ok())
            .unwrap_or_default();

        let level = lookup("ESPFS_GZIP_LEVEL")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(CompressionConfig::MAX_LEVEL);

        Self {
            selection: SelectionConfig { mode, order },
            compression: CompressionConfig { policy, level },
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> PackResult<()> {
        if self.compression.level > CompressionConfig::MAX_LEVEL {
            return Err(PackError::InvalidConfig(format!(
                "gzip level must be between 0 and {}, got {}",
                CompressionConfig::MAX_LEVEL,
                self.compression.level
            )));
        }

        if let SelectionMode::Extensions(groups) = &self.selection.mode {
            if groups.is_empty() {
                return Err(PackError::InvalidConfig(
                    "extension allow-list is empty".to_string(),
                ));
            }
            if groups.iter().any(|g| g.is_empty() || g.iter().any(|e| e.is_empty())) {
                return Err(PackError::InvalidConfig(
                    "extension groups must not contain empty entries".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Parse `"html;css;js;ico,png"` into extension groups.
///
/// Groups are separated by `;`, extensions within a group by `,`. A leading dot
/// on an extension is dropped.
pub fn parse_extension_groups(list: &str) -> Vec<Vec<String>> {
    list.split(';')
        .map(parse_extension_group)
        .filter(|group| !group.is_empty())
        .collect()
}

/// Parse one comma-separated group such as `"ico,png"`
pub fn parse_extension_group(list: &str) -> Vec<String> {
    list.split(',')
        .map(|ext| ext.trim().trim_start_matches('.'))
        .filter(|ext| !ext.is_empty())
        .map(str::to_string)
        .collect()
}
