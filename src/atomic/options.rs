//! Atomic write configuration
//!
//! Embedding services usually carry these settings in their own config file,
//! so both types deserialize from JSON with every field optional.

use serde::{Deserialize, Serialize};

use crate::container::{ContainerError, ContainerResult};

/// Default temp file suffix. The trailing `X`s become random characters.
pub const DEFAULT_TMP_SUFFIX: &str = ".tmp.XXXXXX";

/// Whether an atomic write waits for durability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Rename without fsync. The replacement is atomic but may not survive a crash.
    None,
    /// fsync the temp file before the rename and the directory after it.
    #[default]
    Sync,
}

/// Settings for `write_atomically_with_options`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtomicWriteOptions {
    /// Durability of the replacement
    pub sync: SyncMode,
    /// Appended to the target path to name the temp file
    pub tmp_suffix: String,
}

impl Default for AtomicWriteOptions {
    fn default() -> Self {
        Self {
            sync: SyncMode::Sync,
            tmp_suffix: DEFAULT_TMP_SUFFIX.to_string(),
        }
    }
}

impl AtomicWriteOptions {
    /// Default options with the given sync mode.
    pub fn with_sync(sync: SyncMode) -> Self {
        Self {
            sync,
            ..Self::default()
        }
    }

    /// Checks that the temp suffix can produce a sibling file name.
    pub fn validate(&self) -> ContainerResult<()> {
        if !self.tmp_suffix.ends_with('X') {
            return Err(ContainerError::io_error_no_source(format!(
                "Temp suffix must end with an X placeholder: {:?}",
                self.tmp_suffix
            )));
        }
        if self.tmp_suffix.contains(std::path::is_separator) {
            return Err(ContainerError::io_error_no_source(format!(
                "Temp suffix must not contain a path separator: {:?}",
                self.tmp_suffix
            )));
        }
        Ok(())
    }

    /// Parses options from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> ContainerResult<Self> {
        let options: Self = serde_json::from_str(json).map_err(|e| {
            ContainerError::io_error_with_details(
                "Failed to parse atomic write options",
                e.to_string(),
            )
        })?;
        options.validate()?;
        Ok(options)
    }

    /// Serializes options to JSON.
    pub fn to_json(&self) -> ContainerResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            ContainerError::io_error_with_details(
                "Failed to serialize atomic write options",
                e.to_string(),
            )
        })
    }
}
