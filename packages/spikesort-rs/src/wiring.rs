use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Synchronisation wiring of one acquisition device.
///
/// Keys the pipeline does not interpret are kept in `extra` so the sidecar
/// written next to a stream carries the full descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncDescriptor {
    #[serde(rename = "SYSTEM")]
    pub system: String,

    #[serde(rename = "SYNC_WIRING_DIGITAL", default)]
    pub digital: BTreeMap<String, String>,

    #[serde(
        rename = "SYNC_WIRING_ANALOG",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub analog: BTreeMap<String, String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl SyncDescriptor {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = read_config_file(path)?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Digital line carrying the given role, e.g. `imec_sync`.
    pub fn line_for(&self, role: &str) -> Option<&str> {
        self.digital
            .iter()
            .find(|(_, r)| r.as_str() == role)
            .map(|(line, _)| line.as_str())
    }
}

pub(crate) fn read_config_file(path: &Path) -> Result<String, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }
    std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
        path: path.to_path_buf(),
        source,
    })
}
