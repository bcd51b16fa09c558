use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use ovs_core::errors::ErrorInfo;
use ovs_core::OvsError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::config::OverlapConfig;
use crate::search::SearchOutcome;

/// Schema tag stamped into every manifest.
pub const MANIFEST_SCHEMA: &str = "ovs-run-manifest/1";

/// Structured manifest describing a completed overlap session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    /// Manifest schema identifier.
    pub schema: String,
    /// RFC 3339 timestamp of manifest creation.
    pub created_at: String,
    /// Configuration used for the run.
    pub config: OverlapConfig,
    /// SHA-256 of the canonical JSON form of the configuration.
    pub config_hash: String,
    /// Master seed used to derive the side substreams.
    pub master_seed: u64,
    /// Optional seed label captured from the configuration.
    pub seed_label: Option<String>,
    /// Search outcome, including the locked bias and per-stage records.
    pub search: SearchOutcome,
    /// Production steps executed by the reference side.
    pub reference_steps: u64,
    /// Production steps executed by the target side.
    pub target_steps: u64,
    /// Metrics file produced during the run (relative to run directory).
    pub metrics_file: Option<PathBuf>,
    /// Summary file produced at the end of the run (relative to run directory).
    pub summary_file: Option<PathBuf>,
}

impl RunManifest {
    /// Writes the manifest to a JSON file.
    pub fn write(&self, path: &Path) -> Result<(), OvsError> {
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| {
                OvsError::Serde(
                    ErrorInfo::new("manifest-mkdir", err.to_string())
                        .with_context("path", parent.display().to_string()),
                )
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            OvsError::Serde(
                ErrorInfo::new("manifest-serialize", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        fs::write(path, json).map_err(|err| {
            OvsError::Serde(
                ErrorInfo::new("manifest-write", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }

    /// Loads a manifest from disk.
    pub fn load(path: &Path) -> Result<Self, OvsError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            OvsError::Serde(
                ErrorInfo::new("manifest-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        serde_json::from_str(&contents).map_err(|err| {
            OvsError::Serde(
                ErrorInfo::new("manifest-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}

/// Current time in the format manifests carry.
pub fn manifest_timestamp() -> String {
    Utc::now().to_rfc3339()
}

/// SHA-256 hash of a configuration's canonical JSON form.
///
/// Map keys are sorted before hashing so the digest is independent of field
/// declaration order.
pub fn config_hash(config: &OverlapConfig) -> Result<String, OvsError> {
    let value = serde_json::to_value(config).map_err(|err| {
        OvsError::Serde(ErrorInfo::new("config-hash-serialize", err.to_string()))
    })?;
    let mut bytes = Vec::new();
    serde_json::to_writer(&mut bytes, &canonicalize(value)).map_err(|err| {
        OvsError::Serde(ErrorInfo::new("config-hash-write", err.to_string()))
    })?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered: BTreeMap<String, Value> = map
                .into_iter()
                .map(|(key, value)| (key, canonicalize(value)))
                .collect();
            Value::Object(ordered.into_iter().collect())
        }
        Value::Array(values) => Value::Array(values.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
