//! Engine configuration.

use std::path::{Path, PathBuf};

use datapad_core::Severity;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

fn default_repair_attempts() -> u32 {
    5
}

fn default_validation_attempts() -> u32 {
    2
}

fn default_auto_correct() -> Vec<Severity> {
    vec![Severity::High]
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from(".datapad").join("snapshots")
}

/// Tunable bounds and paths for the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum repair calls per error-correction run
    #[serde(rename = "maxRepairAttempts", default = "default_repair_attempts")]
    pub max_repair_attempts: u32,
    /// Maximum rewrite attempts per logic-validation run
    #[serde(rename = "maxValidationAttempts", default = "default_validation_attempts")]
    pub max_validation_attempts: u32,
    /// Severities that auto-trigger a rewrite; lower severities are
    /// recorded only
    #[serde(rename = "autoCorrectSeverities", default = "default_auto_correct")]
    pub auto_correct_severities: Vec<Severity>,
    /// Directory for namespace snapshots
    #[serde(rename = "snapshotDir", default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_repair_attempts: default_repair_attempts(),
            max_validation_attempts: default_validation_attempts(),
            auto_correct_severities: default_auto_correct(),
            snapshot_dir: default_snapshot_dir(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Whether a finding of this severity should trigger a rewrite.
    pub fn auto_corrects(&self, severity: Severity) -> bool {
        self.auto_correct_severities.contains(&severity)
    }
}
