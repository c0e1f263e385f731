//! Install receipts.
//!
//! A receipt records what postflight actually placed so a later
//! uninstall can account for exactly that, even after the manifest
//! changed. It is bookkeeping only: a missing or unreadable receipt
//! never blocks an uninstall.

use crate::config::SystemPaths;
use crate::error::{Result, StagehandError};
use crate::plan::ArtifactPlan;
use crate::runner::ApplyReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, warn};

/// One artifact the runner placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedArtifact {
    pub path: PathBuf,
    pub elevated: bool,
}

/// Record of a completed install.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallReceipt {
    pub token: String,
    pub version: String,
    pub installed_at: DateTime<Utc>,
    pub artifacts: Vec<PlacedArtifact>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl InstallReceipt {
    /// Build a receipt from what the apply actually did.
    ///
    /// Only destinations the report lists as placed are recorded.
    pub fn from_outcome(plan: &ArtifactPlan, version: &str, report: &ApplyReport) -> Self {
        let artifacts = plan
            .steps
            .iter()
            .filter(|step| report.placed.contains(&step.dest))
            .map(|step| PlacedArtifact {
                path: step.dest.clone(),
                elevated: step.elevated,
            })
            .collect();
        Self {
            token: plan.token.clone(),
            version: version.to_string(),
            installed_at: Utc::now(),
            artifacts,
            warnings: report.warnings.clone(),
        }
    }
}

/// Reads and writes the receipt under the install prefix.
pub struct ReceiptStore {
    path: PathBuf,
}

impl ReceiptStore {
    pub fn new(paths: &SystemPaths) -> Self {
        Self {
            path: paths.receipt_path(),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Load the receipt if one exists and parses.
    ///
    /// A corrupt receipt is logged and treated as absent.
    pub fn load(&self) -> Result<Option<InstallReceipt>> {
        if !self.path.is_file() {
            return Ok(None);
        }
        let data = fs::read_to_string(&self.path)
            .map_err(|e| StagehandError::io_with_path(e, &self.path))?;
        match serde_json::from_str(&data) {
            Ok(receipt) => Ok(Some(receipt)),
            Err(e) => {
                warn!("Ignoring unreadable receipt {}: {}", self.path.display(), e);
                Ok(None)
            }
        }
    }

    /// Write the receipt atomically: serialize to a temp file, validate
    /// it re-parses, sync, back up any previous receipt, then rename
    /// over the final path.
    pub fn save(&self, receipt: &InstallReceipt) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StagehandError::io_with_path(e, parent))?;
        }

        let temp_path = self.path.with_extension(format!("json.{}.tmp", std::process::id()));
        let json = serde_json::to_string_pretty(receipt)?;

        let mut file =
            File::create(&temp_path).map_err(|e| StagehandError::io_with_path(e, &temp_path))?;
        file.write_all(json.as_bytes())
            .map_err(|e| StagehandError::io_with_path(e, &temp_path))?;
        file.sync_all()
            .map_err(|e| StagehandError::io_with_path(e, &temp_path))?;
        drop(file);

        // Refuse to swap in a receipt that does not round-trip.
        let written = fs::read_to_string(&temp_path)
            .map_err(|e| StagehandError::io_with_path(e, &temp_path))?;
        serde_json::from_str::<InstallReceipt>(&written)?;

        if self.path.is_file() {
            let backup = self.path.with_extension("json.bak");
            if let Err(e) = fs::copy(&self.path, &backup) {
                debug!("Receipt backup failed: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path)
            .map_err(|e| StagehandError::io_with_path(e, &self.path))?;
        debug!("Wrote receipt {}", self.path.display());
        Ok(())
    }

    /// Delete the receipt and its backup; absence is success.
    pub fn remove(&self) -> Result<()> {
        let backup = self.path.with_extension("json.bak");
        if backup.symlink_metadata().is_ok() {
            if let Err(e) = fs::remove_file(&backup) {
                debug!("Failed to remove receipt backup: {}", e);
            }
        }
        if self.path.symlink_metadata().is_err() {
            return Ok(());
        }
        fs::remove_file(&self.path).map_err(|e| StagehandError::io_with_path(e, &self.path))
    }
}
