//! Policy setup script generation.
//!
//! When a run cannot escalate, the policy file stays uninstalled. Instead
//! of failing, postflight drops a small script under `<prefix>/bin` that
//! the user can run themselves; it performs the same copy the elevated
//! batch would have, plus the framework-specific load step.

use crate::config::SystemPaths;
use crate::error::{Result, StagehandError};
use crate::manifest::{BundleManifest, PolicyKind};
use crate::platform::permissions::{set_mode, MODE_EXECUTABLE};
use crate::stage::Stage;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Generator for per-bundle policy setup scripts.
pub struct PolicyScriptGenerator {
    paths: SystemPaths,
}

impl PolicyScriptGenerator {
    pub fn new(paths: &SystemPaths) -> Self {
        Self {
            paths: paths.clone(),
        }
    }

    /// Path the script for `token` is written to.
    pub fn script_path(&self, token: &str) -> PathBuf {
        self.paths.bin_dir().join(format!("{token}-policy-setup"))
    }

    /// Write the setup script for the manifest's policy file.
    ///
    /// Returns the script path, or `None` when the manifest declares no
    /// policy file.
    pub fn generate(&self, manifest: &BundleManifest, stage: &Stage) -> Result<Option<PathBuf>> {
        let policy = match &manifest.policy {
            Some(policy) => policy,
            None => return Ok(None),
        };

        let bin_dir = self.paths.bin_dir();
        fs::create_dir_all(&bin_dir).map_err(|e| StagehandError::io_with_path(e, &bin_dir))?;

        let script_path = self.script_path(&manifest.token);
        let source = stage.resolve(&policy.source);
        let dest = policy.dest_under(&self.paths);
        let content = script_content(&manifest.app_name, policy.kind, &source, &dest);

        let mut file = fs::File::create(&script_path)
            .map_err(|e| StagehandError::io_with_path(e, &script_path))?;
        file.write_all(content.as_bytes())
            .map_err(|e| StagehandError::io_with_path(e, &script_path))?;
        drop(file);
        set_mode(&script_path, MODE_EXECUTABLE)?;

        info!(
            "Policy file not installed; run {} to set it up",
            script_path.display()
        );
        Ok(Some(script_path))
    }

    /// Remove the script for `token`; absence is success.
    pub fn remove(&self, token: &str) -> Result<()> {
        let script_path = self.script_path(token);
        if script_path.exists() {
            fs::remove_file(&script_path)
                .map_err(|e| StagehandError::io_with_path(e, &script_path))?;
            debug!("Removed {}", script_path.display());
        }
        Ok(())
    }
}

fn script_content(app_name: &str, kind: PolicyKind, source: &Path, dest: &Path) -> String {
    let source = source.display();
    let dest = dest.display();

    match kind {
        PolicyKind::Apparmor => format!(
            r#"#!/bin/sh
set -eu

PROFILE_SRC="{source}"
PROFILE_DEST="{dest}"

if ! command -v apparmor_parser >/dev/null 2>&1; then
    echo "apparmor_parser not found; skipping AppArmor confinement for {app_name}"
    exit 0
fi

echo "Installing AppArmor profile for {app_name}"
sudo cp "$PROFILE_SRC" "$PROFILE_DEST"
sudo chmod 644 "$PROFILE_DEST"
sudo apparmor_parser --replace --write-cache --skip-read-cache "$PROFILE_DEST"
echo "AppArmor profile loaded."
"#
        ),
        PolicyKind::PolkitAction => format!(
            r#"#!/bin/sh
set -eu

ACTION_SRC="{source}"
ACTION_DEST="{dest}"

echo "Installing polkit action for {app_name}"
sudo mkdir -p "$(dirname "$ACTION_DEST")"
sudo cp "$ACTION_SRC" "$ACTION_DEST"
sudo chmod 644 "$ACTION_DEST"
echo "Polkit action installed."
"#
        ),
    }
}
