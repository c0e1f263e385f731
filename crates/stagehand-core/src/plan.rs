//! Placement planning.
//!
//! [`ArtifactPlan::build`] turns a manifest plus the configured paths into
//! an ordered list of placement steps. It is path arithmetic only: nothing
//! here reads the filesystem, so the same inputs always produce the same
//! plan and a missing staged file surfaces as a per-step skip at apply
//! time instead of a planning failure.

use crate::config::SystemPaths;
use crate::error::Result;
use crate::manifest::BundleManifest;
use crate::platform::permissions::{MODE_EXECUTABLE, MODE_POLICY_FILE, MODE_SUID_HELPER};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// What a placement step does, and what failure of it means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StepKind {
    /// Restore an exact mode on a staged file. No copy, nothing to revert.
    SuidFixup,
    /// Link or copy the primary executable into `<prefix>/bin`. The only
    /// step whose missing source is fatal.
    Binary,
    /// Install the `.desktop` entry.
    DesktopEntry,
    /// Install one icon file.
    Icon,
    /// Install a system policy file. Usually elevated.
    Policy,
}

/// One placement: copy `source` (stage-relative) to `dest` (absolute),
/// then set `mode` if declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementStep {
    pub kind: StepKind,
    pub source: PathBuf,
    pub dest: PathBuf,
    /// Exact octal mode to set after placement; `None` keeps the default.
    pub mode: Option<u32>,
    pub elevated: bool,
}

/// Ordered placement steps for one bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactPlan {
    pub token: String,
    pub steps: Vec<PlacementStep>,
}

impl ArtifactPlan {
    /// Build the plan for a manifest.
    ///
    /// Step order is fixed: SUID fixups, the binary link, the desktop
    /// entry, icons in declared size order then the flat icon, the policy
    /// file. Fails only on malformed declarations, never on missing files.
    pub fn build(
        manifest: &BundleManifest,
        stage_root: &Path,
        paths: &SystemPaths,
    ) -> Result<ArtifactPlan> {
        manifest.validate()?;

        let mut steps = Vec::new();

        for helper in &manifest.suid_helpers {
            steps.push(PlacementStep {
                kind: StepKind::SuidFixup,
                source: helper.clone(),
                dest: stage_root.join(helper),
                mode: Some(MODE_SUID_HELPER),
                elevated: false,
            });
        }

        let binary_dest = paths.bin_dir().join(&manifest.binary.link_name);
        steps.push(PlacementStep {
            kind: StepKind::Binary,
            source: manifest.binary.source.clone(),
            elevated: paths.requires_elevation(&binary_dest),
            dest: binary_dest,
            mode: None,
        });

        if let Some(source) = manifest.staged_desktop_source() {
            let dest = paths.applications_dir.join(manifest.desktop_file_name());
            steps.push(PlacementStep {
                kind: StepKind::DesktopEntry,
                source,
                elevated: paths.requires_elevation(&dest),
                dest,
                mode: Some(MODE_EXECUTABLE),
            });
        }

        if let Some(icons) = &manifest.icons {
            for &size in icons.effective_sizes() {
                if let Some(source) = icons.source_for_size(size) {
                    let file_name = icon_file_name(&icons.icon_name, &source);
                    let dest = paths.hicolor_size_dir(size).join(file_name);
                    steps.push(PlacementStep {
                        kind: StepKind::Icon,
                        elevated: paths.requires_elevation(&dest),
                        source,
                        dest,
                        mode: None,
                    });
                }
            }
            if let Some(flat) = &icons.flat_source {
                let file_name = icon_file_name(&icons.icon_name, flat);
                let dest = paths.flat_icon_dir.join(file_name);
                steps.push(PlacementStep {
                    kind: StepKind::Icon,
                    source: flat.clone(),
                    elevated: paths.requires_elevation(&dest),
                    dest,
                    mode: None,
                });
            }
        }

        if let Some(policy) = &manifest.policy {
            let dest = policy.dest_under(paths);
            steps.push(PlacementStep {
                kind: StepKind::Policy,
                source: policy.source.clone(),
                elevated: paths.requires_elevation(&dest),
                dest,
                mode: Some(MODE_POLICY_FILE),
            });
        }

        Ok(ArtifactPlan {
            token: manifest.token.clone(),
            steps,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Steps the runner performs directly vs. through the elevation
    /// mechanism, in plan order.
    pub fn split_by_elevation(&self) -> (Vec<&PlacementStep>, Vec<&PlacementStep>) {
        self.steps.iter().partition(|step| !step.elevated)
    }
}

/// Installed icon file name: base name plus the source's extension.
fn icon_file_name(icon_name: &str, source: &Path) -> String {
    let ext = source
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_else(|| "png".to_string());
    format!("{icon_name}.{ext}")
}
