//! Bundle manifest: the declarative rule set driving integration.
//!
//! A manifest describes one vendor bundle: its primary binary, desktop
//! entry, icons, optional system policy file, caveats, and zap list. It is
//! plain JSON so host package managers can generate it. Semantic problems
//! are reported as configuration errors before any filesystem mutation.

use crate::config::SystemPaths;
use crate::error::{Result, StagehandError};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Top-level manifest for one application bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleManifest {
    /// Short identifier used for file names (`brave-browser`, `bitwarden`).
    pub token: String,
    /// Human-readable name shown in menus.
    pub app_name: String,
    pub version: String,
    pub binary: BinarySpec,
    /// Staged helpers that need mode 4755 before first launch.
    #[serde(default)]
    pub suid_helpers: Vec<PathBuf>,
    #[serde(default)]
    pub desktop: Option<DesktopSpec>,
    #[serde(default)]
    pub icons: Option<IconSpec>,
    #[serde(default)]
    pub policy: Option<PolicySpec>,
    /// Free text surfaced after install; `${prefix}`/`${home}` expand.
    #[serde(default)]
    pub caveats: Option<String>,
    /// `~/`-relative user data removed only by an explicit zap.
    #[serde(default)]
    pub zap: Vec<String>,
}

/// The primary executable and the name it is linked to under `<prefix>/bin`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinarySpec {
    pub source: PathBuf,
    pub link_name: String,
}

/// Desktop entry handling: patch a staged file or generate one from fields.
///
/// Exactly one of `source` and `generate` must be set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesktopSpec {
    /// Staged `.desktop` file to patch and install.
    #[serde(default)]
    pub source: Option<PathBuf>,
    /// Wholesale `Key=` line replacements applied to `source`.
    #[serde(default)]
    pub replacements: Vec<Replacement>,
    /// Entry description rendered from scratch when the bundle ships none.
    #[serde(default)]
    pub generate: Option<DesktopEntrySpec>,
    /// Installed file name; defaults to `<token>.desktop`.
    #[serde(default)]
    pub file_name: Option<String>,
}

/// One key → new value pair for the patcher.
///
/// A matching `Key=…` line is rewritten to `Key=value`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Replacement {
    pub key: String,
    pub value: String,
}

/// Fields for a generated desktop entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesktopEntrySpec {
    pub name: String,
    #[serde(default)]
    pub generic_name: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    /// Arguments appended to the installed binary path (`%U` and friends).
    #[serde(default)]
    pub exec_args: Option<String>,
    pub icon: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub mime_types: Vec<String>,
    #[serde(default)]
    pub startup_notify: Option<bool>,
    #[serde(default)]
    pub terminal: Option<bool>,
    #[serde(default)]
    pub actions: Vec<DesktopActionSpec>,
}

/// One `[Desktop Action …]` group of a generated entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesktopActionSpec {
    /// Identifier used in the `Actions=` list and the group header.
    pub id: String,
    pub name: String,
    /// Arguments appended to the installed binary path.
    #[serde(default)]
    pub exec_args: Option<String>,
}

/// Icon placement: per-size hicolor theme entries, a flat icon, or both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IconSpec {
    /// Installed icon base name (no extension).
    pub icon_name: String,
    /// Stage-relative path template with a `{size}` placeholder.
    #[serde(default)]
    pub source_pattern: Option<String>,
    /// Sizes to install under `hicolor/{s}x{s}/apps`. With a pattern and
    /// no sizes, the standard ladder is tried and missing files skip.
    #[serde(default)]
    pub sizes: Vec<u32>,
    /// Stage-relative path installed once to the flat icons dir.
    #[serde(default)]
    pub flat_source: Option<PathBuf>,
}

impl IconSpec {
    /// Expand the source pattern for one size.
    pub fn source_for_size(&self, size: u32) -> Option<PathBuf> {
        self.source_pattern
            .as_ref()
            .map(|pattern| PathBuf::from(pattern.replace("{size}", &size.to_string())))
    }

    /// Declared sizes, or [`STANDARD_ICON_SIZES`] when a pattern is given
    /// without any.
    ///
    /// [`STANDARD_ICON_SIZES`]: crate::desktop::icons::STANDARD_ICON_SIZES
    pub fn effective_sizes(&self) -> &[u32] {
        if self.sizes.is_empty() && self.source_pattern.is_some() {
            &crate::desktop::icons::STANDARD_ICON_SIZES
        } else {
            &self.sizes
        }
    }
}

/// Which policy framework the bundle's policy file targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PolicyKind {
    Apparmor,
    PolkitAction,
}

impl PolicyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::Apparmor => "apparmor",
            PolicyKind::PolkitAction => "polkitAction",
        }
    }
}

/// A policy file requiring elevation to place.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySpec {
    pub kind: PolicyKind,
    pub source: PathBuf,
    /// Installed file name inside the framework's directory.
    pub dest_name: String,
}

impl PolicySpec {
    /// Final installed path for this policy file.
    pub fn dest_under(&self, paths: &SystemPaths) -> PathBuf {
        let dir = match self.kind {
            PolicyKind::Apparmor => &paths.apparmor_dir,
            PolicyKind::PolkitAction => &paths.polkit_actions_dir,
        };
        dir.join(&self.dest_name)
    }
}

impl BundleManifest {
    /// Load and validate a manifest from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| StagehandError::io_with_path(e, path))?;
        let manifest: BundleManifest =
            serde_json::from_str(&contents).map_err(|e| StagehandError::Config {
                message: format!("Failed to parse {}: {}", path.display(), e),
            })?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Parse and validate a manifest from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let manifest: BundleManifest =
            serde_json::from_str(json).map_err(|e| StagehandError::Config {
                message: format!("Failed to parse manifest: {e}"),
            })?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// The installed desktop entry file name.
    pub fn desktop_file_name(&self) -> String {
        self.desktop
            .as_ref()
            .and_then(|d| d.file_name.clone())
            .unwrap_or_else(|| format!("{}.desktop", self.token))
    }

    /// Stage-relative location of the desktop entry to install.
    ///
    /// Patched entries live where the vendor shipped them; generated ones
    /// are rendered by preflight into the stage scratch directory.
    pub fn staged_desktop_source(&self) -> Option<PathBuf> {
        let desktop = self.desktop.as_ref()?;
        match (&desktop.source, &desktop.generate) {
            (Some(source), _) => Some(source.clone()),
            (None, Some(_)) => Some(
                Path::new(crate::config::SystemConfig::STAGE_SCRATCH_DIR)
                    .join(self.desktop_file_name()),
            ),
            (None, None) => None,
        }
    }

    /// Check declaration-level invariants.
    ///
    /// Only syntax is checked here. Whether a declared source actually
    /// exists in the stage is decided per step at apply time.
    pub fn validate(&self) -> Result<()> {
        if self.token.is_empty()
            || self.token.contains('/')
            || self.token.contains(char::is_whitespace)
        {
            return Err(StagehandError::config(format!(
                "token must be a single path-safe word, got {:?}",
                self.token
            )));
        }

        validate_stage_relative(&self.binary.source, "binary.source")?;
        if self.binary.link_name.is_empty() || self.binary.link_name.contains('/') {
            return Err(StagehandError::config(format!(
                "binary.linkName must be a bare file name, got {:?}",
                self.binary.link_name
            )));
        }

        for helper in &self.suid_helpers {
            validate_stage_relative(helper, "suidHelpers")?;
        }

        if let Some(desktop) = &self.desktop {
            match (&desktop.source, &desktop.generate) {
                (Some(source), None) => {
                    validate_stage_relative(source, "desktop.source")?;
                    for replacement in &desktop.replacements {
                        if replacement.key.is_empty()
                            || replacement.key.contains('=')
                            || replacement.key.contains('\n')
                        {
                            return Err(StagehandError::config(format!(
                                "desktop.replacements key must be a bare entry key, got {:?}",
                                replacement.key
                            )));
                        }
                        if replacement.value.contains('\n') || replacement.value.contains('\r') {
                            return Err(StagehandError::config(format!(
                                "desktop.replacements value for {:?} must be a single line",
                                replacement.key
                            )));
                        }
                    }
                }
                (None, Some(_)) => {
                    if !desktop.replacements.is_empty() {
                        return Err(StagehandError::config(
                            "desktop.replacements only apply when patching a staged file",
                        ));
                    }
                }
                (Some(_), Some(_)) => {
                    return Err(StagehandError::config(
                        "desktop.source and desktop.generate are mutually exclusive",
                    ));
                }
                (None, None) => {
                    return Err(StagehandError::config(
                        "desktop requires either source or generate",
                    ));
                }
            }
        }

        if let Some(icons) = &self.icons {
            if icons.icon_name.is_empty() || icons.icon_name.contains('/') {
                return Err(StagehandError::config(format!(
                    "icons.iconName must be a bare name, got {:?}",
                    icons.icon_name
                )));
            }
            match icons.source_pattern.as_deref() {
                Some(pattern) => {
                    if !pattern.contains("{size}") {
                        return Err(StagehandError::config(
                            "icons.sourcePattern must contain {size}",
                        ));
                    }
                    validate_stage_relative(Path::new(pattern), "icons.sourcePattern")?;
                }
                None if !icons.sizes.is_empty() => {
                    return Err(StagehandError::config(
                        "icons.sizes requires a sourcePattern",
                    ));
                }
                None => {}
            }
            if let Some(flat) = &icons.flat_source {
                validate_stage_relative(flat, "icons.flatSource")?;
            }
            if icons.source_pattern.is_none() && icons.flat_source.is_none() {
                return Err(StagehandError::config(
                    "icons requires a sourcePattern, a flatSource, or both",
                ));
            }
        }

        if let Some(policy) = &self.policy {
            validate_stage_relative(&policy.source, "policy.source")?;
            if policy.dest_name.is_empty() || policy.dest_name.contains('/') {
                return Err(StagehandError::config(format!(
                    "policy.destName must be a bare file name, got {:?}",
                    policy.dest_name
                )));
            }
        }

        for entry in &self.zap {
            if !entry.starts_with("~/") {
                return Err(StagehandError::config(format!(
                    "zap entries must start with ~/, got {entry:?}"
                )));
            }
            if entry.split('/').any(|part| part == "..") {
                return Err(StagehandError::config(format!(
                    "zap entries must not traverse upwards, got {entry:?}"
                )));
            }
        }

        Ok(())
    }
}

/// Reject stage-relative declarations that could escape the stage.
fn validate_stage_relative(path: &Path, field: &str) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(StagehandError::config(format!("{field} must not be empty")));
    }
    if path.is_absolute() {
        return Err(StagehandError::config(format!(
            "{field} must be relative to the stage, got {}",
            path.display()
        )));
    }
    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(StagehandError::config(format!(
            "{field} must not contain .., got {}",
            path.display()
        )));
    }
    Ok(())
}

/// Expand `${prefix}` and `${home}` placeholders in manifest text.
pub fn expand_placeholders(text: &str, paths: &SystemPaths) -> String {
    text.replace("${prefix}", &paths.prefix.to_string_lossy())
        .replace("${home}", &paths.home.to_string_lossy())
}

/// Resolve a `~/`-relative zap entry against a home directory.
pub fn resolve_home_path(entry: &str, home: &Path) -> PathBuf {
    match entry.strip_prefix("~/") {
        Some(rest) => home.join(rest),
        None => PathBuf::from(entry),
    }
}
