//! Centralized configuration for stagehand.
//!
//! Every absolute directory the engine touches is carried in [`SystemPaths`]
//! so callers (and tests) can redirect system locations instead of relying
//! on hard-coded paths.

use crate::error::{Result, StagehandError};
use std::path::{Path, PathBuf};

/// Well-known directory names under the XDG data home.
pub struct XdgConfig;

impl XdgConfig {
    pub const DATA_DIR: &'static str = ".local/share";
    pub const APPLICATIONS_DIR_NAME: &'static str = "applications";
    pub const ICONS_DIR_NAME: &'static str = "icons";
    pub const HICOLOR_DIR_NAME: &'static str = "hicolor";
    pub const APPS_DIR_NAME: &'static str = "apps";
    pub const DESKTOP_FILE_SUFFIX: &'static str = ".desktop";
}

/// Default locations for policy files owned by the system.
pub struct SystemConfig;

impl SystemConfig {
    pub const POLKIT_ACTIONS_DIR: &'static str = "/etc/polkit-1/actions";
    pub const APPARMOR_DIR: &'static str = "/etc/apparmor.d";
    pub const BIN_DIR_NAME: &'static str = "bin";
    pub const MANIFEST_FILE_NAME: &'static str = "stagehand.json";
    pub const RECEIPT_FILE_NAME: &'static str = "stagehand-receipt.json";
    /// Scratch directory inside the stage for files the engine renders
    /// itself (generated desktop entries).
    pub const STAGE_SCRATCH_DIR: &'static str = ".stagehand";
}

/// Absolute directories used for artifact placement.
///
/// Built once per invocation and passed through plan building and the
/// runner. Fields are public so tests can point system directories into a
/// temp root.
#[derive(Debug, Clone)]
pub struct SystemPaths {
    /// The user's home directory.
    pub home: PathBuf,
    /// Installation prefix holding `bin/` and the receipt.
    pub prefix: PathBuf,
    /// `~/.local/share/applications`.
    pub applications_dir: PathBuf,
    /// `~/.local/share/icons/hicolor` theme root.
    pub icon_theme_dir: PathBuf,
    /// `~/.local/share/icons` for themeless flat icons.
    pub flat_icon_dir: PathBuf,
    /// Where polkit action files are installed. Elevated.
    pub polkit_actions_dir: PathBuf,
    /// Where AppArmor profiles are installed. Elevated.
    pub apparmor_dir: PathBuf,
}

impl SystemPaths {
    /// Derive every directory from an explicit home and prefix.
    ///
    /// System directories stay at their real defaults; tests override the
    /// fields afterwards.
    pub fn rooted(home: impl AsRef<Path>, prefix: impl AsRef<Path>) -> Self {
        let home = home.as_ref().to_path_buf();
        let data_dir = home.join(XdgConfig::DATA_DIR);
        let flat_icon_dir = data_dir.join(XdgConfig::ICONS_DIR_NAME);
        Self {
            applications_dir: data_dir.join(XdgConfig::APPLICATIONS_DIR_NAME),
            icon_theme_dir: flat_icon_dir.join(XdgConfig::HICOLOR_DIR_NAME),
            flat_icon_dir,
            polkit_actions_dir: PathBuf::from(SystemConfig::POLKIT_ACTIONS_DIR),
            apparmor_dir: PathBuf::from(SystemConfig::APPARMOR_DIR),
            home,
            prefix: prefix.as_ref().to_path_buf(),
        }
    }

    /// Resolve paths for the current user.
    pub fn discover(prefix: impl AsRef<Path>) -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| StagehandError::Config {
            message: "Could not determine home directory".to_string(),
        })?;
        Ok(Self::rooted(home, prefix))
    }

    /// `<prefix>/bin`, where the primary binary link lands.
    pub fn bin_dir(&self) -> PathBuf {
        self.prefix.join(SystemConfig::BIN_DIR_NAME)
    }

    /// `<prefix>/stagehand-receipt.json`.
    pub fn receipt_path(&self) -> PathBuf {
        self.prefix.join(SystemConfig::RECEIPT_FILE_NAME)
    }

    /// `~/.local/share/icons/hicolor/{size}x{size}/apps`.
    pub fn hicolor_size_dir(&self, size: u32) -> PathBuf {
        self.icon_theme_dir
            .join(format!("{size}x{size}"))
            .join(XdgConfig::APPS_DIR_NAME)
    }

    /// True when `path` lies outside both home and prefix, meaning a write
    /// there needs elevation.
    pub fn requires_elevation(&self, path: &Path) -> bool {
        !(path.starts_with(&self.home) || path.starts_with(&self.prefix))
    }
}

/// How the runner is allowed to escalate for system-directory writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElevationPolicy {
    /// Probe the environment and pick whatever works.
    Auto,
    /// Only `sudo`.
    Sudo,
    /// Only `pkexec`.
    Pkexec,
    /// Never escalate; elevated steps are skipped with a warning.
    Disabled,
}

impl ElevationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElevationPolicy::Auto => "auto",
            ElevationPolicy::Sudo => "sudo",
            ElevationPolicy::Pkexec => "pkexec",
            ElevationPolicy::Disabled => "disabled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Some(ElevationPolicy::Auto),
            "sudo" => Some(ElevationPolicy::Sudo),
            "pkexec" => Some(ElevationPolicy::Pkexec),
            "disabled" | "none" => Some(ElevationPolicy::Disabled),
            _ => None,
        }
    }
}

impl Default for ElevationPolicy {
    fn default() -> Self {
        ElevationPolicy::Auto
    }
}

impl std::fmt::Display for ElevationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rooted_layout() {
        let paths = SystemPaths::rooted("/home/u", "/home/u/.local/pkg");
        assert_eq!(
            paths.applications_dir,
            PathBuf::from("/home/u/.local/share/applications")
        );
        assert_eq!(
            paths.hicolor_size_dir(128),
            PathBuf::from("/home/u/.local/share/icons/hicolor/128x128/apps")
        );
        assert_eq!(paths.bin_dir(), PathBuf::from("/home/u/.local/pkg/bin"));
        assert_eq!(
            paths.apparmor_dir,
            PathBuf::from(SystemConfig::APPARMOR_DIR)
        );
    }

    #[test]
    fn test_requires_elevation() {
        let paths = SystemPaths::rooted("/home/u", "/opt/pkgtool");
        assert!(!paths.requires_elevation(Path::new("/home/u/.local/share/applications/a.desktop")));
        assert!(!paths.requires_elevation(Path::new("/opt/pkgtool/bin/app")));
        assert!(paths.requires_elevation(Path::new("/etc/apparmor.d/app")));
        assert!(paths.requires_elevation(Path::new("/usr/share/polkit-1/actions/app.policy")));
    }

    #[test]
    fn test_elevation_policy_roundtrip() {
        for policy in [
            ElevationPolicy::Auto,
            ElevationPolicy::Sudo,
            ElevationPolicy::Pkexec,
            ElevationPolicy::Disabled,
        ] {
            let parsed = ElevationPolicy::from_str(policy.as_str()).expect("Should parse");
            assert_eq!(policy, parsed);
        }
    }
}
