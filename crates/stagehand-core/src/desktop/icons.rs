//! Icon cache maintenance.
//!
//! Bundles ship pre-rendered PNGs per size, so installation is plain file
//! placement done by the runner. What remains here is nudging the desktop
//! environment to notice: both cache tools are optional and their absence
//! or failure never fails an install.

use crate::config::SystemPaths;
use crate::platform::command_exists;
use std::process::Command;
use tracing::debug;

/// Sizes vendors commonly ship pre-rendered icons for.
pub const STANDARD_ICON_SIZES: [u32; 7] = [16, 24, 32, 48, 64, 128, 256];

/// Refresh icon caches after placing or removing theme icons.
pub fn refresh_icon_caches(paths: &SystemPaths) {
    if command_exists("gtk-update-icon-cache") {
        let result = Command::new("gtk-update-icon-cache")
            .args(["-f", "-t"])
            .arg(&paths.icon_theme_dir)
            .output();
        match result {
            Ok(output) if output.status.success() => {
                debug!("Refreshed GTK icon cache");
            }
            Ok(output) => {
                debug!(
                    "gtk-update-icon-cache failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                );
            }
            Err(e) => debug!("Failed to run gtk-update-icon-cache: {}", e),
        }
    }

    if command_exists("xdg-icon-resource") {
        let _ = Command::new("xdg-icon-resource")
            .args(["forceupdate", "--theme", "hicolor"])
            .output();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sizes_are_ascending() {
        let mut sorted = STANDARD_ICON_SIZES;
        sorted.sort_unstable();
        assert_eq!(sorted, STANDARD_ICON_SIZES);
    }

    #[test]
    fn test_refresh_tolerates_missing_theme_dir() {
        let temp_dir = TempDir::new().unwrap();
        let paths = SystemPaths::rooted(temp_dir.path(), temp_dir.path().join("pkgs"));
        // Nothing to assert beyond "does not panic or error".
        refresh_icon_caches(&paths);
    }
}
