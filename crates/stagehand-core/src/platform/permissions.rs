//! File permission handling.
//!
//! Chromium-derived bundles ship a setuid sandbox helper that loses its
//! mode bits in transit through tar/ar archives, so the engine has to be
//! able to restore an exact mode including the setuid bit.

use crate::error::{Result, StagehandError};
use std::path::Path;
use tracing::debug;

/// Mode for setuid-root sandbox helpers (`rwsr-xr-x`).
pub const MODE_SUID_HELPER: u32 = 0o4755;

/// Mode for regular executables and scripts.
pub const MODE_EXECUTABLE: u32 = 0o755;

/// Mode for policy files readable by everyone, writable by root.
pub const MODE_POLICY_FILE: u32 = 0o644;

/// Set an exact permission mode on a file.
///
/// # Platform Behavior
/// - **Linux/macOS**: Sets the given octal mode verbatim, setuid included
/// - **Windows**: No-op
pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = std::fs::metadata(path)
            .map_err(|e| StagehandError::io_with_path(e, path))?;
        let mut permissions = metadata.permissions();
        permissions.set_mode(mode);
        std::fs::set_permissions(path, permissions)
            .map_err(|e| StagehandError::io_with_path(e, path))?;
        debug!("Set mode {:o} on: {}", mode, path.display());
    }

    #[cfg(not(unix))]
    {
        let _ = (path, mode);
    }

    Ok(())
}

/// Make a file executable (mode 0o755).
pub fn set_executable(path: &Path) -> Result<()> {
    set_mode(path, MODE_EXECUTABLE)
}

/// True when any of the three execute bits is set.
///
/// # Platform Behavior
/// - **Linux/macOS**: user, group, or other execute bit
/// - **Windows**: always false; nothing here executes on Windows
pub fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(path)
            .map(|m| m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }

    #[cfg(not(unix))]
    {
        let _ = path;
        false
    }
}

/// True when the setuid bit is set.
pub fn is_suid(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(path)
            .map(|m| m.permissions().mode() & 0o4000 != 0)
            .unwrap_or(false)
    }

    #[cfg(not(unix))]
    {
        let _ = path;
        false
    }
}
