//! Path and command lookup utilities.

use std::path::Path;

/// True when `name` resolves on the caller's PATH.
///
/// Delegated to `which`; a host without it reports every probe absent.
pub fn command_exists(name: &str) -> bool {
    std::process::Command::new("which")
        .arg(name)
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

/// Check whether a path names a freedesktop `.desktop` entry.
pub fn is_desktop_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "desktop")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_command_exists_for_shell() {
        assert!(command_exists("sh"));
    }

    #[test]
    fn test_command_exists_missing() {
        assert!(!command_exists("definitely-not-a-real-command-xyz"));
    }

    #[test]
    fn test_is_desktop_file() {
        assert!(is_desktop_file(&PathBuf::from(
            "usr/share/applications/app.desktop"
        )));
        assert!(!is_desktop_file(&PathBuf::from("usr/share/doc/app.txt")));
        assert!(!is_desktop_file(&PathBuf::from("desktop")));
    }
}
