//! Access to the staging root.
//!
//! The stage is the directory where the host package manager extracted the
//! vendor archive. Manifest paths are relative to it. Plan building never
//! touches it; the lifecycle hooks and the runner do.

use crate::error::{Result, StagehandError};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Read/write handle on an extracted bundle.
#[derive(Debug, Clone)]
pub struct Stage {
    root: PathBuf,
}

impl Stage {
    /// Open an existing staging root.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(StagehandError::NotADirectory(root));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a stage-relative entry.
    pub fn resolve(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }

    pub fn exists(&self, relative: &Path) -> bool {
        self.resolve(relative).is_file()
    }

    /// All `.desktop` files shipped in the bundle, stage-relative.
    ///
    /// Walks the whole tree; vendors disagree about where entries live
    /// (`usr/share/applications`, `opt/<vendor>/...`).
    pub fn desktop_files(&self) -> Vec<PathBuf> {
        let mut found = Vec::new();
        for entry in WalkDir::new(&self.root).into_iter().filter_map(|e| e.ok()) {
            if entry.file_type().is_file()
                && crate::platform::paths::is_desktop_file(entry.path())
            {
                if let Ok(relative) = entry.path().strip_prefix(&self.root) {
                    found.push(relative.to_path_buf());
                }
            }
        }
        debug!("Found {} desktop file(s) in stage", found.len());
        found
    }
}
