//! Plan execution: apply and revert.
//!
//! Placement rules the whole engine leans on:
//! - a missing staged source is a per-step skip, except the primary
//!   binary, whose failure aborts the install;
//! - every elevated operation of a run collapses into one mechanism
//!   invocation, and elevation problems downgrade to report warnings
//!   unless the binary itself needed elevation;
//! - revert is idempotent, removing nothing that is already gone.

use crate::config::SystemPaths;
use crate::elevate::{ElevatedBatch, ElevationMechanism};
use crate::error::{Result, StagehandError};
use crate::plan::{ArtifactPlan, PlacementStep, StepKind};
use crate::platform::permissions::{set_executable, set_mode};
use crate::stage::Stage;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of an apply or revert.
///
/// `warnings` carries elevation problems and per-step failures that did
/// not abort the run; `skipped` lists destinations that were not touched.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyReport {
    pub placed: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// How the runner escalates when a step needs it.
enum Escalation {
    Available(Box<dyn ElevationMechanism>),
    Unavailable(String),
}

/// Executes artifact plans against the filesystem.
pub struct PlanRunner {
    stage: Stage,
    paths: SystemPaths,
    escalation: Escalation,
}

impl PlanRunner {
    /// Runner with a working elevation mechanism.
    pub fn new(stage: Stage, paths: SystemPaths, mechanism: Box<dyn ElevationMechanism>) -> Self {
        Self {
            stage,
            paths,
            escalation: Escalation::Available(mechanism),
        }
    }

    /// Runner that cannot escalate; elevated steps are skipped with a
    /// warning carrying `reason`.
    pub fn without_elevation(
        stage: Stage,
        paths: SystemPaths,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            stage,
            paths,
            escalation: Escalation::Unavailable(reason.into()),
        }
    }

    /// Place every artifact the plan names.
    pub fn apply(&self, plan: &ArtifactPlan) -> Result<ApplyReport> {
        let mut report = ApplyReport::default();
        let (direct, elevated) = plan.split_by_elevation();

        for step in direct {
            self.apply_direct(step, &mut report)?;
        }

        if !elevated.is_empty() {
            self.apply_elevated(&elevated, &mut report)?;
        }

        info!(
            "Applied plan for {}: {} placed, {} skipped, {} warning(s)",
            plan.token,
            report.placed.len(),
            report.skipped.len(),
            report.warnings.len()
        );
        Ok(report)
    }

    /// Remove every destination the plan names, in reverse order.
    ///
    /// Absent destinations are success, so a second revert is a no-op.
    pub fn revert(&self, plan: &ArtifactPlan) -> Result<ApplyReport> {
        let mut report = ApplyReport::default();
        let mut elevated_removals: Vec<&PlacementStep> = Vec::new();

        for step in plan.steps.iter().rev() {
            if step.kind == StepKind::SuidFixup {
                // Stage-side mutation; the stage is the host's to delete.
                continue;
            }
            if step.elevated {
                elevated_removals.push(step);
                continue;
            }
            if remove_if_present(&step.dest, &mut report) {
                prune_empty_parents(&step.dest, &[&self.paths.home, &self.paths.prefix]);
            }
        }

        if !elevated_removals.is_empty() {
            self.revert_elevated(&elevated_removals, &mut report);
        }

        info!(
            "Reverted plan for {}: {} removed, {} warning(s)",
            plan.token,
            report.removed.len(),
            report.warnings.len()
        );
        Ok(report)
    }

    fn apply_direct(&self, step: &PlacementStep, report: &mut ApplyReport) -> Result<()> {
        let source = self.stage.resolve(&step.source);

        if !source.is_file() {
            if step.kind == StepKind::Binary {
                return Err(StagehandError::MissingSource(step.source.clone()));
            }
            warn!(
                "Staged file missing, skipping {:?} step: {}",
                step.kind,
                step.source.display()
            );
            report.skipped.push(step.dest.clone());
            return Ok(());
        }

        let result = match step.kind {
            StepKind::SuidFixup => {
                // Source and destination are the same staged file.
                set_mode(&step.dest, step.mode.unwrap_or(0o755))
            }
            StepKind::Binary => place_binary(&source, &step.dest),
            StepKind::DesktopEntry | StepKind::Icon | StepKind::Policy => {
                place_copy(&source, &step.dest, step.mode)
            }
        };

        match result {
            Ok(()) => {
                debug!("Placed {}", step.dest.display());
                report.placed.push(step.dest.clone());
                Ok(())
            }
            Err(e) if step.kind == StepKind::Binary => Err(e),
            Err(e) => {
                warn!("Failed to place {}: {}", step.dest.display(), e);
                report.warnings.push(format!("{}: {}", step.dest.display(), e));
                report.skipped.push(step.dest.clone());
                Ok(())
            }
        }
    }

    fn apply_elevated(&self, steps: &[&PlacementStep], report: &mut ApplyReport) -> Result<()> {
        let mut batch = ElevatedBatch::new();
        let mut dests = Vec::new();
        let mut binary_elevated = false;

        for step in steps {
            let source = self.stage.resolve(&step.source);
            if !source.is_file() {
                if step.kind == StepKind::Binary {
                    return Err(StagehandError::MissingSource(step.source.clone()));
                }
                warn!(
                    "Staged file missing, skipping elevated step: {}",
                    step.source.display()
                );
                report.skipped.push(step.dest.clone());
                continue;
            }
            binary_elevated |= step.kind == StepKind::Binary;
            batch.push_install(&source, &step.dest, step.mode);
            dests.push(step.dest.clone());
        }

        if batch.is_empty() {
            return Ok(());
        }

        let mechanism = match &self.escalation {
            Escalation::Available(mechanism) => mechanism,
            Escalation::Unavailable(reason) => {
                let err = StagehandError::ElevationUnavailable {
                    reason: reason.clone(),
                };
                if binary_elevated {
                    // The binary must land; nothing to downgrade here.
                    return Err(err);
                }
                warn!("{}", err);
                report
                    .warnings
                    .push(format!("Skipped {} elevated step(s): {}", dests.len(), err));
                report.skipped.extend(dests);
                return Ok(());
            }
        };

        match mechanism.run_batch(&batch) {
            Ok(()) => {
                report.placed.extend(dests);
                Ok(())
            }
            Err(e) if binary_elevated => Err(e),
            Err(e) => {
                warn!("Elevated batch via {} failed: {}", mechanism.describe(), e);
                report
                    .warnings
                    .push(format!("Elevated batch failed: {}", e));
                report.skipped.extend(dests);
                Ok(())
            }
        }
    }

    fn revert_elevated(&self, steps: &[&PlacementStep], report: &mut ApplyReport) {
        let mut batch = ElevatedBatch::new();
        let mut dests = Vec::new();

        // Probing first avoids prompting when there is nothing to remove.
        for step in steps {
            if step.dest.symlink_metadata().is_ok() {
                batch.push_remove(&step.dest);
                dests.push(step.dest.clone());
            }
        }

        if batch.is_empty() {
            return;
        }

        match &self.escalation {
            Escalation::Available(mechanism) => match mechanism.run_batch(&batch) {
                Ok(()) => report.removed.extend(dests),
                Err(e) => {
                    warn!("Elevated removal via {} failed: {}", mechanism.describe(), e);
                    report
                        .warnings
                        .push(format!("Elevated removal failed: {}", e));
                }
            },
            Escalation::Unavailable(reason) => {
                warn!("Cannot remove {} elevated artifact(s): {}", dests.len(), reason);
                report.warnings.push(format!(
                    "Left {} elevated artifact(s) in place: {}",
                    dests.len(),
                    reason
                ));
            }
        }
    }
}

/// Copy with parent creation and an optional exact mode.
fn place_copy(source: &Path, dest: &Path, mode: Option<u32>) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| StagehandError::io_with_path(e, parent))?;
    }
    fs::copy(source, dest).map_err(|e| StagehandError::io_with_path(e, dest))?;
    if let Some(mode) = mode {
        set_mode(dest, mode)?;
    }
    Ok(())
}

/// Link the primary binary into place, copying when linking is not an
/// option. Any existing destination is replaced.
fn place_binary(source: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| StagehandError::io_with_path(e, parent))?;
    }
    if dest.symlink_metadata().is_ok() {
        fs::remove_file(dest).map_err(|e| StagehandError::io_with_path(e, dest))?;
    }

    #[cfg(unix)]
    {
        match std::os::unix::fs::symlink(source, dest) {
            Ok(()) => return Ok(()),
            Err(e) => {
                debug!(
                    "Symlink {} -> {} failed ({}), copying instead",
                    source.display(),
                    dest.display(),
                    e
                );
            }
        }
    }

    fs::copy(source, dest).map_err(|e| StagehandError::SymlinkFailed {
        src: source.to_path_buf(),
        dest: dest.to_path_buf(),
        reason: e.to_string(),
    })?;
    set_executable(dest)
}

/// Remove a file or symlink; absence is success.
fn remove_if_present(dest: &Path, report: &mut ApplyReport) -> bool {
    // symlink_metadata so dangling links still count as present.
    if dest.symlink_metadata().is_err() {
        debug!("Already absent: {}", dest.display());
        return false;
    }
    match fs::remove_file(dest) {
        Ok(()) => {
            debug!("Removed {}", dest.display());
            report.removed.push(dest.to_path_buf());
            true
        }
        Err(e) => {
            warn!("Failed to remove {}: {}", dest.display(), e);
            report
                .warnings
                .push(format!("{}: {}", dest.display(), e));
            false
        }
    }
}

/// Remove directories a revert left empty, walking up from `path` and
/// stopping at the given roots or the first non-empty directory.
fn prune_empty_parents(path: &Path, roots: &[&Path]) {
    let mut current = path.parent();
    while let Some(dir) = current {
        if roots.iter().any(|root| dir == *root) {
            break;
        }
        match fs::remove_dir(dir) {
            Ok(()) => debug!("Pruned empty directory {}", dir.display()),
            Err(_) => break,
        }
        current = dir.parent();
    }
}
