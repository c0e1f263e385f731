//! Install lifecycle orchestration.
//!
//! [`Integrator`] ties the pieces together for the four hooks a host
//! packaging tool drives: `preflight` prepares the staged desktop entry,
//! `postflight` executes the plan and writes the receipt,
//! `uninstall_preflight` removes elevated artifacts, and
//! `uninstall_postflight` removes the rest. `zap` and `caveats` surface
//! the manifest's user-data list and free-text notes.

use crate::config::{ElevationPolicy, SystemPaths};
use crate::desktop::{patch_entry_file, DesktopEntry};
use crate::desktop::icons::refresh_icon_caches;
use crate::elevate;
use crate::error::Result;
use crate::manifest::{expand_placeholders, resolve_home_path, BundleManifest, Replacement};
use crate::plan::ArtifactPlan;
use crate::policy::PolicyScriptGenerator;
use crate::receipt::{InstallReceipt, ReceiptStore};
use crate::runner::{ApplyReport, PlanRunner};
use crate::stage::Stage;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Drives desktop integration for one staged bundle.
pub struct Integrator {
    manifest: BundleManifest,
    stage: Stage,
    paths: SystemPaths,
    policy: ElevationPolicy,
}

impl Integrator {
    pub fn new(
        manifest: BundleManifest,
        stage: Stage,
        paths: SystemPaths,
        policy: ElevationPolicy,
    ) -> Self {
        Self {
            manifest,
            stage,
            paths,
            policy,
        }
    }

    pub fn manifest(&self) -> &BundleManifest {
        &self.manifest
    }

    /// The placement plan for this bundle.
    pub fn plan(&self) -> Result<ArtifactPlan> {
        ArtifactPlan::build(&self.manifest, self.stage.root(), &self.paths)
    }

    /// Prepare the staged desktop entry.
    ///
    /// Patches the vendor-shipped file in place, or renders a generated
    /// entry into the stage scratch directory. A bundle without a desktop
    /// spec is a no-op; a declared-but-missing staged file is skipped.
    pub fn preflight(&self) -> Result<()> {
        let desktop = match &self.manifest.desktop {
            Some(desktop) => desktop,
            None => {
                debug!("No desktop entry declared for {}", self.manifest.token);
                return Ok(());
            }
        };

        if let Some(source) = &desktop.source {
            if !self.stage.exists(source) {
                warn!(
                    "Staged desktop entry missing, skipping patch: {}",
                    source.display()
                );
                for shipped in self.stage.desktop_files() {
                    debug!("Stage ships {}", shipped.display());
                }
                return Ok(());
            }
            let replacements: Vec<Replacement> = desktop
                .replacements
                .iter()
                .map(|r| Replacement {
                    key: r.key.clone(),
                    value: expand_placeholders(&r.value, &self.paths),
                })
                .collect();
            let path = self.stage.resolve(source);
            let changed = patch_entry_file(&path, &replacements)?;
            info!(
                "Patched desktop entry {} ({} replacement(s), changed: {})",
                source.display(),
                replacements.len(),
                changed
            );
        } else if let Some(spec) = &desktop.generate {
            let exec_base = self
                .paths
                .bin_dir()
                .join(&self.manifest.binary.link_name)
                .display()
                .to_string();
            let entry = DesktopEntry::from_spec(spec, &exec_base);
            // With generate set, the staged source is the scratch location.
            if let Some(rel) = self.manifest.staged_desktop_source() {
                let out = self.stage.resolve(&rel);
                entry.write_to_file(&out)?;
                info!("Rendered desktop entry into stage: {}", rel.display());
            }
        }
        Ok(())
    }

    /// Execute the plan, then record and announce the outcome.
    ///
    /// Elevation problems and per-step skips surface as report warnings;
    /// only a failed primary binary placement is an error.
    pub fn postflight(&self) -> Result<ApplyReport> {
        info!(
            "Integrating {} {}",
            self.manifest.app_name, self.manifest.version
        );
        let plan = self.plan()?;
        let runner = self.probing_runner();
        let mut report = runner.apply(&plan)?;

        self.offer_policy_script(&report.placed, &mut report.warnings);

        let receipt = InstallReceipt::from_outcome(&plan, &self.manifest.version, &report);
        if let Err(e) = ReceiptStore::new(&self.paths).save(&receipt) {
            warn!("Failed to write install receipt: {}", e);
            report
                .warnings
                .push(format!("Install receipt not written: {e}"));
        }

        if self.manifest.icons.is_some() {
            refresh_icon_caches(&self.paths);
        }
        Ok(report)
    }

    /// Remove elevated artifacts, batched into one escalation.
    pub fn uninstall_preflight(&self) -> Result<ApplyReport> {
        let plan = self.subplan(true)?;
        if plan.is_empty() {
            return Ok(ApplyReport::default());
        }
        let runner = self.probing_runner();
        runner.revert(&plan)
    }

    /// Remove unelevated artifacts, the policy script, and the receipt.
    pub fn uninstall_postflight(&self) -> Result<ApplyReport> {
        let store = ReceiptStore::new(&self.paths);
        match store.load()? {
            Some(receipt) => info!(
                "Uninstalling {} {} (installed {})",
                receipt.token, receipt.version, receipt.installed_at
            ),
            None => debug!("No install receipt for {}", self.manifest.token),
        }

        let mut report = ApplyReport::default();
        // Script and receipt go first so the revert can prune their dirs.
        if let Err(e) = PolicyScriptGenerator::new(&self.paths).remove(&self.manifest.token) {
            warn!("Failed to remove policy setup script: {}", e);
            report
                .warnings
                .push(format!("Policy setup script not removed: {e}"));
        }
        if let Err(e) = store.remove() {
            warn!("Failed to remove install receipt: {}", e);
            report
                .warnings
                .push(format!("Install receipt not removed: {e}"));
        }

        let plan = self.subplan(false)?;
        let runner = PlanRunner::without_elevation(
            self.stage.clone(),
            self.paths.clone(),
            "uninstall postflight touches no elevated paths",
        );
        let reverted = runner.revert(&plan)?;
        report.removed = reverted.removed;
        report.skipped = reverted.skipped;
        report.warnings.extend(reverted.warnings);
        Ok(report)
    }

    /// Delete the manifest's user-data paths. Never run implicitly.
    ///
    /// Returns the paths actually removed; absent entries are skipped.
    pub fn zap(&self) -> Result<Vec<PathBuf>> {
        let mut removed = Vec::new();
        for entry in &self.manifest.zap {
            let path = resolve_home_path(entry, &self.paths.home);
            let meta = match path.symlink_metadata() {
                Ok(meta) => meta,
                Err(_) => {
                    debug!("Zap target already absent: {}", path.display());
                    continue;
                }
            };
            let result = if meta.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match result {
                Ok(()) => {
                    info!("Zapped {}", path.display());
                    removed.push(path);
                }
                Err(e) => warn!("Failed to zap {}: {}", path.display(), e),
            }
        }
        Ok(removed)
    }

    /// The manifest's caveats with `${prefix}`/`${home}` expanded.
    pub fn caveats(&self) -> Option<String> {
        self.manifest
            .caveats
            .as_ref()
            .map(|text| expand_placeholders(text, &self.paths))
    }

    /// Probe the environment for an escalation mechanism, downgrading an
    /// unavailable result to a runner that warns instead.
    fn probing_runner(&self) -> PlanRunner {
        match elevate::probe(self.policy) {
            Ok(mechanism) => PlanRunner::new(self.stage.clone(), self.paths.clone(), mechanism),
            Err(e) => {
                debug!("Elevation probe: {}", e);
                PlanRunner::without_elevation(self.stage.clone(), self.paths.clone(), e.to_string())
            }
        }
    }

    /// The plan restricted to elevated or unelevated steps.
    fn subplan(&self, elevated: bool) -> Result<ArtifactPlan> {
        let plan = self.plan()?;
        Ok(ArtifactPlan {
            token: plan.token.clone(),
            steps: plan
                .steps
                .iter()
                .filter(|step| step.elevated == elevated)
                .cloned()
                .collect(),
        })
    }

    /// When the policy file did not land, leave a setup script behind.
    fn offer_policy_script(&self, placed: &[PathBuf], warnings: &mut Vec<String>) {
        let pending = self.manifest.policy.as_ref().is_some_and(|policy| {
            !placed.contains(&policy.dest_under(&self.paths)) && self.stage.exists(&policy.source)
        });
        if !pending {
            return;
        }
        match PolicyScriptGenerator::new(&self.paths).generate(&self.manifest, &self.stage) {
            Ok(Some(path)) => warnings.push(format!(
                "Policy file not installed; run {} to finish setup",
                path.display()
            )),
            Ok(None) => {}
            Err(e) => {
                warn!("Failed to write policy setup script: {}", e);
                warnings.push(format!("Policy setup script not written: {e}"));
            }
        }
    }
}
