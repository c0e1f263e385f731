//! Elevation mechanisms.
//!
//! A mechanism takes a rendered batch and runs it with the privileges the
//! platform can offer: directly when already root, through `sudo`'s
//! password prompt, or through the polkit agent via `pkexec`. The trait
//! seam exists so the runner can be driven by a deterministic fake in
//! tests.

use super::batch::ElevatedBatch;
use super::ElevationMethod;
use crate::error::{Result, StagehandError};
use std::cell::RefCell;
use std::io::Write;
use std::process::Command;
use std::rc::Rc;
use tracing::{debug, info};

/// Executes elevated batches.
pub trait ElevationMechanism {
    /// Which prompt style this mechanism presents.
    fn method(&self) -> ElevationMethod;

    /// Human-readable description for logs and warnings.
    fn describe(&self) -> String;

    /// Run the whole batch in one invocation.
    fn run_batch(&self, batch: &ElevatedBatch) -> Result<()>;
}

/// Write the batch script to a temp file and run it under `wrapper`.
///
/// The temp file handle stays alive until the child exits; stdio is
/// inherited so interactive prompts reach the terminal.
fn run_script(batch: &ElevatedBatch, wrapper: Option<&str>) -> Result<()> {
    let mut script = tempfile::NamedTempFile::new()?;
    script.write_all(batch.render().as_bytes())?;
    script.flush()?;

    let mut command = match wrapper {
        Some(wrapper) => {
            let mut c = Command::new(wrapper);
            c.arg("/bin/sh").arg(script.path());
            c
        }
        None => {
            let mut c = Command::new("/bin/sh");
            c.arg(script.path());
            c
        }
    };

    debug!(
        "Running elevated batch of {} command(s) via {}",
        batch.len(),
        wrapper.unwrap_or("sh")
    );

    let status = command.status().map_err(|e| StagehandError::Io {
        message: format!("failed to spawn {}", wrapper.unwrap_or("sh")),
        path: None,
        source: Some(e),
    })?;

    if status.success() {
        Ok(())
    } else {
        Err(StagehandError::ElevationDenied {
            status: status.code(),
        })
    }
}

/// Already running as root; no prompt needed.
pub struct DirectMechanism;

impl ElevationMechanism for DirectMechanism {
    fn method(&self) -> ElevationMethod {
        ElevationMethod::None
    }

    fn describe(&self) -> String {
        "direct (already root)".to_string()
    }

    fn run_batch(&self, batch: &ElevatedBatch) -> Result<()> {
        run_script(batch, None)
    }
}

/// Terminal password prompt via `sudo`.
pub struct SudoMechanism;

impl ElevationMechanism for SudoMechanism {
    fn method(&self) -> ElevationMethod {
        ElevationMethod::PasswordPrompt
    }

    fn describe(&self) -> String {
        "sudo (password prompt)".to_string()
    }

    fn run_batch(&self, batch: &ElevatedBatch) -> Result<()> {
        info!("Requesting elevation via sudo");
        run_script(batch, Some("sudo"))
    }
}

/// Polkit agent dialog via `pkexec`.
pub struct PkexecMechanism;

impl ElevationMechanism for PkexecMechanism {
    fn method(&self) -> ElevationMethod {
        ElevationMethod::PolicyAgent
    }

    fn describe(&self) -> String {
        "pkexec (polkit agent)".to_string()
    }

    fn run_batch(&self, batch: &ElevatedBatch) -> Result<()> {
        info!("Requesting elevation via pkexec");
        run_script(batch, Some("pkexec"))
    }
}

/// Deterministic stand-in for tests.
///
/// Records every rendered batch script. With `executing` set it runs the
/// script unprivileged, which exercises the whole batch path against
/// redirected system directories; with `deny` set it refuses like a
/// dismissed prompt.
#[derive(Clone)]
pub struct FakeMechanism {
    method: ElevationMethod,
    deny_status: Option<i32>,
    executing: bool,
    runs: Rc<RefCell<Vec<String>>>,
}

impl FakeMechanism {
    pub fn new() -> Self {
        Self {
            method: ElevationMethod::PolicyAgent,
            deny_status: None,
            executing: false,
            runs: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Refuse every batch the way a dismissed prompt would.
    pub fn denying(status: i32) -> Self {
        Self {
            deny_status: Some(status),
            ..Self::new()
        }
    }

    /// Actually run each batch (unprivileged) after recording it.
    pub fn executing() -> Self {
        Self {
            executing: true,
            ..Self::new()
        }
    }

    /// Rendered scripts seen so far, one per `run_batch` call.
    pub fn recorded(&self) -> Vec<String> {
        self.runs.borrow().clone()
    }

    pub fn invocation_count(&self) -> usize {
        self.runs.borrow().len()
    }
}

impl Default for FakeMechanism {
    fn default() -> Self {
        Self::new()
    }
}

impl ElevationMechanism for FakeMechanism {
    fn method(&self) -> ElevationMethod {
        self.method
    }

    fn describe(&self) -> String {
        "fake (test double)".to_string()
    }

    fn run_batch(&self, batch: &ElevatedBatch) -> Result<()> {
        self.runs.borrow_mut().push(batch.render());
        if let Some(status) = self.deny_status {
            return Err(StagehandError::ElevationDenied {
                status: Some(status),
            });
        }
        if self.executing {
            run_script(batch, None)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_method_mapping() {
        assert_eq!(DirectMechanism.method(), ElevationMethod::None);
        assert_eq!(SudoMechanism.method(), ElevationMethod::PasswordPrompt);
        assert_eq!(PkexecMechanism.method(), ElevationMethod::PolicyAgent);
    }

    #[test]
    fn test_fake_records_one_script_per_batch() {
        let fake = FakeMechanism::new();
        let mut batch = ElevatedBatch::new();
        batch.push_remove(Path::new("/etc/apparmor.d/app"));

        fake.run_batch(&batch).unwrap();
        fake.run_batch(&batch).unwrap();

        assert_eq!(fake.invocation_count(), 2);
        assert!(fake.recorded()[0].contains("rm -f '/etc/apparmor.d/app'"));
    }

    #[test]
    fn test_fake_denies() {
        let fake = FakeMechanism::denying(126);
        let batch = ElevatedBatch::new();
        let err = fake.run_batch(&batch).unwrap_err();
        assert!(matches!(
            err,
            StagehandError::ElevationDenied { status: Some(126) }
        ));
        assert_eq!(fake.invocation_count(), 1);
    }

    #[test]
    fn test_executing_fake_runs_the_script() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let source = temp_dir.path().join("payload");
        std::fs::write(&source, b"data").unwrap();
        let dest = temp_dir.path().join("placed/payload");

        let fake = FakeMechanism::executing();
        let mut batch = ElevatedBatch::new();
        batch.push_install(&source, &dest, Some(0o644));
        fake.run_batch(&batch).unwrap();

        assert!(dest.is_file());
        assert_eq!(std::fs::read(&dest).unwrap(), b"data");
    }
}
