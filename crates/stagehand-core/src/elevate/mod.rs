//! Privilege escalation: method probing and batched execution.
//!
//! Whether escalation is possible, and through what, is a property of the
//! running system that can change between invocations (an agent appears
//! with a desktop session, sudo gets installed). [`probe`] therefore
//! detects capabilities fresh on every call and nothing caches its result.

pub mod batch;
pub mod mechanism;

pub use batch::ElevatedBatch;
pub use mechanism::{
    DirectMechanism, ElevationMechanism, FakeMechanism, PkexecMechanism, SudoMechanism,
};

use crate::config::ElevationPolicy;
use crate::error::{Result, StagehandError};
use crate::platform::command_exists;
use tracing::debug;

/// How an elevation request is presented to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElevationMethod {
    /// No interaction; the process already has the needed privileges.
    None,
    /// Terminal password prompt (`sudo`).
    PasswordPrompt,
    /// Desktop policy agent dialog (`pkexec`).
    PolicyAgent,
}

impl ElevationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElevationMethod::None => "none",
            ElevationMethod::PasswordPrompt => "password-prompt",
            ElevationMethod::PolicyAgent => "policy-agent",
        }
    }
}

impl std::fmt::Display for ElevationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the running system offers for escalation.
#[derive(Debug, Clone, Copy)]
struct Capabilities {
    root: bool,
    sudo: bool,
    pkexec: bool,
    display: bool,
}

impl Capabilities {
    fn detect() -> Self {
        Self {
            root: effective_uid_is_root(),
            sudo: command_exists("sudo"),
            pkexec: command_exists("pkexec"),
            display: has_display_session(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Choice {
    Direct,
    Sudo,
    Pkexec,
}

/// Pick a mechanism from policy and capabilities.
///
/// Root always short-circuits. Under `Auto`, a polkit agent is only
/// plausible inside a display session, so `pkexec` is preferred there and
/// tried last otherwise.
fn choose(policy: ElevationPolicy, caps: Capabilities) -> Result<Choice> {
    if let ElevationPolicy::Disabled = policy {
        return Err(StagehandError::ElevationUnavailable {
            reason: "disabled by configuration".to_string(),
        });
    }

    if caps.root {
        return Ok(Choice::Direct);
    }

    match policy {
        ElevationPolicy::Sudo => {
            if caps.sudo {
                Ok(Choice::Sudo)
            } else {
                Err(StagehandError::ElevationUnavailable {
                    reason: "sudo not found on PATH".to_string(),
                })
            }
        }
        ElevationPolicy::Pkexec => {
            if caps.pkexec {
                Ok(Choice::Pkexec)
            } else {
                Err(StagehandError::ElevationUnavailable {
                    reason: "pkexec not found on PATH".to_string(),
                })
            }
        }
        ElevationPolicy::Auto => {
            if caps.pkexec && caps.display {
                Ok(Choice::Pkexec)
            } else if caps.sudo {
                Ok(Choice::Sudo)
            } else if caps.pkexec {
                Ok(Choice::Pkexec)
            } else {
                Err(StagehandError::ElevationUnavailable {
                    reason: "no sudo or pkexec on PATH".to_string(),
                })
            }
        }
        ElevationPolicy::Disabled => unreachable!("handled above"),
    }
}

/// Probe the system and return a usable mechanism.
///
/// Called once per apply/revert; the result is never cached across runs.
pub fn probe(policy: ElevationPolicy) -> Result<Box<dyn ElevationMechanism>> {
    let caps = Capabilities::detect();
    let choice = choose(policy, caps)?;
    debug!(
        "Elevation probe: policy={} root={} sudo={} pkexec={} display={} -> {:?}",
        policy, caps.root, caps.sudo, caps.pkexec, caps.display, choice
    );
    Ok(match choice {
        Choice::Direct => Box::new(DirectMechanism),
        Choice::Sudo => Box::new(SudoMechanism),
        Choice::Pkexec => Box::new(PkexecMechanism),
    })
}

fn effective_uid_is_root() -> bool {
    #[cfg(unix)]
    {
        nix::unistd::Uid::effective().is_root()
    }

    #[cfg(not(unix))]
    {
        false
    }
}

fn has_display_session() -> bool {
    std::env::var_os("DISPLAY").is_some_and(|v| !v.is_empty())
        || std::env::var_os("WAYLAND_DISPLAY").is_some_and(|v| !v.is_empty())
}
