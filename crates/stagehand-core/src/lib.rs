//! Stagehand Core - headless desktop integration for pre-built Linux app bundles.
//!
//! Given a staged (already unpacked) vendor bundle and a JSON manifest,
//! stagehand links the primary binary into a prefix, installs the desktop
//! entry and icons into the user's XDG directories, and places system
//! policy files through a single batched elevation request. A host
//! packaging tool drives it at four lifecycle points; everything outside
//! the manifest's declarations is left untouched.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::path::Path;
//! use stagehand_core::{BundleManifest, ElevationPolicy, Integrator, Stage, SystemPaths};
//!
//! fn main() -> stagehand_core::Result<()> {
//!     let manifest = BundleManifest::load(Path::new("bundle.json"))?;
//!     let stage = Stage::open("/home/u/.pkgs/stage/app-1.0")?;
//!     let paths = SystemPaths::discover("/home/u/.pkgs")?;
//!     let integrator = Integrator::new(manifest, stage, paths, ElevationPolicy::Auto);
//!
//!     integrator.preflight()?;
//!     let report = integrator.postflight()?;
//!     println!("{} artifact(s) placed", report.placed.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod desktop;
pub mod elevate;
pub mod error;
pub mod lifecycle;
pub mod manifest;
pub mod plan;
pub mod platform;
pub mod policy;
pub mod receipt;
pub mod runner;
pub mod stage;

// Flat re-exports of the types hooks and hosts touch
pub use config::{ElevationPolicy, SystemPaths};
pub use desktop::{patch_entry, patch_entry_file, DesktopEntry, DesktopEntryBuilder};
pub use elevate::{ElevationMechanism, ElevationMethod};
pub use error::{Result, StagehandError};
pub use lifecycle::Integrator;
pub use manifest::BundleManifest;
pub use plan::{ArtifactPlan, PlacementStep, StepKind};
pub use receipt::{InstallReceipt, ReceiptStore};
pub use runner::{ApplyReport, PlanRunner};
pub use stage::Stage;
