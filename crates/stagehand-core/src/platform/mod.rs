//! Platform integration helpers.
//!
//! Everything here is Linux-desktop oriented; the `cfg(unix)` guards keep
//! the crate compiling on other targets for tooling purposes, with the
//! operations degraded to no-ops.

pub mod paths;
pub mod permissions;

pub use paths::command_exists;
