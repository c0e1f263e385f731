//! Desktop entry handling: generation, patching, icon cache refresh.

pub mod entry;
pub mod icons;
pub mod patch;

pub use entry::{DesktopAction, DesktopEntry, DesktopEntryBuilder};
pub use patch::{patch_entry, patch_entry_file};
