//! Batched commands for a single elevation request.
//!
//! Every elevated operation of one apply or revert is collected into one
//! POSIX shell script and handed to the mechanism in a single invocation,
//! so the user sees at most one password or policy prompt per run.

use std::fmt::Write;
use std::path::{Path, PathBuf};

/// One elevated filesystem operation.
#[derive(Debug, Clone, PartialEq, Eq)]
enum BatchCommand {
    /// `mkdir -p` the destination parent, `cp -f`, optional `chmod`.
    Install {
        source: PathBuf,
        dest: PathBuf,
        mode: Option<u32>,
    },
    /// `rm -f` the destination.
    Remove { dest: PathBuf },
}

/// An ordered batch of elevated operations.
#[derive(Debug, Clone, Default)]
pub struct ElevatedBatch {
    commands: Vec<BatchCommand>,
}

impl ElevatedBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Queue an install of `source` (absolute) to `dest`.
    pub fn push_install(&mut self, source: &Path, dest: &Path, mode: Option<u32>) {
        self.commands.push(BatchCommand::Install {
            source: source.to_path_buf(),
            dest: dest.to_path_buf(),
            mode,
        });
    }

    /// Queue a removal of `dest`. `rm -f` keeps removal idempotent.
    pub fn push_remove(&mut self, dest: &Path) {
        self.commands.push(BatchCommand::Remove {
            dest: dest.to_path_buf(),
        });
    }

    /// Render the batch as a POSIX `sh` script.
    pub fn render(&self) -> String {
        let mut script = String::from("#!/bin/sh\nset -eu\n");

        for command in &self.commands {
            match command {
                BatchCommand::Install { source, dest, mode } => {
                    if let Some(parent) = dest.parent() {
                        writeln!(script, "mkdir -p {}", shell_quote_path(parent)).unwrap();
                    }
                    writeln!(
                        script,
                        "cp -f {} {}",
                        shell_quote_path(source),
                        shell_quote_path(dest)
                    )
                    .unwrap();
                    if let Some(mode) = mode {
                        writeln!(script, "chmod {:o} {}", mode, shell_quote_path(dest)).unwrap();
                    }
                }
                BatchCommand::Remove { dest } => {
                    writeln!(script, "rm -f {}", shell_quote_path(dest)).unwrap();
                }
            }
        }

        script
    }
}

/// Single-quote a string for `sh`, escaping embedded quotes.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn shell_quote_path(path: &Path) -> String {
    shell_quote(&path.to_string_lossy())
}
