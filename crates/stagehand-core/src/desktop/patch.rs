//! In-place rewriting of `Key=Value` lines in desktop entry text.
//!
//! The staged entry ships with the vendor's install paths baked into
//! `Exec=` and `Icon=`; before installing it we swap those lines for ones
//! pointing at the placed binary and icon. Everything else in the file,
//! including line order, comments, encoding, and line endings, passes
//! through byte-for-byte. Keys that are not already present are never
//! added.

use crate::error::{Result, StagehandError};
use crate::manifest::Replacement;
use std::path::Path;
use tracing::debug;

/// Replace whole `Key=` lines in `text`.
///
/// A line is rewritten to `Key=newValue` iff the text before its first
/// `=` is exactly a declared key. Idempotent: patching already-patched
/// text yields identical text.
pub fn patch_entry(text: &str, replacements: &[Replacement]) -> String {
    let mut out = String::with_capacity(text.len());

    for piece in text.split_inclusive('\n') {
        let (content, terminator) = split_terminator_suffix(piece);

        match matching_replacement(content, replacements) {
            Some(replacement) => {
                out.push_str(&replacement.key);
                out.push('=');
                out.push_str(&replacement.value);
                out.push_str(terminator);
            }
            None => out.push_str(piece),
        }
    }

    out
}

/// Patch a staged entry file in place.
///
/// Returns whether the file changed. The file is rewritten only when the
/// patched text differs, so repeated runs settle after the first.
pub fn patch_entry_file(path: &Path, replacements: &[Replacement]) -> Result<bool> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| StagehandError::io_with_path(e, path))?;
    let patched = patch_entry(&text, replacements);

    if patched == text {
        debug!("Desktop entry already patched: {}", path.display());
        return Ok(false);
    }

    std::fs::write(path, patched).map_err(|e| StagehandError::io_with_path(e, path))?;
    debug!("Patched desktop entry: {}", path.display());
    Ok(true)
}

/// The line terminator at the end of `piece`, if any, separated from the
/// content. `split_inclusive` keeps `\n` attached, so a CRLF file yields
/// pieces ending in `\r\n`.
fn split_terminator_suffix(piece: &str) -> (&str, &str) {
    if let Some(content) = piece.strip_suffix("\r\n") {
        (content, "\r\n")
    } else if let Some(content) = piece.strip_suffix('\n') {
        (content, "\n")
    } else {
        (piece, "")
    }
}

fn matching_replacement<'a>(
    content: &str,
    replacements: &'a [Replacement],
) -> Option<&'a Replacement> {
    let (key, _) = content.split_once('=')?;
    replacements.iter().find(|r| r.key == key)
}
