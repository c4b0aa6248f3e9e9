// Merge patched members back into the output archive.
//
// Ordinary members go in with one update call. The metadata member needs two
// passes: a plain update drops the stale manifest (`jar -uf` without `-m`),
// then `update_with_metadata` installs the patched one. Any failure deletes
// the output archive so a half-merged file is never left behind.

use std::fs;
use std::io;
use std::path::Path;

use crate::backend::ArchiveTool;
use crate::error::{PatchError, Result};
use crate::report::Reporter;

/// Merge `ordinary` members, then the optional `metadata` member, from
/// `work_dir` into `target`.
pub fn apply_patches(
    tool: &dyn ArchiveTool,
    target: &Path,
    ordinary: &[&str],
    metadata: Option<&str>,
    work_dir: &Path,
    reporter: &dyn Reporter,
) -> Result<()> {
    let result = merge(tool, target, ordinary, metadata, work_dir, reporter);
    if result.is_err() {
        discard(target, reporter);
    }
    result
}

fn merge(
    tool: &dyn ArchiveTool,
    target: &Path,
    ordinary: &[&str],
    metadata: Option<&str>,
    work_dir: &Path,
    reporter: &dyn Reporter,
) -> Result<()> {
    let shown = target.display();

    if !ordinary.is_empty() {
        reporter.info(&format!("Applying patched class files to \"{shown}\"..."));
        tool.update(target, ordinary, work_dir).inspect_err(|_| {
            reporter.error(&format!(
                "Failed to apply patched class files to \"{shown}\" with the \"{}\" tool",
                tool.name()
            ))
        })?;
        reporter.info(&format!("Applied patched class files to \"{shown}\""));
    }

    if let Some(member) = metadata {
        reporter.info(&format!("Handling special case for applying {member}..."));
        let failed = |_: &PatchError| {
            reporter.error(&format!(
                "Failed to apply patched {member} to \"{shown}\" with the \"{}\" tool",
                tool.name()
            ))
        };
        // Drop the stale entry, then install the patched one as the manifest.
        tool.update(target, &[member], work_dir).inspect_err(failed)?;
        tool.update_with_metadata(target, member, work_dir)
            .inspect_err(failed)?;
        reporter.info(&format!("Special case for {member} handled and applied to \"{shown}\""));
    }

    Ok(())
}

/// Remove a partially written archive. A failed removal is only logged so
/// the error that caused it is the one returned.
pub(crate) fn discard(target: &Path, reporter: &dyn Reporter) {
    match fs::remove_file(target) {
        Ok(()) => reporter.info(&format!("Removed incomplete \"{}\"", target.display())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("could not remove \"{}\": {e}", target.display()),
    }
}
