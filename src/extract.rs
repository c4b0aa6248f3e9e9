// Extraction: the delta bundle (tar) and the selected container members.
//
// Both run before any patch and may run concurrently with each other; they
// write disjoint sets of files (deltas vs. member paths) under `work_dir`.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Component, Path, PathBuf};

use tar::Archive;

use crate::backend::ArchiveTool;
use crate::config::PatchSet;
use crate::error::{PatchError, Result, ResultExt};
use crate::report::Reporter;

// ---------------------------------------------------------------------------
// Delta bundle
// ---------------------------------------------------------------------------

/// Relative path of a tar entry with `.` components dropped, or `None` if it
/// would land outside the extraction directory.
fn sanitize_entry_path(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(out)
}

/// Unpack every regular file of `bundle` under `work_dir`, overwriting
/// existing files, and return the files written in archive order.
pub fn extract_delta_bundle(bundle: &Path, work_dir: &Path, reporter: &dyn Reporter) -> Result<Vec<PathBuf>> {
    reporter.info(&format!("Extracting patches from {}...", bundle.display()));

    let file = File::open(bundle).fs_context("opening delta bundle", bundle)?;
    let mut archive = Archive::new(BufReader::new(file));
    let bad_bundle = |e: io::Error| PatchError::Archive {
        path: bundle.to_path_buf(),
        reason: e.to_string(),
    };

    fs::create_dir_all(work_dir).fs_context("creating working directory", work_dir)?;

    let mut written = Vec::new();
    for entry in archive.entries().map_err(bad_bundle)? {
        let mut entry = entry.map_err(bad_bundle)?;
        let raw = entry.path().map_err(bad_bundle)?.into_owned();
        let Some(relative) = sanitize_entry_path(&raw) else {
            return Err(PatchError::UnsafeEntryPath {
                entry: raw.display().to_string(),
            });
        };
        if relative.as_os_str().is_empty() {
            continue;
        }

        let dest = work_dir.join(&relative);
        let kind = entry.header().entry_type();
        if kind.is_dir() {
            fs::create_dir_all(&dest).fs_context("creating directory", &dest)?;
            continue;
        }
        if !kind.is_file() {
            log::debug!("skipping non-file bundle entry {}", raw.display());
            continue;
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).fs_context("creating directory", parent)?;
        }
        let mut out = File::create(&dest).fs_context("creating", &dest)?;
        io::copy(&mut entry, &mut out).fs_context("extracting to", &dest)?;
        written.push(dest);
    }

    reporter.info(&format!("Patches extracted from {}", bundle.display()));
    Ok(written)
}

/// Every member's delta must be present after bundle extraction.
pub fn check_deltas(patch_set: &PatchSet, work_dir: &Path) -> Result<()> {
    for member in patch_set.members() {
        if !member.delta_path(work_dir).is_file() {
            return Err(PatchError::MissingDelta {
                member: member.path.clone(),
                delta: member.delta.clone(),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Container members
// ---------------------------------------------------------------------------

/// Extract exactly the patch set's members from `archive` into `work_dir`.
///
/// `jar -xf` exits successfully when a named member is absent, so every
/// member is checked afterwards.
pub fn extract_members(
    tool: &dyn ArchiveTool,
    archive: &Path,
    patch_set: &PatchSet,
    work_dir: &Path,
    reporter: &dyn Reporter,
) -> Result<()> {
    reporter.info("Selectively extracting installer jar for patching...");
    fs::create_dir_all(work_dir).fs_context("creating working directory", work_dir)?;

    tool.extract(archive, &patch_set.member_paths(), work_dir)?;

    for member in patch_set.members() {
        if !member.local_path(work_dir).is_file() {
            return Err(PatchError::MissingMember {
                member: member.path.clone(),
                archive: archive.to_path_buf(),
            });
        }
    }

    reporter.info("Selective installer jar extraction complete");
    Ok(())
}
