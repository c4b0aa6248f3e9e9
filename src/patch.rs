// Patch application: decode each member's delta into a `.patched` sibling,
// then swap it over the original.
//
// Members touch disjoint files, so they are patched in parallel on the rayon
// pool. Nothing is merged unless every member succeeded.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use sha2::{Digest, Sha256};

use crate::backend::DiffTool;
use crate::config::{MemberSpec, PatchSet};
use crate::error::{PatchError, Result, ResultExt};
use crate::report::Reporter;

/// `<path>.patched`, next to `path`.
pub fn patched_sibling(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".patched");
    PathBuf::from(name)
}

/// Lowercase hex SHA-256 of a file's contents.
pub fn sha256_hex(path: &Path) -> Result<String> {
    let mut file = File::open(path).fs_context("opening", path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).fs_context("hashing", path)?;
    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect())
}

/// Patch one extracted member in place.
///
/// On a decode failure the member is left exactly as extracted.
pub fn apply_delta(member: &MemberSpec, work_dir: &Path, diff: &dyn DiffTool, reporter: &dyn Reporter) -> Result<()> {
    let source = member.local_path(work_dir);
    let delta = member.delta_path(work_dir);
    let patched = patched_sibling(&source);

    reporter.info(&format!("Patching {} with {}", member.path, member.delta));
    diff.decode(&source, &delta, &patched)?;

    fs::rename(&patched, &source).fs_context("replacing", &source)?;

    if let Some(expected) = &member.sha256 {
        let actual = sha256_hex(&source)?;
        if &actual != expected {
            return Err(PatchError::ChecksumMismatch {
                member: member.path.clone(),
                expected: expected.clone(),
                actual,
            });
        }
        log::debug!("{} matches sha256 {actual}", member.path);
    }

    reporter.info(&format!("Patched {}", member.path));
    Ok(())
}

/// Patch every member concurrently. Returns the patched member paths in
/// patch-set order; on failure, the error of the first failing member in
/// that order.
pub fn apply_all(patch_set: &PatchSet, work_dir: &Path, diff: &dyn DiffTool, reporter: &dyn Reporter) -> Result<Vec<String>> {
    let results: Vec<Result<()>> = patch_set
        .members()
        .par_iter()
        .map(|m| apply_delta(m, work_dir, diff, reporter))
        .collect();

    for (member, result) in patch_set.members().iter().zip(results) {
        if let Err(e) = result {
            reporter.error(&format!("Failed to patch {} with the \"{}\" tool", member.path, diff.name()));
            return Err(e);
        }
    }
    Ok(patch_set.member_paths().into_iter().map(str::to_owned).collect())
}
