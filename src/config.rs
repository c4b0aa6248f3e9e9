// Patch set and pipeline configuration.
//
// A `PatchSet` is the ordered list of container members to patch, each
// paired with its delta inside the bundle. Member paths are archive paths
// (always `/`-separated); `native_path` maps them onto the working tree.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

use crate::backend::{ArchiveBackend, DiffBackend};
use crate::error::{PatchError, Result, ResultExt};

/// Delta bundle looked up when none is given.
pub const DEFAULT_DELTA_BUNDLE: &str = "patches.tar";
/// Archive tool used by the external backend.
pub const DEFAULT_ARCHIVE_TOOL: &str = "jar";
/// Diff tool used by the external backend.
pub const DEFAULT_DIFF_TOOL: &str = "xdelta3";

// ---------------------------------------------------------------------------
// MemberSpec
// ---------------------------------------------------------------------------

/// One container member to patch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MemberSpec {
    /// Path inside the container archive, `/`-separated.
    pub path: String,
    /// File name of the delta inside the bundle.
    pub delta: String,
    /// The container's manifest; merged in two stages.
    #[serde(default)]
    pub metadata: bool,
    /// Expected SHA-256 (hex) of the patched member.
    #[serde(default)]
    pub sha256: Option<String>,
}

impl MemberSpec {
    pub fn new(path: impl Into<String>, delta: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            delta: delta.into(),
            metadata: false,
            sha256: None,
        }
    }

    /// Mark this member as the container's metadata member.
    pub fn as_metadata(mut self) -> Self {
        self.metadata = true;
        self
    }

    pub fn with_sha256(mut self, hex: impl Into<String>) -> Self {
        self.sha256 = Some(hex.into());
        self
    }

    /// Location of the extracted member under `work_dir`.
    pub fn local_path(&self, work_dir: &Path) -> PathBuf {
        work_dir.join(native_path(&self.path))
    }

    /// Location of the extracted delta under `work_dir`.
    pub fn delta_path(&self, work_dir: &Path) -> PathBuf {
        work_dir.join(native_path(&self.delta))
    }
}

/// Convert an archive path (`a/b/c`) into a relative platform path.
pub fn native_path(archive_path: &str) -> PathBuf {
    archive_path.split('/').filter(|s| !s.is_empty()).collect()
}

fn check_relative(kind: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(PatchError::InvalidPatchSet(format!("empty {kind}")));
    }
    if value.starts_with('/') || value.ends_with('/') {
        return Err(PatchError::InvalidPatchSet(format!(
            "{kind} \"{value}\" must be a relative file path"
        )));
    }
    // `Path::components` folds `.` and `//` away, so check the raw segments too.
    let ok = value.split('/').all(|seg| !matches!(seg, "" | "." | ".."))
        && Path::new(value)
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if !ok {
        return Err(PatchError::InvalidPatchSet(format!(
            "{kind} \"{value}\" must not contain \"..\", \".\", empty segments or a root"
        )));
    }
    Ok(())
}

fn normalize_sha256(member: &str, hex: &str) -> Result<String> {
    let hex = hex.trim().to_ascii_lowercase();
    if hex.len() != 64 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(PatchError::InvalidPatchSet(format!(
            "sha256 for \"{member}\" is not 64 hex digits"
        )));
    }
    Ok(hex)
}

// ---------------------------------------------------------------------------
// PatchSet
// ---------------------------------------------------------------------------

/// Validated, ordered list of members to patch.
///
/// Invariants: at least one member, unique member paths, unique delta names
/// that never equal a member path, relative paths only, and at most one
/// metadata member.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "PatchSetFile")]
pub struct PatchSet {
    members: Vec<MemberSpec>,
}

#[derive(Deserialize)]
struct PatchSetFile {
    members: Vec<MemberSpec>,
}

impl TryFrom<PatchSetFile> for PatchSet {
    type Error = PatchError;

    fn try_from(file: PatchSetFile) -> Result<Self> {
        Self::new(file.members)
    }
}

impl PatchSet {
    pub fn new(mut members: Vec<MemberSpec>) -> Result<Self> {
        if members.is_empty() {
            return Err(PatchError::InvalidPatchSet("no members".into()));
        }

        let mut paths = HashSet::new();
        let mut deltas = HashSet::new();
        let mut metadata = None;

        for m in &mut members {
            check_relative("member path", &m.path)?;
            check_relative("delta name", &m.delta)?;
            if !paths.insert(m.path.clone()) {
                return Err(PatchError::InvalidPatchSet(format!(
                    "member \"{}\" listed twice",
                    m.path
                )));
            }
            if !deltas.insert(m.delta.clone()) {
                return Err(PatchError::InvalidPatchSet(format!(
                    "delta \"{}\" used by more than one member",
                    m.delta
                )));
            }
            if m.metadata {
                if let Some(first) = metadata.replace(m.path.clone()) {
                    return Err(PatchError::InvalidPatchSet(format!(
                        "both \"{first}\" and \"{}\" are marked as metadata",
                        m.path
                    )));
                }
            }
            if let Some(hex) = &m.sha256 {
                m.sha256 = Some(normalize_sha256(&m.path, hex)?);
            }
        }

        // Deltas and members are extracted into the same tree concurrently.
        if let Some(m) = members.iter().find(|m| deltas.contains(&m.path)) {
            return Err(PatchError::InvalidPatchSet(format!(
                "delta name \"{}\" collides with a member path",
                m.path
            )));
        }

        Ok(Self { members })
    }

    /// The five members patched in the Forge installer jar.
    pub fn forge_installer() -> Self {
        Self {
            members: vec![
                MemberSpec::new(
                    "net/minecraftforge/installer/SimpleInstaller.class",
                    "SimpleInstaller.vcdiff",
                ),
                MemberSpec::new(
                    "net/minecraftforge/installer/SimpleInstaller$1.class",
                    "SimpleInstaller$1.vcdiff",
                ),
                MemberSpec::new("META-INF/MANIFEST.MF", "MANIFEST.vcdiff").as_metadata(),
                MemberSpec::new("META-INF/FORGE.DSA", "FORGE.DSA.vcdiff"),
                MemberSpec::new("META-INF/FORGE.SF", "FORGE.SF.vcdiff"),
            ],
        }
    }

    /// Parse a `{"members": [...]}` document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| PatchError::InvalidPatchSet(e.to_string()))
    }

    /// Load a member list file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).fs_context("reading member list", path)?;
        Self::from_json_str(&text).map_err(|e| match e {
            PatchError::InvalidPatchSet(msg) => {
                PatchError::InvalidPatchSet(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    pub fn members(&self) -> &[MemberSpec] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Every member path, in order.
    pub fn member_paths(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.path.as_str()).collect()
    }

    /// Non-metadata member paths, in order.
    pub fn ordinary_paths(&self) -> Vec<&str> {
        self.members
            .iter()
            .filter(|m| !m.metadata)
            .map(|m| m.path.as_str())
            .collect()
    }

    pub fn metadata_path(&self) -> Option<&str> {
        self.members
            .iter()
            .find(|m| m.metadata)
            .map(|m| m.path.as_str())
    }
}

impl Default for PatchSet {
    fn default() -> Self {
        Self::forge_installer()
    }
}

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

/// Everything the orchestrator needs for one run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Unmodified container archive.
    pub input: PathBuf,
    /// Where the patched copy is written.
    pub output: PathBuf,
    /// Tar bundle of member deltas.
    pub delta_bundle: PathBuf,
    /// Directory the working tree is extracted into.
    pub work_dir: PathBuf,
    pub patch_set: PatchSet,
    pub archive: ArchiveBackend,
    pub diff: DiffBackend,
    /// Skip cleanup after a successful run.
    pub keep_work_files: bool,
}

impl PipelineConfig {
    /// Defaults: `patches.tar`, the current directory, the Forge patch set
    /// and the external `jar` / `xdelta3` tools.
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            delta_bundle: PathBuf::from(DEFAULT_DELTA_BUNDLE),
            work_dir: PathBuf::from("."),
            patch_set: PatchSet::default(),
            archive: ArchiveBackend::default(),
            diff: DiffBackend::default(),
            keep_work_files: false,
        }
    }
}
