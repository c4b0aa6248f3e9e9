// Delegated capabilities: archive manipulation and delta decoding.
//
// The pipeline only talks to the `ArchiveTool` and `DiffTool` traits. Each
// has an external-process implementation (`jar`, `xdelta3`) and an
// in-process one (zip library, VCDIFF library), selected through
// `ArchiveBackend` / `DiffBackend`.
//
// - `jar`        : ArchiveTool over a `jar`-compatible executable
// - `xdelta`     : DiffTool over an `xdelta3`-compatible executable
// - `zip_archive`: in-process ArchiveTool (feature `embedded-archive`)
// - `vcdiff`     : in-process DiffTool (feature `embedded-diff`)

pub mod jar;
pub mod xdelta;

#[cfg(feature = "embedded-archive")]
pub mod zip_archive;

#[cfg(feature = "embedded-diff")]
pub mod vcdiff;

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use crate::config::{DEFAULT_ARCHIVE_TOOL, DEFAULT_DIFF_TOOL};
use crate::error::{PatchError, Result};
use crate::report::Reporter;
use crate::resolve::resolve_tool;

pub use jar::JarTool;
pub use xdelta::Xdelta3Tool;

#[cfg(feature = "embedded-archive")]
pub use zip_archive::ZipTool;

#[cfg(feature = "embedded-diff")]
pub use vcdiff::VcdiffTool;

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Container archive operations.
///
/// Member names are archive paths (`/`-separated). `dir` is the working
/// directory the member files are read from or written to, mirroring the
/// archive layout.
pub trait ArchiveTool: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Extract only `members` from `archive` into `dir`.
    fn extract(&self, archive: &Path, members: &[&str], dir: &Path) -> Result<()>;

    /// Replace (or add) `members` in `archive` with the files under `dir`.
    fn update(&self, archive: &Path, members: &[&str], dir: &Path) -> Result<()>;

    /// Install `member` as the archive's authoritative metadata entry.
    fn update_with_metadata(&self, archive: &Path, member: &str, dir: &Path) -> Result<()>;
}

/// Binary delta decoding.
pub trait DiffTool: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Rebuild `output` from `source` plus `delta`, overwriting `output`.
    /// Must not write to `source`.
    fn decode(&self, source: &Path, delta: &Path, output: &Path) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Backend selection
// ---------------------------------------------------------------------------

/// Which archive implementation a run uses.
#[derive(Debug, Clone)]
pub enum ArchiveBackend {
    /// External `jar`-compatible executable, resolved by name.
    Jar { tool: String },
    /// In-process zip library.
    #[cfg(feature = "embedded-archive")]
    Zip,
    /// Caller-supplied implementation.
    Custom(Arc<dyn ArchiveTool>),
}

impl Default for ArchiveBackend {
    fn default() -> Self {
        Self::Jar {
            tool: DEFAULT_ARCHIVE_TOOL.to_owned(),
        }
    }
}

impl ArchiveBackend {
    /// Name of the executable that must be resolved, if any.
    pub fn required_tool(&self) -> Option<&str> {
        match self {
            Self::Jar { tool } => Some(tool.as_str()),
            _ => None,
        }
    }

    pub fn resolve(&self, work_dir: &Path, reporter: &dyn Reporter) -> Result<Arc<dyn ArchiveTool>> {
        let resolved: Arc<dyn ArchiveTool> = match self {
            Self::Jar { tool } => Arc::new(JarTool::new(resolve_tool(tool, work_dir, reporter)?)),
            #[cfg(feature = "embedded-archive")]
            Self::Zip => Arc::new(ZipTool),
            Self::Custom(tool) => Arc::clone(tool),
        };
        Ok(resolved)
    }
}

/// Which delta decoder a run uses.
#[derive(Debug, Clone)]
pub enum DiffBackend {
    /// External `xdelta3`-compatible executable, resolved by name.
    Xdelta3 { tool: String },
    /// In-process VCDIFF decoding.
    #[cfg(feature = "embedded-diff")]
    Vcdiff,
    /// Caller-supplied implementation.
    Custom(Arc<dyn DiffTool>),
}

impl Default for DiffBackend {
    fn default() -> Self {
        Self::Xdelta3 {
            tool: DEFAULT_DIFF_TOOL.to_owned(),
        }
    }
}

impl DiffBackend {
    pub fn required_tool(&self) -> Option<&str> {
        match self {
            Self::Xdelta3 { tool } => Some(tool.as_str()),
            _ => None,
        }
    }

    pub fn resolve(&self, work_dir: &Path, reporter: &dyn Reporter) -> Result<Arc<dyn DiffTool>> {
        let resolved: Arc<dyn DiffTool> = match self {
            Self::Xdelta3 { tool } => {
                Arc::new(Xdelta3Tool::new(resolve_tool(tool, work_dir, reporter)?))
            }
            #[cfg(feature = "embedded-diff")]
            Self::Vcdiff => Arc::new(VcdiffTool),
            Self::Custom(tool) => Arc::clone(tool),
        };
        Ok(resolved)
    }
}

// ---------------------------------------------------------------------------
// External command runner
// ---------------------------------------------------------------------------

/// An external tool invocation that can render itself for diagnostics.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Run to completion. Any nonzero exit (or failure to start) becomes a
    /// `ToolFailed` carrying the rendered command line.
    pub fn run(&self, tool: &str, action: &str) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }

        log::debug!("running: {self}");
        let failed = |status: String, stderr: String| PatchError::ToolFailed {
            tool: tool.to_owned(),
            action: action.to_owned(),
            command: self.to_string(),
            status,
            stderr,
        };

        let output = cmd
            .output()
            .map_err(|e| failed(format!("could not be started: {e}"), String::new()))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            log::debug!("{tool}: {}", stdout.trim());
        }

        if output.status.success() {
            Ok(())
        } else {
            Err(failed(
                output.status.to_string(),
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ))
        }
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::RecordingReporter;

    #[test]
    fn command_renders_space_separated() {
        let cmd = ToolCommand::new("jar")
            .arg("-uf")
            .arg("out.jar")
            .args(["a.class", "b.class"]);
        assert_eq!(cmd.to_string(), "jar -uf out.jar a.class b.class");
    }

    #[test]
    fn unstartable_command_is_a_tool_failure() {
        let err = ToolCommand::new("jarpatch-definitely-not-installed")
            .arg("-x")
            .run("fake", "do things")
            .unwrap_err();
        assert_eq!(
            err.attempted_command(),
            Some("jarpatch-definitely-not-installed -x")
        );
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_captures_stderr() {
        let err = ToolCommand::new("sh")
            .args(["-c", "echo broken >&2; exit 3"])
            .run("sh", "fail on purpose")
            .unwrap_err();
        match err {
            PatchError::ToolFailed { status, stderr, .. } => {
                assert!(status.contains('3'));
                assert_eq!(stderr.trim(), "broken");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn current_dir_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        ToolCommand::new("sh")
            .args(["-c", "echo hi > marker"])
            .current_dir(dir.path())
            .run("sh", "write marker")
            .unwrap();
        assert!(dir.path().join("marker").is_file());
    }

    #[test]
    fn default_backends_need_external_tools() {
        assert_eq!(ArchiveBackend::default().required_tool(), Some("jar"));
        assert_eq!(DiffBackend::default().required_tool(), Some("xdelta3"));
    }

    #[test]
    fn missing_external_tool_fails_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let backend = DiffBackend::Xdelta3 {
            tool: "jarpatch-missing-diff".into(),
        };
        let err = backend.resolve(dir.path(), &RecordingReporter::new()).unwrap_err();
        assert!(matches!(err, PatchError::ToolNotFound { .. }));
    }
}
