// Error types for the patch pipeline.
//
// Every failure the pipeline can hit is a `PatchError`. Components return
// them unchanged; the orchestrator wraps the first one in a `PipelineError`
// tagged with the stage that produced it, and only the CLI turns that into a
// process exit code.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::report::Stage;

/// Exit code for a successful run.
pub const EXIT_OK: i32 = 0;
/// Exit code when a required CLI input is missing.
pub const EXIT_MISSING_INPUT: i32 = 1;
/// Exit code for any extraction, patching or merging failure.
pub const EXIT_PATCH_FAILED: i32 = 2;

pub type Result<T, E = PatchError> = std::result::Result<T, E>;

/// Broad classes of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A required file, tool or configuration value is missing or invalid.
    MissingPrerequisite,
    /// An archive or diff tool (external or in-process) reported failure.
    ToolFailure,
    /// A file copy, remove, rename or read failed.
    Io,
}

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("input file \"{}\" not found", .0.display())]
    MissingInput(PathBuf),

    #[error("delta bundle \"{}\" not found", .0.display())]
    MissingDeltaBundle(PathBuf),

    #[error("output \"{}\" would overwrite the input archive", .0.display())]
    OutputIsInput(PathBuf),

    #[error(
        "required dependency \"{name}\" not found on the search path or in \"{}\"; {hint}",
        .work_dir.display()
    )]
    ToolNotFound {
        name: String,
        work_dir: PathBuf,
        hint: String,
    },

    #[error("delta \"{delta}\" for member \"{member}\" is missing from the delta bundle")]
    MissingDelta { member: String, delta: String },

    #[error("member \"{member}\" was not extracted from \"{}\"", .archive.display())]
    MissingMember { member: String, archive: PathBuf },

    #[error("invalid patch set: {0}")]
    InvalidPatchSet(String),

    #[error("{tool} failed to {action} ({status}); attempted command: {command}{}", stderr_suffix(.stderr))]
    ToolFailed {
        tool: String,
        action: String,
        command: String,
        status: String,
        stderr: String,
    },

    #[error("failed to decode delta for \"{}\": {reason}", .member.display())]
    Decode { member: PathBuf, reason: String },

    #[error("archive \"{}\": {reason}", .path.display())]
    Archive { path: PathBuf, reason: String },

    #[error("checksum mismatch for \"{member}\": expected {expected}, got {actual}")]
    ChecksumMismatch {
        member: String,
        expected: String,
        actual: String,
    },

    #[error("refusing to extract \"{entry}\" outside the working directory")]
    UnsafeEntryPath { entry: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("\n{trimmed}")
    }
}

impl PatchError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingInput(_)
            | Self::MissingDeltaBundle(_)
            | Self::OutputIsInput(_)
            | Self::ToolNotFound { .. }
            | Self::MissingDelta { .. }
            | Self::MissingMember { .. }
            | Self::InvalidPatchSet(_) => ErrorCategory::MissingPrerequisite,
            Self::ToolFailed { .. }
            | Self::Decode { .. }
            | Self::Archive { .. }
            | Self::ChecksumMismatch { .. }
            | Self::UnsafeEntryPath { .. } => ErrorCategory::ToolFailure,
            Self::Io { .. } => ErrorCategory::Io,
        }
    }

    /// Process exit code for this failure. All pipeline failures share one
    /// code; a missing CLI argument never reaches the pipeline.
    pub fn exit_code(&self) -> i32 {
        EXIT_PATCH_FAILED
    }

    /// The literal command line, for failures raised by an external tool.
    pub fn attempted_command(&self) -> Option<&str> {
        match self {
            Self::ToolFailed { command, .. } => Some(command),
            _ => None,
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// A `PatchError` tagged with the pipeline stage that produced it.
#[derive(Debug, Error)]
#[error("{stage} failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: PatchError,
}

impl PipelineError {
    pub fn exit_code(&self) -> i32 {
        self.source.exit_code()
    }
}

/// Attaches the failing action and path to `io::Result`s.
pub(crate) trait ResultExt<T> {
    fn fs_context(self, action: &str, path: &Path) -> Result<T>;
}

impl<T> ResultExt<T> for io::Result<T> {
    fn fs_context(self, action: &str, path: &Path) -> Result<T> {
        self.map_err(|e| PatchError::io(format!("{action} \"{}\"", path.display()), e))
    }
}
