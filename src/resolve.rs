// External tool resolution.
//
// A tool is looked up on the system search path first; failing that, an
// executable of the same name (plus the platform suffix) in the working
// directory is used. Resolution has no side effects and may run
// concurrently for different tools.

use std::env::consts::EXE_SUFFIX;
use std::path::{Path, PathBuf};

use crate::error::{PatchError, Result};
use crate::report::Reporter;

/// Where a tool was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolOrigin {
    /// On the search path; invoked by bare name.
    System,
    /// In the working directory; invoked by explicit path.
    Local,
}

/// A resolved external executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolReference {
    name: String,
    invocation: PathBuf,
    origin: ToolOrigin,
}

impl ToolReference {
    /// Logical name, e.g. `jar`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// What to pass as the program of a `Command`.
    pub fn invocation(&self) -> &Path {
        &self.invocation
    }

    pub fn origin(&self) -> ToolOrigin {
        self.origin
    }
}

/// Resolve `name` to an invocation path.
///
/// A local executable is returned as `work_dir.join(name + EXE_SUFFIX)` so it
/// is never looked up on the search path again. Callers that later change
/// the child's current directory must pass an absolute `work_dir`.
pub fn resolve_tool(name: &str, work_dir: &Path, reporter: &dyn Reporter) -> Result<ToolReference> {
    reporter.info(&format!("Checking {name} tool existence..."));

    if let Ok(found) = which::which(name) {
        log::debug!("{name} found on the search path at {}", found.display());
        reporter.info(&format!("{name} tool found"));
        return Ok(ToolReference {
            name: name.to_owned(),
            invocation: PathBuf::from(name),
            origin: ToolOrigin::System,
        });
    }

    let local = work_dir.join(format!("{name}{EXE_SUFFIX}"));
    if local.is_file() {
        reporter.info(&format!("{name} tool found in {}", work_dir.display()));
        return Ok(ToolReference {
            name: name.to_owned(),
            invocation: local,
            origin: ToolOrigin::Local,
        });
    }

    Err(PatchError::ToolNotFound {
        name: name.to_owned(),
        work_dir: work_dir.to_path_buf(),
        hint: download_hint(name),
    })
}

/// Where to obtain a missing tool.
pub fn download_hint(name: &str) -> String {
    match name {
        "jar" => "it ships with any JDK, e.g. https://adoptium.net (OpenJDK 8 HotSpot or newer)"
            .to_owned(),
        "xdelta3" => {
            "you can download it here: https://github.com/jmacd/xdelta-gpl/releases/tag/v3.1.0"
                .to_owned()
        }
        other => format!("install {other} or place the {other}{EXE_SUFFIX} executable there"),
    }
}
