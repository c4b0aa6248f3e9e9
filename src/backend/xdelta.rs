// `xdelta3`-compatible delta decoder.

use std::path::Path;

use super::{DiffTool, ToolCommand};
use crate::error::Result;
use crate::resolve::ToolReference;

#[derive(Debug, Clone)]
pub struct Xdelta3Tool {
    tool: ToolReference,
}

impl Xdelta3Tool {
    pub fn new(tool: ToolReference) -> Self {
        Self { tool }
    }
}

impl DiffTool for Xdelta3Tool {
    fn name(&self) -> &str {
        self.tool.name()
    }

    /// `xdelta3 -d -f -s <source> <delta> <output>`
    fn decode(&self, source: &Path, delta: &Path, output: &Path) -> Result<()> {
        ToolCommand::new(self.tool.invocation())
            .args(["-d", "-f", "-s"])
            .arg(source)
            .arg(delta)
            .arg(output)
            .run(self.name(), &format!("patch \"{}\"", source.display()))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::report::RecordingReporter;
    use crate::resolve::resolve_tool;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &Path, body: &str) -> Xdelta3Tool {
        let path = dir.join("fakexdelta");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        Xdelta3Tool::new(resolve_tool("fakexdelta", dir, &RecordingReporter::new()).unwrap())
    }

    #[test]
    fn passes_decode_force_and_source_flags() {
        let dir = tempfile::tempdir().unwrap();
        // Writes its argument list to the output file (last argument).
        let tool = script(dir.path(), "for last; do :; done\necho \"$*\" > \"$last\"");
        let out = dir.path().join("x.class.patched");
        tool.decode(Path::new("x.class"), Path::new("x.vcdiff"), &out)
            .unwrap();
        let args = std::fs::read_to_string(&out).unwrap();
        assert_eq!(args.trim(), format!("-d -f -s x.class x.vcdiff {}", out.display()));
    }

    #[test]
    fn nonzero_exit_is_tool_failure() {
        let dir = tempfile::tempdir().unwrap();
        let tool = script(dir.path(), "echo 'bad delta' >&2\nexit 1");
        let err = tool
            .decode(Path::new("a"), Path::new("b"), Path::new("c"))
            .unwrap_err();
        assert!(err.to_string().contains("bad delta"));
        assert!(err.attempted_command().unwrap().ends_with("-d -f -s a b c"));
    }
}
