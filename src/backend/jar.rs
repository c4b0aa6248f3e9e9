// `jar`-compatible archive tool.
//
// Runs with the working tree as its current directory so member paths are
// both the names inside the archive and the files on disk. The archive path
// must therefore be absolute.

use std::path::Path;

use super::{ArchiveTool, ToolCommand};
use crate::config::native_path;
use crate::error::Result;
use crate::resolve::ToolReference;

#[derive(Debug, Clone)]
pub struct JarTool {
    tool: ToolReference,
}

impl JarTool {
    pub fn new(tool: ToolReference) -> Self {
        Self { tool }
    }

    fn command(&self, flags: &str, archive: &Path, members: &[&str], dir: &Path) -> ToolCommand {
        ToolCommand::new(self.tool.invocation())
            .arg(flags)
            .arg(archive)
            .args(members.iter().map(|m| native_path(m)))
            .current_dir(dir)
    }
}

impl ArchiveTool for JarTool {
    fn name(&self) -> &str {
        self.tool.name()
    }

    fn extract(&self, archive: &Path, members: &[&str], dir: &Path) -> Result<()> {
        self.command("-xf", archive, members, dir)
            .run(self.name(), &format!("extract \"{}\"", archive.display()))
    }

    fn update(&self, archive: &Path, members: &[&str], dir: &Path) -> Result<()> {
        self.command("-uf", archive, members, dir)
            .run(self.name(), &format!("update \"{}\"", archive.display()))
    }

    // `-m` makes jar treat the file as the manifest instead of an ordinary
    // entry; without it, updating META-INF/MANIFEST.MF drops the manifest.
    fn update_with_metadata(&self, archive: &Path, member: &str, dir: &Path) -> Result<()> {
        self.command("-ufm", archive, &[member], dir).run(
            self.name(),
            &format!("apply manifest {member} to \"{}\"", archive.display()),
        )
    }
}
