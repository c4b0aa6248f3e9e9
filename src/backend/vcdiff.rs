// In-process VCDIFF decoding through the `xdelta3` library bindings.

use std::fs;
use std::path::Path;

use super::DiffTool;
use crate::error::{PatchError, Result, ResultExt};

#[derive(Debug, Default, Clone, Copy)]
pub struct VcdiffTool;

impl DiffTool for VcdiffTool {
    fn name(&self) -> &str {
        "vcdiff"
    }

    fn decode(&self, source: &Path, delta: &Path, output: &Path) -> Result<()> {
        let src = fs::read(source).fs_context("reading", source)?;
        let patch = fs::read(delta).fs_context("reading delta", delta)?;
        let decoded = xdelta3::decode(&patch, &src).ok_or_else(|| PatchError::Decode {
            member: source.to_path_buf(),
            reason: format!("\"{}\" is not a valid delta for this source", delta.display()),
        })?;
        fs::write(output, decoded).fs_context("writing", output)
    }
}
