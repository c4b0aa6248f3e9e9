// In-process container archive backend built on the `zip` crate.
//
// Updates never modify the archive in place: the new archive is streamed
// into a temporary file next to the target (unchanged entries are copied
// raw, without recompression) and then persisted over it.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufReader, Seek, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::ArchiveTool;
use crate::config::native_path;
use crate::error::{PatchError, Result, ResultExt};

#[derive(Debug, Default, Clone, Copy)]
pub struct ZipTool;

fn archive_error(path: &Path, e: impl std::fmt::Display) -> PatchError {
    PatchError::Archive {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

fn open(archive: &Path) -> Result<ZipArchive<BufReader<File>>> {
    let file = File::open(archive).fs_context("opening archive", archive)?;
    ZipArchive::new(BufReader::new(file)).map_err(|e| archive_error(archive, e))
}

fn file_options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// Directory entries leading to `member`, e.g. `META-INF/` for
/// `META-INF/MANIFEST.MF`.
fn parent_dirs(member: &str) -> Vec<String> {
    let mut dirs = Vec::new();
    let mut end = 0;
    while let Some(pos) = member[end..].find('/') {
        end += pos + 1;
        dirs.push(member[..end].to_owned());
    }
    dirs
}

impl ZipTool {
    /// Rewrite `archive`:
    /// 1. `leading` members (and their directory entries) first,
    /// 2. every existing entry not being replaced, copied raw,
    /// 3. `trailing` members last.
    fn rewrite(&self, archive: &Path, dir: &Path, leading: &[&str], trailing: &[&str]) -> Result<()> {
        let mut source = open(archive)?;

        let leading_dirs: Vec<String> = leading.iter().flat_map(|m| parent_dirs(m)).collect();
        let replaced: HashSet<&str> = leading
            .iter()
            .chain(trailing)
            .copied()
            .chain(leading_dirs.iter().map(String::as_str))
            .collect();

        let parent = match archive.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let tmp = NamedTempFile::new_in(parent).fs_context("creating temporary archive in", parent)?;
        let mut writer = ZipWriter::new(tmp);

        let mut seen_dirs = HashSet::new();
        for d in &leading_dirs {
            if seen_dirs.insert(d.as_str()) {
                writer
                    .add_directory(d.as_str(), file_options())
                    .map_err(|e| archive_error(archive, e))?;
            }
        }
        for member in leading {
            append_member(&mut writer, archive, dir, member)?;
        }

        for i in 0..source.len() {
            let entry = source.by_index_raw(i).map_err(|e| archive_error(archive, e))?;
            if replaced.contains(entry.name()) {
                continue;
            }
            writer.raw_copy_file(entry).map_err(|e| archive_error(archive, e))?;
        }

        for member in trailing {
            append_member(&mut writer, archive, dir, member)?;
        }

        let tmp = writer.finish().map_err(|e| archive_error(archive, e))?;
        tmp.persist(archive)
            .map_err(|e| PatchError::io(format!("replacing \"{}\"", archive.display()), e.error))?;
        Ok(())
    }
}

fn append_member<W: Write + Seek>(
    writer: &mut ZipWriter<W>,
    archive: &Path,
    dir: &Path,
    member: &str,
) -> Result<()> {
    let path = dir.join(native_path(member));
    let mut file = File::open(&path).fs_context("opening patched member", &path)?;
    writer
        .start_file(member, file_options())
        .map_err(|e| archive_error(archive, e))?;
    io::copy(&mut file, writer).fs_context("compressing", &path)?;
    Ok(())
}

impl ArchiveTool for ZipTool {
    fn name(&self) -> &str {
        "zip"
    }

    fn extract(&self, archive: &Path, members: &[&str], dir: &Path) -> Result<()> {
        let mut zip = open(archive)?;
        for member in members {
            let mut entry = zip
                .by_name(member)
                .map_err(|e| archive_error(archive, format!("{member}: {e}")))?;
            let out = dir.join(native_path(member));
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent).fs_context("creating directory", parent)?;
            }
            let mut file = File::create(&out).fs_context("creating", &out)?;
            io::copy(&mut entry, &mut file).fs_context("extracting to", &out)?;
        }
        Ok(())
    }

    fn update(&self, archive: &Path, members: &[&str], dir: &Path) -> Result<()> {
        self.rewrite(archive, dir, &[], members)
    }

    // The manifest goes first so readers that only look at the leading
    // entries (java.util.jar.JarInputStream) still find it.
    fn update_with_metadata(&self, archive: &Path, member: &str, dir: &Path) -> Result<()> {
        self.rewrite(archive, dir, &[member], &[])
    }
}
