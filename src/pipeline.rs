// Pipeline orchestration.
//
//   ResolveTools -> Extract -> Patch -> Merge -> Cleanup -> Done
//
// Fixed fan-out inside a stage uses `rayon::join`; the member list is
// patched with `par_iter` (see `patch::apply_all`). A stage starts only after
// every task of the previous one succeeded. The first failure ends the run
// and is returned as a `PipelineError` tagged with its stage; intermediate
// files are then left in place for diagnosis.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::backend::{ArchiveTool, DiffTool};
use crate::config::PipelineConfig;
use crate::error::{PatchError, PipelineError, Result, ResultExt};
use crate::extract::{check_deltas, extract_delta_bundle, extract_members};
use crate::merge::{apply_patches, discard};
use crate::patch::apply_all;
use crate::report::{Reporter, Stage};

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchReport {
    /// The patched container archive.
    pub output: PathBuf,
    /// Member paths patched and merged, in patch-set order.
    pub patched: Vec<String>,
    /// Intermediate files removed by cleanup (0 when work files are kept).
    pub removed: usize,
}

/// Paths made absolute and tools resolved; everything later stages need.
struct Prepared {
    input: PathBuf,
    output: PathBuf,
    bundle: PathBuf,
    work_dir: PathBuf,
    archive: Arc<dyn ArchiveTool>,
    diff: Arc<dyn DiffTool>,
}

fn at(stage: Stage) -> impl FnOnce(PatchError) -> PipelineError {
    move |source| PipelineError { stage, source }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).fs_context("resolving", path)
}

pub struct Pipeline<'a> {
    config: PipelineConfig,
    reporter: &'a dyn Reporter,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: PipelineConfig, reporter: &'a dyn Reporter) -> Self {
        Self { config, reporter }
    }

    /// Run every stage. On failure the error is reported once through the
    /// reporter and returned.
    pub fn run(&self) -> std::result::Result<PatchReport, PipelineError> {
        match self.execute() {
            Ok(report) => {
                self.reporter.stage(Stage::Done);
                Ok(report)
            }
            Err(e) => {
                self.reporter.error(&e.to_string());
                Err(e)
            }
        }
    }

    fn execute(&self) -> std::result::Result<PatchReport, PipelineError> {
        self.reporter.stage(Stage::ResolveTools);
        let p = self.prepare().map_err(at(Stage::ResolveTools))?;

        self.reporter.info(&format!(
            "Creating patched jar \"{}\" based on \"{}\"...",
            p.output.display(),
            p.input.display()
        ));

        self.reporter.stage(Stage::Extract);
        let extracted = self.extract(&p).map_err(at(Stage::Extract))?;

        self.reporter.stage(Stage::Patch);
        let patched = self.patch(&p).map_err(at(Stage::Patch))?;

        self.reporter.stage(Stage::Merge);
        let set = &self.config.patch_set;
        apply_patches(
            p.archive.as_ref(),
            &p.output,
            &set.ordinary_paths(),
            set.metadata_path(),
            &p.work_dir,
            self.reporter,
        )
        .map_err(at(Stage::Merge))?;

        self.reporter.stage(Stage::Cleanup);
        let removed = if self.config.keep_work_files {
            self.reporter.info("Keeping intermediate files");
            0
        } else {
            self.cleanup(&p.work_dir, &extracted).map_err(at(Stage::Cleanup))?
        };

        Ok(PatchReport {
            output: p.output,
            patched,
            removed,
        })
    }

    // -----------------------------------------------------------------------
    // Stages
    // -----------------------------------------------------------------------

    /// Existence checks and tool resolution, concurrently. Nothing on disk
    /// is touched.
    fn prepare(&self) -> Result<Prepared> {
        let cfg = &self.config;
        let input = absolute(&cfg.input)?;
        let output = absolute(&cfg.output)?;
        let bundle = absolute(&cfg.delta_bundle)?;
        let work_dir = absolute(&cfg.work_dir)?;

        let (checked, (archive, diff)) = rayon::join(
            || check_inputs(&input, &output, &bundle),
            || {
                rayon::join(
                    || cfg.archive.resolve(&work_dir, self.reporter),
                    || cfg.diff.resolve(&work_dir, self.reporter),
                )
            },
        );
        checked?;

        Ok(Prepared {
            archive: archive?,
            diff: diff?,
            input,
            output,
            bundle,
            work_dir,
        })
    }

    /// Bundle and members concurrently. Returns the bundle files written.
    fn extract(&self, p: &Prepared) -> Result<Vec<PathBuf>> {
        let set = &self.config.patch_set;
        let (bundle, members) = rayon::join(
            || extract_delta_bundle(&p.bundle, &p.work_dir, self.reporter),
            || extract_members(p.archive.as_ref(), &p.input, set, &p.work_dir, self.reporter),
        );
        let written = bundle?;
        members?;
        check_deltas(set, &p.work_dir)?;
        Ok(written)
    }

    /// All members, alongside the input-to-output copy. Either failing
    /// discards whatever was written to the output.
    fn patch(&self, p: &Prepared) -> Result<Vec<String>> {
        let (patched, copied) = rayon::join(
            || apply_all(&self.config.patch_set, &p.work_dir, p.diff.as_ref(), self.reporter),
            || {
                fs::copy(&p.input, &p.output)
                    .map(drop)
                    .fs_context("copying input to", &p.output)
            },
        );

        match (patched, copied) {
            (Ok(patched), Ok(())) => Ok(patched),
            // A patch error wins over a copy error.
            (Err(e), _) | (Ok(_), Err(e)) => {
                discard(&p.output, self.reporter);
                Err(e)
            }
        }
    }

    /// Remove member files and extracted bundle files, then any directory
    /// under `work_dir` that became empty. Other files are kept.
    fn cleanup(&self, work_dir: &Path, extracted: &[PathBuf]) -> Result<usize> {
        let members = self
            .config
            .patch_set
            .members()
            .iter()
            .map(|m| m.local_path(work_dir));

        let mut removed = 0;
        let mut dirs = Vec::new();
        for file in members.chain(extracted.iter().cloned()) {
            if remove_if_present(&file)? {
                removed += 1;
            }
            let mut dir = file.parent();
            while let Some(d) = dir {
                if d == work_dir || !d.starts_with(work_dir) {
                    break;
                }
                dirs.push(d.to_path_buf());
                dir = d.parent();
            }
        }

        // Deepest first so parents are empty by the time they are tried.
        dirs.sort_by(|a, b| {
            b.components()
                .count()
                .cmp(&a.components().count())
                .then_with(|| a.cmp(b))
        });
        dirs.dedup();
        for d in dirs {
            if fs::read_dir(&d).is_ok_and(|mut entries| entries.next().is_none()) {
                fs::remove_dir(&d).fs_context("removing directory", &d)?;
            }
        }

        self.reporter.info(&format!("Removed {removed} intermediate files"));
        Ok(removed)
    }
}

fn check_inputs(input: &Path, output: &Path, bundle: &Path) -> Result<()> {
    if !input.is_file() {
        return Err(PatchError::MissingInput(input.to_path_buf()));
    }
    if !bundle.is_file() {
        return Err(PatchError::MissingDeltaBundle(bundle.to_path_buf()));
    }
    if same_file(input, output) {
        return Err(PatchError::OutputIsInput(output.to_path_buf()));
    }
    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Whether a file was removed; absence is not an error.
fn remove_if_present(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(PatchError::io(format!("removing \"{}\"", path.display()), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MemberSpec, PatchSet};
    use crate::report::RecordingReporter;

    #[test]
    fn missing_input_fails_resolution_stage() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = PipelineConfig::new(dir.path().join("in.jar"), dir.path().join("out.jar"));
        cfg.work_dir = dir.path().join("work");
        let r = RecordingReporter::new();

        let err = Pipeline::new(cfg, &r).run().unwrap_err();
        assert_eq!(err.stage, Stage::ResolveTools);
        assert!(matches!(err.source, PatchError::MissingInput(_)));
        assert_eq!(r.errors(), vec![err.to_string()]);
        assert!(!dir.path().join("work").exists());
    }

    #[test]
    fn output_equal_to_input_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("in.jar");
        fs::write(&jar, b"PK").unwrap();
        fs::write(dir.path().join("patches.tar"), b"").unwrap();
        assert!(matches!(
            check_inputs(&jar, &jar, &dir.path().join("patches.tar")),
            Err(PatchError::OutputIsInput(_))
        ));
    }

    #[test]
    fn cleanup_keeps_unrelated_files() {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path();
        let set = PatchSet::new(vec![
            MemberSpec::new("net/x/A.class", "A.vcdiff"),
            MemberSpec::new("META-INF/MANIFEST.MF", "M.vcdiff").as_metadata(),
        ])
        .unwrap();
        fs::create_dir_all(work.join("net/x")).unwrap();
        fs::create_dir_all(work.join("META-INF")).unwrap();
        fs::write(work.join("net/x/A.class"), b"a").unwrap();
        fs::write(work.join("META-INF/MANIFEST.MF"), b"m").unwrap();
        fs::write(work.join("META-INF/notes.txt"), b"mine").unwrap();
        fs::write(work.join("A.vcdiff"), b"d").unwrap();
        fs::write(work.join("M.vcdiff"), b"d").unwrap();
        fs::write(work.join("in.jar"), b"PK").unwrap();

        let mut cfg = PipelineConfig::new(work.join("in.jar"), work.join("out.jar"));
        cfg.patch_set = set;
        let r = RecordingReporter::new();
        let pipeline = Pipeline::new(cfg, &r);
        let removed = pipeline
            .cleanup(work, &[work.join("A.vcdiff"), work.join("M.vcdiff")])
            .unwrap();

        assert_eq!(removed, 4);
        assert!(!work.join("net").exists());
        assert!(work.join("META-INF/notes.txt").exists());
        assert!(work.join("in.jar").exists());
    }
}
