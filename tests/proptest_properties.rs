use std::fs::{self, File};
use std::path::Path;

use jarpatch::error::Result;
use jarpatch::extract::extract_delta_bundle;
use jarpatch::patch::{apply_delta, patched_sibling};
use jarpatch::{DiffTool, MemberSpec, PatchError, PatchSet, RecordingReporter};
use proptest::prelude::*;

#[derive(Debug)]
struct LibDiff;

impl DiffTool for LibDiff {
    fn name(&self) -> &str {
        "libxdelta3"
    }

    fn decode(&self, source: &Path, delta: &Path, output: &Path) -> Result<()> {
        let src = fs::read(source).unwrap();
        let d = fs::read(delta).unwrap();
        let out = xdelta3::decode(&d, &src).ok_or_else(|| PatchError::Decode {
            member: source.to_path_buf(),
            reason: "corrupt delta".into(),
        })?;
        fs::write(output, out).unwrap();
        Ok(())
    }
}

fn write_bundle(path: &Path, entries: &[(String, Vec<u8>)]) {
    let mut builder = tar::Builder::new(File::create(path).unwrap());
    for (name, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, data.as_slice()).unwrap();
    }
    builder.finish().unwrap();
}

fn segment() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_$]{1,12}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_patch_roundtrip(
        old in proptest::collection::vec(any::<u8>(), 64..2048),
        new in proptest::collection::vec(any::<u8>(), 1..2048),
        dir_name in segment(),
        file_name in segment(),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let member = MemberSpec::new(format!("{dir_name}/{file_name}.class"), "m.vcdiff");
        let path = member.local_path(dir.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, &old).unwrap();
        fs::write(dir.path().join("m.vcdiff"), xdelta3::encode(&new, &old).unwrap()).unwrap();

        apply_delta(&member, dir.path(), &LibDiff, &RecordingReporter::new()).unwrap();

        prop_assert_eq!(fs::read(&path).unwrap(), new);
        prop_assert!(!patched_sibling(&path).exists());
    }

    #[test]
    fn prop_bundle_extraction_idempotent(
        files in proptest::collection::btree_map("[a-z0-9_]{1,12}", proptest::collection::vec(any::<u8>(), 0..512), 1..6),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let bundle = dir.path().join("patches.tar");
        let entries: Vec<(String, Vec<u8>)> = files
            .iter()
            .map(|(name, data)| (format!("{name}.vcdiff"), data.clone()))
            .collect();
        write_bundle(&bundle, &entries);
        let work = dir.path().join("work");
        let r = RecordingReporter::new();

        let first = extract_delta_bundle(&bundle, &work, &r).unwrap();
        let snapshot: Vec<Vec<u8>> = first.iter().map(|p| fs::read(p).unwrap()).collect();
        let second = extract_delta_bundle(&bundle, &work, &r).unwrap();

        prop_assert_eq!(&first, &second);
        for (path, before) in second.iter().zip(&snapshot) {
            prop_assert_eq!(&fs::read(path).unwrap(), before);
        }
        prop_assert_eq!(fs::read_dir(&work).unwrap().count(), entries.len());
    }

    #[test]
    fn prop_parent_components_are_rejected(
        a in segment(),
        b in segment(),
    ) {
        let bad = PatchSet::new(vec![MemberSpec::new(format!("{a}/../{b}"), "x.vcdiff")]);
        prop_assert!(matches!(bad, Err(PatchError::InvalidPatchSet(_))));

        let good = PatchSet::new(vec![MemberSpec::new(format!("{a}/{b}"), "x.vcdiff")]);
        prop_assert!(good.is_ok());
    }
}
