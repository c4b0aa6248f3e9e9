use std::process::Command;
use tempfile::tempdir;

fn bin() -> String {
    env!("CARGO_BIN_EXE_jarpatch").to_string()
}

#[test]
fn cli_no_args_prints_help_and_succeeds() {
    let out = Command::new(bin()).output().unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("--input"));
    assert!(stdout.contains("Exit codes:"));
    assert!(stdout.contains("Notice:"));
}

#[test]
fn cli_missing_input_exits_1() {
    let out = Command::new(bin()).args(["-o", "out.jar"]).output().unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("--input"));
}

#[test]
fn cli_missing_output_exits_1() {
    let out = Command::new(bin()).args(["-i", "in.jar"]).output().unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("--output"));
}

#[test]
fn cli_unknown_backend_exits_1() {
    let st = Command::new(bin())
        .args(["-i", "in.jar", "-o", "out.jar", "--archive-backend", "rar"])
        .status()
        .unwrap();
    assert_eq!(st.code(), Some(1));
}

#[test]
fn cli_version_flag() {
    let out = Command::new(bin()).arg("-v").output().unwrap();
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn cli_missing_input_file_exits_2() {
    let dir = tempdir().unwrap();
    let out = Command::new(bin())
        .current_dir(dir.path())
        .args(["-i", "missing.jar", "-o", "out.jar"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("missing.jar"));
    assert!(stderr.contains("Check that the input jar"));
    assert!(!dir.path().join("out.jar").exists());
}

#[test]
fn cli_quiet_suppresses_banner() {
    let dir = tempdir().unwrap();
    let out = Command::new(bin())
        .current_dir(dir.path())
        .args(["-q", "-i", "missing.jar", "-o", "out.jar"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2));
    assert!(out.stdout.is_empty());
}

#[test]
fn cli_invalid_member_list_exits_2() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("members.json"), r#"{"members": [{"path": "../x", "delta": "x"}]}"#)
        .unwrap();
    let st = Command::new(bin())
        .current_dir(dir.path())
        .args(["-q", "-i", "in.jar", "-o", "out.jar", "--members", "members.json"])
        .status()
        .unwrap();
    assert_eq!(st.code(), Some(2));
}

/// Full run through the binary with the zip backend and a stand-in diff
/// tool placed in the working directory. The stand-in "decodes" by copying
/// the delta, so each delta simply holds the patched bytes.
#[cfg(all(unix, feature = "embedded-archive"))]
#[test]
fn cli_end_to_end_with_local_diff_tool() {
    use std::fs::{self, File};
    use std::io::{Read, Write};
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let work = dir.path().join("work");
    fs::create_dir(&work).unwrap();

    let tool = work.join("jarpatch-copy-diff");
    fs::write(&tool, "#!/bin/sh\n# -d -f -s <source> <delta> <output>\ncp \"$5\" \"$6\"\n").unwrap();
    fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();

    let input = dir.path().join("app.jar");
    let mut w = zip::ZipWriter::new(File::create(&input).unwrap());
    for (name, data) in [("META-INF/MANIFEST.MF", "Manifest-Version: 1.0\n"), ("a/B.class", "old")] {
        w.start_file(name, zip::write::SimpleFileOptions::default()).unwrap();
        w.write_all(data.as_bytes()).unwrap();
    }
    w.finish().unwrap();

    let bundle = dir.path().join("patches.tar");
    let mut builder = tar::Builder::new(File::create(&bundle).unwrap());
    for (name, data) in [("M.delta", "Manifest-Version: 1.0\nMain-Class: a.B\n"), ("B.delta", "new")] {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, data.as_bytes()).unwrap();
    }
    builder.finish().unwrap();

    fs::write(
        dir.path().join("members.json"),
        r#"{"members": [
            {"path": "a/B.class", "delta": "B.delta"},
            {"path": "META-INF/MANIFEST.MF", "delta": "M.delta", "metadata": true}
        ]}"#,
    )
    .unwrap();

    let out = Command::new(bin())
        .current_dir(dir.path())
        .args(["-i", "app.jar", "-o", "patched.jar", "--members", "members.json"])
        .args(["--work-dir", "work", "--archive-backend", "zip"])
        .args(["--diff-tool", "jarpatch-copy-diff"])
        .output()
        .unwrap();
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    assert!(String::from_utf8_lossy(&out.stdout).contains("Success!"));

    let mut z = zip::ZipArchive::new(File::open(dir.path().join("patched.jar")).unwrap()).unwrap();
    let mut read = |name: &str| {
        let mut s = String::new();
        z.by_name(name).unwrap().read_to_string(&mut s).unwrap();
        s
    };
    assert_eq!(read("a/B.class"), "new");
    assert_eq!(read("META-INF/MANIFEST.MF"), "Manifest-Version: 1.0\nMain-Class: a.B\n");

    // Only the stand-in tool is left behind.
    let left: Vec<_> = fs::read_dir(&work).unwrap().map(|e| e.unwrap().file_name()).collect();
    assert_eq!(left, vec![std::ffi::OsString::from("jarpatch-copy-diff")]);
}
