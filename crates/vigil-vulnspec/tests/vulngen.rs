// SPDX-License-Identifier: MIT OR Apache-2.0
//! The vulngen binary compiles source files into loadable images.

use assert_cmd::Command;
use vigil_vulnspec::{validate, HEADER};

#[test]
fn compiles_source_to_a_valid_image() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("cves.vsrc");
    let out = tmp.path().join("cves.vs");
    std::fs::write(
        &src,
        r#"(cve "CVE-1" 6.5 6.5 "desc" (> "foo/bar" "1.2.2"))"#,
    )
    .unwrap();

    Command::cargo_bin("vigil-vulngen")
        .unwrap()
        .args(["-f"])
        .arg(&src)
        .args(["-o"])
        .arg(&out)
        .assert()
        .success();

    let image = std::fs::read(&out).unwrap();
    assert_eq!(&image[..HEADER.len()], &HEADER);
    validate(&image).unwrap();
}

#[test]
fn stdin_to_stdout() {
    let output = Command::cargo_bin("vigil-vulngen")
        .unwrap()
        .write_stdin(r#"(cve "CVE-2" 1.0 1.0 "d" (= "a/b" "1"))"#)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    validate(&output).unwrap();
}

#[test]
fn bad_source_fails() {
    Command::cargo_bin("vigil-vulngen")
        .unwrap()
        .write_stdin("(cve incomplete")
        .assert()
        .failure();
}
