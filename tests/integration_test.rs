use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const FIXTURE: &str = "busybox-multi-platform";
const OCI_IMAGE: &str = "sha256:8a4415fb43600953cbdac6ec03c2d96d900bb21f8d78964837dad7f73b9afcdc";
const DOCKER_LIST: &str =
    "sha256:6528525e9f75c69e4706eed1d383da9d9535d831e6f9915b32cb795aeaa0e7a0";

/// Command isolated from the user's config and layouts
fn imgindex(home: &Path) -> Result<Command> {
    let mut cmd = Command::cargo_bin("imgindex")?;
    cmd.env("XDG_CONFIG_HOME", home.join("config"))
        .env("HOME", home)
        .env("IMGINDEX_XDG_PATH", home.join("manifests"));
    Ok(cmd)
}

/// Copy the busybox fixture into the layout directory of the `FIXTURE` index
fn install_fixture(home: &Path) -> Result<PathBuf> {
    let source =
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/testdata/layout/busybox-multi-platform");
    let target = home.join("manifests").join(FIXTURE);
    fs::create_dir_all(target.join("blobs/sha256"))?;
    for file in ["index.json", "oci-layout"] {
        fs::copy(source.join(file), target.join(file))?;
    }
    Ok(target)
}

#[test]
fn test_version_command() -> Result<()> {
    let mut cmd = Command::cargo_bin("imgindex")?;
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("imgindex 0.1.0"));
    Ok(())
}

#[test]
fn test_version_subcommand() -> Result<()> {
    let mut cmd = Command::cargo_bin("imgindex")?;
    cmd.arg("version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("imgindex 0.1.0"));
    Ok(())
}

#[test]
fn test_help_command() -> Result<()> {
    let mut cmd = Command::cargo_bin("imgindex")?;
    cmd.arg("--help");
    cmd.assert().success().stdout(predicate::str::contains(
        "Build, annotate and publish multi-platform OCI image indexes",
    ));
    Ok(())
}

#[test]
fn test_create_then_inspect() -> Result<()> {
    let home = TempDir::new()?;
    let index = "localhost:5000/team/app:v1";

    imgindex(home.path())?
        .args(["create", index, "--format", "docker"])
        .assert()
        .success();
    assert!(home
        .path()
        .join("manifests/localhost-5000_team_app-v1/index.json")
        .exists());

    imgindex(home.path())?
        .args(["inspect", index])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "application/vnd.docker.distribution.manifest.list.v2+json",
        ))
        .stdout(predicate::str::contains("\n\t\"schemaVersion\": 2"));

    // a second create must not clobber the layout
    imgindex(home.path())?
        .args(["create", index])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    Ok(())
}

#[test]
fn test_create_rejects_unknown_format() -> Result<()> {
    let home = TempDir::new()?;
    imgindex(home.path())?
        .args(["create", "localhost:5000/app", "--format", "tarball"])
        .assert()
        .failure();
    Ok(())
}

#[test]
fn test_annotate_saved_entry() -> Result<()> {
    let home = TempDir::new()?;
    install_fixture(home.path())?;

    imgindex(home.path())?
        .args([
            "annotate",
            FIXTURE,
            OCI_IMAGE,
            "--variant",
            "v8",
            "--urls",
            "https://mirror.example.com",
            "--annotations",
            "org.example.team=builders",
        ])
        .assert()
        .success();

    imgindex(home.path())?
        .args(["inspect", FIXTURE])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"variant\": \"v8\""))
        .stdout(predicate::str::contains("https://mirror.example.com"))
        .stdout(predicate::str::contains("https://bar.foo"))
        .stdout(predicate::str::contains("\"org.example.team\": \"builders\""));
    Ok(())
}

#[test]
fn test_annotate_unknown_digest_fails() -> Result<()> {
    let home = TempDir::new()?;
    install_fixture(home.path())?;

    imgindex(home.path())?
        .args([
            "annotate",
            FIXTURE,
            "sha256:4f2fa90168e3ce7022d69a6d67f3f5ae5df1b92d801d2c51ffee341af635adb4",
            "--os",
            "linux",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no image or image index found"));
    Ok(())
}

#[test]
fn test_remove_digest() -> Result<()> {
    let home = TempDir::new()?;
    let layout = install_fixture(home.path())?;

    imgindex(home.path())?
        .args(["remove", FIXTURE, DOCKER_LIST])
        .assert()
        .success();

    let saved = fs::read_to_string(layout.join("index.json"))?;
    assert!(!saved.contains(DOCKER_LIST));
    assert!(saved.contains(OCI_IMAGE));
    Ok(())
}

#[test]
fn test_delete_removes_layout() -> Result<()> {
    let home = TempDir::new()?;
    let layout = install_fixture(home.path())?;

    imgindex(home.path())?
        .args(["delete", FIXTURE])
        .assert()
        .success();
    assert!(!layout.exists());

    imgindex(home.path())?
        .args(["inspect", FIXTURE])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open index"));
    Ok(())
}

#[test]
fn test_add_help_lists_platform_flags() -> Result<()> {
    let home = TempDir::new()?;
    imgindex(home.path())?
        .args(["add", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--os-version"))
        .stdout(predicate::str::contains("--all"));
    Ok(())
}
