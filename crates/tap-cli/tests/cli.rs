//! Integration tests for the `tap` CLI binary.

use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Test context that sets up a temporary TAP home environment
struct TestContext {
    temp_dir: TempDir,
    tap_home: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let tap_home = temp_dir.path().join(".tap");
        std::fs::create_dir_all(&tap_home).expect("failed to create tap home");
        Self { temp_dir, tap_home }
    }

    fn tap_cmd(&self) -> Command {
        let bin_path = env!("CARGO_BIN_EXE_tap");
        let mut cmd = Command::new(bin_path);
        cmd.env("HOME", self.temp_dir.path());
        cmd.env("TAP_HOME", &self.tap_home);
        cmd.env_remove("TAP_BIN_DIR");
        cmd.env_remove("TAP_FORMULA_DIR");
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.tap_cmd().args(args).output().expect("failed to run tap")
    }

    fn bin_dir(&self) -> PathBuf {
        self.tap_home.join("bin")
    }

    fn write_formula(&self, file: &str, content: &str) -> PathBuf {
        let dir = self.tap_home.join("formula");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(file);
        std::fs::write(&path, content).unwrap();
        path
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_help_command() {
    let ctx = TestContext::new();
    let output = ctx.run(&["--help"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Usage:"));
}

#[test]
fn test_version_command() {
    let ctx = TestContext::new();
    assert!(ctx.run(&["--version"]).status.success());
}

#[test]
fn test_list_shows_published_history() {
    let ctx = TestContext::new();
    let output = ctx.run(&["list", "--os", "linux", "--arch", "amd64"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let out = stdout(&output);
    for version in ["0.0.28", "0.0.35", "0.5.3", "5.2.5"] {
        assert!(out.contains(version), "missing {version} in:\n{out}");
    }
}

#[test]
fn test_resolve_published_linux_release() {
    let ctx = TestContext::new();
    let output = ctx.run(&["resolve", "5.2.5", "--os", "linux", "--arch", "amd64", "--json"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let d: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(d["version"], "5.2.5");
    assert_eq!(d["platform"]["os"], "linux");
    assert_eq!(d["platform"]["arch"], "amd64");
    assert!(
        d["url"]
            .as_str()
            .unwrap()
            .ends_with("/netfetch_5.2.5_linux_amd64.tar.gz")
    );
    assert_eq!(
        d["content_hash"],
        "cdec364c59d5ae41a7d755d5b3c9afbccd4bd935c3b539dd699eb82b8e6bb8e0"
    );
}

#[test]
fn test_resolve_unknown_version_fails() {
    let ctx = TestContext::new();
    let output = ctx.run(&["resolve", "9.9.9", "--os", "linux", "--arch", "amd64"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Unknown version 9.9.9"));
}

#[test]
fn test_resolve_unlisted_platform_fails() {
    let ctx = TestContext::new();
    let output = ctx.run(&["resolve", "5.2.5", "--os", "windows", "--arch", "arm64"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("no build for windows/arm64"));
}

#[test]
fn test_dry_run_install_writes_nothing() {
    let ctx = TestContext::new();
    let output = ctx.run(&["install", "5.2.5", "--os", "linux", "--arch", "amd64", "--dry-run"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("would install 5.2.5"));
    assert!(!ctx.bin_dir().exists());
}

#[test]
fn test_hash_command() {
    let ctx = TestContext::new();
    let file = ctx.temp_dir.path().join("hello.txt");
    std::fs::write(&file, "hello world\n").unwrap();

    let output = ctx.run(&["hash", file.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(
        stdout(&output)
            .starts_with("a948904f2f0f479b8f8197694b30184b0d2ed1c1cd2a1ec0fb85d299a192a447")
    );
}

#[test]
fn test_check_accepts_embedded_style_formula() {
    let ctx = TestContext::new();
    let path = ctx.temp_dir.path().join("netfetch-5.3.0.toml");
    let content = formula(
        "5.3.0",
        "linux",
        "amd64",
        "https://example.com/a.tar.gz",
        &"ab".repeat(32),
        "version",
    );
    std::fs::write(&path, content).unwrap();

    let output = ctx.run(&["check", path.to_str().unwrap()]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("netfetch 5.3.0"));
}

#[test]
fn test_check_rejects_bad_hash() {
    let ctx = TestContext::new();
    let path = ctx.temp_dir.path().join("broken.toml");
    let content = formula(
        "5.3.0",
        "linux",
        "amd64",
        "https://example.com/a.tar.gz",
        "nothex",
        "version",
    );
    std::fs::write(&path, content).unwrap();

    let output = ctx.run(&["check", path.to_str().unwrap()]);
    assert!(!output.status.success());
}

fn formula(version: &str, os: &str, arch: &str, url: &str, sha256: &str, smoke: &str) -> String {
    format!(
        r#"name = "netfetch"
description = "Scan Kubernetes clusters for network policies"
homepage = "https://github.com/deggja/netfetch"
version = "{version}"
smoke_test_args = ["{smoke}"]

[[platforms]]
os = "{os}"
arch = "{arch}"
url = "{url}"
sha256 = "{sha256}"
"#
    )
}

#[cfg(unix)]
mod install {
    use super::*;
    use sha2::{Digest, Sha256};

    fn release_archive(script: &str) -> Vec<u8> {
        let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, mode, data) in [
            ("LICENSE", 0o644, b"MIT".to_vec()),
            ("netfetch", 0o755, format!("#!/bin/sh\n{script}\n").into_bytes()),
        ] {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(mode);
            header.set_entry_type(tar::EntryType::Regular);
            builder.append_data(&mut header, name, data.as_slice()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn host() -> (&'static str, &'static str) {
        let p = tap_core::Platform::current().expect("unsupported test host");
        (p.os.as_str(), p.arch.as_str())
    }

    fn serve(ctx: &TestContext, server: &mut mockito::Server, archive: &[u8], pinned: &[u8]) -> mockito::Mock {
        let (os, arch) = host();
        let url = format!("{}/v9.0.0/netfetch_9.0.0_{os}_{arch}.tar.gz", server.url());
        ctx.write_formula(
            "netfetch-9.0.0.toml",
            &formula("9.0.0", os, arch, &url, &hex(pinned), "version"),
        );
        server
            .mock("GET", format!("/v9.0.0/netfetch_9.0.0_{os}_{arch}.tar.gz").as_str())
            .with_status(200)
            .with_body(archive)
            .create()
    }

    fn hex(data: &[u8]) -> String {
        Sha256::digest(data)
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    fn target(ctx: &TestContext) -> PathBuf {
        ctx.bin_dir().join("netfetch")
    }

    #[test]
    fn test_install_from_overlay_formula() {
        let ctx = TestContext::new();
        let mut server = mockito::Server::new();
        let archive = release_archive(r#"[ "$1" = "version" ] || exit 2; echo "netfetch 9.0.0""#);
        let m = serve(&ctx, &mut server, &archive, &archive);

        let output = ctx.run(&["install", "9.0.0"]);
        assert!(output.status.success(), "{}", stderr(&output));
        assert!(stdout(&output).contains("9.0.0 installed to"));
        assert!(target(&ctx).exists());
        m.assert();

        let verify = ctx.run(&["verify", "9.0.0"]);
        assert!(verify.status.success(), "{}", stderr(&verify));
        assert!(stdout(&verify).contains("netfetch 9.0.0"));
    }

    #[test]
    fn test_install_latest_picks_overlay_release() {
        let ctx = TestContext::new();
        let mut server = mockito::Server::new();
        let archive = release_archive("echo ok");
        let _m = serve(&ctx, &mut server, &archive, &archive);

        let output = ctx.run(&["install"]);
        assert!(output.status.success(), "{}", stderr(&output));
        assert!(target(&ctx).exists());
    }

    #[test]
    fn test_tampered_download_is_rejected() {
        let ctx = TestContext::new();
        let mut server = mockito::Server::new();
        let archive = release_archive("echo ok");
        let _m = serve(&ctx, &mut server, b"tampered", &archive);

        let output = ctx.run(&["install", "9.0.0"]);
        assert!(!output.status.success());
        assert!(stderr(&output).contains("Integrity check failed"));
        assert!(!target(&ctx).exists());
    }

    #[test]
    fn test_failed_smoke_test_keeps_previous_binary() {
        let ctx = TestContext::new();
        let mut server = mockito::Server::new();
        let archive = release_archive("exit 3");
        let _m = serve(&ctx, &mut server, &archive, &archive);
        std::fs::create_dir_all(ctx.bin_dir()).unwrap();
        std::fs::write(target(&ctx), "previous").unwrap();

        let output = ctx.run(&["install", "9.0.0"]);
        assert!(!output.status.success());
        assert!(stderr(&output).contains("Smoke test"));
        assert_eq!(std::fs::read_to_string(target(&ctx)).unwrap(), "previous");
    }

    #[test]
    fn test_verify_without_install_fails() {
        let ctx = TestContext::new();
        let output = ctx.run(&["verify"]);
        assert!(!output.status.success());
        assert!(stderr(&output).contains("not installed"));
    }
}
