//! Shared test utilities for devpacker CLI tests.

#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// `devpacker` with the build mode and log filter variables cleared so the
/// host environment cannot leak into a test
pub fn devpacker() -> Command {
    let mut cmd = Command::cargo_bin("devpacker").unwrap();
    cmd.env_remove("BP_DCNB_BUILD_MODE")
        .env_remove("BP_DCNB_OMIT_APP_DIR")
        .env_remove("DEVPACKER_LOG")
        .env_remove("RUST_LOG");
    cmd
}

/// Write an executable `sh` script
pub fn write_executable(path: &Path, body: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).unwrap();
}

/// A features folder with two features:
///
/// - `go`: detect script that writes a version selection, acquire script, a
///   configure script and a PATH containerEnv
/// - `node`: no scripts besides configure, detected only on request
pub fn write_features_folder(root: &Path) -> PathBuf {
    fs::create_dir_all(root).unwrap();
    fs::write(
        root.join("devpack-settings.json"),
        r#"{
            "publisher": "acme",
            "featureSet": "tools",
            "version": "1.2.0"
        }"#,
    )
    .unwrap();
    fs::write(
        root.join("devcontainer-features.json"),
        r#"{
            "features": [
                {
                    "id": "go",
                    "name": "Go",
                    "options": {"version": {"type": "string", "default": "latest"}},
                    "extensions": ["golang.go"],
                    "containerEnv": {"PATH": "/usr/local/go/bin:${PATH}", "GOPATH": "/go"}
                },
                {
                    "id": "node",
                    "options": {"version": {"type": "string", "default": "lts"}}
                }
            ]
        }"#,
    )
    .unwrap();

    write_executable(
        &root.join("features/go/bin/detect"),
        "if [ -f go.mod ]; then\n  echo \"_BUILD_ARG_GO_VERSION=1.19\" > \"$_BUILD_ARG_GO_SELECTION_ENV_FILE_PATH\"\n  exit 0\nfi\nexit 100",
    );
    write_executable(
        &root.join("features/go/bin/acquire"),
        "mkdir -p \"$_BUILD_ARG_GO_TARGETPATH/bin\"\necho \"go $_BUILD_ARG_GO_VERSION\" > \"$_BUILD_ARG_GO_TARGETPATH/bin/go\"",
    );
    write_executable(&root.join("features/go/bin/configure"), "true");
    write_executable(&root.join("features/node/bin/configure"), "true");
    fs::create_dir_all(root.join("common")).unwrap();
    fs::write(root.join("common/utils.sh"), "# shared helpers\n").unwrap();
    root.to_path_buf()
}

/// Fake docker: `image inspect` prints `$FAKE_INSPECT_OUTPUT`, `build` records
/// its arguments and working directory in `$FAKE_DOCKER_LOG`
pub fn write_fake_docker(dir: &Path) -> PathBuf {
    let path = dir.join("docker");
    write_executable(
        &path,
        r#"case "$1" in
  image)
    if [ -n "$FAKE_INSPECT_FAIL" ]; then
      echo "Error: No such image: $3" >&2
      exit 1
    fi
    printf '%s\n' "$FAKE_INSPECT_OUTPUT"
    ;;
  build)
    echo "cwd-has-script=$(test -x post-processing.sh && echo yes || echo no)" >> "$FAKE_DOCKER_LOG"
    for arg in "$@"; do echo "$arg" >> "$FAKE_DOCKER_LOG"; done
    ;;
esac"#,
    );
    path
}

/// Fake pack recording its arguments and working directory in `$FAKE_PACK_LOG`
pub fn write_fake_pack(dir: &Path, exit_code: i32) -> PathBuf {
    let path = dir.join("pack");
    write_executable(
        &path,
        &format!(
            "echo \"cwd=$(pwd)\" >> \"$FAKE_PACK_LOG\"\nfor arg in \"$@\"; do echo \"$arg\" >> \"$FAKE_PACK_LOG\"; done\nexit {}",
            exit_code
        ),
    );
    path
}

/// `docker image inspect` output for an image built from the fixture features
pub fn inspect_output(mode: &str, done: &str) -> String {
    serde_json::json!({
        "lifecycle": {"buildpacks": [{"key": "acme/tools", "layers": {
            "go": {"data": {"com.microsoft.devcontainer.feature": {
                "id": "acme/tools/go",
                "version": "1.2.0",
                "config": {"id": "go", "extensions": ["golang.go"]},
                "optionSelections": {"version": "1.19", "buildMode": mode}
            }}}
        }}]},
        "buildmode": mode,
        "done": done,
        "user": "vscode"
    })
    .to_string()
}
