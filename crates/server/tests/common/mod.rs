#![allow(dead_code)]

use anyhow::Context as _;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

pub use oas_mcp_test_support::{
    KillOnDrop, pick_unused_port, spawn_echo_upstream, wait_http_ok,
};

pub const PETSTORE: &str = r#"
openapi: 3.0.3
info:
  title: Petstore
  version: 1.0.0
paths:
  /pets/{id}:
    get:
      parameters:
        - name: id
          in: path
          required: true
          schema:
            type: string
        - name: verbose
          in: query
          schema:
            type: boolean
  /pets:
    post:
      operationId: createPet
      summary: Create a pet
      requestBody:
        required: true
        content:
          application/json:
            schema:
              type: object
"#;

pub fn write_doc(dir: &Path, name: &str, contents: &str) -> anyhow::Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

fn command(workdir: &Path, doc: &Path, upstream: &str) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_oas-mcp"));
    // Run from an empty directory so no stray ./config.yaml is picked up.
    cmd.current_dir(workdir)
        .arg("--swagger-file")
        .arg(doc)
        .arg("--upstream-base-url")
        .arg(upstream)
        .arg("--upstream-timeout")
        .arg("5");
    cmd
}

pub fn spawn_stdio(workdir: &Path, doc: &Path, upstream: &str) -> anyhow::Result<Child> {
    command(workdir, doc, upstream)
        .arg("--mode")
        .arg("stdio")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("spawn oas-mcp (stdio)")
}

pub fn spawn_http(
    workdir: &Path,
    doc: &Path,
    upstream: &str,
    mode: &str,
    port: u16,
    extra: &[&str],
) -> anyhow::Result<Child> {
    command(workdir, doc, upstream)
        .arg("--mode")
        .arg(mode)
        .arg("--host")
        .arg("127.0.0.1")
        .arg("--port")
        .arg(port.to_string())
        .arg("--shutdown-grace")
        .arg("1")
        .args(extra)
        .stdin(Stdio::null())
        .spawn()
        .with_context(|| format!("spawn oas-mcp ({mode})"))
}
