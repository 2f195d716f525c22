//! Integration tests for the `storeview` binary.
//!
//! A host is spawned with `serve`, its port is read from stdout, and the
//! inspector subcommands are run against it as separate processes.

use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncBufReadExt;
use tokio::process::{Child, Command};

const BINARY: &str = env!("CARGO_BIN_EXE_storeview");

struct HostHandle {
    child: Child,
    port: u16,
    stdout_drain: Option<tokio::task::JoinHandle<()>>,
}

impl HostHandle {
    async fn stop(mut self) {
        if let Some(drain) = self.stdout_drain.take() {
            drain.abort();
        }
        let _ = self.child.kill().await;
        let _ = self.child.wait().await;
    }
}

impl Drop for HostHandle {
    fn drop(&mut self) {
        if let Some(drain) = self.stdout_drain.take() {
            drain.abort();
        }
        let _ = self.child.start_kill();
    }
}

/// Start `storeview serve` and wait for its port line.
async fn start_host(extra_args: &[&str]) -> Result<HostHandle, String> {
    let mut child = Command::new(BINARY)
        .arg("serve")
        .arg("--port")
        .arg("0")
        .args(extra_args)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| format!("failed to spawn storeview: {e}"))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| "failed to capture stdout".to_string())?;
    let mut lines = tokio::io::BufReader::new(stdout).lines();

    let line = tokio::time::timeout(Duration::from_secs(20), lines.next_line())
        .await
        .map_err(|_| "timed out waiting for STOREVIEW_PORT".to_string())?
        .map_err(|e| format!("failed to read storeview stdout: {e}"))?
        .ok_or_else(|| "storeview exited before printing its port".to_string())?;

    let port = line
        .strip_prefix("STOREVIEW_PORT=")
        .ok_or_else(|| format!("unexpected first line '{line}'"))?
        .trim()
        .parse::<u16>()
        .map_err(|e| format!("invalid STOREVIEW_PORT in '{line}': {e}"))?;

    let stdout_drain =
        tokio::spawn(async move { while let Ok(Some(_)) = lines.next_line().await {} });

    Ok(HostHandle {
        child,
        port,
        stdout_drain: Some(stdout_drain),
    })
}

/// Run an inspector subcommand; returns (success, stdout).
async fn inspect(port: u16, args: &[&str]) -> (bool, String) {
    let output = Command::new(BINARY)
        .args(&args[..1])
        .arg("--port")
        .arg(port.to_string())
        .args(&args[1..])
        .stderr(Stdio::null())
        .output()
        .await
        .expect("failed to run storeview");

    (
        output.status.success(),
        String::from_utf8_lossy(&output.stdout).into_owned(),
    )
}

#[tokio::test]
async fn test_seeded_host_lists_entries() {
    let host = start_host(&["--seed", "theme=dark", "--seed", "lang=en"])
        .await
        .unwrap();

    let (ok, stdout) = inspect(host.port, &["list"]).await;
    assert!(ok);
    assert_eq!(stdout, "theme\tdark\nlang\ten\n");

    let (ok, stdout) = inspect(host.port, &["list", "--json"]).await;
    assert!(ok);
    let entries: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(entries, serde_json::json!([["theme", "dark"], ["lang", "en"]]));

    host.stop().await;
}

#[tokio::test]
async fn test_write_then_delete() {
    let host = start_host(&[]).await.unwrap();

    let (ok, _) = inspect(host.port, &["write", "k", "v"]).await;
    assert!(ok);
    let (_, stdout) = inspect(host.port, &["list"]).await;
    assert_eq!(stdout, "k\tv\n");

    let (ok, _) = inspect(host.port, &["delete", "k"]).await;
    assert!(ok);
    let (_, stdout) = inspect(host.port, &["list"]).await;
    assert!(stdout.is_empty());

    host.stop().await;
}

#[tokio::test]
async fn test_sqlite_host_persists_between_runs() {
    let temp = TempDir::new().unwrap();
    let db = temp.path().join("host.sqlite");
    let db_arg = db.to_str().unwrap();

    let host = start_host(&["--db", db_arg]).await.unwrap();
    let (ok, _) = inspect(host.port, &["write", "saved", "yes"]).await;
    assert!(ok);
    host.stop().await;

    let host = start_host(&["--db", db_arg]).await.unwrap();
    let (_, stdout) = inspect(host.port, &["list"]).await;
    assert_eq!(stdout, "saved\tyes\n");
    host.stop().await;
}

#[tokio::test]
async fn test_inspect_without_host_fails() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let (ok, stdout) = inspect(port, &["list"]).await;
    assert!(!ok);
    assert!(stdout.is_empty());
}
