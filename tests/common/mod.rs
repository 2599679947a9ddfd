//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::process::Stdio;
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

const BIN: &str = env!("CARGO_BIN_EXE_graceful-reboot");

/// How long to wait for a log line before failing the test.
pub const LINE_TIMEOUT: Duration = Duration::from_secs(10);

/// A running `graceful-reboot` binary with its log output.
pub struct Service {
    pub child: Child,
    lines: mpsc::UnboundedReceiver<String>,
    seen: Vec<String>,
}

impl Service {
    /// Start the host binary with `args`, capturing stdout line by line.
    pub fn spawn(args: &[&str]) -> Self {
        let mut command = Command::new(BIN);
        command.args(args);
        Self::spawn_command(command)
    }

    /// Start the host binary in the background of a shell that exits at
    /// once, leaving the service to be adopted by init.
    ///
    /// `child` is the shell, which has already exited on return.
    pub async fn spawn_orphaned(args: &[&str]) -> Self {
        let mut command = Command::new("/bin/sh");
        command
            .arg("-c")
            .arg(r#""$0" "$@" & exit 0"#)
            .arg(BIN)
            .args(args);
        let mut service = Self::spawn_command(command);
        let shell = service.child.wait().await.expect("wait for shell");
        assert!(shell.success());
        service
    }

    fn spawn_command(mut command: Command) -> Self {
        let mut child = command
            .env("RUST_LOG", "graceful_reboot=info")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .expect("spawn graceful-reboot");

        let stdout = child.stdout.take().expect("piped stdout");
        let (tx, lines) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        Self {
            child,
            lines,
            seen: Vec::new(),
        }
    }

    pub fn pid(&self) -> i32 {
        self.child.id().expect("child still running") as i32
    }

    pub fn signal(&self, signal: Signal) {
        kill(Pid::from_raw(self.pid()), signal).expect("send signal");
    }

    /// Read lines until one contains `needle`.
    pub async fn wait_for(&mut self, needle: &str) -> String {
        let found = tokio::time::timeout(LINE_TIMEOUT, async {
            while let Some(line) = self.lines.recv().await {
                self.seen.push(line.clone());
                if line.contains(needle) {
                    return Some(line);
                }
            }
            None
        })
        .await;

        match found {
            Ok(Some(line)) => line,
            _ => panic!("no line containing {needle:?}; saw:\n{}", self.seen.join("\n")),
        }
    }

    /// Wait for the `ready` line and return the served address.
    pub async fn wait_ready(&mut self) -> SocketAddr {
        let line = self.wait_for("ready address=").await;
        parse_field(&line, "address")
            .and_then(|a| a.parse().ok())
            .unwrap_or_else(|| panic!("ready line without address: {line}"))
    }

    /// Every line printed so far plus whatever is still buffered.
    ///
    /// Call after the process (and any successor sharing its stdout) exited.
    pub async fn collect(mut self) -> Vec<String> {
        while let Ok(Some(line)) = tokio::time::timeout(LINE_TIMEOUT, self.lines.recv()).await {
            self.seen.push(line);
        }
        self.seen
    }
}

/// Value of `key=value` in a formatted log line.
pub fn parse_field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let prefix = format!("{key}=");
    line.split_whitespace()
        .find_map(|token| token.strip_prefix(prefix.as_str()))
}

/// Poll `/status` until it is served by a process other than `old_pid`.
pub async fn wait_for_successor(addr: SocketAddr, old_pid: i64) -> serde_json::Value {
    let deadline = tokio::time::Instant::now() + LINE_TIMEOUT;
    loop {
        let attempt = tokio::time::timeout(Duration::from_secs(2), try_status(addr)).await;
        if let Ok(Ok(status)) = attempt {
            if status["pid"].as_i64().is_some_and(|pid| pid != old_pid) {
                return status;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "no successor took over {addr}"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

async fn try_status(addr: SocketAddr) -> reqwest::Result<serde_json::Value> {
    reqwest::get(format!("http://{addr}/status")).await?.json().await
}

/// Fetch `/status` from a running service.
pub async fn status(addr: SocketAddr) -> serde_json::Value {
    reqwest::get(format!("http://{addr}/status"))
        .await
        .expect("status request")
        .json()
        .await
        .expect("status json")
}
