//! Descriptor handoff to a successor process.
//!
//! The successor is a shell that records what it inherited: its argv,
//! working directory, environment and descriptor table.

#![cfg(target_os = "linux")]

use std::fs;
use std::os::fd::AsRawFd;
use std::path::Path;
use std::time::Duration;

use graceful_reboot::config::LifecycleConfig;
use graceful_reboot::lifecycle::{AttemptKind, Lifecycle, ParentRetirement, ProcessImage};

const INSPECT_SCRIPT: &str = r#"
if [ -e /proc/$$/fd/4 ]; then extra=present; else extra=absent; fi
fd0=$(readlink /proc/$$/fd/0)
fd1=$(readlink /proc/$$/fd/1)
fd2=$(readlink /proc/$$/fd/2)
fd3=$(readlink /proc/$$/fd/3)
printf '%s\n' "$extra" > fd4
printf '%s\n%s\n%s\n' "$fd0" "$fd1" "$fd2" > stdio
printf '%s\n' "$fd3" > fd3
printf '%s' "$PATH" > path
cat /proc/$$/cmdline > cmdline
pwd -P > cwd
: > done
"#;

fn config() -> LifecycleConfig {
    LifecycleConfig {
        retire_parent: false,
        signals_enabled: false,
        ..LifecycleConfig::default()
    }
}

async fn wait_for_file(path: &Path) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !path.exists() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "successor never wrote {}",
            path.display()
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

fn link(fd: i32) -> String {
    fs::read_link(format!("/proc/self/fd/{fd}"))
        .unwrap()
        .to_string_lossy()
        .into_owned()
}

#[tokio::test]
async fn successor_inherits_argv_cwd_and_descriptors() {
    let dir = tempfile::tempdir().unwrap();
    let workdir = dir.path().canonicalize().unwrap();
    let argv = ["/bin/sh", "-c", INSPECT_SCRIPT, "inspect", "extra-arg"];

    let lifecycle = Lifecycle::with_image(
        config(),
        ProcessImage::new(argv, &workdir),
        ParentRetirement::Disabled,
    );

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    assert_eq!(lifecycle.set_extract_proc_files([&listener]).unwrap(), 1);
    // Registering again changes nothing.
    assert_eq!(lifecycle.set_extract_proc_files([&listener]).unwrap(), 0);
    assert_eq!(lifecycle.proc_files(), vec![0, 1, 2, listener.as_raw_fd()]);

    let outcome = lifecycle.reboot(Some(Duration::from_secs(2))).await;
    assert_eq!(outcome.kind(), AttemptKind::Reboot);
    let status = outcome.status().expect("attempt ran");
    assert!(status.successor().is_some());
    assert!(status.is_graceful());
    assert_eq!(outcome.exit_code(), 0);

    wait_for_file(&workdir.join("done")).await;

    let mut expected_cmdline = argv.join("\0");
    expected_cmdline.push('\0');
    assert_eq!(fs::read_to_string(workdir.join("cmdline")).unwrap(), expected_cmdline);

    assert_eq!(
        fs::read_to_string(workdir.join("cwd")).unwrap().trim_end(),
        workdir.to_str().unwrap()
    );

    assert_eq!(
        fs::read_to_string(workdir.join("path")).unwrap(),
        std::env::var("PATH").unwrap_or_default()
    );

    let stdio = fs::read_to_string(workdir.join("stdio")).unwrap();
    let stdio: Vec<&str> = stdio.lines().collect();
    assert_eq!(stdio, vec![link(0), link(1), link(2)]);

    assert_eq!(
        fs::read_to_string(workdir.join("fd3")).unwrap().trim_end(),
        link(listener.as_raw_fd())
    );
    assert_eq!(fs::read_to_string(workdir.join("fd4")).unwrap().trim_end(), "absent");
}

#[tokio::test]
async fn unresolvable_successor_still_tears_down() {
    let dir = tempfile::tempdir().unwrap();
    let image = ProcessImage::new(["./no-such-binary"], dir.path());
    let lifecycle = Lifecycle::with_image(config(), image, ParentRetirement::Disabled);

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    lifecycle.set_extract_proc_files([&listener]).unwrap();

    let outcome = lifecycle.reboot(Some(Duration::from_secs(2))).await;
    assert!(lifecycle.is_shutting_down());
    assert_eq!(outcome.exit_code(), 255);
    assert!(outcome.status().unwrap().successor().is_none());
    // Only a failed spawn degraded the attempt.
    assert!(outcome.status().unwrap().is_graceful());

    // The registered socket is still usable by this process.
    assert!(listener.local_addr().is_ok());
}
