//! End-to-end shutdown and reboot of the host binary through signals.

use std::io::Write;
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

mod common;

use common::Service;

/// Default shutdown budget plus slack.
const EXIT_BUDGET: Duration = Duration::from_secs(25);

#[tokio::test]
async fn sigint_exits_zero_and_runs_hook_once() {
    let mut service = Service::spawn(&["--bind", "127.0.0.1:0"]);
    let addr = service.wait_ready().await;

    let body = reqwest::get(format!("http://{addr}/"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains(&service.pid().to_string()));

    service.signal(Signal::SIGINT);

    let status = tokio::time::timeout(EXIT_BUDGET, service.child.wait())
        .await
        .expect("service did not exit in time")
        .unwrap();
    assert_eq!(status.code(), Some(0));

    let lines = service.collect().await;
    let hooks = lines
        .iter()
        .filter(|l| l.contains("pre-close hook invoked"))
        .count();
    assert_eq!(hooks, 1, "log:\n{}", lines.join("\n"));
    assert!(lines.iter().any(|l| l.contains("Process shut down gracefully")));
}

#[tokio::test]
async fn sigterm_lets_in_flight_request_finish() {
    let mut service = Service::spawn(&["--bind", "127.0.0.1:0"]);
    let addr = service.wait_ready().await;

    let slow = tokio::spawn(async move {
        reqwest::get(format!("http://{addr}/slow/1500"))
            .await
            .map(|r| r.status())
    });

    // Wait until the request is being served.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let status = common::status(addr).await;
        // The status request counts itself.
        if status["in_flight"].as_u64() >= Some(2) {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "slow request never started");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    service.signal(Signal::SIGTERM);

    let response = slow.await.unwrap().expect("in-flight request was dropped");
    assert!(response.is_success());

    let status = tokio::time::timeout(EXIT_BUDGET, service.child.wait())
        .await
        .expect("service did not exit in time")
        .unwrap();
    assert_eq!(status.code(), Some(0));
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn reboot_signal_hands_listener_to_successor() {
    // The predecessor's parent is this test process; never signal it.
    let mut config = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        config,
        "[lifecycle]\nretire_parent = false\n\n[listener]\nbind_address = \"127.0.0.1:0\"\n"
    )
    .unwrap();
    let config_path = config.path().to_str().unwrap().to_string();

    let mut service = Service::spawn(&["--config", &config_path]);
    let addr = service.wait_ready().await;
    let predecessor = service.pid();

    let before = common::status(addr).await;
    assert_eq!(before["pid"].as_i64(), Some(i64::from(predecessor)));
    assert_eq!(before["inherited_listener"], false);

    service.signal(Signal::SIGUSR2);

    let status = tokio::time::timeout(EXIT_BUDGET, service.child.wait())
        .await
        .expect("predecessor did not exit in time")
        .unwrap();
    assert_eq!(status.code(), Some(0));

    // Same address, new process.
    let after = common::status(addr).await;
    let successor = after["pid"].as_i64().expect("pid") as i32;
    assert_ne!(successor, predecessor);
    assert_eq!(after["inherited_listener"], true);
    assert_ne!(after["instance_id"], before["instance_id"]);

    kill(Pid::from_raw(successor), Signal::SIGTERM).unwrap();

    let lines = service.collect().await;
    assert!(
        lines.iter().any(|l| l.contains("Process rebooted gracefully")),
        "log:\n{}",
        lines.join("\n")
    );
    assert!(lines.iter().any(|l| l.contains("Listener inherited from predecessor")));
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn reboot_after_parent_exited_does_not_signal_stale_pid() {
    let mut config = tempfile::NamedTempFile::new().unwrap();
    writeln!(config, "[listener]\nbind_address = \"127.0.0.1:0\"\n").unwrap();
    let config_path = config.path().to_str().unwrap().to_string();

    // The shell that started the service is gone before the reboot.
    let mut service = Service::spawn_orphaned(&["--config", &config_path]).await;
    let addr = service.wait_ready().await;

    let before = common::status(addr).await;
    let predecessor = before["pid"].as_i64().expect("pid");
    let ppid = before["ppid"].as_i64().expect("ppid");
    if ppid != 1 {
        // Adopted by a subreaper rather than init; retirement would signal it.
        eprintln!("skipping: service was adopted by pid {ppid}, not init");
        kill(Pid::from_raw(predecessor as i32), Signal::SIGTERM).unwrap();
        return;
    }

    kill(Pid::from_raw(predecessor as i32), Signal::SIGUSR2).unwrap();

    let after = common::wait_for_successor(addr, predecessor).await;
    let successor = after["pid"].as_i64().expect("pid") as i32;
    assert_eq!(after["inherited_listener"], true);

    kill(Pid::from_raw(successor), Signal::SIGTERM).unwrap();

    let lines = service.collect().await;
    let log = lines.join("\n");
    assert!(lines.iter().any(|l| l.contains("Process rebooted gracefully")), "log:\n{log}");
    assert!(!lines.iter().any(|l| l.contains("Failed to retire parent")), "log:\n{log}");
    assert!(!lines.iter().any(|l| l.contains("Sent SIGTERM to parent")), "log:\n{log}");
}
