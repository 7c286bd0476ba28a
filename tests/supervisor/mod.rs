use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::tempdir;
use xcwrap_cli::command::BuildCommand;
use xcwrap_cli::model::{Outcome, SignalKind};
use xcwrap_cli::supervisor::{SupervisedRun, SupervisorOptions, TeardownLatch, supervise};

fn shell(dir: &Path, script: &str) -> BuildCommand {
    BuildCommand {
        program: "/bin/sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
        dir: dir.to_path_buf(),
        archive_path: None,
    }
}

fn options(log_path: PathBuf, timeout: Duration) -> SupervisorOptions {
    SupervisorOptions {
        timeout,
        grace: Duration::from_millis(500),
        log_path,
        progress: None,
    }
}

/// Gone or a zombie both count as dead; orphaned zombies may linger until
/// init reaps them.
#[cfg(target_os = "linux")]
fn is_alive(pid: i32) -> bool {
    match fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.split_whitespace().next())
            .is_some_and(|state| state != "Z" && state != "X"),
        Err(_) => false,
    }
}

#[cfg(target_os = "linux")]
async fn read_pid(path: &Path) -> i32 {
    for _ in 0..100 {
        if let Ok(text) = fs::read_to_string(path)
            && let Ok(pid) = text.trim().parse()
        {
            return pid;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("pid file {} never written", path.display());
}

#[tokio::test]
async fn success_before_timeout() {
    let dir = tempdir().expect("tempdir");
    let log = dir.path().join("build.log");

    let report = supervise(
        &shell(dir.path(), "echo compiled; echo warned >&2"),
        &options(log.clone(), Duration::from_secs(30)),
        std::future::pending(),
    )
    .await
    .expect("supervise");

    assert!(matches!(report.outcome, Outcome::Success { .. }));
    assert!(!report.timed_out);
    assert_eq!(report.outcome.exit_code(), 0);

    let text = fs::read_to_string(&log).expect("read log");
    assert!(text.contains("compiled\n"));
    assert!(text.contains("warned\n"));
    assert_eq!(report.bytes_logged, Some(text.len() as u64));
    assert!(report.last_output.is_some());
}

#[tokio::test]
async fn failure_passes_exit_code_through() {
    let dir = tempdir().expect("tempdir");
    let log = dir.path().join("build.log");

    let report = supervise(
        &shell(dir.path(), "echo 'error: something failed' >&2; exit 65"),
        &options(log.clone(), Duration::from_secs(30)),
        std::future::pending(),
    )
    .await
    .expect("supervise");

    match report.outcome {
        Outcome::Failure { exit_code, .. } => assert_eq!(exit_code, 65),
        other => panic!("unexpected outcome: {other:?}"),
    }
    let text = fs::read_to_string(&log).expect("read log");
    assert_eq!(text, "error: something failed\n");
}

#[tokio::test]
async fn stdout_and_stderr_keep_write_order() {
    let dir = tempdir().expect("tempdir");
    let log = dir.path().join("build.log");

    let report = supervise(
        &shell(
            dir.path(),
            "echo one; echo 'error: two' >&2; echo three; echo 'error: four' >&2",
        ),
        &options(log.clone(), Duration::from_secs(30)),
        std::future::pending(),
    )
    .await
    .expect("supervise");

    assert!(report.outcome.is_success());
    let text = fs::read_to_string(&log).expect("read log");
    assert_eq!(text, "one\nerror: two\nthree\nerror: four\n");
}

// /dev/full fails every write with ENOSPC.
#[cfg(target_os = "linux")]
#[tokio::test]
async fn unwritable_log_does_not_fail_the_build() {
    let dir = tempdir().expect("tempdir");

    let report = supervise(
        &shell(dir.path(), "head -c 4000000 /dev/zero"),
        &options(PathBuf::from("/dev/full"), Duration::from_secs(30)),
        std::future::pending(),
    )
    .await
    .expect("supervise");

    assert!(
        report.outcome.is_success(),
        "unexpected outcome: {:?}",
        report.outcome
    );
    assert_eq!(report.bytes_logged, None);
    assert!(report.last_output.is_some());
}

#[tokio::test]
async fn timeout_kills_group_and_keeps_partial_log() {
    let dir = tempdir().expect("tempdir");
    let log = dir.path().join("build.log");

    let started = std::time::Instant::now();
    let report = supervise(
        &shell(dir.path(), "echo partial; sleep 30; echo never"),
        &options(log.clone(), Duration::from_millis(300)),
        std::future::pending(),
    )
    .await
    .expect("supervise");

    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(report.timed_out);
    assert_eq!(
        report.outcome,
        Outcome::TimedOut {
            timeout: Duration::from_millis(300)
        }
    );
    assert_eq!(report.outcome.exit_code(), 124);

    let text = fs::read_to_string(&log).expect("read log");
    assert!(text.contains("partial"));
    assert!(!text.contains("never"));
}

#[tokio::test]
async fn timed_out_flag_overrides_exit_status() {
    let dir = tempdir().expect("tempdir");
    // SIGKILL leaves a signal status, which must not read as a failure.
    let report = supervise(
        &shell(dir.path(), "sleep 30; exit 0"),
        &options(dir.path().join("build.log"), Duration::from_millis(100)),
        std::future::pending(),
    )
    .await
    .expect("supervise");

    assert!(matches!(report.outcome, Outcome::TimedOut { .. }));
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn interrupt_kills_whole_process_group() {
    let dir = tempdir().expect("tempdir");
    let pid_file = dir.path().join("grandchild.pid");
    let script = format!("sleep 30 & echo $! > '{}'; wait", pid_file.display());

    let signal = {
        let pid_file = pid_file.clone();
        async move {
            read_pid(&pid_file).await;
            SignalKind::Interrupt
        }
    };

    let started = std::time::Instant::now();
    let report = supervise(
        &shell(dir.path(), &script),
        &options(dir.path().join("build.log"), Duration::from_secs(30)),
        signal,
    )
    .await
    .expect("supervise");

    assert_eq!(report.outcome, Outcome::Cancelled(SignalKind::Interrupt));
    assert_eq!(report.outcome.exit_code(), 130);
    assert!(started.elapsed() < Duration::from_secs(10));

    let grandchild = read_pid(&pid_file).await;
    let mut alive = is_alive(grandchild);
    for _ in 0..50 {
        if !alive {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        alive = is_alive(grandchild);
    }
    assert!(!alive, "grandchild {grandchild} survived teardown");
}

#[tokio::test]
async fn terminate_maps_to_143() {
    let dir = tempdir().expect("tempdir");
    let report = supervise(
        &shell(dir.path(), "sleep 30"),
        &options(dir.path().join("build.log"), Duration::from_secs(30)),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            SignalKind::Terminate
        },
    )
    .await
    .expect("supervise");

    assert_eq!(report.outcome.exit_code(), 143);
    assert!(!report.timed_out);
}

#[tokio::test]
async fn teardown_runs_once() {
    let dir = tempdir().expect("tempdir");
    let mut run = SupervisedRun::spawn(
        &shell(dir.path(), "echo once"),
        &options(dir.path().join("build.log"), Duration::from_secs(30)),
    )
    .await
    .expect("spawn");

    let outcome = run.wait(std::future::pending()).await;
    assert!(outcome.is_success());

    assert!(run.teardown().await.is_some());
    assert!(run.teardown().await.is_none());
}

#[test]
fn latch_opens_once() {
    let latch = TeardownLatch::new();
    assert!(!latch.is_done());
    assert!(latch.try_begin());
    assert!(!latch.try_begin());
    assert!(latch.is_done());
}

#[tokio::test]
async fn missing_program_is_a_spawn_error() {
    let dir = tempdir().expect("tempdir");
    let cmd = BuildCommand {
        program: "/definitely/not/xcodebuild".to_string(),
        args: Vec::new(),
        dir: dir.path().to_path_buf(),
        archive_path: None,
    };

    let err = supervise(
        &cmd,
        &options(dir.path().join("build.log"), Duration::from_secs(5)),
        std::future::pending(),
    )
    .await
    .expect_err("spawn should fail");
    assert!(err.to_string().contains("/definitely/not/xcodebuild"));
}
