//! Lifecycle of one build-tool process.
//!
//! A run starts in its own process group with a timeout timer armed. It ends
//! when the child exits, the timer fires, or a shutdown signal arrives. Every
//! ending goes through [`SupervisedRun::teardown`], which kills the process
//! group before returning, so nothing the build tool started outlives the
//! wrapper.

pub mod sink;
pub mod tree;

use crate::app_error::SetupError;
use crate::command::BuildCommand;
use crate::model::{Operation, Outcome, SignalKind};
use crate::progress::Progress;
use sink::LogSink;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::process::Child;
use tokio::time::Sleep;
use tracing::{debug, info, warn};
use tree::ProcessTree;

#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    pub timeout: Duration,
    /// Upper bound on teardown after the process group is killed.
    pub grace: Duration,
    pub log_path: PathBuf,
    /// Operation whose verb the progress line shows; `None` disables it.
    pub progress: Option<Operation>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: Outcome,
    pub pid: u32,
    pub timed_out: bool,
    pub bytes_logged: Option<u64>,
    /// Time from spawn to the last chunk of output, if any arrived.
    pub last_output: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeardownStats {
    pub bytes_logged: Option<u64>,
    pub last_output: Option<Duration>,
}

/// One-shot guard so overlapping triggers run cleanup once.
#[derive(Debug, Default)]
pub struct TeardownLatch(AtomicBool);

impl TeardownLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true for the first caller only.
    pub fn try_begin(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    pub fn is_done(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

enum Trigger {
    Exited(io::Result<ExitStatus>),
    Timeout,
    Signal(SignalKind),
}

pub struct SupervisedRun {
    child: Child,
    tree: ProcessTree,
    started: Instant,
    timeout: Duration,
    grace: Duration,
    timed_out: bool,
    timer: Option<Pin<Box<Sleep>>>,
    sink: Option<LogSink>,
    progress: Option<Progress>,
    latch: TeardownLatch,
}

/// Runs `command` to a terminal outcome and tears it down.
///
/// `shutdown` resolves when the wrapper is asked to stop; pass
/// [`std::future::pending`] to supervise without signal handling.
pub async fn supervise<F>(
    command: &BuildCommand,
    options: &SupervisorOptions,
    shutdown: F,
) -> Result<RunReport, SetupError>
where
    F: Future<Output = SignalKind>,
{
    let mut run = SupervisedRun::spawn(command, options).await?;
    let outcome = run.wait(shutdown).await;
    let stats = run.teardown().await.unwrap_or(TeardownStats {
        bytes_logged: None,
        last_output: None,
    });

    debug!(
        pid = run.pid(),
        status = outcome.status(),
        bytes = ?stats.bytes_logged,
        last_output_ms = ?stats.last_output.map(|d| d.as_millis()),
        "supervised run finished"
    );

    Ok(RunReport {
        outcome,
        pid: run.pid(),
        timed_out: run.timed_out(),
        bytes_logged: stats.bytes_logged,
        last_output: stats.last_output,
    })
}

impl SupervisedRun {
    pub async fn spawn(
        command: &BuildCommand,
        options: &SupervisorOptions,
    ) -> Result<Self, SetupError> {
        let file = sink::create_log(&options.log_path)
            .await
            .map_err(|source| SetupError::LogFile {
                path: options.log_path.clone(),
                source,
            })?;

        let spawn_error = |source: io::Error| SetupError::Spawn {
            program: command.program.clone(),
            source,
        };

        let mut cmd = command.to_tokio_command();
        ProcessTree::isolate(&mut cmd);
        cmd.kill_on_drop(true);
        let capture = sink::capture(&mut cmd).map_err(spawn_error)?;

        let mut child = cmd.spawn().map_err(spawn_error)?;
        let started = Instant::now();
        // Release the parent's copies of the pipe's write end so the sink
        // sees EOF once the child's process group is gone.
        drop(cmd);

        let Some(pid) = child.id() else {
            return Err(spawn_error(io::Error::other(
                "child exited before its pid was read",
            )));
        };

        let sink = LogSink::start(file, capture.into_streams(&mut child));
        let progress = options
            .progress
            .map(|operation| Progress::start(operation, started));

        info!(
            pid,
            program = %command.program,
            timeout_secs = options.timeout.as_secs(),
            log = %options.log_path.display(),
            "build tool started"
        );

        Ok(Self {
            child,
            tree: ProcessTree::new(pid),
            started,
            timeout: options.timeout,
            grace: options.grace,
            timed_out: false,
            timer: Some(Box::pin(tokio::time::sleep(options.timeout))),
            sink: Some(sink),
            progress,
            latch: TeardownLatch::new(),
        })
    }

    pub fn pid(&self) -> u32 {
        self.tree.root()
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Waits for the first of child exit, timeout, or `shutdown`.
    pub async fn wait<F>(&mut self, shutdown: F) -> Outcome
    where
        F: Future<Output = SignalKind>,
    {
        tokio::pin!(shutdown);

        let trigger = {
            let child = &mut self.child;
            let timer = &mut self.timer;
            tokio::select! {
                status = child.wait() => Trigger::Exited(status),
                () = expired(timer) => Trigger::Timeout,
                kind = &mut shutdown => Trigger::Signal(kind),
            }
        };

        match trigger {
            Trigger::Exited(status) => self.classify(status),
            Trigger::Timeout => {
                warn!(
                    pid = self.pid(),
                    timeout_secs = self.timeout.as_secs(),
                    "timeout reached; killing process group"
                );
                self.timed_out = true;
                self.timer = None;
                self.kill_tree().await;
                let status = self.reap().await;
                self.classify(status)
            }
            Trigger::Signal(kind) => {
                warn!(
                    pid = self.pid(),
                    signal = kind.as_str(),
                    "shutdown requested; killing process group"
                );
                self.kill_tree().await;
                let _ = self.reap().await;
                Outcome::Cancelled(kind)
            }
        }
    }

    /// Single-shot cleanup. Returns `None` if teardown already ran.
    pub async fn teardown(&mut self) -> Option<TeardownStats> {
        if !self.latch.try_begin() {
            debug!(pid = self.pid(), "teardown already ran");
            return None;
        }

        let deadline = tokio::time::Instant::now() + self.grace;

        if self.timer.take().is_some() {
            debug!(pid = self.pid(), "timeout timer cancelled");
        }

        if let Some(progress) = self.progress.take() {
            progress.stop().await;
        }

        self.kill_tree().await;

        let mut stats = TeardownStats {
            bytes_logged: None,
            last_output: None,
        };
        if let Some(sink) = self.sink.take() {
            stats.last_output = sink
                .last_output()
                .map(|at| at.saturating_duration_since(self.started));
            stats.bytes_logged = sink.close(deadline).await;
        }

        tokio::time::sleep_until(deadline).await;
        Some(stats)
    }

    async fn kill_tree(&self) {
        match self.tree.kill().await {
            Ok(true) => debug!(pgid = self.pid(), "killed process group"),
            Ok(false) => debug!(pgid = self.pid(), "process group already gone"),
            Err(err) => warn!(pgid = self.pid(), error = %err, "killing process group failed"),
        }
    }

    async fn reap(&mut self) -> io::Result<ExitStatus> {
        let limit = self.grace.max(Duration::from_millis(500));
        match tokio::time::timeout(limit, self.child.wait()).await {
            Ok(status) => status,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "child did not exit after kill",
            )),
        }
    }

    /// The timed-out flag wins over whatever status the child reported.
    fn classify(&self, status: io::Result<ExitStatus>) -> Outcome {
        if self.timed_out {
            return Outcome::TimedOut {
                timeout: self.timeout,
            };
        }

        let elapsed = self.elapsed();
        match status {
            Ok(status) if status.success() => Outcome::Success { elapsed },
            Ok(status) => Outcome::Failure {
                exit_code: exit_code_of(status),
                elapsed,
            },
            Err(err) => {
                warn!(pid = self.pid(), error = %err, "waiting for build tool failed");
                Outcome::Failure {
                    exit_code: 1,
                    elapsed,
                }
            }
        }
    }
}

async fn expired(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

/// Exit code to pass through for a failed child. A child killed by a signal
/// reports `128 + signal`, as shells do.
pub fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}
