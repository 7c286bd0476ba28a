use crate::app_error::ExitCode;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    #[default]
    Build,
    Test,
    Archive,
    Clean,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Build => "build",
            Operation::Test => "test",
            Operation::Archive => "archive",
            Operation::Clean => "clean",
        }
    }

    pub fn verb(self) -> &'static str {
        match self {
            Operation::Build => "Building",
            Operation::Test => "Testing",
            Operation::Archive => "Archiving",
            Operation::Clean => "Cleaning",
        }
    }

    /// Only build and test run against a simulator destination.
    pub fn needs_destination(self) -> bool {
        matches!(self, Operation::Build | Operation::Test)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Interrupt,
    Terminate,
}

impl SignalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalKind::Interrupt => "interrupted",
            SignalKind::Terminate => "terminated",
        }
    }

    pub fn exit_code(self) -> i32 {
        match self {
            SignalKind::Interrupt => ExitCode::Interrupted.code(),
            SignalKind::Terminate => ExitCode::Terminated.code(),
        }
    }
}

/// Resolved options for one supervised invocation.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub dir: PathBuf,
    pub scheme: String,
    pub operation: Operation,
    pub destination: Option<String>,
    pub timeout: Duration,
    pub log_path: PathBuf,
    pub archive_path: Option<PathBuf>,
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success { elapsed: Duration },
    Failure { exit_code: i32, elapsed: Duration },
    TimedOut { timeout: Duration },
    Cancelled(SignalKind),
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Success { .. } => ExitCode::Success.code(),
            Outcome::Failure { exit_code, .. } => *exit_code,
            Outcome::TimedOut { .. } => ExitCode::Timeout.code(),
            Outcome::Cancelled(kind) => kind.exit_code(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn status(&self) -> &'static str {
        match self {
            Outcome::Success { .. } => "success",
            Outcome::Failure { .. } => "failed",
            Outcome::TimedOut { .. } => "timed_out",
            Outcome::Cancelled(kind) => kind.as_str(),
        }
    }
}
