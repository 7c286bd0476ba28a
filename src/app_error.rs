use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    Setup = 1,
    Timeout = 124,
    Interrupted = 130,
    Terminated = 143,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Conditions detected before the build tool is spawned. All map to exit code 1.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("target directory {} does not exist", .0.display())]
    TargetDirMissing(PathBuf),

    #[error("no .xcworkspace or .xcodeproj found in {}", .0.display())]
    NoDescriptorFound(PathBuf),

    #[error("multiple {kind} files found in {}: {}", dir.display(), found.join(", "))]
    AmbiguousDescriptor {
        dir: PathBuf,
        kind: &'static str,
        found: Vec<String>,
    },

    #[error("device {device:?} not found in simulator list")]
    InvalidDevice { device: String, listing: String },

    #[error("{tool} unavailable: {reason}")]
    ToolUnavailable { tool: String, reason: String },

    #[error("start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("open log file {}: {source}", path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug)]
pub struct AppError {
    code: ExitCode,
    message: String,
}

impl AppError {
    pub fn usage<T: Into<String>>(message: T) -> Self {
        Self {
            code: ExitCode::Setup,
            message: message.into(),
        }
    }

    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self {
            code: ExitCode::Setup,
            message: message.into(),
        }
    }

    pub fn code(&self) -> i32 {
        self.code.code()
    }
}

impl From<SetupError> for AppError {
    fn from(err: SetupError) -> Self {
        Self {
            code: ExitCode::Setup,
            message: err.to_string(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}
