//! Whole-tree termination for the supervised child.
//!
//! On unix the child leads its own process group and the group is killed with
//! `killpg(SIGKILL)`. On Windows the child gets a new process group and the
//! tree is killed with `taskkill /T /F`.

use std::io;
use tokio::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessTree {
    root: u32,
}

impl ProcessTree {
    pub fn new(root: u32) -> Self {
        Self { root }
    }

    /// Pid of the child, which is also the process group id on unix.
    pub fn root(&self) -> u32 {
        self.root
    }

    /// Makes the spawned child the leader of a fresh process group.
    pub fn isolate(cmd: &mut Command) {
        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        #[cfg(windows)]
        {
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
            cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
        }
    }

    /// Forcefully kills every process in the tree.
    ///
    /// Returns `Ok(false)` when nothing was left to kill.
    #[cfg(unix)]
    pub async fn kill(&self) -> io::Result<bool> {
        use nix::errno::Errno;
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        let Ok(raw) = i32::try_from(self.root) else {
            return Err(io::Error::other(format!("pid {} out of range", self.root)));
        };

        match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
            Ok(()) => Ok(true),
            Err(Errno::ESRCH) => Ok(false),
            Err(errno) => Err(io::Error::from(errno)),
        }
    }

    #[cfg(windows)]
    pub async fn kill(&self) -> io::Result<bool> {
        use std::process::Stdio;

        let status = Command::new("taskkill")
            .args(["/PID", &self.root.to_string(), "/T", "/F"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;

        // taskkill exits 128 when the pid is already gone.
        match status.code() {
            Some(0) => Ok(true),
            Some(128) => Ok(false),
            _ => Err(io::Error::other(format!("taskkill exited with {status}"))),
        }
    }
}
