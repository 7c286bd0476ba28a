use crate::descriptor::BuildDescriptor;
use crate::model::{Operation, RunRequest};
use std::path::{Path, PathBuf};
use std::process::Stdio;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory for the build tool; descriptor names are relative to it.
    pub dir: PathBuf,
    pub archive_path: Option<PathBuf>,
}

pub fn build_command(
    program: &str,
    descriptor: &BuildDescriptor,
    request: &RunRequest,
) -> BuildCommand {
    let mut args = vec![
        descriptor.kind.flag().to_string(),
        descriptor.name.clone(),
        "-scheme".to_string(),
        request.scheme.clone(),
    ];

    if request.operation.needs_destination()
        && let Some(device) = &request.destination
    {
        args.push("-destination".to_string());
        args.push(destination_selector(device));
    }

    args.push("-skipMacroValidation".to_string());

    let archive_path = match (request.operation, &request.archive_path) {
        (Operation::Archive, Some(path)) => Some(resolve_archive_path(&request.dir, path)),
        _ => None,
    };

    if let Some(path) = &archive_path {
        args.push("-archivePath".to_string());
        args.push(path.display().to_string());
    }
    args.push(request.operation.as_str().to_string());

    BuildCommand {
        program: program.to_string(),
        args,
        dir: request.dir.clone(),
        archive_path,
    }
}

pub fn destination_selector(device: &str) -> String {
    format!("platform=iOS Simulator,name={device}")
}

/// Relative archive paths land inside the target directory. The result is
/// made absolute against the current directory when possible.
pub fn resolve_archive_path(dir: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        dir.join(path)
    };
    std::path::absolute(&joined).unwrap_or(joined)
}

impl BuildCommand {
    /// The command line as it could be pasted into a POSIX shell.
    pub fn shell_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(shell_quote)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn to_tokio_command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if !self.dir.as_os_str().is_empty() {
            cmd.current_dir(&self.dir);
        }
        cmd
    }
}

pub fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if safe {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}
