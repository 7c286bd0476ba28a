mod style;

pub use style::{
    ColorEnv, accent, bold, colors_enabled, configure, failure, muted, number, success, warning,
};

use crate::command::BuildCommand;
use crate::descriptor::BuildDescriptor;
use crate::model::RunRequest;
use std::io::Write;
use std::time::Duration;

/// Whole seconds, e.g. `42s`.
pub fn format_secs(duration: Duration) -> String {
    format!("{}s", duration.as_secs())
}

/// Start-of-run banner: what is being built, where, and where the log goes.
pub fn print_banner(
    mut w: impl Write,
    request: &RunRequest,
    descriptor: &BuildDescriptor,
    command: &BuildCommand,
) -> std::io::Result<()> {
    writeln!(
        w,
        "{} {} ({})",
        bold(request.operation.verb()),
        accent(&request.scheme),
        descriptor.name
    )?;

    if let Some(device) = &request.destination {
        writeln!(w, "  destination: {device}")?;
    }
    if let Some(path) = &command.archive_path {
        writeln!(w, "  archive: {}", path.display())?;
    }
    writeln!(w, "  timeout: {}", number(&format_secs(request.timeout)))?;
    writeln!(w, "  log: {}", muted(&request.log_path.display().to_string()))
}
