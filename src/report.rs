use crate::model::{Operation, Outcome, RunRequest};
use crate::output::{self, accent, failure, muted, number, success, warning};
use regex::Regex;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use time::OffsetDateTime;

static ERROR_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^.*error:.*$").expect("valid regex"));

/// xcodebuild prints this when `-destination` names no known simulator.
pub const DEVICE_NOT_FOUND_MARKER: &str = "Unable to find a destination matching";
pub const DEVICE_HINT: &str = "list available simulators with: xcrun simctl list devices";

#[derive(Debug, Clone)]
pub struct Summary {
    pub operation: Operation,
    pub scheme: String,
    pub outcome: Outcome,
    pub log_path: PathBuf,
    pub error_line: Option<String>,
    pub hint: Option<&'static str>,
    pub archive_path: Option<PathBuf>,
}

/// First line containing `error:`. Lossy: warnings that mention `error:`
/// match too.
pub fn extract_error_line(log: &str) -> Option<&str> {
    ERROR_LINE_RE
        .find(log)
        .map(|m| m.as_str().trim_end_matches('\r'))
}

pub fn device_hint(log: &str) -> Option<&'static str> {
    log.contains(DEVICE_NOT_FOUND_MARKER).then_some(DEVICE_HINT)
}

/// Builds the summary for a finished run. Failures re-read the log for a
/// diagnostic; a log that cannot be read just yields no diagnostic.
pub fn summarize(request: &RunRequest, outcome: Outcome, archive_path: Option<PathBuf>) -> Summary {
    let mut summary = Summary {
        operation: request.operation,
        scheme: request.scheme.clone(),
        outcome,
        log_path: request.log_path.clone(),
        error_line: None,
        hint: None,
        archive_path,
    };

    if let Outcome::Failure { .. } = outcome
        && let Some(log) = read_log(&request.log_path)
    {
        summary.error_line = extract_error_line(&log).map(str::to_string);
        summary.hint = device_hint(&log);
    }

    summary
}

fn read_log(path: &Path) -> Option<String> {
    let bytes = std::fs::read(path).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

pub fn print_summary(mut w: impl Write, summary: &Summary) -> std::io::Result<()> {
    let action = summary.operation.as_str();

    match summary.outcome {
        Outcome::Success { elapsed } => {
            writeln!(
                w,
                "{} {} {} succeeded in {}",
                success("ok"),
                action,
                accent(&summary.scheme),
                number(&output::format_secs(elapsed))
            )?;
            if let Some(path) = &summary.archive_path {
                writeln!(w, "  archive: {}", path.display())?;
            }
            return Ok(());
        }
        Outcome::Failure { exit_code, elapsed } => {
            writeln!(
                w,
                "{} {} {} failed with exit code {} after {}",
                failure("x"),
                action,
                accent(&summary.scheme),
                number(&exit_code.to_string()),
                number(&output::format_secs(elapsed))
            )?;
            if let Some(line) = &summary.error_line {
                writeln!(w, "  {}", failure(line))?;
            }
            if let Some(hint) = summary.hint {
                writeln!(w, "  {} {hint}", warning("hint:"))?;
            }
        }
        Outcome::TimedOut { timeout } => {
            writeln!(
                w,
                "{} {} {} timed out after {}",
                failure("x"),
                action,
                accent(&summary.scheme),
                number(&output::format_secs(timeout))
            )?;
        }
        Outcome::Cancelled(kind) => {
            writeln!(
                w,
                "{} {} {} {}",
                failure("x"),
                action,
                accent(&summary.scheme),
                kind.as_str()
            )?;
        }
    }

    writeln!(w, "  log: {}", muted(&summary.log_path.display().to_string()))
}

#[derive(Serialize)]
struct SummaryJson<'a> {
    action: Operation,
    scheme: &'a str,
    status: &'a str,
    exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    elapsed_ms: Option<u64>,
    #[serde(with = "time::serde::rfc3339")]
    started_at: OffsetDateTime,
    command: &'a str,
    log: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_line: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    archive_path: Option<String>,
}

pub fn write_json(
    mut w: impl Write,
    summary: &Summary,
    started_at: OffsetDateTime,
    command: &str,
) -> std::io::Result<()> {
    let elapsed = match summary.outcome {
        Outcome::Success { elapsed } | Outcome::Failure { elapsed, .. } => Some(elapsed),
        Outcome::TimedOut { timeout } => Some(timeout),
        Outcome::Cancelled(_) => None,
    };

    let payload = SummaryJson {
        action: summary.operation,
        scheme: &summary.scheme,
        status: summary.outcome.status(),
        exit_code: summary.outcome.exit_code(),
        elapsed_ms: elapsed.map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
        started_at,
        command,
        log: summary.log_path.display().to_string(),
        error_line: summary.error_line.as_deref(),
        hint: summary.hint,
        archive_path: summary
            .archive_path
            .as_ref()
            .map(|p| p.display().to_string()),
    };

    serde_json::to_writer_pretty(&mut w, &payload)?;
    writeln!(w)
}
