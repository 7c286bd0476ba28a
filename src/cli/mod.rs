use crate::app_error::{AppError, ExitCode, SetupError};
use crate::command::{self, BuildCommand};
use crate::config::{self, Config, DEFAULT_CONFIG_PATH, RequestOptions, Settings};
use crate::descriptor;
use crate::device;
use crate::logging;
use crate::model::{Operation, RunRequest};
use crate::output;
use crate::report;
use crate::signals::SignalBridge;
use crate::supervisor::{self, SupervisorOptions};
use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, ValueEnum};
use clap_complete::{Generator, generate};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::debug;

const AFTER_HELP: &str = "Exit codes:
  0    success
  1    invalid arguments or setup error
  124  timed out
  130  interrupted
  143  terminated
  *    xcodebuild's own exit code on build failure";

#[derive(Debug, Parser)]
#[command(
    name = "xcwrap",
    version,
    about = "Run xcodebuild with a timeout, a build log, and an error summary",
    after_help = AFTER_HELP,
    styles = clap_styles()
)]
struct Cli {
    /// Operation to run.
    #[arg(short = 'a', long = "action", value_enum, default_value_t = Operation::Build)]
    action: Operation,

    /// Directory holding the .xcworkspace or .xcodeproj.
    #[arg(short = 'd', long = "dir", value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Scheme to build.
    #[arg(short = 's', long = "scheme", value_name = "NAME")]
    scheme: Option<String>,

    /// Simulator name (build and test only).
    #[arg(short = 'D', long = "device", value_name = "NAME")]
    device: Option<String>,

    /// Timeout in seconds [default: 300, or 600 for test].
    #[arg(
        short = 't',
        long = "timeout",
        value_name = "SECONDS",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    timeout: Option<u64>,

    /// Where to write the .xcarchive (archive only).
    #[arg(short = 'o', long = "archive-path", value_name = "PATH")]
    archive_path: Option<PathBuf>,

    /// Build log file [default: <tmp>/xcwrap.log].
    #[arg(short = 'l', long = "log", value_name = "PATH")]
    log: Option<PathBuf>,

    /// Only print errors.
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Print the run summary as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Config file with defaults and tool paths.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[arg(long = "no-color")]
    no_color: bool,

    /// Diagnostic log level; overrides XCWRAP_LOG.
    #[arg(long, value_enum, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    /// Print a shell completion script and exit.
    #[arg(long, value_enum, value_name = "SHELL")]
    completions: Option<Shell>,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Shell {
    Bash,
    Zsh,
    Fish,
    Powershell,
}

fn clap_styles() -> Styles {
    Styles::plain()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .error(AnsiColor::Red.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default())
        .literal(AnsiColor::Cyan.on_default())
        .placeholder(AnsiColor::Cyan.on_default())
        .valid(AnsiColor::Cyan.on_default())
        .invalid(AnsiColor::Cyan.on_default())
        .context(AnsiColor::White.on_default())
        .context_value(AnsiColor::Cyan.on_default())
}

/// Parses arguments, runs one supervised build, and returns the exit code.
///
/// Argument errors exit 1 rather than clap's usual 2; help and version exit 0.
pub fn run_cli() -> Result<i32, AppError> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::Success,
                _ => ExitCode::Setup,
            };
            let _ = err.print();
            return Ok(code.code());
        }
    };

    output::configure(cli.no_color);
    logging::init(cli.log_level);

    if let Some(shell) = cli.completions {
        run_completion(shell)?;
        return Ok(ExitCode::Success.code());
    }

    let cfg = load_config(cli.config.as_deref())?;
    let settings = cfg
        .as_ref()
        .map(Config::settings)
        .transpose()
        .map_err(AppError::usage)?
        .unwrap_or_default();
    let defaults = cfg.map(|cfg| cfg.defaults).unwrap_or_default();

    let options = RequestOptions {
        operation: cli.action,
        dir: cli.dir,
        scheme: cli.scheme,
        device: cli.device,
        timeout: cli.timeout,
        archive_path: cli.archive_path,
        log: cli.log,
        quiet: cli.quiet,
    };
    let request = config::resolve_request(&options, &defaults).map_err(AppError::usage)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| AppError::internal(format!("start runtime: {e}")))?;

    runtime.block_on(execute(request, settings, cli.json))
}

async fn execute(request: RunRequest, settings: Settings, as_json: bool) -> Result<i32, AppError> {
    let descriptor = descriptor::discover(&request.dir)?;

    if let Some(device) = &request.destination
        && let Err(err) = device::validate(device, &settings.device_list).await
    {
        if let SetupError::InvalidDevice { listing, .. } = &err {
            eprintln!("{}", listing.trim_end());
        }
        return Err(err.into());
    }

    let command = command::build_command(&settings.build_tool, &descriptor, &request);
    debug!(command = %command.shell_line(), dir = %command.dir.display(), "build command");

    let show_status = !request.quiet && !as_json;
    if show_status {
        output::print_banner(io::stdout().lock(), &request, &descriptor, &command)
            .map_err(|e| AppError::internal(format!("write output: {e}")))?;
    }

    let mut signals = SignalBridge::subscribe()
        .map_err(|e| AppError::internal(format!("subscribe to signals: {e}")))?;

    let options = SupervisorOptions {
        timeout: request.timeout,
        grace: settings.grace,
        log_path: request.log_path.clone(),
        progress: show_status.then_some(request.operation),
    };

    let started_at = OffsetDateTime::now_utc();
    let result = supervisor::supervise(&command, &options, signals.recv()).await;
    signals.close();
    let run = result?;

    let summary = report::summarize(&request, run.outcome, command.archive_path.clone());
    print_outcome(&summary, &command, started_at, as_json, request.quiet)?;

    Ok(run.outcome.exit_code())
}

fn print_outcome(
    summary: &report::Summary,
    command: &BuildCommand,
    started_at: OffsetDateTime,
    as_json: bool,
    quiet: bool,
) -> Result<(), AppError> {
    let written = if as_json {
        report::write_json(io::stdout().lock(), summary, started_at, &command.shell_line())
    } else if !summary.outcome.is_success() {
        report::print_summary(io::stderr().lock(), summary)
    } else if !quiet {
        report::print_summary(io::stdout().lock(), summary)
    } else {
        Ok(())
    };

    written.map_err(|e| AppError::internal(format!("write output: {e}")))
}

fn load_config(explicit: Option<&Path>) -> Result<Option<Config>, AppError> {
    let path = explicit.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));

    if !path.exists() {
        if explicit.is_some() {
            return Err(AppError::usage(format!(
                "config file {} not found",
                path.display()
            )));
        }
        return Ok(None);
    }

    config::load(path).map(Some).map_err(AppError::usage)
}

fn run_completion(shell: Shell) -> Result<(), AppError> {
    let mut cmd = Cli::command();
    let mut stdout = io::stdout().lock();

    match shell {
        Shell::Bash => generate_completion(clap_complete::shells::Bash, &mut cmd, &mut stdout),
        Shell::Zsh => generate_completion(clap_complete::shells::Zsh, &mut cmd, &mut stdout),
        Shell::Fish => generate_completion(clap_complete::shells::Fish, &mut cmd, &mut stdout),
        Shell::Powershell => {
            generate_completion(clap_complete::shells::PowerShell, &mut cmd, &mut stdout)
        }
    }
    .map_err(|e| AppError::internal(format!("generate completion: {e}")))
}

fn generate_completion<G: Generator>(
    generator: G,
    cmd: &mut clap::Command,
    writer: &mut impl Write,
) -> Result<(), io::Error> {
    generate(generator, cmd, "xcwrap", writer);
    writer.flush()
}
