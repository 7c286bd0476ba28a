use crate::model::{Operation, RunRequest};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CURRENT_VERSION: i32 = 1;
pub const DEFAULT_CONFIG_PATH: &str = "./xcwrap.yml";
pub const DEFAULT_DEVICE: &str = "iPhone 16";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_TEST_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_GRACE: Duration = Duration::from_millis(100);
pub const MAX_GRACE: Duration = Duration::from_secs(10);
pub const DEFAULT_BUILD_TOOL: &str = "xcodebuild";
pub const DEFAULT_DEVICE_LIST: &[&str] = &["xcrun", "simctl", "list", "devices"];
pub const DEFAULT_LOG_NAME: &str = "xcwrap.log";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub version: i32,
    pub defaults: Defaults,
    pub tools: Tools,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Defaults {
    pub device: String,
    pub timeout: Option<u64>,
    pub test_timeout: Option<u64>,
    pub log: String,
    pub quiet: Option<bool>,
    pub grace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Tools {
    pub build: String,
    pub device_list: Vec<String>,
}

/// Tool locations and teardown timing after defaults are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub build_tool: String,
    pub device_list: Vec<String>,
    pub grace: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            build_tool: DEFAULT_BUILD_TOOL.to_string(),
            device_list: DEFAULT_DEVICE_LIST.iter().map(|s| s.to_string()).collect(),
            grace: DEFAULT_GRACE,
        }
    }
}

/// Options as given on the command line, before defaults are applied.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub operation: Operation,
    pub dir: Option<PathBuf>,
    pub scheme: Option<String>,
    pub device: Option<String>,
    pub timeout: Option<u64>,
    pub archive_path: Option<PathBuf>,
    pub log: Option<PathBuf>,
    pub quiet: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationErrors {
    pub issues: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F: Into<String>, M: Into<String>>(&mut self, field: F, message: M) {
        self.issues.push(ValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(first) = self.issues.first() {
            write!(
                f,
                "configuration validation failed: {}: {}",
                first.field, first.message
            )
        } else {
            write!(f, "configuration validation failed")
        }
    }
}

impl std::error::Error for ValidationErrors {}

pub fn load(path: &Path) -> Result<Config, String> {
    let cfg = parse(path)?;
    validate(&cfg).map_err(|e| e.to_string())?;
    Ok(cfg)
}

pub fn parse(path: &Path) -> Result<Config, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("read config: {e}"))?;
    let cfg: Config = serde_yaml::from_str(&text).map_err(|e| format!("parse config yaml: {e}"))?;
    Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<(), ValidationErrors> {
    let mut issues = ValidationErrors::new();

    if cfg.version != CURRENT_VERSION {
        issues.add("version", format!("must be {CURRENT_VERSION}"));
    }

    validate_defaults(&mut issues, &cfg.defaults);
    validate_tools(&mut issues, &cfg.tools);

    if issues.has_issues() {
        Err(issues)
    } else {
        Ok(())
    }
}

impl Config {
    pub fn settings(&self) -> Result<Settings, String> {
        let mut settings = Settings::default();

        if !self.tools.build.trim().is_empty() {
            settings.build_tool = self.tools.build.clone();
        }
        if !self.tools.device_list.is_empty() {
            settings.device_list = self.tools.device_list.clone();
        }
        if !self.defaults.grace.is_empty() {
            settings.grace = parse_duration(&self.defaults.grace)
                .map_err(|_| "defaults.grace: must be a valid duration".to_string())?;
        }

        Ok(settings)
    }
}

pub fn default_log_path() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_LOG_NAME)
}

pub fn default_timeout_secs(operation: Operation, defaults: &Defaults) -> u64 {
    match operation {
        Operation::Test => defaults.test_timeout.unwrap_or(DEFAULT_TEST_TIMEOUT_SECS),
        _ => defaults.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS),
    }
}

/// Checks run in the order callers rely on: required options first, then the
/// archive path, then the timeout. Nothing here touches the target directory.
pub fn resolve_request(opts: &RequestOptions, defaults: &Defaults) -> Result<RunRequest, String> {
    let dir = opts
        .dir
        .as_ref()
        .filter(|dir| !dir.as_os_str().is_empty())
        .ok_or_else(|| "--dir is required".to_string())?;

    let scheme = opts
        .scheme
        .as_deref()
        .map(str::trim)
        .filter(|scheme| !scheme.is_empty())
        .ok_or_else(|| "--scheme is required".to_string())?;

    let archive_path = match opts.operation {
        Operation::Archive => {
            let path = opts
                .archive_path
                .as_ref()
                .filter(|path| !path.as_os_str().is_empty())
                .ok_or_else(|| "archive requires --archive-path".to_string())?;
            Some(path.clone())
        }
        _ => None,
    };

    let timeout_secs = opts
        .timeout
        .unwrap_or_else(|| default_timeout_secs(opts.operation, defaults));
    if timeout_secs == 0 {
        return Err("timeout must be a positive integer".to_string());
    }

    let destination = if opts.operation.needs_destination() {
        let device = resolve_text(opts.device.as_deref(), &defaults.device, DEFAULT_DEVICE);
        Some(device)
    } else {
        None
    };

    let log_path = match &opts.log {
        Some(path) if !path.as_os_str().is_empty() => path.clone(),
        _ if !defaults.log.is_empty() => PathBuf::from(&defaults.log),
        _ => default_log_path(),
    };

    Ok(RunRequest {
        dir: dir.clone(),
        scheme: scheme.to_string(),
        operation: opts.operation,
        destination,
        timeout: Duration::from_secs(timeout_secs),
        log_path,
        archive_path,
        quiet: opts.quiet || defaults.quiet.unwrap_or(false),
    })
}

fn validate_defaults(issues: &mut ValidationErrors, d: &Defaults) {
    if d.timeout == Some(0) {
        issues.add("defaults.timeout", "must be a positive integer");
    }

    if d.test_timeout == Some(0) {
        issues.add("defaults.test_timeout", "must be a positive integer");
    }

    if !d.grace.is_empty() {
        match parse_duration(&d.grace) {
            Ok(grace) if grace > MAX_GRACE => {
                issues.add("defaults.grace", "must be at most 10s");
            }
            Ok(_) => {}
            Err(_) => issues.add("defaults.grace", "must be a valid duration"),
        }
    }

    if !d.device.is_empty() && d.device.trim().is_empty() {
        issues.add("defaults.device", "must not be blank");
    }
}

fn validate_tools(issues: &mut ValidationErrors, t: &Tools) {
    if !t.build.is_empty() && t.build.trim().is_empty() {
        issues.add("tools.build", "must not be blank");
    }

    for (idx, tok) in t.device_list.iter().enumerate() {
        if tok.is_empty() {
            issues.add(format!("tools.device_list[{idx}]"), "must not be empty");
        }
    }
}

fn parse_duration(text: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(text)
}

fn resolve_text(primary: Option<&str>, fallback: &str, default_value: &str) -> String {
    match primary {
        Some(value) if !value.trim().is_empty() => value.to_string(),
        _ if !fallback.trim().is_empty() => fallback.to_string(),
        _ => default_value.to_string(),
    }
}
