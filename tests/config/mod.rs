use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::tempdir;
use xcwrap_cli::config::{
    self, Config, DEFAULT_DEVICE, Defaults, RequestOptions, Settings, Tools, load,
    resolve_request, validate,
};
use xcwrap_cli::model::Operation;

fn options(operation: Operation) -> RequestOptions {
    RequestOptions {
        operation,
        dir: Some(PathBuf::from("ios")),
        scheme: Some("App".to_string()),
        ..RequestOptions::default()
    }
}

#[test]
fn test_defaults_to_600_seconds_and_others_to_300() {
    let defaults = Defaults::default();

    let test = resolve_request(&options(Operation::Test), &defaults).expect("resolve test");
    assert_eq!(test.timeout, Duration::from_secs(600));

    for op in [Operation::Build, Operation::Clean] {
        let req = resolve_request(&options(op), &defaults).expect("resolve");
        assert_eq!(req.timeout, Duration::from_secs(300), "{op:?}");
    }

    let mut archive = options(Operation::Archive);
    archive.archive_path = Some(PathBuf::from("out/App.xcarchive"));
    let req = resolve_request(&archive, &defaults).expect("resolve archive");
    assert_eq!(req.timeout, Duration::from_secs(300));
}

#[test]
fn explicit_timeout_wins() {
    let mut opts = options(Operation::Test);
    opts.timeout = Some(42);
    let req = resolve_request(&opts, &Defaults::default()).expect("resolve");
    assert_eq!(req.timeout, Duration::from_secs(42));
}

#[test]
fn zero_timeout_is_rejected() {
    let mut opts = options(Operation::Build);
    opts.timeout = Some(0);
    let err = resolve_request(&opts, &Defaults::default()).expect_err("zero timeout");
    assert!(err.contains("positive integer"));
}

#[test]
fn missing_dir_or_scheme_is_rejected_for_every_operation() {
    for op in [
        Operation::Build,
        Operation::Test,
        Operation::Archive,
        Operation::Clean,
    ] {
        let mut no_dir = options(op);
        no_dir.dir = None;
        assert!(resolve_request(&no_dir, &Defaults::default()).is_err());

        let mut blank_scheme = options(op);
        blank_scheme.scheme = Some("  ".to_string());
        assert!(resolve_request(&blank_scheme, &Defaults::default()).is_err());
    }
}

#[test]
fn archive_requires_archive_path() {
    let err = resolve_request(&options(Operation::Archive), &Defaults::default())
        .expect_err("missing archive path");
    assert!(err.contains("--archive-path"));
}

#[test]
fn destination_only_for_build_and_test() {
    let defaults = Defaults::default();

    let build = resolve_request(&options(Operation::Build), &defaults).expect("build");
    assert_eq!(build.destination.as_deref(), Some(DEFAULT_DEVICE));

    let mut test = options(Operation::Test);
    test.device = Some("iPad Pro 13-inch (M4)".to_string());
    let test = resolve_request(&test, &defaults).expect("test");
    assert_eq!(test.destination.as_deref(), Some("iPad Pro 13-inch (M4)"));

    let mut clean = options(Operation::Clean);
    clean.device = Some("iPhone 16".to_string());
    let clean = resolve_request(&clean, &defaults).expect("clean");
    assert!(clean.destination.is_none());
}

#[test]
fn config_defaults_fill_unset_options() {
    let defaults = Defaults {
        device: "iPhone 15".to_string(),
        timeout: Some(90),
        test_timeout: Some(1200),
        log: "/var/tmp/build.log".to_string(),
        quiet: Some(true),
        grace: String::new(),
    };

    let build = resolve_request(&options(Operation::Build), &defaults).expect("build");
    assert_eq!(build.destination.as_deref(), Some("iPhone 15"));
    assert_eq!(build.timeout, Duration::from_secs(90));
    assert_eq!(build.log_path, PathBuf::from("/var/tmp/build.log"));
    assert!(build.quiet);

    let test = resolve_request(&options(Operation::Test), &defaults).expect("test");
    assert_eq!(test.timeout, Duration::from_secs(1200));
}

#[test]
fn default_log_path_is_in_temp_dir() {
    let req = resolve_request(&options(Operation::Build), &Defaults::default()).expect("build");
    assert_eq!(req.log_path, config::default_log_path());
    assert!(req.log_path.starts_with(std::env::temp_dir()));
}

#[test]
fn validate_collects_every_issue() {
    let cfg = Config {
        version: 2,
        defaults: Defaults {
            timeout: Some(0),
            grace: "soon".to_string(),
            ..Defaults::default()
        },
        tools: Tools {
            build: "   ".to_string(),
            device_list: vec!["xcrun".to_string(), String::new()],
        },
    };

    let err = validate(&cfg).expect_err("invalid config");
    let fields: Vec<&str> = err.issues.iter().map(|i| i.field.as_str()).collect();
    assert!(fields.contains(&"version"));
    assert!(fields.contains(&"defaults.timeout"));
    assert!(fields.contains(&"defaults.grace"));
    assert!(fields.contains(&"tools.build"));
    assert!(fields.contains(&"tools.device_list[1]"));
}

#[test]
fn validate_rejects_long_grace() {
    let cfg = Config {
        version: 1,
        defaults: Defaults {
            grace: "30s".to_string(),
            ..Defaults::default()
        },
        ..Config::default()
    };

    let err = validate(&cfg).expect_err("grace too long");
    assert_eq!(err.issues[0].field, "defaults.grace");
}

#[test]
fn settings_fall_back_to_builtin_tools() {
    let cfg = Config {
        version: 1,
        ..Config::default()
    };
    assert_eq!(cfg.settings().expect("settings"), Settings::default());
    assert_eq!(Settings::default().build_tool, "xcodebuild");
    assert_eq!(
        Settings::default().grace,
        Duration::from_millis(100)
    );
}

#[test]
fn load_yaml_config() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("xcwrap.yml");
    fs::write(
        &path,
        r#"version: 1
defaults:
  device: "iPhone 15 Pro"
  test_timeout: 900
  grace: "250ms"
tools:
  build: /opt/xcode/bin/xcodebuild
  device_list: ["/bin/echo", "iPhone 15 Pro"]
"#,
    )
    .expect("write config");

    let cfg = load(&path).expect("load config");
    assert_eq!(cfg.defaults.device, "iPhone 15 Pro");
    assert_eq!(cfg.defaults.test_timeout, Some(900));

    let settings = cfg.settings().expect("settings");
    assert_eq!(settings.build_tool, "/opt/xcode/bin/xcodebuild");
    assert_eq!(settings.device_list, vec!["/bin/echo", "iPhone 15 Pro"]);
    assert_eq!(settings.grace, Duration::from_millis(250));
}

#[test]
fn load_rejects_unknown_fields() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("xcwrap.yml");
    fs::write(&path, "version: 1\nretries: 3\n").expect("write config");

    let err = load(&path).expect_err("unknown field");
    assert!(err.starts_with("parse config yaml:"));
}
