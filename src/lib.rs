pub mod app_error;
pub mod cli;
pub mod command;
pub mod config;
pub mod descriptor;
pub mod device;
pub mod logging;
pub mod model;
pub mod output;
pub mod progress;
pub mod report;
pub mod signals;
pub mod supervisor;

/// Runs the CLI and returns the process exit code.
pub fn run() -> i32 {
    match cli::run_cli() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err}", output::failure("error:"));
            err.code()
        }
    }
}
