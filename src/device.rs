use crate::app_error::SetupError;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs the device enumeration command and checks that `device` appears in
/// its output. On a miss the full listing is carried in the error so the
/// caller can print it.
pub async fn validate(device: &str, list_command: &[String]) -> Result<(), SetupError> {
    let listing = list_devices(list_command).await?;

    if listing.contains(device) {
        debug!(device, "device found in simulator list");
        return Ok(());
    }

    warn!(device, "device not present in simulator list");
    Err(SetupError::InvalidDevice {
        device: device.to_string(),
        listing,
    })
}

pub async fn list_devices(list_command: &[String]) -> Result<String, SetupError> {
    let Some(program) = list_command.first() else {
        return Err(SetupError::ToolUnavailable {
            tool: "device list".to_string(),
            reason: "no command configured".to_string(),
        });
    };

    let tool = list_command.join(" ");
    let output = Command::new(program)
        .args(&list_command[1..])
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| SetupError::ToolUnavailable {
            tool: tool.clone(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let reason = match stderr.trim() {
            "" => format!("exited with {}", output.status),
            text => format!("exited with {}: {text}", output.status),
        };
        return Err(SetupError::ToolUnavailable { tool, reason });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
