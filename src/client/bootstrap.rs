//! Coordinator election: spawning a coordinator when none is reachable.
//!
//! The spawned coordinator runs this same binary with `--server`, detached
//! from the client's stdio, and with the `BUILD_ID` environment variable
//! overridden to the distinguished marker so that bulk process reaping keyed
//! on the client's own marker does not take the coordinator down with it.
//!
//! There is no lock file. Concurrent clients may all elect at once; the
//! coordinator's listen-address bind is the mutual-exclusion point, and every
//! loser exits cleanly on its bind error.

use std::process::{Command, Stdio};

use crate::config::{Config, DETACHED_BUILD_ID};
use crate::error::Result;

/// Spawn a coordinator for the configured address in the background.
pub fn spawn_coordinator(config: &Config) -> Result<()> {
    let exe = std::env::current_exe()?;

    let mut command = Command::new(&exe);
    command
        .args(coordinator_args(config))
        .env("BUILD_ID", DETACHED_BUILD_ID)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    let child = command.spawn()?;
    tracing::info!(
        "spawned coordinator PID={} for {}",
        child.id(),
        config.addr()
    );
    Ok(())
}

/// Command-line arguments for the spawned coordinator. The comment records
/// who started it, purely for process-list visibility.
fn coordinator_args(config: &Config) -> Vec<String> {
    let cwd = std::env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "?".to_string());

    let mut args = vec![
        "--server".to_string(),
        "--host".to_string(),
        config.host.clone(),
        "--port".to_string(),
        config.port.to_string(),
        "--log-file".to_string(),
        config.log_file.display().to_string(),
    ];
    if config.verbose {
        args.push("--verbose".to_string());
    }
    for location in &config.shared_exe_locations {
        args.push("--shared-exe".to_string());
        args.push(location.display().to_string());
    }
    args.push("--comment".to_string());
    args.push(format!(
        "Started by PID {} in cwd {}, which had BUILD_ID {}",
        std::process::id(),
        cwd,
        config.build_id
    ));
    args
}
