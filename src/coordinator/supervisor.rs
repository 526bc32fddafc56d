//! Shared child process supervision.
//!
//! The supervisor owns the shared executable's process handle exclusively:
//! nothing else starts, stops, or signals it. It deliberately does not watch
//! the child on its own; the coordinator's poll loop calls [`is_running`]
//! every tick and decides whether to restart.
//!
//! On Unix the stop sequence is SIGTERM, a bounded grace period, then SIGKILL.
//! On Windows it falls back to terminating the process directly.
//!
//! [`is_running`]: ChildSupervisor::is_running

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::process::{Child, Command};

use crate::config::SHARED_EXE_START_ARG;
use crate::error::{ProcleaseError, Result};

/// Handle to the running shared process.
struct ChildHandle {
    child: Child,
    pid: u32,
    started_at: DateTime<Utc>,
}

/// Starts, probes, and force-stops the shared executable.
pub struct ChildSupervisor {
    exe: PathBuf,
    stop_grace: Duration,
    child: Option<ChildHandle>,
}

impl ChildSupervisor {
    /// Find the shared executable among the candidate locations, in order.
    ///
    /// Failure here is an unrecoverable configuration error; the coordinator
    /// refuses to start rather than retry.
    pub fn locate(candidates: &[PathBuf]) -> Result<PathBuf> {
        for candidate in candidates {
            if candidate.is_file() {
                return Ok(candidate.clone());
            }
        }
        Err(ProcleaseError::SharedExecutableNotFound(
            candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        ))
    }

    pub fn new(exe: PathBuf, stop_grace: Duration) -> Self {
        Self {
            exe,
            stop_grace,
            child: None,
        }
    }

    /// PID of the shared process, if one is currently tracked.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(|h| h.pid)
    }

    /// When the current shared process was started.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.child.as_ref().map(|h| h.started_at)
    }

    /// Launch the shared executable as a detached background process.
    ///
    /// The caller is expected to have checked [`is_running`] first; starting
    /// replaces whatever handle is tracked.
    ///
    /// [`is_running`]: ChildSupervisor::is_running
    pub fn start(&mut self) -> Result<u32> {
        tracing::info!("{} {} starting", self.exe.display(), SHARED_EXE_START_ARG);

        let child = Command::new(&self.exe)
            .arg(SHARED_EXE_START_ARG)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        let pid = child.id().ok_or_else(|| {
            ProcleaseError::Io(std::io::Error::other(
                "shared process exited before its PID could be read",
            ))
        })?;

        tracing::info!("{} started, PID={}", self.exe.display(), pid);
        self.child = Some(ChildHandle {
            child,
            pid,
            started_at: Utc::now(),
        });
        Ok(pid)
    }

    /// Non-blocking liveness probe. Reaps and logs the exit if the child has
    /// died since the last check.
    pub fn is_running(&mut self) -> bool {
        let Some(handle) = self.child.as_mut() else {
            return false;
        };
        match handle.child.try_wait() {
            Ok(Some(status)) => {
                tracing::warn!("shared process PID={} exited: {}", handle.pid, status);
                self.child = None;
                false
            }
            Ok(None) => true,
            Err(e) => {
                tracing::warn!("could not probe shared process PID={}: {}", handle.pid, e);
                self.child = None;
                false
            }
        }
    }

    /// Stop the shared process if one is tracked. Idempotent: with nothing
    /// tracked this is a no-op.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(mut handle) = self.child.take() else {
            return Ok(());
        };

        tracing::info!("killing shared process PID={}", handle.pid);

        #[cfg(unix)]
        {
            // SAFETY: kill(2) with a valid pid and signal has no memory effects
            unsafe {
                libc::kill(handle.pid as i32, libc::SIGTERM);
            }

            match tokio::time::timeout(self.stop_grace, handle.child.wait()).await {
                Ok(status) => {
                    status?;
                }
                Err(_) => {
                    tracing::warn!(
                        "shared process PID={} did not exit within {:?}, force-killing",
                        handle.pid,
                        self.stop_grace
                    );
                    handle.child.start_kill()?;
                    handle.child.wait().await?;
                }
            }
        }

        #[cfg(not(unix))]
        {
            handle.child.kill().await?;
        }

        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;
    use tokio::time::sleep;

    /// Write an executable stub standing in for the shared executable.
    fn stub_exe(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn locate_picks_the_first_existing_candidate() {
        let dir = TempDir::new().unwrap();
        let exe = stub_exe(&dir, "helper", "exec sleep 30");
        let missing = dir.path().join("nope");

        let found = ChildSupervisor::locate(&[missing.clone(), exe.clone()]).unwrap();
        assert_eq!(found, exe);
    }

    #[test]
    fn locate_fails_fatally_when_nothing_exists() {
        let dir = TempDir::new().unwrap();
        let err = ChildSupervisor::locate(&[dir.path().join("nope")]).unwrap_err();
        assert!(matches!(err, ProcleaseError::SharedExecutableNotFound(_)));
    }

    #[tokio::test]
    async fn start_probe_stop_lifecycle() {
        let dir = TempDir::new().unwrap();
        let exe = stub_exe(&dir, "helper", "exec sleep 30");
        let mut supervisor = ChildSupervisor::new(exe, Duration::from_secs(5));

        assert!(!supervisor.is_running());
        assert!(supervisor.pid().is_none());

        let pid = supervisor.start().unwrap();
        assert!(supervisor.is_running());
        assert_eq!(supervisor.pid(), Some(pid));
        assert!(supervisor.started_at().is_some());

        supervisor.stop().await.unwrap();
        assert!(!supervisor.is_running());
        assert!(supervisor.pid().is_none());
    }

    #[tokio::test]
    async fn probe_detects_a_child_that_exits_on_its_own() {
        let dir = TempDir::new().unwrap();
        let exe = stub_exe(&dir, "helper", "exit 0");
        let mut supervisor = ChildSupervisor::new(exe, Duration::from_secs(5));

        supervisor.start().unwrap();
        // Give the stub time to run to completion.
        sleep(Duration::from_millis(200)).await;
        assert!(!supervisor.is_running());
    }

    #[tokio::test]
    async fn stop_without_a_child_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let exe = stub_exe(&dir, "helper", "exec sleep 30");
        let mut supervisor = ChildSupervisor::new(exe, Duration::from_secs(5));

        supervisor.stop().await.unwrap();
        supervisor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_force_kills_a_child_that_ignores_sigterm() {
        let dir = TempDir::new().unwrap();
        let exe = stub_exe(&dir, "helper", "trap '' TERM\nwhile :; do sleep 1; done");
        let mut supervisor = ChildSupervisor::new(exe, Duration::from_millis(300));

        supervisor.start().unwrap();
        assert!(supervisor.is_running());

        tokio::time::timeout(Duration::from_secs(5), supervisor.stop())
            .await
            .expect("stop must finish within the grace period plus kill")
            .unwrap();
        assert!(!supervisor.is_running());
    }
}
