//! Runtime configuration shared by the coordinator and the lease client.
//!
//! Built once from the CLI at startup and passed by value to whichever role
//! runs. Timing knobs are plain fields so tests can shrink them.

use std::path::PathBuf;
use std::time::Duration;

/// The argument passed to the shared executable when starting it.
pub const SHARED_EXE_START_ARG: &str = "-start";

/// Ownership marker assigned to a coordinator spawned by a client, chosen so
/// that bulk process reaping keyed on the client's own marker misses it.
pub const DETACHED_BUILD_ID: &str = "Independent";

/// Configuration for one proclease process, either role.
#[derive(Debug, Clone)]
pub struct Config {
    /// Host the coordinator listens on / the client connects to.
    pub host: String,
    /// Port the coordinator listens on / the client connects to.
    pub port: u16,
    /// Client session lifetime; the session ends once this much wall-clock
    /// time has elapsed, regardless of server responsiveness.
    pub session_timeout: Duration,
    /// Debug-level logging.
    pub verbose: bool,
    /// Coordinator log file path.
    pub log_file: PathBuf,
    /// Ignored by logic; carried on the command line for process-list
    /// visibility.
    pub comment: String,
    /// Ownership marker read from the environment at startup.
    pub build_id: String,
    /// Ordered candidate locations for the shared executable.
    pub shared_exe_locations: Vec<PathBuf>,

    /// How often the coordinator polls the lease count and child health.
    /// Bounds both stop latency after the last disconnect and restart latency
    /// after an unexpected child death.
    pub poll_interval: Duration,
    /// How often the client sends a liveness announcement.
    pub heartbeat_interval: Duration,
    /// Client connect timeout.
    pub connect_timeout: Duration,
    /// How long the client waits after spawning a coordinator before retrying.
    pub elect_retry_pause: Duration,
    /// How long the supervisor waits after SIGTERM before force-killing.
    pub stop_grace: Duration,
}

impl Config {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 50005,
            session_timeout: Duration::from_secs(30 * 60),
            verbose: false,
            log_file: PathBuf::from("proclease.log"),
            comment: String::new(),
            build_id: String::new(),
            shared_exe_locations: default_shared_exe_locations(),
            poll_interval: Duration::from_secs(1),
            heartbeat_interval: Duration::from_secs(2),
            connect_timeout: Duration::from_millis(2500),
            elect_retry_pause: Duration::from_secs(2),
            stop_grace: Duration::from_secs(5),
        }
    }
}

/// Conventional install locations of the shared executable, tried in order.
pub fn default_shared_exe_locations() -> Vec<PathBuf> {
    vec![PathBuf::from(
        "c:/Program Files (x86)/Microsoft Visual Studio 10.0/Common7/IDE/mspdbsrv.exe",
    )]
}
