use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::{Config, default_shared_exe_locations};

/// proclease - keeps a shared build helper process alive while clients hold leases
///
/// Run with no flags to take a lease from the coordinator at the configured
/// address, starting one if none is reachable. Run with `-s` to be the
/// coordinator.
#[derive(Parser, Debug)]
#[command(name = "proclease")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as the coordinator (server role)
    #[arg(short = 's', long)]
    pub server: bool,

    /// The host to listen/speak on
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// The port to listen/speak on
    #[arg(short = 'P', long, default_value_t = 50005)]
    pub port: u16,

    /// After this many minutes, quit the client
    #[arg(short = 't', long = "timeout", default_value_t = 30)]
    pub timeout_minutes: u64,

    /// Be talkative
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Coordinator log file location
    #[arg(short = 'l', long, default_value = "proclease.log")]
    pub log_file: PathBuf,

    /// Ignored; useful for making things appear in a process listing
    #[arg(long, default_value = "")]
    pub comment: String,

    /// Candidate location of the shared executable (repeatable, tried in order)
    #[arg(long = "shared-exe")]
    pub shared_exe: Vec<PathBuf>,

    /// Ownership marker, read from the environment at startup
    #[arg(long, env = "BUILD_ID", default_value = "", hide = true)]
    pub build_id: String,
}

impl Cli {
    /// Build the runtime configuration, falling back to defaults for the
    /// timing knobs the CLI does not expose.
    pub fn into_config(self) -> Config {
        let shared_exe_locations = if self.shared_exe.is_empty() {
            default_shared_exe_locations()
        } else {
            self.shared_exe
        };

        Config {
            host: self.host,
            port: self.port,
            session_timeout: Duration::from_secs(self.timeout_minutes.saturating_mul(60)),
            verbose: self.verbose,
            log_file: self.log_file,
            comment: self.comment,
            build_id: self.build_id,
            shared_exe_locations,
            ..Config::default()
        }
    }
}
