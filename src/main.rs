use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use proclease::cli::Cli;
use proclease::config::Config;
use proclease::error::{Result, exit_codes};
use proclease::{client, coordinator};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let server = cli.server;
    let config = cli.into_config();

    // The guard must outlive the run so buffered log lines get flushed.
    let _guard = match init_logging(server, &config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(exit_codes::INTERNAL as u8);
        }
    };

    let result = if server {
        coordinator::run(config).await
    } else {
        client::run(config).await
    };

    match result {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

/// The coordinator logs to its configured file through a non-blocking
/// appender (it runs detached, with no useful stdio); the client logs to
/// stderr so a human watching the job output sees the session.
fn init_logging(server: bool, config: &Config) -> Result<Option<WorkerGuard>> {
    let default_level = if config.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if server {
        let dir = match config.log_file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;
        let file_name = config
            .log_file
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "proclease.log".into());

        let appender = tracing_appender::rolling::never(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(non_blocking)
            .with_ansi(false)
            .init();
        Ok(Some(guard))
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        Ok(None)
    }
}
