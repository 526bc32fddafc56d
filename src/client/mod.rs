//! The lease client.
//!
//! A client holds exactly one lease: one long-lived TCP connection to the
//! coordinator, over which it announces itself every couple of seconds and
//! reads the coordinator's count response. The session ends at the configured
//! wall-clock lifetime, and the socket closing is the only deregistration
//! signal the coordinator gets.
//!
//! If no coordinator is reachable (connection refused), the client elects
//! itself: it spawns a coordinator in the background and retries. Concurrent
//! electors race safely because only one spawned coordinator can win the
//! listen-address bind.

pub mod bootstrap;

use std::io;
use std::time::Instant;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};

use crate::config::Config;
use crate::error::{ProcleaseError, Result};
use crate::protocol::{self, MAX_MESSAGE_SIZE};

/// Run the client role: obtain a lease, hold it for the configured lifetime.
pub async fn run(config: Config) -> Result<()> {
    let pid = std::process::id();
    tracing::info!("BUILD_ID={}", config.build_id);

    loop {
        tracing::debug!("connecting to coordinator at {}", config.addr());
        match timeout(config.connect_timeout, TcpStream::connect(config.addr())).await {
            Ok(Ok(stream)) => return session(stream, &config, pid).await,

            // No coordinator is listening: elect to start one, then retry.
            Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => {
                tracing::info!(
                    "connection refused at {}; starting a coordinator",
                    config.addr()
                );
                bootstrap::spawn_coordinator(&config)?;
                sleep(config.elect_retry_pause).await;
            }

            Ok(Err(e)) => {
                return Err(ProcleaseError::CoordinatorConnection(format!(
                    "{}: {}",
                    config.addr(),
                    e
                )));
            }

            Err(_) => {
                return Err(ProcleaseError::CoordinatorConnection(format!(
                    "timed out connecting to {}",
                    config.addr()
                )));
            }
        }
    }
}

/// Hold the lease: heartbeat until the wall-clock lifetime elapses or the
/// coordinator goes away. The cutoff takes precedence over server
/// responsiveness, so the response read is bounded by the time remaining.
async fn session(mut stream: TcpStream, config: &Config, pid: u32) -> Result<()> {
    let started = Instant::now();
    let lifetime = config.session_timeout;
    let announce = protocol::announce_line(pid, &config.build_id);
    let mut buf = [0u8; MAX_MESSAGE_SIZE];

    while started.elapsed() < lifetime {
        stream.write_all(announce.as_bytes()).await?;

        let remaining = lifetime.saturating_sub(started.elapsed());
        let n = match timeout(remaining, stream.read(&mut buf)).await {
            Ok(read) => read?,
            Err(_) => break,
        };
        if n == 0 {
            tracing::info!("coordinator closed the connection");
            break;
        }
        let response = String::from_utf8_lossy(&buf[..n]);

        // Keep a human watching the log convinced the session is alive.
        println!(
            "proclease: client has run for {} out of {} seconds. Server said: {}",
            started.elapsed().as_secs(),
            lifetime.as_secs(),
            response
        );

        let pause = config.heartbeat_interval.min(
            lifetime.saturating_sub(started.elapsed()),
        );
        sleep(pause).await;
    }

    tracing::info!("session over after {:?}, closing", started.elapsed());
    Ok(())
}
