//! The lease-counting coordinator.
//!
//! The coordinator owns the lifecycle of the shared child process. It accepts
//! client connections (one spawned handler task each), tracks the live lease
//! count in a [`LeaseRegistry`], and drives the child state machine from that
//! count: started on the first lease, restarted eagerly if it dies while
//! leases are held, stopped and the whole coordinator shut down once the
//! count returns to zero.
//!
//! Interrupt signals are asymmetric on purpose: while leases are held an
//! interrupt is logged and ignored so the shared process is never orphaned
//! mid-build; while idle, before any client has ever connected, an interrupt
//! shuts the coordinator down.

pub mod registry;
pub mod supervisor;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;

use crate::config::Config;
use crate::error::Result;
use crate::protocol::{self, ClientMessage, MAX_MESSAGE_SIZE};
use self::registry::LeaseRegistry;
use self::supervisor::ChildSupervisor;

/// Run the coordinator role to completion.
///
/// Locates the shared executable (fatal if missing), binds the listen
/// address, and serves until the last lease is released. Losing the bind to
/// another coordinator is not an error: the winner is already doing the job,
/// so the loser exits cleanly.
pub async fn run(config: Config) -> Result<()> {
    let exe = ChildSupervisor::locate(&config.shared_exe_locations)?;

    let listener = match TcpListener::bind(config.addr()).await {
        Ok(listener) => listener,
        Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
            tracing::info!(
                "another coordinator already owns {}; exiting",
                config.addr()
            );
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    serve(listener, exe, config).await
}

/// Serve an already-bound listener. Split from [`run`] so tests can bind an
/// ephemeral port themselves.
pub(crate) async fn serve(listener: TcpListener, exe: PathBuf, config: Config) -> Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!("being a coordinator on {}", addr);

    let registry = Arc::new(LeaseRegistry::new());
    let mut supervisor = ChildSupervisor::new(exe, config.stop_grace);
    let (pid_tx, pid_rx) = watch::channel(None::<u32>);
    let mut child_started = false;

    let mut poll = tokio::time::interval(config.poll_interval);

    #[cfg(unix)]
    let mut sigint = signal(SignalKind::interrupt())?;
    #[cfg(unix)]
    let mut sigterm = signal(SignalKind::terminate())?;

    tracing::info!("waiting for leases...");

    #[cfg(unix)]
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _)) => {
                        let registry = Arc::clone(&registry);
                        let pid_rx = pid_rx.clone();
                        tokio::spawn(handle_connection(stream, registry, pid_rx));
                    }
                    Err(e) => {
                        tracing::error!("accept error: {}", e);
                    }
                }
            }

            _ = poll.tick() => {
                if poll_tick(&registry, &mut supervisor, &pid_tx, &mut child_started).await? {
                    break;
                }
            }

            _ = sigint.recv() => {
                if honor_interrupt(&registry).await {
                    break;
                }
            }

            _ = sigterm.recv() => {
                if honor_interrupt(&registry).await {
                    break;
                }
            }
        }
    }

    #[cfg(not(unix))]
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _)) => {
                        let registry = Arc::clone(&registry);
                        let pid_rx = pid_rx.clone();
                        tokio::spawn(handle_connection(stream, registry, pid_rx));
                    }
                    Err(e) => {
                        tracing::error!("accept error: {}", e);
                    }
                }
            }

            _ = poll.tick() => {
                if poll_tick(&registry, &mut supervisor, &pid_tx, &mut child_started).await? {
                    break;
                }
            }

            _ = tokio::signal::ctrl_c() => {
                if honor_interrupt(&registry).await {
                    break;
                }
            }
        }
    }

    supervisor.stop().await?;
    drop(listener);
    tracing::info!("coordinator exiting");
    Ok(())
}

/// One supervisory poll: reconcile the child process with the lease count.
/// Returns true once the coordinator should shut down.
async fn poll_tick(
    registry: &LeaseRegistry,
    supervisor: &mut ChildSupervisor,
    pid_tx: &watch::Sender<Option<u32>>,
    child_started: &mut bool,
) -> Result<bool> {
    let count = registry.count().await;

    if count > 0 {
        if !supervisor.is_running() {
            if *child_started {
                tracing::warn!(
                    "shared process died with {} leases held, restarting",
                    count
                );
            }
            let pid = supervisor.start()?;
            pid_tx.send_replace(Some(pid));
            *child_started = true;
        }
        Ok(false)
    } else if *child_started {
        // Last lease released: stop the child and exit.
        Ok(true)
    } else {
        // Never had a lease yet; keep waiting.
        Ok(false)
    }
}

/// Decide whether an interrupt shuts the coordinator down. While leases are
/// held it is swallowed; while idle it is honored.
async fn honor_interrupt(registry: &LeaseRegistry) -> bool {
    let count = registry.count().await;
    if count > 0 {
        tracing::info!("ignoring interrupt; {} leases still held", count);
        false
    } else {
        tracing::info!("interrupt while idle, shutting down");
        true
    }
}

/// Handle one client connection for its full lifetime.
///
/// Registers a lease on entry, answers one response per request, and releases
/// the lease on any read or write failure. Closing the socket is the peer's
/// deregistration signal; there is no goodbye message.
async fn handle_connection(
    mut stream: TcpStream,
    registry: Arc<LeaseRegistry>,
    pid_rx: watch::Receiver<Option<u32>>,
) {
    let peer = stream.peer_addr().ok();
    let id = registry.register().await;
    tracing::debug!("lease {} opened from {:?}", id, peer);

    let mut buf = [0u8; MAX_MESSAGE_SIZE];
    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(_) => break,
        };
        let raw = String::from_utf8_lossy(&buf[..n]).into_owned();

        let response = match ClientMessage::parse(&raw) {
            ClientMessage::Status => {
                let leases = registry.snapshot().await;
                protocol::status_report(*pid_rx.borrow(), &leases)
            }
            ClientMessage::Announce(identity) => {
                if identity.is_empty() {
                    break;
                }
                if registry.note_identity(id, &identity).await {
                    tracing::info!("{} is alive", identity);
                }
                protocol::count_response(registry.count().await)
            }
        };

        if stream.write_all(response.as_bytes()).await.is_err() {
            break;
        }
    }

    let remaining = registry.deregister(id).await;
    tracing::info!("lease {} released, {} remain", id, remaining);
}
