//! Wire protocol for client-coordinator communication.
//!
//! The protocol is plain UTF-8 text over TCP, one request and one response
//! per round trip, with no framing beyond "read one chunk". There are no
//! error payloads: the coordinator always answers with status text, and a
//! peer that goes away is simply a closed socket. Closing the connection is
//! the deregistration signal; there is no goodbye message.
//!
//! ## Requests
//!
//! - `status` - ask for the multi-line diagnostic report
//! - anything else - an opaque liveness/identity announcement, conventionally
//!   `PID <pid> BUILD_ID <marker>`; the coordinator records it as the lease's
//!   identity and otherwise ignores it
//!
//! ## Responses
//!
//! - the live lease count as text: `<n> clients are connected`
//! - for `status`: a report listing the shared process PID, the live count,
//!   and one line per active lease

use crate::coordinator::registry::LeaseEntry;

/// Request payload that selects the diagnostic report.
pub const STATUS_COMMAND: &str = "status";

/// Maximum bytes read per request; anything longer is truncated by the peer's
/// own send, not rejected.
pub const MAX_MESSAGE_SIZE: usize = 1024;

/// A parsed client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Request for the diagnostic report.
    Status,
    /// Liveness announcement carrying the client's self-reported identity.
    Announce(String),
}

impl ClientMessage {
    /// Parse one request payload. Leading/trailing whitespace is not part of
    /// the message.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed == STATUS_COMMAND {
            ClientMessage::Status
        } else {
            ClientMessage::Announce(trimmed.to_string())
        }
    }
}

/// The default response: the live lease count as text.
pub fn count_response(count: usize) -> String {
    format!("{} clients are connected", count)
}

/// The multi-line report returned for `status`.
pub fn status_report(child_pid: Option<u32>, leases: &[LeaseEntry]) -> String {
    let pid_line = match child_pid {
        Some(pid) => format!("\tshared process PID: {}", pid),
        None => "\tshared process PID: not running".to_string(),
    };

    let mut lines = vec![
        "Coordinator status:".to_string(),
        pid_line,
        format!("\tlive lease count: {}", leases.len()),
        "\tactive leases:".to_string(),
    ];
    for lease in leases {
        lines.push(format!("\t\t{}: {}", lease.id, lease.identity));
    }
    lines.join("\n")
}

/// The announcement a client sends each heartbeat.
pub fn announce_line(pid: u32, build_id: &str) -> String {
    format!("PID {} BUILD_ID {}", pid, build_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn lease(id: u64, identity: &str) -> LeaseEntry {
        LeaseEntry {
            id,
            identity: identity.to_string(),
            last_seen: Utc::now(),
        }
    }

    #[test]
    fn parse_status_command() {
        assert_eq!(ClientMessage::parse("status"), ClientMessage::Status);
        assert_eq!(ClientMessage::parse("  status\n"), ClientMessage::Status);
    }

    #[test]
    fn parse_announcement() {
        let msg = ClientMessage::parse("PID 4242 BUILD_ID job-17\n");
        assert_eq!(
            msg,
            ClientMessage::Announce("PID 4242 BUILD_ID job-17".to_string())
        );
    }

    #[test]
    fn count_response_format() {
        assert_eq!(count_response(0), "0 clients are connected");
        assert_eq!(count_response(3), "3 clients are connected");
    }

    #[test]
    fn announce_round_trips_as_announcement() {
        let line = announce_line(99, "build-7");
        assert_eq!(line, "PID 99 BUILD_ID build-7");
        assert_eq!(ClientMessage::parse(&line), ClientMessage::Announce(line));
    }

    #[test]
    fn status_report_lists_every_lease() {
        let leases = vec![lease(1, "PID 10 BUILD_ID a"), lease(2, "PID 11 BUILD_ID b")];
        let report = status_report(Some(777), &leases);

        assert!(report.starts_with("Coordinator status:"));
        assert!(report.contains("shared process PID: 777"));
        assert!(report.contains("live lease count: 2"));
        assert!(report.contains("\t\t1: PID 10 BUILD_ID a"));
        assert!(report.contains("\t\t2: PID 11 BUILD_ID b"));
    }

    #[test]
    fn status_report_without_child() {
        let report = status_report(None, &[]);
        assert!(report.contains("shared process PID: not running"));
        assert!(report.contains("live lease count: 0"));
    }
}
