//! proclease - keeps a shared build helper process alive while clients hold leases.
//!
//! The motivating problem: a build helper (the original example is
//! `mspdbsrv.exe`, which serializes PDB access during parallel builds) has its
//! own idle timeout and gets restarted by the build system with an ownership
//! marker that bulk process reapers kill by. Overlapping jobs that share the
//! helper then take each other down.
//!
//! proclease arbitrates: each job runs a lease client for its lifetime, and a
//! self-elected coordinator keeps the helper running - under a reaper-proof
//! marker - for exactly as long as at least one lease is held.

pub mod cli;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod protocol;

pub use error::{ProcleaseError, Result};
