//! Application layer
//!
//! Wires the cache, retry policy, registry and orchestrator of one scan.

pub mod scan_session;

pub use scan_session::{ScanSession, SessionHandle};
