//! Service layer
//!
//! Coordinates a scan over the domain ports:
//! - Enumerator registry
//! - Bounded parallel runner
//! - Enumeration error handling
//! - Scan orchestrator

pub mod enumeration_error_handler;
pub mod enumerator_registry;
pub mod parallel_runner;
pub mod scan_orchestrator;

pub use enumeration_error_handler::{
    handle_details_fetching_error, handle_enumeration_error, ScanningPhase,
};
pub use enumerator_registry::EnumeratorRegistry;
pub use parallel_runner::{JobEnd, JobReport, ParallelRunner, StopReason};
pub use scan_orchestrator::ScanOrchestrator;
