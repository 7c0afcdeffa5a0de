//! Domain layer for the driftscan scan engine
//!
//! This module contains the scan data model, the ports implemented by
//! enumerators and details fetchers, and the domain errors.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{EnumerationError, RemoteError, ScanError, ScanResult};
