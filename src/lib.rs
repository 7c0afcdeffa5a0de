//! driftscan - cloud resource enumeration engine
//!
//! driftscan inventories live cloud infrastructure by running one
//! enumerator per resource type against the provider APIs, and merges
//! their results, timings and diagnostics into a single scan result.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Scan data model, ports and errors
//! - **Infrastructure Layer** (`infrastructure`): Cache, retry, repository support, config, logging
//! - **Service Layer** (`services`): Registry and scan orchestration
//! - **Application Layer** (`application`): Scan session composition root
//!
//! # Example
//!
//! ```ignore
//! use driftscan::{ConfigLoader, EnumerateInput, ScanSession};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::load()?;
//!     let mut session = ScanSession::from_config(&config);
//!     session.add_enumerator(VpcEnumerator::new(/* repository */))?;
//!
//!     let (orchestrator, handle) = session.orchestrator();
//!     let output = orchestrator.enumerate(EnumerateInput::new(["aws_vpc"])).await?;
//!     handle.log_cache_stats();
//!     Ok(())
//! }
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{ScanSession, SessionHandle};
pub use domain::models::{
    Config, Diagnostic, DiagnosticCode, Diagnostics, EnumerateInput, EnumerateOutput, ListOutput,
    Provider, RefreshInput, RefreshOutput, Resource, ResourceType,
};
pub use domain::ports::{AbstractResourceFactory, DetailsFetcher, Enumerator, ResourceFactory};
pub use domain::{EnumerationError, RemoteError, ScanError, ScanResult};
pub use infrastructure::cache::{Cache, CacheLookup};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::logging::LoggerImpl;
pub use infrastructure::repository::{Credentials, Page, RepositoryContext};
pub use infrastructure::retry::RetryPolicy;
pub use services::{EnumeratorRegistry, ScanOrchestrator};
