//! Port trait definitions (Hexagonal Architecture)
//!
//! Interfaces the scan engine consumes from its collaborators:
//! - Enumerator: lists every resource of one type
//! - DetailsFetcher: reads the full attributes of one resource
//! - ResourceFactory: wraps raw provider items into resources

pub mod details_fetcher;
pub mod enumerator;
pub mod resource_factory;

pub use details_fetcher::DetailsFetcher;
pub use enumerator::Enumerator;
pub use resource_factory::{AbstractResourceFactory, ResourceFactory};
