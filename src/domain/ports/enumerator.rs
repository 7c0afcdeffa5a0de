//! Enumerator port - lists every live resource of one type.

use async_trait::async_trait;

use crate::domain::errors::EnumerationError;
use crate::domain::models::{Resource, ResourceType};

/// Lists all live resources of one provider resource type.
///
/// Implementations are thin glue over a repository: call the listing
/// operation, wrap each item with a
/// [`ResourceFactory`](super::ResourceFactory). Exactly one enumerator may be
/// registered per resource type.
#[async_trait]
pub trait Enumerator: Send + Sync {
    /// The resource type this enumerator produces.
    fn supported_type(&self) -> ResourceType;

    /// List every resource of [`supported_type`](Self::supported_type).
    ///
    /// Errors are not fatal to the scan: the orchestrator turns them into
    /// diagnostics for this type only.
    async fn enumerate(&self) -> Result<Vec<Resource>, EnumerationError>;
}
