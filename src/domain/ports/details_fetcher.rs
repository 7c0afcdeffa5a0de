//! Details fetcher port - reads the full attributes of one resource.

use async_trait::async_trait;

use crate::domain::errors::EnumerationError;
use crate::domain::models::{Resource, ResourceType};

/// Reads the complete attribute set of an enumerated resource.
///
/// Types without a registered fetcher pass through the refresh phase
/// unchanged.
#[async_trait]
pub trait DetailsFetcher: Send + Sync {
    fn supported_type(&self) -> ResourceType;

    async fn read_details(&self, resource: &Resource) -> Result<Resource, EnumerationError>;
}
