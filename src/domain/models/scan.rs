use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use uuid::Uuid;

use super::diagnostic::{Diagnostic, Diagnostics};
use super::resource::{Resource, ResourceType};

/// Resources grouped by type
pub type ResourcesByType = BTreeMap<ResourceType, Vec<Resource>>;

/// The set of resource types to scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumerateInput {
    pub resource_types: BTreeSet<ResourceType>,
}

impl EnumerateInput {
    pub fn new<I, T>(resource_types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ResourceType>,
    {
        Self {
            resource_types: resource_types.into_iter().map(Into::into).collect(),
        }
    }
}

/// Aggregated result of one scan
///
/// Every requested type owns a key in both `resources` and `timings`, even
/// when its enumerator failed.
#[derive(Debug, Clone, Serialize)]
pub struct EnumerateOutput {
    pub scan_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub resources: ResourcesByType,
    pub timings: BTreeMap<ResourceType, Duration>,
    pub diagnostics: Diagnostics,
}

impl EnumerateOutput {
    pub fn new(scan_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            scan_id,
            started_at,
            resources: BTreeMap::new(),
            timings: BTreeMap::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    /// Total number of resources across all types
    pub fn resource_count(&self) -> usize {
        self.resources.values().map(Vec::len).sum()
    }

    /// Resources found for one type, empty when the type was not scanned
    pub fn resources_of(&self, resource_type: &str) -> &[Resource] {
        self.resources
            .get(resource_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn diagnostics_for<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = &'a Diagnostic> {
        self.diagnostics.for_type(resource_type)
    }
}

/// Result of running one enumerator
///
/// Merged by the orchestrator: a failure never aborts the other types.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumerationOutcome {
    Success(Vec<Resource>),
    Failure(Diagnostic),
}

/// Resources whose details should be read
#[derive(Debug, Clone, Default)]
pub struct RefreshInput {
    pub resources: ResourcesByType,
}

impl RefreshInput {
    pub fn new(resources: ResourcesByType) -> Self {
        Self { resources }
    }
}

impl From<EnumerateOutput> for RefreshInput {
    fn from(output: EnumerateOutput) -> Self {
        Self::new(output.resources)
    }
}

/// Resources with their details read
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshOutput {
    pub resources: ResourcesByType,
    pub diagnostics: Diagnostics,
}

/// Enumerated and refreshed resources of a single type
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListOutput {
    pub resources: Vec<Resource>,
    pub diagnostics: Diagnostics,
}
