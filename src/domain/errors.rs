//! Domain errors for the driftscan scan engine.

use std::fmt;
use thiserror::Error;

use super::models::{Provider, Resource, ResourceType};

/// Fatal configuration errors: the scan does not start.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Unknown resource type requested: {0}")]
    UnknownResourceType(ResourceType),

    #[error("An enumerator is already registered for {0}")]
    DuplicateEnumerator(ResourceType),

    #[error("A details fetcher is already registered for {0}")]
    DuplicateDetailsFetcher(ResourceType),

    #[error("Missing credentials for provider {0}")]
    MissingCredentials(Provider),
}

pub type ScanResult<T> = Result<T, ScanError>;

/// Error returned by a provider management API, reduced to what the
/// engine needs to classify it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    provider: Provider,
    status_code: Option<u16>,
    code: Option<String>,
    message: String,
}

impl RemoteError {
    pub fn new(provider: Provider, message: impl Into<String>) -> Self {
        Self {
            provider,
            status_code: None,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = &self.code {
            write!(f, "{code}: ")?;
        }
        f.write_str(&self.message)?;
        if let Some(status) = self.status_code {
            write!(f, " (status code: {status})")?;
        }
        Ok(())
    }
}

impl std::error::Error for RemoteError {}

/// Error returned by an enumerator or details fetcher
#[derive(Debug, Error)]
pub enum EnumerationError {
    /// Listing `listed_type` failed while enumerating `resource_type`
    #[error("error listing {listed_type} for {resource_type}: {source}")]
    Listing {
        resource_type: ResourceType,
        listed_type: ResourceType,
        #[source]
        source: RemoteError,
    },

    #[error("error reading details of {resource_type}.{id}: {source}")]
    ReadingDetails {
        resource_type: ResourceType,
        id: String,
        #[source]
        source: RemoteError,
    },

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("{0}")]
    Other(String),
}

impl EnumerationError {
    /// Wrap a remote error raised while listing `resource_type`
    pub fn listing(resource_type: impl Into<ResourceType>, source: RemoteError) -> Self {
        let resource_type = resource_type.into();
        Self::Listing {
            listed_type: resource_type.clone(),
            resource_type,
            source,
        }
    }

    /// Wrap a remote error raised while listing a dependency of `resource_type`
    pub fn listing_dependency(
        resource_type: impl Into<ResourceType>,
        listed_type: impl Into<ResourceType>,
        source: RemoteError,
    ) -> Self {
        Self::Listing {
            resource_type: resource_type.into(),
            listed_type: listed_type.into(),
            source,
        }
    }

    pub fn reading_details(resource: &Resource, source: RemoteError) -> Self {
        Self::ReadingDetails {
            resource_type: resource.resource_type().clone(),
            id: resource.id().to_string(),
            source,
        }
    }

    /// The remote error at the bottom of the chain, if any
    pub fn root_cause(&self) -> Option<&RemoteError> {
        match self {
            Self::Listing { source, .. } | Self::ReadingDetails { source, .. } => Some(source),
            Self::Remote(source) => Some(source),
            Self::Other(_) => None,
        }
    }

    /// Message of the root cause, or of the error itself
    pub fn root_message(&self) -> String {
        self.root_cause()
            .map_or_else(|| self.to_string(), ToString::to_string)
    }

    /// The type that was being listed when the error happened
    pub fn listed_type(&self) -> Option<&ResourceType> {
        match self {
            Self::Listing { listed_type, .. } => Some(listed_type),
            Self::ReadingDetails { resource_type, .. } => Some(resource_type),
            _ => None,
        }
    }

    /// The resource the error is attached to, when it can be identified
    pub fn resource(&self) -> Option<Resource> {
        match self {
            Self::ReadingDetails {
                resource_type, id, ..
            } => Some(Resource::identity(resource_type.clone(), id.clone())),
            _ => None,
        }
    }
}
