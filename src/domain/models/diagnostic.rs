use serde::{Deserialize, Serialize};
use std::fmt;

use super::resource::{Resource, ResourceType};

/// Classification of a recoverable scan problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCode {
    /// The provider refused to list or read the resource type
    AccessDenied,
    /// The enumerator failed for a non-classified reason
    EnumerationFailed,
    /// Rate limiting persisted after every retry attempt
    RateLimited,
    /// Reading the details of a single resource failed
    DetailsFetchFailed,
    /// The enumerator or fetcher panicked
    Panicked,
    /// The scan was cancelled or timed out before the type completed
    Cancelled,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessDenied => "access_denied",
            Self::EnumerationFailed => "enumeration_failed",
            Self::RateLimited => "rate_limited",
            Self::DetailsFetchFailed => "details_fetch_failed",
            Self::Panicked => "panicked",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured, non-fatal record of a problem met while scanning one type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    code: DiagnosticCode,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resource_type: Option<ResourceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resource: Option<Resource>,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            resource_type: None,
            resource: None,
        }
    }

    pub fn with_resource_type(mut self, resource_type: ResourceType) -> Self {
        self.resource_type = Some(resource_type);
        self
    }

    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn code(&self) -> &'static str {
        self.code.as_str()
    }

    pub fn kind(&self) -> DiagnosticCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The resource type this diagnostic concerns, empty when unknown
    pub fn resource_type(&self) -> &str {
        self.resource_type.as_ref().map_or("", ResourceType::as_str)
    }

    pub fn resource(&self) -> Option<&Resource> {
        self.resource.as_ref()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Append-only, insertion-ordered diagnostic list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    pub fn extend(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    /// Diagnostics attached to one resource type, in insertion order
    pub fn for_type<'a>(&'a self, resource_type: &'a str) -> impl Iterator<Item = &'a Diagnostic> {
        self.0
            .iter()
            .filter(move |d| d.resource_type() == resource_type)
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
