use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Borrow;
use std::fmt;

/// Identifier of a provider resource kind (e.g. `aws_vpc`, `google_storage_bucket`)
///
/// Used as the aggregation key of every scan result map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceType(String);

impl ResourceType {
    /// Create a resource type from its provider name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceType {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ResourceType {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl PartialEq<str> for ResourceType {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ResourceType {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for ResourceType {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Free-form resource attributes as returned by the provider
pub type Attributes = Map<String, Value>;

/// A live cloud resource discovered during a scan
///
/// Immutable once produced: enumerators build it through a
/// [`ResourceFactory`](crate::domain::ports::ResourceFactory) and the scan
/// engine only moves it around.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    id: String,
    #[serde(rename = "type")]
    resource_type: ResourceType,
    #[serde(default)]
    attributes: Attributes,
}

impl Resource {
    pub fn new(resource_type: ResourceType, id: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            id: id.into(),
            resource_type,
            attributes,
        }
    }

    /// Build a resource carrying only its identity
    pub fn identity(resource_type: ResourceType, id: impl Into<String>) -> Self {
        Self::new(resource_type, id, Attributes::new())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Look up a single attribute
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Whether two resources designate the same remote object, ignoring attributes
    pub fn same_identity(&self, other: &Self) -> bool {
        self.id == other.id && self.resource_type == other.resource_type
    }

    /// Parse a `<type>.<id>` reference into an identity-only resource
    ///
    /// Ids may contain dots, only the first one separates the type.
    pub fn from_reference(reference: &str) -> Option<Self> {
        let (resource_type, id) = reference.split_once('.')?;
        if resource_type.is_empty() || id.is_empty() {
            return None;
        }
        Some(Self::identity(ResourceType::from(resource_type), id))
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.id)
    }
}
