use crate::domain::models::{Attributes, Resource, ResourceType};

/// Builds abstract resources from raw provider listings
pub trait ResourceFactory: Send + Sync {
    fn create_abstract_resource(
        &self,
        resource_type: ResourceType,
        id: &str,
        attributes: Attributes,
    ) -> Resource;
}

/// Factory producing plain [`Resource`] values without normalization
#[derive(Debug, Clone, Copy, Default)]
pub struct AbstractResourceFactory;

impl ResourceFactory for AbstractResourceFactory {
    fn create_abstract_resource(
        &self,
        resource_type: ResourceType,
        id: &str,
        attributes: Attributes,
    ) -> Resource {
        Resource::new(resource_type, id, attributes)
    }
}
