//! Registry of enumerators and details fetchers.
//!
//! The [`EnumeratorRegistry`] holds at most one [`Enumerator`] and one
//! [`DetailsFetcher`] per resource type. Providers populate it once at
//! composition time; the scan orchestrator then resolves requested types
//! against it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::domain::errors::{ScanError, ScanResult};
use crate::domain::models::ResourceType;
use crate::domain::ports::{DetailsFetcher, Enumerator};

/// Central registry of enumerators and details fetchers, keyed by type.
#[derive(Default)]
pub struct EnumeratorRegistry {
    enumerators: BTreeMap<ResourceType, Arc<dyn Enumerator>>,
    fetchers: BTreeMap<ResourceType, Arc<dyn DetailsFetcher>>,
}

impl fmt::Debug for EnumeratorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnumeratorRegistry")
            .field("enumerators", &self.enumerators.keys().collect::<Vec<_>>())
            .field("fetchers", &self.fetchers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl EnumeratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the enumerator of its supported type.
    ///
    /// A second enumerator for the same type is rejected and the registry
    /// keeps the first one.
    pub fn add_enumerator(&mut self, enumerator: impl Enumerator + 'static) -> ScanResult<()> {
        self.add_enumerator_arc(Arc::new(enumerator))
    }

    pub fn add_enumerator_arc(&mut self, enumerator: Arc<dyn Enumerator>) -> ScanResult<()> {
        let resource_type = enumerator.supported_type();
        if self.enumerators.contains_key(&resource_type) {
            return Err(ScanError::DuplicateEnumerator(resource_type));
        }
        self.enumerators.insert(resource_type, enumerator);
        Ok(())
    }

    /// Register the details fetcher of its supported type.
    pub fn add_details_fetcher(
        &mut self,
        fetcher: impl DetailsFetcher + 'static,
    ) -> ScanResult<()> {
        self.add_details_fetcher_arc(Arc::new(fetcher))
    }

    pub fn add_details_fetcher_arc(&mut self, fetcher: Arc<dyn DetailsFetcher>) -> ScanResult<()> {
        let resource_type = fetcher.supported_type();
        if self.fetchers.contains_key(&resource_type) {
            return Err(ScanError::DuplicateDetailsFetcher(resource_type));
        }
        self.fetchers.insert(resource_type, fetcher);
        Ok(())
    }

    /// Look up the enumerator of a type.
    pub fn enumerator(&self, resource_type: &str) -> Option<&Arc<dyn Enumerator>> {
        self.enumerators.get(resource_type)
    }

    /// Look up the details fetcher of a type.
    pub fn details_fetcher(&self, resource_type: &str) -> Option<&Arc<dyn DetailsFetcher>> {
        self.fetchers.get(resource_type)
    }

    /// Resolve every requested type, failing on the first unknown one.
    pub fn resolve<'a, I>(&self, resource_types: I) -> ScanResult<Vec<Arc<dyn Enumerator>>>
    where
        I: IntoIterator<Item = &'a ResourceType>,
    {
        resource_types
            .into_iter()
            .map(|resource_type| {
                self.enumerators
                    .get(resource_type)
                    .cloned()
                    .ok_or_else(|| ScanError::UnknownResourceType(resource_type.clone()))
            })
            .collect()
    }

    /// Types with a registered enumerator, sorted.
    pub fn supported_types(&self) -> impl Iterator<Item = &ResourceType> {
        self.enumerators.keys()
    }

    pub fn len(&self) -> usize {
        self.enumerators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enumerators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::EnumerationError;
    use crate::domain::models::Resource;
    use async_trait::async_trait;

    struct StaticEnumerator(&'static str);

    #[async_trait]
    impl Enumerator for StaticEnumerator {
        fn supported_type(&self) -> ResourceType {
            ResourceType::from(self.0)
        }

        async fn enumerate(&self) -> Result<Vec<Resource>, EnumerationError> {
            Ok(Vec::new())
        }
    }

    struct IdentityFetcher(&'static str);

    #[async_trait]
    impl DetailsFetcher for IdentityFetcher {
        fn supported_type(&self) -> ResourceType {
            ResourceType::from(self.0)
        }

        async fn read_details(&self, resource: &Resource) -> Result<Resource, EnumerationError> {
            Ok(resource.clone())
        }
    }

    #[test]
    fn test_default_registry_is_empty() {
        let registry = EnumeratorRegistry::default();
        assert!(registry.is_empty());
        assert_eq!(registry.supported_types().count(), 0);
    }

    #[test]
    fn test_lookup_by_type() {
        let mut registry = EnumeratorRegistry::new();
        registry.add_enumerator(StaticEnumerator("aws_vpc")).unwrap();
        registry.add_details_fetcher(IdentityFetcher("aws_vpc")).unwrap();

        assert!(registry.enumerator("aws_vpc").is_some());
        assert!(registry.enumerator("aws_subnet").is_none());
        assert!(registry.details_fetcher("aws_vpc").is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_enumerator_rejected() {
        let mut registry = EnumeratorRegistry::new();
        registry.add_enumerator(StaticEnumerator("aws_vpc")).unwrap();

        let err = registry.add_enumerator(StaticEnumerator("aws_vpc")).unwrap_err();
        assert!(matches!(err, ScanError::DuplicateEnumerator(t) if t == "aws_vpc"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_fetcher_rejected() {
        let mut registry = EnumeratorRegistry::new();
        registry.add_details_fetcher(IdentityFetcher("aws_vpc")).unwrap();

        assert!(matches!(
            registry.add_details_fetcher(IdentityFetcher("aws_vpc")),
            Err(ScanError::DuplicateDetailsFetcher(_))
        ));
    }

    #[test]
    fn test_resolve_reports_unknown_type() {
        let mut registry = EnumeratorRegistry::new();
        registry.add_enumerator(StaticEnumerator("aws_vpc")).unwrap();

        let requested = [ResourceType::from("aws_vpc"), ResourceType::from("aws_eip")];
        let Err(err) = registry.resolve(&requested) else {
            panic!("aws_eip has no enumerator");
        };
        assert!(matches!(err, ScanError::UnknownResourceType(t) if t == "aws_eip"));

        assert_eq!(registry.resolve(&requested[..1]).unwrap().len(), 1);
    }

    #[test]
    fn test_debug_lists_types() {
        let mut registry = EnumeratorRegistry::new();
        registry.add_enumerator(StaticEnumerator("github_repository")).unwrap();

        let rendered = format!("{registry:?}");
        assert!(rendered.contains("github_repository"));
    }
}
