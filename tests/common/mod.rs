//! Common test utilities for integration tests
//!
//! Mock enumerators and details fetchers with call counters, shared by the
//! orchestrator and repository integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use driftscan::{EnumerationError, DetailsFetcher, Enumerator, Resource, ResourceType};
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Identity-only resources `<type>.<id>` for each id
pub fn resources(resource_type: &str, ids: &[&str]) -> Vec<Resource> {
    ids.iter()
        .map(|id| Resource::identity(ResourceType::from(resource_type), *id))
        .collect()
}

/// Tracks how many mocks run at the same time
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyProbe {
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ConcurrencyProbe {
    fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

type ErrorFactory = Box<dyn Fn() -> EnumerationError + Send + Sync>;

enum Behavior {
    Return(Vec<Resource>),
    Fail(ErrorFactory),
    Panic(&'static str),
}

/// Enumerator with a scripted outcome
pub struct MockEnumerator {
    resource_type: ResourceType,
    behavior: Behavior,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
    probe: Option<ConcurrencyProbe>,
}

impl MockEnumerator {
    fn new(resource_type: &str, behavior: Behavior) -> Self {
        Self {
            resource_type: ResourceType::from(resource_type),
            behavior,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
            probe: None,
        }
    }

    pub fn returning(resource_type: &str, ids: &[&str]) -> Self {
        Self::new(resource_type, Behavior::Return(resources(resource_type, ids)))
    }

    pub fn failing<F>(resource_type: &str, error: F) -> Self
    where
        F: Fn() -> EnumerationError + Send + Sync + 'static,
    {
        Self::new(resource_type, Behavior::Fail(Box::new(error)))
    }

    pub fn panicking(resource_type: &str, message: &'static str) -> Self {
        Self::new(resource_type, Behavior::Panic(message))
    }

    /// Sleep before producing the outcome
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_probe(mut self, probe: ConcurrencyProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Counter shared with the registered copy
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Enumerator for MockEnumerator {
    fn supported_type(&self) -> ResourceType {
        self.resource_type.clone()
    }

    async fn enumerate(&self) -> Result<Vec<Resource>, EnumerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(probe) = &self.probe {
            probe.enter();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(probe) = &self.probe {
            probe.exit();
        }

        match &self.behavior {
            Behavior::Return(resources) => Ok(resources.clone()),
            Behavior::Fail(error) => Err(error()),
            Behavior::Panic(message) => panic!("{message}"),
        }
    }
}

/// Details fetcher adding a `refreshed` attribute, failing for some ids
pub struct MockFetcher {
    resource_type: ResourceType,
    failing_ids: HashSet<String>,
    calls: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl MockFetcher {
    pub fn new(resource_type: &str) -> Self {
        Self {
            resource_type: ResourceType::from(resource_type),
            failing_ids: HashSet::new(),
            calls: Arc::new(AtomicUsize::new(0)),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing_for(mut self, id: &str) -> Self {
        self.failing_ids.insert(id.to_string());
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl DetailsFetcher for MockFetcher {
    fn supported_type(&self) -> ResourceType {
        self.resource_type.clone()
    }

    async fn read_details(&self, resource: &Resource) -> Result<Resource, EnumerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }

        if self.failing_ids.contains(resource.id()) {
            return Err(EnumerationError::Other(format!(
                "resource {resource} vanished"
            )));
        }

        let mut attributes = resource.attributes().clone();
        attributes.insert("refreshed".to_string(), json!(true));
        Ok(Resource::new(
            resource.resource_type().clone(),
            resource.id(),
            attributes,
        ))
    }
}
