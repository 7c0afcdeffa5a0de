use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::domain::errors::ScanResult;
use crate::domain::models::{Config, Provider, ScanConfig};
use crate::domain::ports::{DetailsFetcher, Enumerator};
use crate::infrastructure::cache::{Cache, CacheStats};
use crate::infrastructure::repository::{Credentials, RepositoryContext};
use crate::infrastructure::retry::RetryPolicy;
use crate::services::{EnumeratorRegistry, ScanOrchestrator};

/// Composition root of one scan
///
/// Owns the session cache shared by every repository, the retry policy and
/// the registry that providers populate before building the orchestrator.
/// Cancelling the session stops pending retries and abandons in-flight
/// enumerators. Dropping it discards the cache.
pub struct ScanSession {
    cache: Arc<Cache>,
    retry: RetryPolicy,
    registry: EnumeratorRegistry,
    scan: ScanConfig,
    cancellation: CancellationToken,
}

impl ScanSession {
    pub fn from_config(config: &Config) -> Self {
        let cancellation = CancellationToken::new();
        Self {
            cache: Arc::new(Cache::new(config.cache.capacity)),
            retry: RetryPolicy::from_config(&config.retry).with_cancellation(cancellation.clone()),
            registry: EnumeratorRegistry::new(),
            scan: config.scan.clone(),
            cancellation,
        }
    }

    /// Repository support for `provider`, sharing the session cache
    ///
    /// # Errors
    /// [`ScanError::MissingCredentials`](crate::domain::ScanError::MissingCredentials)
    /// when `credentials` is `None`
    pub fn repository_context(
        &self,
        provider: Provider,
        credentials: Option<Credentials>,
    ) -> ScanResult<RepositoryContext> {
        RepositoryContext::new(
            provider,
            credentials,
            Arc::clone(&self.cache),
            self.retry.clone(),
        )
    }

    pub fn add_enumerator(&mut self, enumerator: impl Enumerator + 'static) -> ScanResult<()> {
        self.registry.add_enumerator(enumerator)
    }

    pub fn add_details_fetcher(
        &mut self,
        fetcher: impl DetailsFetcher + 'static,
    ) -> ScanResult<()> {
        self.registry.add_details_fetcher(fetcher)
    }

    pub fn registry_mut(&mut self) -> &mut EnumeratorRegistry {
        &mut self.registry
    }

    /// Freeze the registry into an orchestrator bound to the session
    pub fn orchestrator(self) -> (ScanOrchestrator, SessionHandle) {
        let orchestrator = ScanOrchestrator::new(Arc::new(self.registry), self.scan)
            .with_cancellation(self.cancellation.clone());
        let handle = SessionHandle {
            cache: self.cache,
            cancellation: self.cancellation,
        };
        (orchestrator, handle)
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }
}

/// What stays reachable of a session once its orchestrator is built
#[derive(Debug, Clone)]
pub struct SessionHandle {
    cache: Arc<Cache>,
    cancellation: CancellationToken,
}

impl SessionHandle {
    /// Stop pending retries and abandon in-flight work
    pub fn cancel(&self) {
        info!("scan session cancelled");
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Log the cache counters of the session
    pub fn log_cache_stats(&self) {
        let stats = self.cache_stats();
        info!(
            hits = stats.hits,
            misses = stats.misses,
            evictions = stats.evictions,
            entries = stats.entries,
            hit_rate = stats.hit_rate(),
            "scan session cache statistics"
        );
    }
}
