//! Support shared by every provider repository
//!
//! A repository wraps the raw API client of one provider service. Every
//! listing goes through [`RepositoryContext`], which memoizes the result in
//! the session cache and retries rate-limited calls, so enumerators asking
//! for the same listing concurrently trigger a single remote call.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use crate::domain::errors::{RemoteError, ScanError, ScanResult};
use crate::domain::models::Provider;
use crate::infrastructure::cache::{Cache, CacheLookup};
use crate::infrastructure::provider::is_transient;
use crate::infrastructure::retry::RetryPolicy;

/// Provider credentials handed to a repository
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    identity: String,
    secret: String,
}

impl Credentials {
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            secret: secret.into(),
        }
    }

    /// Access key id, client id or account name
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// One page of a paginated listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Token requesting the following page, `None` on the last page
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }

    pub fn with_next(items: Vec<T>, next_token: impl Into<String>) -> Self {
        Self {
            items,
            next_token: Some(next_token.into()),
        }
    }
}

/// Cache, retry policy and credentials of one provider's repositories
#[derive(Clone)]
pub struct RepositoryContext {
    provider: Provider,
    credentials: Credentials,
    cache: Arc<Cache>,
    retry: RetryPolicy,
}

impl RepositoryContext {
    /// Build the context, failing when the provider has no credentials
    pub fn new(
        provider: Provider,
        credentials: Option<Credentials>,
        cache: Arc<Cache>,
        retry: RetryPolicy,
    ) -> ScanResult<Self> {
        let credentials = credentials.ok_or(ScanError::MissingCredentials(provider))?;
        Ok(Self {
            provider,
            credentials,
            cache,
            retry,
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Run a remote call with retries on rate limiting, without caching
    pub async fn call<T, F, Fut>(&self, operation: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        self.retry.execute(is_transient, operation).await
    }

    /// Return the cached value of `key`, fetching it once on a miss
    ///
    /// Concurrent callers for the same key wait for the first one and share
    /// its result. A failed fetch caches nothing: the error goes back to
    /// the caller and the next caller fetches again.
    pub async fn cached<T, F, Fut>(&self, key: &str, fetch: F) -> Result<Arc<T>, RemoteError>
    where
        T: Any + Send + Sync,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        self.memoize(key, self.call(fetch)).await
    }

    /// Collect every page of a listing, in page order
    ///
    /// Each page is retried on its own, so a rate-limited page does not
    /// replay the pages already read.
    pub async fn paginate<T, F, Fut>(&self, mut fetch_page: F) -> Result<Vec<T>, RemoteError>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = Result<Page<T>, RemoteError>>,
    {
        let mut results = Vec::new();
        let mut token: Option<String> = None;
        let mut pages = 0_usize;

        loop {
            let page = self.call(|| fetch_page(token.clone())).await?;
            pages += 1;
            results.extend(page.items);
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        debug!(provider = %self.provider, pages, items = results.len(), "listing complete");
        Ok(results)
    }

    /// [`paginate`](Self::paginate) memoized under `key`
    pub async fn cached_pages<T, F, Fut>(
        &self,
        key: &str,
        fetch_page: F,
    ) -> Result<Arc<Vec<T>>, RemoteError>
    where
        T: Send + Sync + 'static,
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = Result<Page<T>, RemoteError>>,
    {
        self.memoize(key, self.paginate(fetch_page)).await
    }

    async fn memoize<T, Fut>(&self, key: &str, compute: Fut) -> Result<Arc<T>, RemoteError>
    where
        T: Any + Send + Sync,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let key = self.cache_key(key);
        let guard = match self.cache.get_and_lock::<T>(&key).await {
            CacheLookup::Hit(value) => return Ok(value),
            CacheLookup::Miss(guard) => guard,
        };

        let value = compute.await?;
        Ok(guard.put(value))
    }

    /// Keys are namespaced by provider since the cache is session-wide
    fn cache_key(&self, key: &str) -> String {
        format!("{}:{key}", self.provider)
    }
}

impl fmt::Debug for RepositoryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryContext")
            .field("provider", &self.provider)
            .field("credentials", &self.credentials)
            .field("cache", &self.cache.stats())
            .field("retry", &self.retry)
            .finish()
    }
}
