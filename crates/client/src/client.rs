//! Async PIM client
//!
//! [`PimClient`] wires the pipeline together once per configuration:
//! transport, credential exchange, token manager, rate limiter, retry policy
//! and dispatcher, plus the page walker and bulk batcher on top. Clones share
//! everything, so one quota and one credential serve every clone.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::BoxStream;
use pimsdk_common::resilience::{Backoff, RateLimiter};
use pimsdk_domain::{
    AttemptOutcome, BulkItemResult, ClientConfig, Credential, PaginatedResult, PimError,
    RequestDescriptor, Result,
};
use serde::de::DeserializeOwned;
use tracing::info;

use crate::auth::{CredentialExchange, Grant, HttpCredentialExchange, TokenManager};
use crate::bulk::{BulkBatcher, BulkItem, BulkMode};
use crate::dispatcher::Dispatcher;
use crate::pagination::PageWalker;
use crate::resources::{Categories, Families, MediaFiles, ProductModels, Products};
use crate::retry::RetryPolicy;
use crate::transport::{ReqwestTransport, Transport};

struct Inner {
    config: ClientConfig,
    dispatcher: Arc<Dispatcher>,
    pages: PageWalker,
    bulk: BulkBatcher,
}

/// Handle to one PIM instance
#[derive(Clone)]
pub struct PimClient {
    inner: Arc<Inner>,
}

impl PimClient {
    /// Client with the production transport and credential exchange.
    ///
    /// # Errors
    /// `PimError::Config` when the configuration is invalid.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Client configured from `PIM_*` environment variables.
    ///
    /// # Errors
    /// `PimError::Config` when a required variable is missing or invalid.
    pub fn from_env() -> Result<Self> {
        Self::new(crate::config::load_from_env()?)
    }

    pub fn builder(config: ClientConfig) -> PimClientBuilder {
        PimClientBuilder::new(config)
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.inner.dispatcher
    }

    #[must_use]
    pub fn token_manager(&self) -> &Arc<TokenManager> {
        self.inner.dispatcher.tokens()
    }

    #[must_use]
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        self.inner.dispatcher.limiter()
    }

    /// Execute one logical call.
    ///
    /// # Errors
    /// See [`Dispatcher::execute`].
    pub async fn execute(&self, descriptor: &RequestDescriptor) -> Result<AttemptOutcome> {
        self.inner.dispatcher.execute(descriptor).await
    }

    /// `GET path` decoded as JSON.
    ///
    /// # Errors
    /// See [`Dispatcher::execute_json`].
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.inner.dispatcher.execute_json(&RequestDescriptor::get(path)).await
    }

    /// # Errors
    /// See [`PageWalker::first_page`].
    pub async fn first_page<T: DeserializeOwned>(
        &self,
        descriptor: RequestDescriptor,
    ) -> Result<PaginatedResult<T>> {
        self.inner.pages.first_page(descriptor).await
    }

    /// # Errors
    /// See [`PageWalker::next_page`].
    pub async fn next_page<T: DeserializeOwned>(
        &self,
        previous: &PaginatedResult<T>,
    ) -> Result<Option<PaginatedResult<T>>> {
        self.inner.pages.next_page(previous).await
    }

    /// Every item of a paginated collection, page by page.
    pub fn iterate<T>(&self, descriptor: RequestDescriptor) -> BoxStream<'static, Result<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.inner.pages.iterate(descriptor)
    }

    /// Run a bulk operation; one result per item, in input order.
    pub async fn execute_bulk(&self, items: Vec<BulkItem>, mode: &BulkMode) -> Vec<BulkItemResult> {
        self.inner.bulk.execute_bulk(items, mode).await
    }

    pub fn products(&self) -> Products<'_> {
        Products::new(self)
    }

    pub fn product_models(&self) -> ProductModels<'_> {
        ProductModels::new(self)
    }

    pub fn families(&self) -> Families<'_> {
        Families::new(self)
    }

    pub fn categories(&self) -> Categories<'_> {
        Categories::new(self)
    }

    pub fn media_files(&self) -> MediaFiles<'_> {
        MediaFiles::new(self)
    }
}

/// Builder for [`PimClient`]
///
/// Every collaborator defaults to the production one derived from the
/// configuration; tests swap in their own transport or exchange.
pub struct PimClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    exchange: Option<Arc<dyn CredentialExchange>>,
    limiter: Option<Arc<RateLimiter>>,
    credential: Option<Credential>,
    backoff: Option<Backoff>,
}

impl PimClientBuilder {
    fn new(config: ClientConfig) -> Self {
        Self { config, transport: None, exchange: None, limiter: None, credential: None, backoff: None }
    }

    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn credential_exchange(mut self, exchange: Arc<dyn CredentialExchange>) -> Self {
        self.exchange = Some(exchange);
        self
    }

    /// Share a quota with other clients of the same API connection.
    #[must_use]
    pub fn rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Start from an already-issued credential.
    #[must_use]
    pub fn credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    #[must_use]
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Assemble the client
    ///
    /// # Errors
    /// `PimError::Config` for an invalid configuration or when the HTTP
    /// client cannot be created.
    pub fn build(self) -> Result<PimClient> {
        let config = self.config;
        config.validate()?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => {
                let mut builder = ReqwestTransport::builder().timeout(config.timeout());
                if let Some(agent) = &config.user_agent {
                    builder = builder.user_agent(agent.clone());
                }
                Arc::new(builder.build()?)
            }
        };

        let backoff = match self.backoff {
            Some(backoff) => backoff,
            None => Backoff::new(
                Duration::from_millis(config.backoff_base_ms),
                Duration::from_millis(config.backoff_max_ms),
            )
            .map_err(|e| PimError::Config(e.to_string()))?,
        };

        let exchange: Arc<dyn CredentialExchange> = match self.exchange {
            Some(exchange) => exchange,
            None => Arc::new(HttpCredentialExchange::new(&config, Arc::clone(&transport))?),
        };
        let mut tokens = TokenManager::new(
            exchange,
            Grant::from_config(&config),
            config.token_buffer(),
            config.max_retries,
            backoff,
        );
        if let Some(credential) = self.credential {
            tokens = tokens.with_credential(credential);
        }

        let limiter = match self.limiter {
            Some(limiter) => limiter,
            None => Arc::new(
                RateLimiter::new(config.rate_limit_calls, config.rate_limit_period())
                    .map_err(|e| PimError::Config(e.to_string()))?,
            ),
        };

        let policy = RetryPolicy::new(config.max_retries, backoff).retry_writes(config.retry_writes);
        let dispatcher = Arc::new(
            Dispatcher::new(config.base()?, transport, Arc::new(tokens), limiter, policy)
                .with_timeout(config.timeout())
                .with_deadline(config.deadline()),
        );
        let pages = PageWalker::new(Arc::clone(&dispatcher));
        let bulk = BulkBatcher::new(Arc::clone(&dispatcher))
            .with_batch_size(config.bulk_batch_size)
            .with_concurrency(config.bulk_concurrency);

        info!(
            base_url = %config.base_url,
            rate_limit_calls = config.rate_limit_calls,
            rate_limit_period_seconds = config.rate_limit_period_seconds,
            max_retries = config.max_retries,
            "PIM client initialized"
        );

        Ok(PimClient { inner: Arc::new(Inner { config, dispatcher, pages, bulk }) })
    }
}
