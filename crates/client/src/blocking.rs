//! Blocking adapter
//!
//! [`BlockingPimClient`] drives a [`PimClient`] on a private runtime so
//! synchronous code can use the SDK. Rate limiting, retries and token
//! refresh behave exactly as in the async client because they are the same
//! pipeline.
//!
//! Calling any method from inside an async runtime panics, as with every
//! `block_on`-based adapter.

use std::future::Future;

use futures::stream::{BoxStream, StreamExt};
use pimsdk_domain::{
    AttemptOutcome, BulkItemResult, ClientConfig, PaginatedResult, PimError, RequestDescriptor,
    Result,
};
use serde::de::DeserializeOwned;
use tokio::runtime::{Builder, Runtime};

use crate::bulk::{BulkItem, BulkMode};
use crate::client::PimClient;

/// Synchronous facade over [`PimClient`]
pub struct BlockingPimClient {
    runtime: Runtime,
    client: PimClient,
}

impl BlockingPimClient {
    /// # Errors
    /// `PimError::Config` for an invalid configuration,
    /// `PimError::Internal` if the runtime cannot start.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = PimClient::new(config)?;
        Ok(Self { runtime: build_runtime()?, client })
    }

    /// Wrap an existing client; its clones keep sharing quota and credential.
    ///
    /// # Errors
    /// `PimError::Internal` if the runtime cannot start.
    pub fn from_client(client: PimClient) -> Result<Self> {
        Ok(Self { runtime: build_runtime()?, client })
    }

    #[must_use]
    pub const fn client(&self) -> &PimClient {
        &self.client
    }

    /// # Errors
    /// See [`PimClient::execute`].
    pub fn execute(&self, descriptor: &RequestDescriptor) -> Result<AttemptOutcome> {
        self.runtime.block_on(self.client.execute(descriptor))
    }

    /// # Errors
    /// See [`PimClient::get_json`].
    pub fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.runtime.block_on(self.client.get_json(path))
    }

    /// # Errors
    /// See [`PimClient::first_page`].
    pub fn first_page<T: DeserializeOwned>(&self, descriptor: RequestDescriptor) -> Result<PaginatedResult<T>> {
        self.runtime.block_on(self.client.first_page(descriptor))
    }

    /// # Errors
    /// See [`PimClient::next_page`].
    pub fn next_page<T: DeserializeOwned>(
        &self,
        previous: &PaginatedResult<T>,
    ) -> Result<Option<PaginatedResult<T>>> {
        self.runtime.block_on(self.client.next_page(previous))
    }

    /// Every item of a paginated collection; pages are fetched as the
    /// iterator reaches them.
    pub fn iterate<T>(&self, descriptor: RequestDescriptor) -> BlockingIter<'_, T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        BlockingIter { runtime: &self.runtime, stream: self.client.iterate(descriptor) }
    }

    pub fn execute_bulk(&self, items: Vec<BulkItem>, mode: &BulkMode) -> Vec<BulkItemResult> {
        self.runtime.block_on(self.client.execute_bulk(items, mode))
    }

    /// Run any async client operation to completion.
    ///
    /// ```no_run
    /// # use pimsdk_client::BlockingPimClient;
    /// # fn demo(client: &BlockingPimClient) -> pimsdk_client::Result<()> {
    /// let family: serde_json::Value =
    ///     client.call(|c| async move { c.families().get("shoes").await })?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn call<F, Fut, R>(&self, operation: F) -> R
    where
        F: FnOnce(PimClient) -> Fut,
        Fut: Future<Output = R>,
    {
        self.runtime.block_on(operation(self.client.clone()))
    }
}

/// Iterator over a paginated collection, see [`BlockingPimClient::iterate`]
pub struct BlockingIter<'a, T> {
    runtime: &'a Runtime,
    stream: BoxStream<'static, Result<T>>,
}

impl<T> Iterator for BlockingIter<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.runtime.block_on(self.stream.next())
    }
}

fn build_runtime() -> Result<Runtime> {
    Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("pimsdk-blocking")
        .enable_all()
        .build()
        .map_err(|e| PimError::Internal(format!("failed to start runtime: {e}")))
}
