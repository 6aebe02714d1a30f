//! Pagination walker
//!
//! Drives the dispatcher across HAL-style pages. Each step is exactly one
//! logical call; the lazy [`PageWalker::iterate`] stream fetches a page only
//! once the previous one has been drained.

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use pimsdk_domain::{PageEnvelope, PaginatedResult, RequestDescriptor, Result};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::dispatcher::Dispatcher;

/// Page-by-page access to list endpoints
#[derive(Clone)]
pub struct PageWalker {
    dispatcher: Arc<Dispatcher>,
}

impl PageWalker {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Fetch the page described by `descriptor`.
    ///
    /// # Errors
    /// Any dispatcher error, or `PimError::Decode` when the body is not a page
    /// envelope of `T`.
    #[instrument(skip_all, fields(path = %descriptor.path()))]
    pub async fn first_page<T: DeserializeOwned>(
        &self,
        descriptor: RequestDescriptor,
    ) -> Result<PaginatedResult<T>> {
        self.fetch(descriptor).await
    }

    /// Fetch the page after `previous`, or `None` when it was the last one.
    ///
    /// # Errors
    /// Same as [`PageWalker::first_page`].
    pub async fn next_page<T: DeserializeOwned>(
        &self,
        previous: &PaginatedResult<T>,
    ) -> Result<Option<PaginatedResult<T>>> {
        match previous.next_request() {
            Some(request) => self.fetch(request).await.map(Some),
            None => Ok(None),
        }
    }

    /// Lazily yield every item of every page, in order.
    ///
    /// The stream ends after the last page, or right after yielding the first
    /// error. Calling `iterate` again restarts from the first page.
    pub fn iterate<T>(&self, descriptor: RequestDescriptor) -> BoxStream<'static, Result<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let walker = self.clone();
        stream::unfold(Walk::Fetch(descriptor), move |state| {
            let walker = walker.clone();
            async move { walker.advance(state).await }
        })
        .boxed()
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        descriptor: RequestDescriptor,
    ) -> Result<PaginatedResult<T>> {
        let envelope: PageEnvelope<T> = self.dispatcher.execute_json(&descriptor).await?;
        let page = PaginatedResult::from_envelope(envelope, descriptor);
        debug!(
            items = page.items.len(),
            current_page = page.current_page,
            has_next = page.has_next(),
            "page fetched"
        );
        Ok(page)
    }

    async fn advance<T: DeserializeOwned>(&self, mut state: Walk<T>) -> Option<(Result<T>, Walk<T>)> {
        loop {
            state = match state {
                Walk::Done => return None,
                Walk::Fetch(request) => match self.fetch::<T>(request).await {
                    Ok(page) => Walk::Drain { next: page.next_request(), items: page.into_items().into_iter() },
                    Err(err) => return Some((Err(err), Walk::Done)),
                },
                Walk::Drain { mut items, next } => {
                    if let Some(item) = items.next() {
                        return Some((Ok(item), Walk::Drain { items, next }));
                    }
                    match next {
                        Some(request) => Walk::Fetch(request),
                        None => return None,
                    }
                }
            };
        }
    }
}

enum Walk<T> {
    Fetch(RequestDescriptor),
    Drain { items: std::vec::IntoIter<T>, next: Option<RequestDescriptor> },
    Done,
}
