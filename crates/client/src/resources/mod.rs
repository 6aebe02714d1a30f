//! Resource adapters
//!
//! Thin, typed entry points per endpoint family. Every adapter only builds
//! [`RequestDescriptor`]s and hands them to the client core; none of them
//! touches the transport.

pub mod categories;
pub mod families;
pub mod media_files;
pub mod product_models;
pub mod products;

use futures::stream::BoxStream;
use pimsdk_domain::{
    AttemptOutcome, BulkItemResult, PaginatedResult, PimError, RequestDescriptor, Result, WriteAck,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use categories::{Categories, CategoryMedia};
pub use families::Families;
pub use media_files::{MediaFiles, MediaOwner};
pub use product_models::ProductModels;
pub use products::{ProductKey, Products};

use crate::bulk::{keyed_line, BulkItem, BulkMode};
use crate::client::PimClient;
use crate::search::SearchQuery;

/// `{collection}/{key}` with the key percent-encoded as one segment.
pub(crate) fn item_path(collection: &str, key: &str) -> String {
    format!("{collection}/{}", urlencoding::encode(key))
}

/// `{collection}/{a}/{b}/...`, encoding each `/`-separated segment of `key`.
///
/// Media file codes are storage paths whose slashes are meaningful.
pub(crate) fn nested_path(collection: &str, key: &str) -> String {
    let encoded: Vec<_> = key.split('/').map(urlencoding::encode).collect();
    format!("{collection}/{}", encoded.join("/"))
}

pub(crate) fn write_ack(outcome: &AttemptOutcome) -> WriteAck {
    WriteAck { status: outcome.status, location: outcome.location().map(str::to_string) }
}

/// Turn payloads into keyed upserts against `collection`.
///
/// # Errors
/// `PimError::Validation` when a payload lacks a string `key_field`.
pub(crate) fn upsert_items(collection: &str, key_field: &str, payloads: Vec<Value>) -> Result<Vec<BulkItem>> {
    payloads
        .into_iter()
        .enumerate()
        .map(|(index, payload)| {
            let key = payload
                .get(key_field)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    PimError::invalid_field(
                        key_field,
                        format!("bulk item {index} has no string '{key_field}'"),
                    )
                })?;
            let line = keyed_line(key_field, &key, payload);
            Ok(BulkItem::new(key.clone(), RequestDescriptor::patch(item_path(collection, &key)).json(line)))
        })
        .collect()
}

/// Adapter for endpoints keyed by a `code` (families, categories, product models)
#[derive(Clone, Copy)]
pub struct CodeResource<'a> {
    client: &'a PimClient,
    collection: &'static str,
}

impl<'a> CodeResource<'a> {
    pub(crate) const fn new(client: &'a PimClient, collection: &'static str) -> Self {
        Self { client, collection }
    }

    #[must_use]
    pub const fn collection(&self) -> &'static str {
        self.collection
    }

    /// Fetch one resource by code.
    ///
    /// # Errors
    /// `PimError::NotFound` for unknown codes, or any dispatcher error.
    pub async fn get<T: DeserializeOwned>(&self, code: &str) -> Result<T> {
        self.client.get_json(&item_path(self.collection, code)).await
    }

    /// First page of the collection, narrowed by `query`.
    ///
    /// # Errors
    /// `PimError::Validation` for an invalid query, or any dispatcher error.
    pub async fn list<T: DeserializeOwned>(&self, query: &SearchQuery) -> Result<PaginatedResult<T>> {
        let request = query.apply(RequestDescriptor::get(self.collection))?;
        self.client.first_page(request).await
    }

    /// Every item of the collection, fetched page by page.
    ///
    /// # Errors
    /// `PimError::Validation` for an invalid query.
    pub fn iterate<T>(&self, query: &SearchQuery) -> Result<BoxStream<'static, Result<T>>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let request = query.apply(RequestDescriptor::get(self.collection))?;
        Ok(self.client.iterate(request))
    }

    /// # Errors
    /// `PimError::Validation` when the API rejects the payload.
    pub async fn create(&self, payload: Value) -> Result<WriteAck> {
        let outcome = self.client.execute(&RequestDescriptor::post(self.collection).json(payload)).await?;
        Ok(write_ack(&outcome))
    }

    /// Create-or-update one resource.
    ///
    /// # Errors
    /// `PimError::Validation` when the API rejects the payload.
    pub async fn update(&self, code: &str, payload: Value) -> Result<WriteAck> {
        let request = RequestDescriptor::patch(item_path(self.collection, code)).json(payload);
        Ok(write_ack(&self.client.execute(&request).await?))
    }

    /// Upsert many resources through the collection's NDJSON endpoint.
    ///
    /// # Errors
    /// `PimError::Validation` when a payload has no `code`; per-item API
    /// failures are reported in the results instead.
    pub async fn bulk_upsert(&self, payloads: Vec<Value>) -> Result<Vec<BulkItemResult>> {
        let items = upsert_items(self.collection, "code", payloads)?;
        Ok(self.client.execute_bulk(items, &BulkMode::native(self.collection)).await)
    }

    pub(crate) async fn delete(&self, code: &str) -> Result<()> {
        self.client.execute(&RequestDescriptor::delete(item_path(self.collection, code))).await?;
        Ok(())
    }
}
