//! Products, addressed by uuid (`/api/rest/v1/products-uuid`) or by
//! identifier (`/api/rest/v1/products`)

use futures::stream::BoxStream;
use pimsdk_domain::constants::{PRODUCTS_PATH, PRODUCTS_UUID_PATH};
use pimsdk_domain::{BulkItemResult, PaginatedResult, RequestDescriptor, Result, WriteAck};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::instrument;

use super::{item_path, upsert_items, write_ack};
use crate::bulk::BulkMode;
use crate::client::PimClient;
use crate::search::SearchQuery;

/// Which key a bulk upsert matches products on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductKey {
    Uuid,
    Identifier,
}

impl ProductKey {
    const fn field(self) -> &'static str {
        match self {
            Self::Uuid => "uuid",
            Self::Identifier => "identifier",
        }
    }

    const fn collection(self) -> &'static str {
        match self {
            Self::Uuid => PRODUCTS_UUID_PATH,
            Self::Identifier => PRODUCTS_PATH,
        }
    }
}

/// Product adapter
#[derive(Clone, Copy)]
pub struct Products<'a> {
    client: &'a PimClient,
}

impl<'a> Products<'a> {
    pub(crate) const fn new(client: &'a PimClient) -> Self {
        Self { client }
    }

    /// # Errors
    /// `PimError::NotFound` for unknown products.
    pub async fn get_by_uuid<T: DeserializeOwned>(&self, uuid: &str) -> Result<T> {
        self.client.get_json(&item_path(PRODUCTS_UUID_PATH, uuid)).await
    }

    /// # Errors
    /// `PimError::NotFound` for unknown products.
    pub async fn get_by_identifier<T: DeserializeOwned>(&self, identifier: &str) -> Result<T> {
        self.client.get_json(&item_path(PRODUCTS_PATH, identifier)).await
    }

    /// First page of products matching `query`.
    ///
    /// # Errors
    /// `PimError::Validation` for an invalid query, or any dispatcher error.
    pub async fn list<T: DeserializeOwned>(&self, query: &SearchQuery) -> Result<PaginatedResult<T>> {
        let request = query.apply(RequestDescriptor::get(PRODUCTS_UUID_PATH))?;
        self.client.first_page(request).await
    }

    /// Every product matching `query`, fetched page by page.
    ///
    /// # Errors
    /// `PimError::Validation` for an invalid query.
    pub fn iterate<T>(&self, query: &SearchQuery) -> Result<BoxStream<'static, Result<T>>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let request = query.apply(RequestDescriptor::get(PRODUCTS_UUID_PATH))?;
        Ok(self.client.iterate(request))
    }

    /// Search through `POST /products-uuid/search`, for criteria too long for
    /// a query string.
    ///
    /// The call only reads, so it is retried like a GET. Later pages re-post
    /// the criteria to the `next` link, which supplies the page position.
    ///
    /// # Errors
    /// `PimError::Validation` for an invalid query, or any dispatcher error.
    #[instrument(skip_all)]
    pub async fn search<T: DeserializeOwned>(&self, query: &SearchQuery) -> Result<PaginatedResult<T>> {
        let request = RequestDescriptor::post(format!("{PRODUCTS_UUID_PATH}/search"))
            .json(query.compile_body()?)
            .retry_writes(true);
        self.client.first_page(request).await
    }

    /// # Errors
    /// `PimError::Validation` when the API rejects the payload.
    pub async fn create(&self, payload: Value) -> Result<WriteAck> {
        let request = RequestDescriptor::post(PRODUCTS_UUID_PATH).json(payload);
        Ok(write_ack(&self.client.execute(&request).await?))
    }

    /// # Errors
    /// `PimError::Validation` when the API rejects the payload.
    pub async fn update_by_uuid(&self, uuid: &str, payload: Value) -> Result<WriteAck> {
        let request = RequestDescriptor::patch(item_path(PRODUCTS_UUID_PATH, uuid)).json(payload);
        Ok(write_ack(&self.client.execute(&request).await?))
    }

    /// # Errors
    /// `PimError::Validation` when the API rejects the payload.
    pub async fn update_by_identifier(&self, identifier: &str, payload: Value) -> Result<WriteAck> {
        let request = RequestDescriptor::patch(item_path(PRODUCTS_PATH, identifier)).json(payload);
        Ok(write_ack(&self.client.execute(&request).await?))
    }

    /// # Errors
    /// `PimError::NotFound` for unknown products.
    pub async fn delete_by_uuid(&self, uuid: &str) -> Result<()> {
        self.client.execute(&RequestDescriptor::delete(item_path(PRODUCTS_UUID_PATH, uuid))).await?;
        Ok(())
    }

    /// # Errors
    /// `PimError::NotFound` for unknown products.
    pub async fn delete_by_identifier(&self, identifier: &str) -> Result<()> {
        self.client.execute(&RequestDescriptor::delete(item_path(PRODUCTS_PATH, identifier))).await?;
        Ok(())
    }

    /// Upsert many products through the NDJSON collection endpoint.
    ///
    /// # Errors
    /// `PimError::Validation` when a payload lacks its key; per-item API
    /// failures are reported in the results instead.
    pub async fn bulk_upsert(&self, payloads: Vec<Value>, key: ProductKey) -> Result<Vec<BulkItemResult>> {
        let items = upsert_items(key.collection(), key.field(), payloads)?;
        Ok(self.client.execute_bulk(items, &BulkMode::native(key.collection())).await)
    }
}
