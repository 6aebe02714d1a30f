//! Product media files (`/api/rest/v1/media-files`)

use bytes::Bytes;
use pimsdk_domain::constants::MEDIA_FILES_PATH;
use pimsdk_domain::{MultipartPart, RequestDescriptor, Result, WriteAck};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::instrument;

use super::{nested_path, write_ack};
use crate::client::PimClient;

/// Product or product model value a file is attached to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaOwner {
    Product { identifier: String, attribute: String, scope: Option<String>, locale: Option<String> },
    ProductModel { code: String, attribute: String, scope: Option<String>, locale: Option<String> },
}

impl MediaOwner {
    /// Multipart part name and JSON payload describing the owner.
    fn part(&self) -> (&'static str, Value) {
        match self {
            Self::Product { identifier, attribute, scope, locale } => (
                "product",
                json!({"identifier": identifier, "attribute": attribute, "scope": scope, "locale": locale}),
            ),
            Self::ProductModel { code, attribute, scope, locale } => (
                "product_model",
                json!({"code": code, "attribute": attribute, "scope": scope, "locale": locale}),
            ),
        }
    }
}

/// Media file adapter
#[derive(Clone, Copy)]
pub struct MediaFiles<'a> {
    client: &'a PimClient,
}

impl<'a> MediaFiles<'a> {
    pub(crate) const fn new(client: &'a PimClient) -> Self {
        Self { client }
    }

    /// Upload a file and attach it to `owner`.
    ///
    /// The created file's code is in the `Location` of the returned ack.
    ///
    /// # Errors
    /// `PimError::Validation` when the API rejects the upload.
    #[instrument(skip(self, owner, data), fields(filename = %filename, bytes = data.len()))]
    pub async fn upload(
        &self,
        owner: &MediaOwner,
        filename: &str,
        content_type: Option<String>,
        data: Bytes,
    ) -> Result<WriteAck> {
        let (part_name, payload) = owner.part();
        let request = RequestDescriptor::post(MEDIA_FILES_PATH).multipart(vec![
            MultipartPart::text(part_name, payload.to_string()),
            MultipartPart::file("file", filename, content_type, data),
        ]);
        Ok(write_ack(&self.client.execute(&request).await?))
    }

    /// Metadata of one media file.
    ///
    /// # Errors
    /// `PimError::NotFound` for unknown codes.
    pub async fn get<T: DeserializeOwned>(&self, code: &str) -> Result<T> {
        self.client.get_json(&nested_path(MEDIA_FILES_PATH, code)).await
    }

    /// Raw content of one media file.
    ///
    /// # Errors
    /// `PimError::NotFound` for unknown codes.
    pub async fn download(&self, code: &str) -> Result<Bytes> {
        let path = format!("{}/download", nested_path(MEDIA_FILES_PATH, code));
        let outcome = self.client.execute(&RequestDescriptor::get(path).header("Accept", "*/*")).await?;
        Ok(outcome.bytes())
    }
}
