//! Categories (`/api/rest/v1/categories`) and their media files

use std::ops::Deref;

use bytes::Bytes;
use pimsdk_domain::constants::{CATEGORIES_PATH, CATEGORY_MEDIA_FILES_PATH};
use pimsdk_domain::{MultipartPart, RequestDescriptor, Result, WriteAck};
use serde_json::json;
use tracing::instrument;

use super::{nested_path, write_ack, CodeResource};
use crate::client::PimClient;

/// File attached to a category attribute
#[derive(Debug, Clone)]
pub struct CategoryMedia {
    pub category_code: String,
    pub attribute_code: String,
    pub channel: Option<String>,
    pub locale: Option<String>,
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Category adapter
#[derive(Clone, Copy)]
pub struct Categories<'a>(CodeResource<'a>);

impl<'a> Categories<'a> {
    pub(crate) const fn new(client: &'a PimClient) -> Self {
        Self(CodeResource::new(client, CATEGORIES_PATH))
    }

    /// Upload a file for a category attribute.
    ///
    /// # Errors
    /// `PimError::Validation` when the API rejects the upload.
    #[instrument(skip(self, media), fields(category = %media.category_code, attribute = %media.attribute_code))]
    pub async fn upload_media(&self, media: CategoryMedia) -> Result<WriteAck> {
        let category = json!({
            "code": media.category_code,
            "attribute_code": media.attribute_code,
            "channel": media.channel,
            "locale": media.locale,
        });
        let request = RequestDescriptor::post(CATEGORY_MEDIA_FILES_PATH).multipart(vec![
            MultipartPart::text("category", category.to_string()),
            MultipartPart::file("file", media.filename, media.content_type, media.data),
        ]);
        Ok(write_ack(&self.0.client.execute(&request).await?))
    }

    /// Download a category media file by its storage path.
    ///
    /// # Errors
    /// `PimError::NotFound` for unknown files.
    pub async fn download_media(&self, file_path: &str) -> Result<Bytes> {
        let path = format!("{}/download", nested_path(CATEGORY_MEDIA_FILES_PATH, file_path));
        let outcome = self.0.client.execute(&RequestDescriptor::get(path).header("Accept", "*/*")).await?;
        Ok(outcome.bytes())
    }
}

impl<'a> Deref for Categories<'a> {
    type Target = CodeResource<'a>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
