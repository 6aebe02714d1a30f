//! Product models (`/api/rest/v1/product-models`)

use std::ops::Deref;

use pimsdk_domain::constants::PRODUCT_MODELS_PATH;
use pimsdk_domain::Result;

use super::CodeResource;
use crate::client::PimClient;

/// Product model adapter
///
/// Everything [`CodeResource`] offers, plus deletion.
#[derive(Clone, Copy)]
pub struct ProductModels<'a>(CodeResource<'a>);

impl<'a> ProductModels<'a> {
    pub(crate) const fn new(client: &'a PimClient) -> Self {
        Self(CodeResource::new(client, PRODUCT_MODELS_PATH))
    }

    /// # Errors
    /// `PimError::NotFound` for unknown codes, or any dispatcher error.
    pub async fn delete(&self, code: &str) -> Result<()> {
        self.0.delete(code).await
    }
}

impl<'a> Deref for ProductModels<'a> {
    type Target = CodeResource<'a>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
