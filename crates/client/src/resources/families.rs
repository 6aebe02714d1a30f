//! Families (`/api/rest/v1/families`)

use std::ops::Deref;

use pimsdk_domain::constants::FAMILIES_PATH;

use super::CodeResource;
use crate::client::PimClient;

/// Family adapter: get, list, create, update and bulk upsert by code
#[derive(Clone, Copy)]
pub struct Families<'a>(CodeResource<'a>);

impl<'a> Families<'a> {
    pub(crate) const fn new(client: &'a PimClient) -> Self {
        Self(CodeResource::new(client, FAMILIES_PATH))
    }
}

impl<'a> Deref for Families<'a> {
    type Target = CodeResource<'a>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
