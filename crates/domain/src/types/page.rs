//! Paginated responses
//!
//! [`PageEnvelope`] mirrors the HAL-style list document of the remote API
//! and round-trips it exactly. [`PaginatedResult`] is the caller-facing
//! snapshot of one page, carrying enough context to request the next one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PAGE_LIMIT, REL_NEXT};
use crate::types::request::RequestDescriptor;

/// Link relation target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
}

/// Wire shape of a list response
///
/// ```json
/// {
///   "_links": {"self": {"href": "..."}, "next": {"href": "..."}},
///   "current_page": 1,
///   "items_count": 42,
///   "_embedded": {"items": [...]}
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageEnvelope<T> {
    #[serde(rename = "_links", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub links: BTreeMap<String, Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items_count: Option<u64>,
    #[serde(rename = "_embedded")]
    pub embedded: Embedded<T>,
}

/// `_embedded` section of a list response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedded<T> {
    pub items: Vec<T>,
}

/// Reference to the page after a given one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCursor {
    /// `next` link, followed verbatim
    Link(String),
    /// Page-number fallback for endpoints without link metadata
    Page { number: u32, limit: u32 },
}

/// Immutable snapshot of one page
#[derive(Debug, Clone, PartialEq)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub current_page: Option<u32>,
    pub links: BTreeMap<String, Link>,
    pub items_count: Option<u64>,
    /// Request that produced this page
    pub request: RequestDescriptor,
}

impl<T> PaginatedResult<T> {
    pub fn from_envelope(envelope: PageEnvelope<T>, request: RequestDescriptor) -> Self {
        Self {
            items: envelope.embedded.items,
            current_page: envelope.current_page,
            links: envelope.links,
            items_count: envelope.items_count,
            request,
        }
    }

    /// URL of a link relation, if present.
    #[must_use]
    pub fn link(&self, rel: &str) -> Option<&str> {
        self.links.get(rel).map(|l| l.href.as_str())
    }

    /// Cursor for the following page.
    ///
    /// When the response carried link metadata, only a `next` link counts.
    /// Otherwise the page number is incremented as long as the page was full.
    #[must_use]
    pub fn next_cursor(&self) -> Option<PageCursor> {
        if !self.links.is_empty() {
            return self.link(REL_NEXT).map(|href| PageCursor::Link(href.to_string()));
        }

        let limit = self
            .request
            .query_value("limit")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(DEFAULT_PAGE_LIMIT);
        if self.items.is_empty() || self.items.len() < limit as usize {
            return None;
        }

        let current = self
            .current_page
            .or_else(|| self.request.query_value("page").and_then(|v| v.parse().ok()))
            .unwrap_or(1);
        Some(PageCursor::Page { number: current + 1, limit })
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.next_cursor().is_some()
    }

    /// Descriptor that fetches the following page.
    #[must_use]
    pub fn next_request(&self) -> Option<RequestDescriptor> {
        match self.next_cursor()? {
            PageCursor::Link(href) => Some(self.request.follow(href)),
            PageCursor::Page { number, limit } => Some(
                self.request
                    .clone()
                    .with_query_value("page", number.to_string())
                    .with_query_value("limit", limit.to_string()),
            ),
        }
    }

    /// Transform the items while keeping the page metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResult<U> {
        PaginatedResult {
            items: self.items.into_iter().map(f).collect(),
            current_page: self.current_page,
            links: self.links,
            items_count: self.items_count,
            request: self.request,
        }
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}
