//! Request descriptors
//!
//! A [`RequestDescriptor`] is the only thing a resource adapter hands to the
//! dispatcher. It is built once and never mutated afterwards; the dispatcher
//! re-encodes it for every attempt.

use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::impl_wire_token_conversions;

/// Body keys that locate a page; a followed link supersedes them
const PAGE_POSITION_KEYS: [&str; 2] = ["page", "search_after"];

/// HTTP methods used by the PIM API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl_wire_token_conversions!(HttpMethod {
    Get => "GET",
    Post => "POST",
    Put => "PUT",
    Patch => "PATCH",
    Delete => "DELETE",
});

impl HttpMethod {
    /// Repeating the request has no additional side effects.
    #[must_use]
    pub const fn is_idempotent(self) -> bool {
        matches!(self, Self::Get | Self::Put | Self::Delete)
    }
}

/// One part of a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartPart {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl MultipartPart {
    /// Plain text field.
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filename: None,
            content_type: None,
            data: Bytes::from(value.into()),
        }
    }

    /// File field with a filename and optional MIME type.
    pub fn file(
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: Option<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self { name: name.into(), filename: Some(filename.into()), content_type, data: data.into() }
    }
}

/// Request payload
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    /// `application/json`
    Json(Value),
    /// Newline-delimited JSON collection (`application/vnd.akeneo.collection+json`)
    Ndjson(Vec<Value>),
    /// `multipart/form-data`
    Multipart(Vec<MultipartPart>),
    /// Opaque bytes with an explicit content type
    Raw { content_type: String, data: Bytes },
}

impl RequestBody {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    #[must_use]
    pub const fn is_multipart(&self) -> bool {
        matches!(self, Self::Multipart(_))
    }

    /// Serialize NDJSON lines into a single payload.
    ///
    /// # Errors
    /// Returns the serializer error when a line cannot be encoded.
    pub fn ndjson_payload(lines: &[Value]) -> serde_json::Result<String> {
        let mut payload = String::new();
        for (index, line) in lines.iter().enumerate() {
            if index > 0 {
                payload.push('\n');
            }
            payload.push_str(&serde_json::to_string(line)?);
        }
        Ok(payload)
    }
}

/// Immutable description of one logical HTTP call
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    method: HttpMethod,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: RequestBody,
    retry_writes: Option<bool>,
    deadline: Option<Duration>,
}

impl RequestDescriptor {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: RequestBody::Empty,
            retry_writes: None,
            deadline: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    /// Append one query parameter, keeping insertion order.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Append several query parameters, keeping insertion order.
    #[must_use]
    pub fn query_pairs<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query.extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Replace the value of `key`, appending it if absent.
    #[must_use]
    pub fn with_query_value(mut self, key: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        match self.query.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.query.push((key.to_string(), value)),
        }
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    #[must_use]
    pub fn ndjson(mut self, lines: Vec<Value>) -> Self {
        self.body = RequestBody::Ndjson(lines);
        self
    }

    #[must_use]
    pub fn multipart(mut self, parts: Vec<MultipartPart>) -> Self {
        self.body = RequestBody::Multipart(parts);
        self
    }

    #[must_use]
    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Allow (or forbid) retrying this call on server errors regardless of
    /// the method's idempotency.
    #[must_use]
    pub fn retry_writes(mut self, allow: bool) -> Self {
        self.retry_writes = Some(allow);
        self
    }

    /// Deadline for the whole logical call, all attempts included.
    #[must_use]
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    #[must_use]
    pub const fn method(&self) -> HttpMethod {
        self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path is a full URL (e.g. a pagination link) rather than a relative path.
    #[must_use]
    pub fn is_absolute(&self) -> bool {
        self.path.starts_with("http://") || self.path.starts_with("https://")
    }

    #[must_use]
    pub fn query_params(&self) -> &[(String, String)] {
        &self.query
    }

    #[must_use]
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    #[must_use]
    pub const fn request_body(&self) -> &RequestBody {
        &self.body
    }

    #[must_use]
    pub const fn is_multipart(&self) -> bool {
        self.body.is_multipart()
    }

    #[must_use]
    pub const fn retry_writes_override(&self) -> Option<bool> {
        self.retry_writes
    }

    #[must_use]
    pub const fn deadline_override(&self) -> Option<Duration> {
        self.deadline
    }

    /// Same request against a different path, query dropped.
    ///
    /// Used when following a pagination link, which already carries the
    /// complete query string. A JSON object body loses its page position
    /// (`page`, `search_after`) and every key the link's query names.
    #[must_use]
    pub fn follow(&self, url: impl Into<String>) -> Self {
        let path = url.into();
        let body = match &self.body {
            RequestBody::Json(Value::Object(fields)) => {
                let linked: Vec<String> = path
                    .split_once('?')
                    .map(|(_, query)| {
                        url::form_urlencoded::parse(query.as_bytes())
                            .map(|(key, _)| key.into_owned())
                            .collect()
                    })
                    .unwrap_or_default();
                let mut fields = fields.clone();
                fields.retain(|key, _| {
                    !PAGE_POSITION_KEYS.contains(&key.as_str()) && !linked.iter().any(|k| k == key)
                });
                RequestBody::Json(Value::Object(fields))
            }
            other => other.clone(),
        };
        Self { path, query: Vec::new(), body, ..self.clone() }
    }
}
