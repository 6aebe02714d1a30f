//! HTTP transport
//!
//! The [`Transport`] trait is the seam between request orchestration and the
//! network. The dispatcher hands it one fully-resolved attempt at a time and
//! gets back the raw [`AttemptOutcome`]; retries, credentials and rate
//! limiting all live above it. [`ReqwestTransport`] is the production
//! implementation; tests substitute in-memory transports.

use std::time::Duration;

use async_trait::async_trait;
use pimsdk_domain::constants::{COLLECTION_CONTENT_TYPE, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use pimsdk_domain::{AttemptOutcome, HttpMethod, MultipartPart, PimError, RequestBody, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder};
use tracing::debug;
use url::Url;

/// One fully-resolved transport attempt
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
    /// Bound on this single attempt
    pub timeout: Duration,
}

/// Executes single HTTP exchanges
///
/// Implementations must not retry: every call is exactly one attempt.
/// Non-2xx responses are returned as outcomes, not errors; only failures to
/// obtain a response at all become `PimError::Network`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<AttemptOutcome>;
}

/// reqwest-backed transport
#[derive(Clone)]
pub struct ReqwestTransport {
    client: ReqwestClient,
}

impl ReqwestTransport {
    /// Start building a new transport.
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::default()
    }

    /// Convenience constructor with default configuration.
    ///
    /// # Errors
    /// Returns `PimError::Config` when the TLS backend cannot be initialised.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    fn prepare(&self, request: TransportRequest) -> Result<RequestBuilder> {
        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), request.url)
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Ndjson(lines) => builder
                .header(CONTENT_TYPE, COLLECTION_CONTENT_TYPE)
                .body(RequestBody::ndjson_payload(&lines)?),
            // Forms are single-use; one is built from the parts for every attempt.
            RequestBody::Multipart(parts) => builder.multipart(build_form(parts)?),
            RequestBody::Raw { content_type, data } => {
                builder.header(CONTENT_TYPE, content_type).body(data)
            }
        };
        Ok(builder)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<AttemptOutcome> {
        let method = request.method;
        let url = request.url.clone();
        debug!(%method, %url, "sending HTTP request");

        let response = self.prepare(request)?.send().await.map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(|err| PimError::Network {
            message: format!("failed to read response body: {err}"),
            timed_out: err.is_timeout(),
            request_sent: true,
        })?;

        debug!(%method, %url, status, bytes = body.len(), "received HTTP response");
        Ok(AttemptOutcome::new(status, headers, body))
    }
}

/// Builder for [`ReqwestTransport`].
#[derive(Debug)]
pub struct ReqwestTransportBuilder {
    timeout: Duration,
    user_agent: Option<String>,
    default_headers: Option<HeaderMap>,
}

impl Default for ReqwestTransportBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: None,
            default_headers: None,
        }
    }
}

impl ReqwestTransportBuilder {
    /// Upper bound for any single exchange; requests may set a shorter one.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    /// Build the transport
    ///
    /// # Errors
    /// Returns `PimError::Config` if the underlying client cannot be created.
    pub fn build(self) -> Result<ReqwestTransport> {
        let mut headers = self.default_headers.unwrap_or_default();
        headers.entry(ACCEPT).or_insert(HeaderValue::from_static("application/json"));

        let client = ReqwestClient::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()))
            .default_headers(headers)
            .build()
            .map_err(|err| PimError::Config(format!("failed to build HTTP client: {err}")))?;

        Ok(ReqwestTransport { client })
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn build_form(parts: Vec<MultipartPart>) -> Result<Form> {
    let mut form = Form::new();
    for part in parts {
        let mut field = Part::bytes(part.data.to_vec());
        if let Some(filename) = part.filename {
            field = field.file_name(filename);
        }
        if let Some(content_type) = part.content_type {
            field = field.mime_str(&content_type).map_err(|err| {
                PimError::invalid_field(part.name.clone(), format!("invalid content type: {err}"))
            })?;
        }
        form = form.part(part.name, field);
    }
    Ok(form)
}

/// Map a reqwest failure onto the network error kind.
///
/// Connection failures never reached the server, so even non-idempotent
/// requests may be resent after them.
fn map_reqwest_error(err: reqwest::Error) -> PimError {
    if err.is_builder() {
        return PimError::Internal(format!("failed to build request: {err}"));
    }
    PimError::Network {
        message: format!("HTTP request failed: {err}"),
        timed_out: err.is_timeout(),
        request_sent: !err.is_connect(),
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use serde_json::json;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn request(method: HttpMethod, url: &str, body: RequestBody) -> TransportRequest {
        TransportRequest {
            method,
            url: Url::parse(url).unwrap(),
            headers: vec![("Authorization".into(), "Bearer t".into())],
            body,
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn returns_non_success_status_as_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/rest/v1/families/missing"))
            .respond_with(
                ResponseTemplate::new(404).set_body_string(r#"{"code":404,"message":"nope"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new().unwrap();
        let url = format!("{}/api/rest/v1/families/missing", server.uri());
        let outcome =
            transport.send(request(HttpMethod::Get, &url, RequestBody::Empty)).await.unwrap();

        assert_eq!(outcome.status, 404);
        assert!(outcome.text().contains("nope"));
    }

    #[tokio::test]
    async fn sends_ndjson_with_collection_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(header("content-type", COLLECTION_CONTENT_TYPE))
            .and(header("authorization", "Bearer t"))
            .and(body_string("{\"code\":\"a\"}\n{\"code\":\"b\"}"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new().unwrap();
        let body = RequestBody::Ndjson(vec![json!({"code": "a"}), json!({"code": "b"})]);
        let outcome =
            transport.send(request(HttpMethod::Patch, &server.uri(), body)).await.unwrap();
        assert_eq!(outcome.status, 200);
    }

    #[tokio::test]
    async fn multipart_body_can_be_sent_twice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).insert_header("Location", "/media/1"))
            .expect(2)
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new().unwrap();
        let parts = vec![
            MultipartPart::text("product", r#"{"identifier":"sku-1","attribute":"image"}"#),
            MultipartPart::file("file", "a.png", Some("image/png".into()), vec![1u8, 2, 3]),
        ];
        let req = request(HttpMethod::Post, &server.uri(), RequestBody::Multipart(parts));
        for _ in 0..2 {
            let outcome = transport.send(req.clone()).await.unwrap();
            assert_eq!(outcome.location(), Some("/media/1"));
        }
    }

    #[tokio::test]
    async fn connection_refused_is_unsent_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // release the port so that requests fail with ECONNREFUSED

        let transport = ReqwestTransport::new().unwrap();
        let url = format!("http://{addr}/api/rest/v1/products");
        match transport.send(request(HttpMethod::Post, &url, RequestBody::Empty)).await {
            Err(PimError::Network { request_sent, .. }) => assert!(!request_sent),
            other => panic!("expected network error, got {other:?}"),
        }
    }
}
