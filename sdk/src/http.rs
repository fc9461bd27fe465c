//! HTTP transport for the Watson APIs.
//!
//! One attempt per call. Failures are returned to the caller as-is; retry
//! policy belongs to the caller.

use std::{collections::BTreeMap, time::Duration};

use bytes::Bytes;
use reqwest::{
    Client as ReqwestClient,
    header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT},
};
use tracing::debug;

use crate::{
    error::{Error, Result},
    request::{Body, Request},
};

/// Default client identification sent as `User-Agent`.
pub const DEFAULT_USER_AGENT: &str = concat!("watson-sdk-rust/", env!("CARGO_PKG_VERSION"));

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Transport options.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub user_agent: String,
    pub default_headers: HeaderMap,
    pub disable_ssl_verification: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            default_headers: HeaderMap::new(),
            disable_ssl_verification: false,
        }
    }
}

/// A response as received, before mapping.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    /// Lowercase header names.
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn content_type(&self) -> &str {
        self.headers
            .get(CONTENT_TYPE.as_str())
            .map(|s| s.as_str())
            .unwrap_or("")
    }
}

/// HTTP client for Watson APIs.
pub struct HttpClient {
    client: ReqwestClient,
    user_agent: HeaderValue,
    default_headers: HeaderMap,
}

impl HttpClient {
    /// Creates a new HTTP client.
    pub fn new(config: HttpConfig) -> Result<Self> {
        let client = ReqwestClient::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.disable_ssl_verification)
            .build()?;

        Self::with_client(client, config)
    }

    /// Wraps an externally configured reqwest client.
    pub fn with_client(client: ReqwestClient, config: HttpConfig) -> Result<Self> {
        let user_agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| Error::argument(format!("invalid user agent: {e}")))?;

        Ok(Self {
            client,
            user_agent,
            default_headers: config.default_headers,
        })
    }

    /// Returns the underlying reqwest client.
    pub fn inner(&self) -> &ReqwestClient {
        &self.client
    }

    /// Adds the client identification and default headers. Headers already
    /// present on the request win.
    pub fn decorate(&self, request: &mut Request) {
        if !request.headers.contains_key(USER_AGENT) {
            request.headers.insert(USER_AGENT, self.user_agent.clone());
        }
        for (name, value) in &self.default_headers {
            if !request.headers.contains_key(name) {
                request.headers.insert(name.clone(), value.clone());
            }
        }
    }

    /// Returns the identification header value.
    pub fn user_agent(&self) -> &str {
        self.user_agent.to_str().unwrap_or(DEFAULT_USER_AGENT)
    }

    /// Sends a request and reads the full response body.
    pub async fn execute(&self, request: Request) -> Result<RawResponse> {
        let Request {
            method,
            url,
            headers,
            body,
        } = request;

        debug!(%method, %url, "sending request");

        let mut builder = self.client.request(method.into(), url).headers(headers);
        builder = match body {
            Body::Empty => builder,
            Body::Json(data) => builder.body(data),
            Body::Raw { data, .. } => builder.body(data),
            Body::Multipart(form) => builder.multipart(form.into_form()?),
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let body = response.bytes().await?;

        debug!(status, bytes = body.len(), "received response");

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        out.entry(name.as_str().to_string())
            .and_modify(|v| {
                v.push_str(", ");
                v.push_str(&value);
            })
            .or_insert(value);
    }
    out
}
