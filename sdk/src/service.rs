//! Generic service facade.
//!
//! A [`Service`] binds one [`ServiceDefinition`] to a transport and an
//! authenticator. Every operation follows the same path: validate the
//! arguments against the descriptor, attach identification and auth
//! headers, send once, map the response.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::{
    auth::{Authenticator, Credentials},
    endpoint::{EndpointDescriptor, EndpointKind, ServiceDefinition},
    error::{Error, Result},
    http::{HttpClient, RawResponse},
    request::{CallArgs, Request, prepare},
    response::{DetailedResponse, Payload, map_bytes, map_json, map_payload},
    stream::{ChannelHandler, StreamingChannel},
};

/// One Watson service family bound to a transport and credentials.
pub struct Service {
    definition: &'static ServiceDefinition,
    http: Arc<HttpClient>,
    auth: RwLock<Arc<dyn Authenticator>>,
    url: RwLock<Url>,
    version: RwLock<Option<String>>,
    /// Token endpoint applied to API keys passed to `set_credentials`.
    iam_url: Option<String>,
}

impl Service {
    pub(crate) fn new(
        definition: &'static ServiceDefinition,
        http: Arc<HttpClient>,
        auth: Arc<dyn Authenticator>,
        url: Url,
        version: Option<String>,
    ) -> Self {
        Self {
            definition,
            http,
            auth: RwLock::new(auth),
            url: RwLock::new(url),
            version: RwLock::new(version),
            iam_url: None,
        }
    }

    pub(crate) fn with_iam_url(mut self, iam_url: Option<String>) -> Self {
        self.iam_url = iam_url;
        self
    }

    /// Returns the service family definition.
    pub fn definition(&self) -> &'static ServiceDefinition {
        self.definition
    }

    /// Returns the service name.
    pub fn name(&self) -> &'static str {
        self.definition.name
    }

    /// Returns the current base URL.
    pub fn url(&self) -> Url {
        self.url.read().clone()
    }

    /// Overrides the base URL.
    pub fn set_url(&self, url: &str) -> Result<()> {
        let parsed = parse_base_url(url)?;
        *self.url.write() = parsed;
        Ok(())
    }

    /// Returns the version date sent with each call.
    pub fn version(&self) -> Option<String> {
        self.version.read().clone()
    }

    /// Overrides the version date. `None` stops sending `version`.
    pub fn set_version(&self, version: Option<&str>) {
        *self.version.write() = version.filter(|v| !v.is_empty()).map(str::to_string);
    }

    /// Replaces the credentials. In-flight calls keep the previous ones.
    ///
    /// API keys without their own token endpoint use the client's.
    pub fn set_credentials(&self, credentials: Credentials) -> Result<()> {
        let credentials = credentials.or_iam_url(self.iam_url.as_deref());
        let auth = credentials
            .authenticator_with_agent(self.http.inner().clone(), self.http.user_agent())?;
        debug!(service = self.name(), kind = credentials.kind(), "credentials replaced");
        *self.auth.write() = auth;
        Ok(())
    }

    /// Replaces the authenticator.
    pub fn set_authenticator(&self, auth: Arc<dyn Authenticator>) {
        *self.auth.write() = auth;
    }

    /// Looks up an operation.
    pub fn descriptor(&self, operation: &str) -> Result<&'static EndpointDescriptor> {
        self.definition.endpoint(operation).ok_or_else(|| {
            Error::argument(format!("{}: unknown operation {:?}", self.name(), operation))
        })
    }

    /// Returns the names of all operations.
    pub fn operations(&self) -> Vec<&'static str> {
        self.definition.operation_names().collect()
    }

    /// Validates `args` and builds the request without sending it.
    ///
    /// The result carries identification headers but no `Authorization`.
    pub fn build_request(&self, operation: &str, args: CallArgs) -> Result<Request> {
        let descriptor = self.descriptor(operation)?;
        self.build(descriptor, args)
    }

    fn build(&self, descriptor: &EndpointDescriptor, args: CallArgs) -> Result<Request> {
        let url = self.url();
        let version = self.version();
        let mut request = prepare(descriptor, &url, version.as_deref(), args)?;
        self.http.decorate(&mut request);
        Ok(request)
    }

    async fn authorize(&self, request: &mut Request) -> Result<()> {
        let auth = self.auth.read().clone();
        let header = auth.auth_header().await?;
        request.set_header(AUTHORIZATION.as_str(), &header)
    }

    async fn send(&self, operation: &str, args: CallArgs) -> Result<RawResponse> {
        let descriptor = self.descriptor(operation)?;
        if descriptor.kind != EndpointKind::Rest {
            return Err(Error::argument(format!(
                "{}.{} is a streaming operation",
                self.name(),
                operation
            )));
        }
        self.send_with(descriptor, args).await
    }

    async fn send_with(
        &self,
        descriptor: &EndpointDescriptor,
        args: CallArgs,
    ) -> Result<RawResponse> {
        let mut request = self.build(descriptor, args)?;
        self.authorize(&mut request).await?;
        debug!(service = self.name(), operation = descriptor.name, "calling");
        self.http.execute(request).await
    }

    /// Calls an operation and deserializes its JSON response.
    pub async fn call<T>(&self, operation: &str, args: CallArgs) -> Result<DetailedResponse<T>>
    where
        T: DeserializeOwned,
    {
        map_json(self.send(operation, args).await?)
    }

    /// Calls an operation and returns the raw response body.
    pub async fn call_bytes(&self, operation: &str, args: CallArgs) -> Result<DetailedResponse<Bytes>> {
        map_bytes(self.send(operation, args).await?)
    }

    /// Calls an operation, returning JSON or bytes by response content type.
    pub async fn call_payload(
        &self,
        operation: &str,
        args: CallArgs,
    ) -> Result<DetailedResponse<Payload>> {
        map_payload(self.send(operation, args).await?)
    }

    /// Calls an ad-hoc descriptor against this service's URL and credentials.
    pub async fn call_descriptor<T>(
        &self,
        descriptor: &EndpointDescriptor,
        args: CallArgs,
    ) -> Result<DetailedResponse<T>>
    where
        T: DeserializeOwned,
    {
        map_json(self.send_with(descriptor, args).await?)
    }

    /// Opens a duplex streaming operation.
    ///
    /// `init`, when given, is sent as the first text frame.
    pub async fn open_channel(
        &self,
        operation: &str,
        args: CallArgs,
        init: Option<serde_json::Value>,
        handler: Arc<dyn ChannelHandler>,
    ) -> Result<StreamingChannel> {
        let descriptor = self.descriptor(operation)?;
        if descriptor.kind != EndpointKind::Duplex {
            return Err(Error::argument(format!(
                "{}.{} is not a streaming operation",
                self.name(),
                operation
            )));
        }

        let mut request = self.build(descriptor, args)?;
        self.authorize(&mut request).await?;
        let url = websocket_url(request.url)?;

        let channel = StreamingChannel::connect(&url, &request.headers, handler).await?;
        if let Some(init) = init {
            channel.send_json(&init).await?;
        }
        Ok(channel)
    }
}

pub(crate) fn parse_base_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url.trim_end_matches('/'))
        .map_err(|e| Error::argument(format!("invalid service url {url:?}: {e}")))?;
    if parsed.cannot_be_a_base() {
        return Err(Error::argument(format!("invalid service url {url:?}")));
    }
    Ok(parsed)
}

fn websocket_url(mut url: Url) -> Result<Url> {
    let scheme = match url.scheme() {
        "https" => "wss",
        "http" => "ws",
        "wss" | "ws" => return Ok(url),
        other => {
            return Err(Error::argument(format!("unsupported url scheme {other:?}")));
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| Error::argument(format!("cannot stream over {url}")))?;
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::BearerTokenAuthenticator, catalog, http::HttpConfig};

    fn service(def: &'static ServiceDefinition) -> Service {
        let http = Arc::new(HttpClient::new(HttpConfig::default()).unwrap());
        Service::new(
            def,
            http,
            Arc::new(BearerTokenAuthenticator::new("tok")),
            parse_base_url(def.default_url).unwrap(),
            def.version.map(str::to_string),
        )
    }

    #[test]
    fn test_build_request_uses_service_url_and_version() {
        let svc = service(&catalog::ASSISTANT);
        let req = svc
            .build_request("message", CallArgs::new().arg("workspace_id", "abc"))
            .unwrap();
        assert_eq!(
            req.url.as_str(),
            "https://gateway.watsonplatform.net/assistant/api/v1/workspaces/abc/message?version=2018-09-20"
        );
        assert!(req.header("user-agent").unwrap().starts_with("watson-sdk-rust/"));
        assert!(req.header("authorization").is_none());
    }

    #[test]
    fn test_set_url_and_version() {
        let svc = service(&catalog::DISCOVERY);
        svc.set_url("http://localhost:8080/discovery/").unwrap();
        svc.set_version(Some("2019-04-30"));

        let req = svc.build_request("list_environments", CallArgs::new()).unwrap();
        assert_eq!(
            req.url.as_str(),
            "http://localhost:8080/discovery/v1/environments?version=2019-04-30"
        );

        svc.set_version(None);
        let req = svc.build_request("list_environments", CallArgs::new()).unwrap();
        assert_eq!(req.url.query(), None);

        assert!(svc.set_url("not a url").unwrap_err().is_argument());
    }

    #[test]
    fn test_unknown_operation() {
        let svc = service(&catalog::TONE_ANALYZER);
        let err = svc.build_request("sentiment", CallArgs::new()).unwrap_err();
        assert!(err.is_argument());
        assert_eq!(svc.operations(), vec!["tone", "tone_chat"]);
    }

    #[tokio::test]
    async fn test_streaming_operation_rejected_by_call() {
        let svc = service(&catalog::TEXT_TO_SPEECH);
        let err = svc
            .call_bytes("synthesize_stream", CallArgs::new())
            .await
            .unwrap_err();
        assert!(err.is_argument());
    }

    #[test]
    fn test_websocket_url() {
        let url = Url::parse("https://stream.example.test/text-to-speech/api/v1/synthesize?voice=en-US_AllisonV3Voice").unwrap();
        assert_eq!(
            websocket_url(url).unwrap().as_str(),
            "wss://stream.example.test/text-to-speech/api/v1/synthesize?voice=en-US_AllisonV3Voice"
        );
        let url = Url::parse("http://127.0.0.1:9000/v1/recognize").unwrap();
        assert_eq!(websocket_url(url).unwrap().scheme(), "ws");
    }
}
